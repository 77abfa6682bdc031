//! Engine wide configuration values.

use crate::{generator::granular::GrainPoolPolicy, utils::db_to_linear, Error};

// -------------------------------------------------------------------------------------------------

/// Number of waveform chunks a recorded sample gets split into.
pub const NUM_CHUNKS: usize = 128;
/// Length of a recorded sample in seconds.
pub const WAVE_LEN_SECONDS: f64 = 2.0;
/// Duration of a single waveform chunk in seconds.
pub const CHUNK_LEN_SECONDS: f64 = WAVE_LEN_SECONDS / NUM_CHUNKS as f64;
/// Number of polyphonic keyboard voices. The loop voice comes on top.
pub const MAX_VOICES: usize = 6;
/// Max number of chunks a selection may span.
pub const MAX_SELECTION_CHUNKS: usize = 37;
/// Max grain duration coefficient.
pub const MAX_DURATION_COEFF: f32 = 8.0;
/// Lowest low-pass filter cutoff in Hz.
pub const MIN_FILTER_CUTOFF: f32 = 200.0;
/// Highest low-pass filter cutoff in Hz. At this value the filter is bypassed.
pub const MAX_FILTER_CUTOFF: f32 = 22050.0;

pub const NOTE_CHANNEL_CAPACITY: usize = 16;
pub const TRIGGER_CHANNEL_CAPACITY: usize = 512;
pub const CHUNK_CHANNEL_CAPACITY: usize = 256;

// -------------------------------------------------------------------------------------------------

/// Configuration for a granular node, its recorder and its control session.
///
/// Use [`Config::default`] and the builder functions to customize it. All values are checked in
/// [`Config::validate`] when creating a node or recorder.
#[derive(Debug, Clone)]
pub struct Config {
    /// By default [`NUM_CHUNKS`]. Number of waveform chunks.
    pub num_chunks: usize,
    /// By default [`WAVE_LEN_SECONDS`]. Length of recorded samples.
    pub wave_len_seconds: f64,
    /// By default [`MAX_VOICES`]. Number of polyphonic note voices.
    pub max_voices: usize,
    /// By default [`MAX_SELECTION_CHUNKS`].
    pub max_selection_chunks: usize,
    /// By default [`MAX_DURATION_COEFF`].
    pub max_duration_coeff: f32,
    /// By default [`MIN_FILTER_CUTOFF`].
    pub min_filter_cutoff: f32,
    /// By default [`MAX_FILTER_CUTOFF`]. Also the initial cutoff, which leaves the output
    /// unfiltered.
    pub max_filter_cutoff: f32,
    /// By default 2048. Longest block the audio thread processes at once. Longer blocks get
    /// split up, so this only affects the size of preallocated scratch buffers.
    pub max_block_size: usize,
    /// By default [`NOTE_CHANNEL_CAPACITY`].
    pub note_channel_capacity: usize,
    /// By default [`TRIGGER_CHANNEL_CAPACITY`].
    pub trigger_channel_capacity: usize,
    /// By default [`CHUNK_CHANNEL_CAPACITY`].
    pub chunk_channel_capacity: usize,
    /// By default 0.01 seconds.
    pub attack_time: f32,
    /// By default 0.05 seconds.
    pub release_time: f32,
    /// By default -12 dB.
    pub trim: f32,
    /// By default true. Apply a bell shaped window to each grain.
    pub bell_envelope: bool,
    /// By default [`GrainPoolPolicy::DropNew`].
    pub pool_policy: GrainPoolPolicy,
    /// By default None: seed grain jitter from the OS. Set to get reproducible output.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_chunks: NUM_CHUNKS,
            wave_len_seconds: WAVE_LEN_SECONDS,
            max_voices: MAX_VOICES,
            max_selection_chunks: MAX_SELECTION_CHUNKS,
            max_duration_coeff: MAX_DURATION_COEFF,
            min_filter_cutoff: MIN_FILTER_CUTOFF,
            max_filter_cutoff: MAX_FILTER_CUTOFF,
            max_block_size: 2048,
            note_channel_capacity: NOTE_CHANNEL_CAPACITY,
            trigger_channel_capacity: TRIGGER_CHANNEL_CAPACITY,
            chunk_channel_capacity: CHUNK_CHANNEL_CAPACITY,
            attack_time: 0.01,
            release_time: 0.05,
            trim: db_to_linear(-12.0),
            bell_envelope: true,
            pool_policy: GrainPoolPolicy::DropNew,
            seed: None,
        }
    }
}

impl Config {
    pub fn num_chunks(mut self, num_chunks: usize) -> Self {
        self.num_chunks = num_chunks;
        self
    }

    pub fn wave_len_seconds(mut self, seconds: f64) -> Self {
        self.wave_len_seconds = seconds;
        self
    }

    pub fn max_voices(mut self, voices: usize) -> Self {
        self.max_voices = voices;
        self
    }

    pub fn filter_cutoff_range(mut self, min: f32, max: f32) -> Self {
        self.min_filter_cutoff = min;
        self.max_filter_cutoff = max;
        self
    }

    pub fn max_block_size(mut self, size: usize) -> Self {
        self.max_block_size = size;
        self
    }

    pub fn note_channel_capacity(mut self, capacity: usize) -> Self {
        self.note_channel_capacity = capacity;
        self
    }

    pub fn trigger_channel_capacity(mut self, capacity: usize) -> Self {
        self.trigger_channel_capacity = capacity;
        self
    }

    pub fn chunk_channel_capacity(mut self, capacity: usize) -> Self {
        self.chunk_channel_capacity = capacity;
        self
    }

    pub fn attack_time(mut self, seconds: f32) -> Self {
        self.attack_time = seconds;
        self
    }

    pub fn release_time(mut self, seconds: f32) -> Self {
        self.release_time = seconds;
        self
    }

    pub fn trim(mut self, trim: f32) -> Self {
        self.trim = trim;
        self
    }
    pub fn trim_db(mut self, trim_db: f32) -> Self {
        self.trim = db_to_linear(trim_db);
        self
    }

    pub fn bell_envelope(mut self, enabled: bool) -> Self {
        self.bell_envelope = enabled;
        self
    }

    pub fn pool_policy(mut self, policy: GrainPoolPolicy) -> Self {
        self.pool_policy = policy;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Number of samples a recorded wave has at the given sample rate.
    pub fn wave_len_samples(&self, sample_rate: u32) -> usize {
        (self.wave_len_seconds * sample_rate as f64) as usize
    }

    /// Number of samples a single chunk spans at the given sample rate.
    pub fn samples_per_chunk(&self, sample_rate: u32) -> f64 {
        self.wave_len_seconds * sample_rate as f64 / self.num_chunks as f64
    }

    /// Convert a selection length in chunks to samples.
    pub fn chunks_to_samples(&self, chunks: usize, sample_rate: u32) -> usize {
        (chunks as f64 * self.samples_per_chunk(sample_rate)) as usize
    }

    /// Convert a length in samples to (fractional) chunks.
    pub fn samples_to_chunks(&self, samples: usize, sample_rate: u32) -> f64 {
        samples as f64 / self.samples_per_chunk(sample_rate)
    }

    /// Validate all parameters. Returns Error::ParameterError on errors.
    pub fn validate(&self) -> Result<(), Error> {
        let check_non_zero = |name: &str, value: usize| {
            if value == 0 {
                Err(Error::ParameterError(format!(
                    "config '{name}' value must be > 0"
                )))
            } else {
                Ok(())
            }
        };
        check_non_zero("num_chunks", self.num_chunks)?;
        check_non_zero("max_voices", self.max_voices)?;
        check_non_zero("max_selection_chunks", self.max_selection_chunks)?;
        check_non_zero("max_block_size", self.max_block_size)?;
        check_non_zero("note_channel_capacity", self.note_channel_capacity)?;
        check_non_zero("trigger_channel_capacity", self.trigger_channel_capacity)?;
        check_non_zero("chunk_channel_capacity", self.chunk_channel_capacity)?;

        if self.max_selection_chunks > self.num_chunks {
            return Err(Error::ParameterError(format!(
                "config 'max_selection_chunks' value '{}' exceeds 'num_chunks' '{}'",
                self.max_selection_chunks, self.num_chunks
            )));
        }
        if self.wave_len_seconds <= 0.0 || self.wave_len_seconds.is_nan() {
            return Err(Error::ParameterError(format!(
                "config 'wave_len_seconds' value is '{}'",
                self.wave_len_seconds
            )));
        }
        if self.max_duration_coeff < 1.0 || self.max_duration_coeff.is_nan() {
            return Err(Error::ParameterError(format!(
                "config 'max_duration_coeff' value is '{}'",
                self.max_duration_coeff
            )));
        }
        if !(self.min_filter_cutoff > 0.0 && self.min_filter_cutoff <= self.max_filter_cutoff) {
            return Err(Error::ParameterError(format!(
                "config filter cutoff range '{}..{}' is invalid",
                self.min_filter_cutoff, self.max_filter_cutoff
            )));
        }
        if self.attack_time.is_nan() || self.release_time.is_nan() {
            return Err(Error::ParameterError(
                "config envelope times must not be NaN".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.trim) {
            return Err(Error::ParameterError(format!(
                "config 'trim' value is '{}'",
                self.trim
            )));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------
