//! Granular synthesis engine for a single voice.

use std::f64::consts::PI;

use rand::{rngs::SmallRng, Rng, SeedableRng};

use assume::assume;

use crate::{
    channel::Sender,
    config::Config,
    message::TriggerEvent,
    sample::SampleBuffer,
    utils::{
        asr::{AsrEnvelope, AsrStage},
        ramp::LinearRamp,
    },
};

// -------------------------------------------------------------------------------------------------

/// Max number of grains a single engine plays at once.
pub const MAX_GRAINS: usize = 32;
/// Min grain duration and selection size in samples.
pub const MIN_GRAIN_DURATION: usize = 640;

// -------------------------------------------------------------------------------------------------

/// What happens with a new grain when all [`MAX_GRAINS`] grains are alive.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::Display,
    strum::VariantNames,
)]
pub enum GrainPoolPolicy {
    /// Skip the new grain.
    #[default]
    DropNew,
    /// Replace the oldest alive grain with the new one.
    StealOldest,
}

// -------------------------------------------------------------------------------------------------

/// A single grain: a windowed, resampled slice of the sample buffer.
#[derive(Debug, Clone, Copy)]
pub struct Grain {
    phase: f64,
    rate: f64,
    alive: bool,
    age: usize,
    duration: usize,
    // bell window oscillator state
    b1: f64,
    y1: f64,
    y2: f64,
}

impl Grain {
    const fn dead() -> Self {
        Self {
            phase: 0.0,
            rate: 1.0,
            alive: false,
            age: 0,
            duration: 1,
            b1: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    fn new(phase: f64, rate: f64, duration: usize) -> Self {
        debug_assert!(duration > 0);
        // Seeded so the n-th window sample is sin((n + 1) * w): the window ends at exactly 0.
        let w = PI / duration as f64;
        Self {
            phase,
            rate,
            alive: true,
            age: 0,
            duration,
            b1: 2.0 * w.cos(),
            y1: 0.0,
            y2: -w.sin(),
        }
    }

    /// Read position in the sample buffer.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Number of samples the grain already played.
    pub fn age(&self) -> usize {
        self.age
    }

    pub fn duration(&self) -> usize {
        self.duration
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

// -------------------------------------------------------------------------------------------------

/// Plays overlapping grains from a selection of a sample buffer.
///
/// A new grain gets triggered every `selection size` samples at the selection start, offset by
/// a small random jitter. Each grain lasts `selection size * duration coeff` samples, so
/// coefficients above 1 make grains overlap. The summed grains are shaped by an ASR envelope
/// and a slowly ramped trim gain.
///
/// Engines never allocate or block after construction. Activity is reported via
/// [`TriggerEvent`]s into the given event sender.
pub struct GrainEngine {
    id: usize,
    sample_buffer: SampleBuffer,
    sample_rate: u32,
    selection_start: usize,
    trigger_period: usize,
    duration_coeff: f32,
    grains_duration: usize,
    grains_rate: f64,
    bell_envelope: bool,
    grains: [Grain; MAX_GRAINS],
    alive_grains: usize,
    trigger_accumulator: usize,
    pool_policy: GrainPoolPolicy,
    envelope: AsrEnvelope,
    trim: LinearRamp,
    rng: SmallRng,
}

impl GrainEngine {
    /// Time in seconds the trim needs to ramp over a full unit.
    const TRIM_RAMP_TIME: f32 = 1.0;

    /// Create a new idle engine, using envelope, trim, window and pool settings from the
    /// given config.
    pub fn new(id: usize, sample_buffer: SampleBuffer, sample_rate: u32, config: &Config) -> Self {
        debug_assert!(!sample_buffer.is_empty(), "Need a non empty sample buffer");
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(id as u64)),
            None => SmallRng::from_os_rng(),
        };
        Self {
            id,
            sample_buffer,
            sample_rate,
            selection_start: 0,
            trigger_period: 0,
            duration_coeff: 1.0,
            grains_duration: MIN_GRAIN_DURATION,
            grains_rate: 1.0,
            bell_envelope: config.bell_envelope,
            grains: [Grain::dead(); MAX_GRAINS],
            alive_grains: 0,
            trigger_accumulator: 0,
            pool_policy: config.pool_policy,
            envelope: AsrEnvelope::new(config.attack_time, 1.0, config.release_time, sample_rate),
            trim: LinearRamp::new(sample_rate, Self::TRIM_RAMP_TIME, config.trim),
            rng,
        }
    }

    /// Reseed the jitter generator to get reproducible grain positions.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn selection_start(&self) -> usize {
        self.selection_start
    }

    /// Distance between grain onsets in samples. 0 until a selection size got set.
    pub fn trigger_period(&self) -> usize {
        self.trigger_period
    }

    pub fn grains_duration(&self) -> usize {
        self.grains_duration
    }

    pub fn grains_rate(&self) -> f64 {
        self.grains_rate
    }

    /// Samples left until the next grain onset, relative to the next block's start.
    pub fn trigger_accumulator(&self) -> usize {
        self.trigger_accumulator
    }

    pub fn alive_grains(&self) -> usize {
        self.alive_grains
    }

    /// All currently alive grains.
    pub fn grains(&self) -> &[Grain] {
        &self.grains[..self.alive_grains]
    }

    pub fn envelope_stage(&self) -> AsrStage {
        self.envelope.stage()
    }

    pub fn is_idle(&self) -> bool {
        self.envelope.stage() == AsrStage::Idle
    }

    pub fn is_shutting_down(&self) -> bool {
        self.envelope.stage() == AsrStage::ShutDown
    }

    /// Set the grain start position in samples. Wraps around at the end of the sample buffer.
    pub fn set_selection_start(&mut self, start: usize) {
        self.selection_start = start % self.sample_buffer.len();
    }

    /// Set the selection size, which is the trigger period, in samples.
    /// Sizes below [`MIN_GRAIN_DURATION`] get clamped.
    pub fn set_selection_size(&mut self, size: usize) {
        self.trigger_period = size.max(MIN_GRAIN_DURATION);
        self.update_grains_duration();
    }

    /// Set the grain duration as multiple of the selection size.
    pub fn set_grains_duration_coeff(&mut self, coeff: f32) {
        self.duration_coeff = coeff;
        self.update_grains_duration();
    }

    fn update_grains_duration(&mut self) {
        let duration = (self.trigger_period as f64 * self.duration_coeff as f64).round();
        // NaN and negative values end up at the min duration too
        self.grains_duration = duration.max(MIN_GRAIN_DURATION as f64) as usize;
    }

    /// Set the playback rate of new grains. 2.0 plays an octave higher.
    /// Negative rates are not supported and get clamped to 0.
    pub fn set_grains_rate(&mut self, rate: f64) {
        debug_assert!(rate >= 0.0, "Grain rate must be >= 0");
        self.grains_rate = rate.max(0.0);
    }

    /// Ramp the output gain to the given linear trim level.
    pub fn set_trim(&mut self, trim: f32) {
        if trim != self.trim.target() {
            self.trim.set_target(trim);
        }
    }

    /// Enable or disable the bell shaped window for new and running grains.
    pub fn set_bell_envelope(&mut self, enabled: bool) {
        self.bell_envelope = enabled;
    }

    pub fn set_env_attack_time(&mut self, seconds: f32) {
        self.envelope.set_attack_time(seconds);
    }

    pub fn set_env_release_time(&mut self, seconds: f32) {
        self.envelope.set_release_time(seconds);
    }

    pub fn set_pool_policy(&mut self, policy: GrainPoolPolicy) {
        self.pool_policy = policy;
    }

    /// Start playing grains with the given rate. Does nothing while already sustaining.
    pub fn note_on(&mut self, rate: f64) {
        if self.envelope.stage() != AsrStage::Sustain {
            self.set_grains_rate(rate);
            self.envelope.note_on();
        }
    }

    /// Release the envelope. The engine keeps playing until the envelope reached zero.
    pub fn note_off(&mut self) {
        if !self.is_idle() {
            self.envelope.note_off();
        }
    }

    /// Quickly fade out, without using the regular release time.
    pub fn shutdown(&mut self) {
        if !self.is_idle() {
            self.envelope.shut_down();
        }
    }

    /// Mix the next `output.len()` samples into `output`.
    ///
    /// `scratch` is a temporary buffer, which must be at least as long as `output`. When the
    /// envelope becomes idle within this block, a [`TriggerKind::BecameIdle`] event is sent
    /// and the engine resets itself.
    ///
    /// [`TriggerKind::BecameIdle`]: crate::message::TriggerKind::BecameIdle
    pub fn process(
        &mut self,
        output: &mut [f32],
        scratch: &mut [f32],
        events: &mut Sender<TriggerEvent>,
    ) {
        if self.is_idle() {
            return;
        }
        debug_assert!(scratch.len() >= output.len(), "Scratch buffer too small");

        let mut envelope_samples = 0;
        let mut became_idle = false;
        for value in scratch[..output.len()].iter_mut() {
            *value = self.envelope.tick() * self.trim.tick();
            envelope_samples += 1;
            if self.is_idle() {
                became_idle = true;
                break;
            }
        }

        self.process_grains(
            &mut output[..envelope_samples],
            &scratch[..envelope_samples],
            events,
        );

        if became_idle {
            events.send(TriggerEvent::became_idle(self.id));
            self.reset();
        }
    }

    fn process_grains(
        &mut self,
        output: &mut [f32],
        envelope: &[f32],
        events: &mut Sender<TriggerEvent>,
    ) {
        let num_samples = output.len();

        // continue running grains, keeping alive grains at the front of the pool
        let mut grain_index = 0;
        while grain_index < self.alive_grains {
            let mut grain = self.grains[grain_index];
            self.synthesize_grain(&mut grain, output, envelope);
            if grain.alive {
                self.grains[grain_index] = grain;
                grain_index += 1;
            } else {
                self.grains[grain_index] = self.grains[self.alive_grains - 1];
                self.alive_grains -= 1;
            }
        }

        if self.trigger_period == 0 {
            return;
        }

        // trigger new grains at their onset within this block
        let mut jitter = None;
        let mut triggered = false;
        while self.trigger_accumulator < num_samples {
            let slot = if self.alive_grains < MAX_GRAINS {
                self.alive_grains += 1;
                Some(self.alive_grains - 1)
            } else {
                match self.pool_policy {
                    GrainPoolPolicy::DropNew => None,
                    GrainPoolPolicy::StealOldest => self.oldest_grain_index(),
                }
            };
            if let Some(slot) = slot {
                let jitter = *jitter.get_or_insert_with(|| {
                    self.rng.random_range(0..=self.sample_rate as usize / 100)
                });
                let buffer_len = self.sample_buffer.len() as f64;
                let phase = ((self.selection_start + jitter) as f64) % buffer_len;
                let mut grain = Grain::new(phase, self.grains_rate, self.grains_duration);
                let offset = self.trigger_accumulator;
                self.synthesize_grain(&mut grain, &mut output[offset..], &envelope[offset..]);
                if grain.alive {
                    self.grains[slot] = grain;
                } else {
                    // died within this block: free the slot again
                    self.grains[slot] = self.grains[self.alive_grains - 1];
                    self.alive_grains -= 1;
                }
                triggered = true;
            }
            // advance even when no grain got started
            self.trigger_accumulator += self.trigger_period;
        }
        self.trigger_accumulator -= num_samples;

        if triggered {
            events.send(TriggerEvent::new_grain(self.id, self.grains_duration));
        }
    }

    fn oldest_grain_index(&self) -> Option<usize> {
        self.grains[..self.alive_grains]
            .iter()
            .enumerate()
            .max_by_key(|(_, grain)| grain.age)
            .map(|(index, _)| index)
    }

    fn synthesize_grain(&self, grain: &mut Grain, output: &mut [f32], envelope: &[f32]) {
        debug_assert!(grain.alive && grain.age < grain.duration);
        let samples = &self.sample_buffer[..];
        let buffer_len = samples.len();

        let rate = grain.rate;
        let mut phase = grain.phase;
        let mut age = grain.age;
        let (b1, mut y1, mut y2) = (grain.b1, grain.y1, grain.y2);

        let num_samples = output.len().min(grain.duration - age);
        for (out, env) in output[..num_samples].iter_mut().zip(&envelope[..num_samples]) {
            let read_index = phase as usize;
            assume!(
                unsafe: read_index < buffer_len,
                "Grain read position must be within the sample buffer"
            );
            let next_index = if read_index + 1 == buffer_len {
                0
            } else {
                read_index + 1
            };
            let fraction = phase - read_index as f64;
            let mut value = (samples[read_index] as f64 * (1.0 - fraction)
                + samples[next_index] as f64 * fraction) as f32;

            let y0 = b1 * y1 - y2;
            y2 = y1;
            y1 = y0;
            if self.bell_envelope {
                value *= y0 as f32;
            }

            *out += value * *env;

            age += 1;
            phase += rate;
            if phase >= buffer_len as f64 {
                phase %= buffer_len as f64;
            }
        }

        grain.phase = phase;
        grain.age = age;
        grain.y1 = y1;
        grain.y2 = y2;
        if age == grain.duration {
            grain.alive = false;
        }
    }

    /// Stop all grains and rewind the trigger. Runs automatically when the envelope became idle.
    pub fn reset(&mut self) {
        self.trigger_accumulator = 0;
        for grain in &mut self.grains[..self.alive_grains] {
            grain.alive = false;
        }
        self.alive_grains = 0;
    }
}

// -------------------------------------------------------------------------------------------------
