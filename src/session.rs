//! Control thread state of an interactive granular instrument.

use crate::{
    channel::Receiver,
    config::Config,
    generator::GranularHandle,
    message::{TriggerEvent, TriggerKind, WaveChunkEvent, WaveChunkKind},
    utils::{speed_from_note, wave::WaveformPoint},
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Selection within the recorded wave, in waveform chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start_chunk: usize,
    pub size_chunks: usize,
}

// -------------------------------------------------------------------------------------------------

/// Min/max overview of a recorded wave, updated from recorder [`WaveChunkEvent`]s.
#[derive(Debug, Clone)]
pub struct WaveOverview {
    chunks: Vec<WaveformPoint>,
}

impl WaveOverview {
    pub fn new(num_chunks: usize) -> Self {
        Self {
            chunks: vec![WaveformPoint::default(); num_chunks],
        }
    }

    pub fn chunks(&self) -> &[WaveformPoint] {
        &self.chunks
    }

    pub fn reset(&mut self) {
        self.chunks.fill(WaveformPoint::default());
    }

    fn apply(&mut self, event: &WaveChunkEvent) {
        match event.kind {
            WaveChunkKind::RecordingStarted => self.reset(),
            WaveChunkKind::ChunkUpdate => {
                if let Some(chunk) = self.chunks.get_mut(event.chunk_index) {
                    *chunk = WaveformPoint {
                        min: event.low,
                        max: event.high,
                    };
                } else {
                    log::warn!("Ignoring update for invalid chunk {}", event.chunk_index);
                }
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Everything the control thread needs to drive a granular node.
///
/// Keeps track of the loop toggle, the current selection and duration, forwards user input to
/// the node's [`GranularHandle`] and digests the node's and recorder's events once per frame.
pub struct ControlSession {
    handle: GranularHandle,
    chunk_events: Option<Receiver<WaveChunkEvent>>,
    config: Config,
    sample_rate: u32,
    looping: bool,
    selection: Selection,
    duration_coeff: f32,
    filter_cutoff: f32,
    overview: WaveOverview,
    /// Duration of the last started grain in chunks for each voice id, None when idle.
    cursors: Vec<Option<f64>>,
    trigger_events: Vec<TriggerEvent>,
    dropped_commands: usize,
    dropped_trigger_events: usize,
    dropped_chunk_events: usize,
}

impl ControlSession {
    pub fn new(handle: GranularHandle, config: &Config, sample_rate: u32) -> Result<Self, Error> {
        config.validate()?;
        let selection = Selection {
            start_chunk: 0,
            size_chunks: 1,
        };
        let mut session = Self {
            handle,
            chunk_events: None,
            config: config.clone(),
            sample_rate,
            looping: false,
            selection,
            duration_coeff: 1.0,
            filter_cutoff: config.max_filter_cutoff,
            overview: WaveOverview::new(config.num_chunks),
            // note voices plus the loop voice
            cursors: vec![None; config.max_voices + 1],
            trigger_events: Vec::with_capacity(config.trigger_channel_capacity),
            dropped_commands: 0,
            dropped_trigger_events: 0,
            dropped_chunk_events: 0,
        };
        session.set_selection_chunks(selection.start_chunk, selection.size_chunks);
        Ok(session)
    }

    /// Also digest waveform chunk events from a recorder in [`Self::update`].
    pub fn with_chunk_events(mut self, chunk_events: Receiver<WaveChunkEvent>) -> Self {
        self.chunk_events = Some(chunk_events);
        self
    }

    /// Replace the node handle, e.g. after a new recording created a new node.
    pub fn set_handle(&mut self, handle: GranularHandle) {
        self.handle = handle;
        self.cursors.fill(None);
        self.dropped_commands = 0;
        self.dropped_trigger_events = 0;
        // push current state to the new node
        self.set_selection_chunks(self.selection.start_chunk, self.selection.size_chunks);
        self.set_duration_coeff(self.duration_coeff);
        self.set_filter_cutoff(self.filter_cutoff);
        if self.looping {
            if let Err(err) = self.handle.loop_on() {
                log::warn!("Failed to restart loop: {err}");
            }
        }
    }

    pub fn handle(&self) -> &GranularHandle {
        &self.handle
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn duration_coeff(&self) -> f32 {
        self.duration_coeff
    }

    pub fn filter_cutoff(&self) -> f32 {
        self.filter_cutoff
    }

    pub fn overview(&self) -> &WaveOverview {
        &self.overview
    }

    /// Grain duration in chunks of all voices which currently play. Index is the voice id.
    pub fn cursors(&self) -> &[Option<f64>] {
        &self.cursors
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Toggle the loop voice. Returns the new loop state.
    pub fn toggle_loop(&mut self) -> Result<bool, Error> {
        if self.looping {
            self.handle.loop_off()?;
        } else {
            self.handle.loop_on()?;
        }
        self.looping = !self.looping;
        Ok(self.looping)
    }

    /// Set the selection in chunks. The size gets clamped to `1..=max_selection_chunks` and the
    /// start to the available chunks.
    pub fn set_selection_chunks(&mut self, start_chunk: usize, size_chunks: usize) {
        let size_chunks = size_chunks.clamp(1, self.config.max_selection_chunks);
        let start_chunk = start_chunk.min(self.config.num_chunks - size_chunks);
        self.selection = Selection {
            start_chunk,
            size_chunks,
        };
        self.handle.set_selection_start(
            self.config
                .chunks_to_samples(start_chunk, self.sample_rate),
        );
        self.handle.set_selection_size(
            self.config
                .chunks_to_samples(size_chunks, self.sample_rate),
        );
    }

    /// Map a 7-bit controller value to the selection size.
    pub fn set_selection_size_from_cc(&mut self, value: u8) {
        let max = self.config.max_selection_chunks;
        let size = 1 + (value.min(127) as usize * (max - 1) + 63) / 127;
        self.set_selection_chunks(self.selection.start_chunk, size);
    }

    /// Set the grain duration coefficient. Clamped to `1..=max_duration_coeff`, NaN resets to 1.
    pub fn set_duration_coeff(&mut self, coeff: f32) {
        let coeff = if coeff.is_nan() { 1.0 } else { coeff };
        self.duration_coeff = coeff.clamp(1.0, self.config.max_duration_coeff);
        self.handle.set_grains_duration_coeff(self.duration_coeff);
    }

    /// Map a 7-bit controller value to the duration coefficient.
    pub fn set_duration_coeff_from_cc(&mut self, value: u8) {
        let max = self.config.max_duration_coeff;
        self.set_duration_coeff(1.0 + (max - 1.0) * value.min(127) as f32 / 127.0);
    }

    /// Set the output low-pass cutoff in Hz, clamped to the configured cutoff range.
    pub fn set_filter_cutoff(&mut self, cutoff: f32) {
        let (min, max) = (self.config.min_filter_cutoff, self.config.max_filter_cutoff);
        self.filter_cutoff = if cutoff.is_nan() {
            max
        } else {
            cutoff.clamp(min, max)
        };
        self.handle.set_filter_cutoff(self.filter_cutoff);
    }

    /// Map a 7-bit controller value exponentially to the filter cutoff range.
    pub fn set_filter_cutoff_from_cc(&mut self, value: u8) {
        let (min, max) = (self.config.min_filter_cutoff, self.config.max_filter_cutoff);
        let cutoff = if value >= 127 {
            // fully open
            max
        } else {
            min * (max / min).powf(value as f32 / 127.0)
        };
        self.set_filter_cutoff(cutoff);
    }

    /// Play the given MIDI note, transposing grains relative to the center note.
    pub fn note_on(&mut self, note: i32) -> Result<(), Error> {
        self.handle.note_on(note, speed_from_note(note))
    }

    pub fn note_off(&mut self, note: i32) -> Result<(), Error> {
        self.handle.note_off(note)
    }

    /// Digest all pending node and recorder events. Call once per frame.
    pub fn update(&mut self) {
        self.trigger_events.clear();
        self.handle.poll_trigger_events(&mut self.trigger_events);
        for event in &self.trigger_events {
            let Some(cursor) = self.cursors.get_mut(event.voice_id) else {
                log::warn!("Ignoring trigger event of unknown voice {}", event.voice_id);
                continue;
            };
            *cursor = match event.kind {
                TriggerKind::NewGrain => Some(
                    self.config
                        .samples_to_chunks(event.grain_duration_samples, self.sample_rate),
                ),
                TriggerKind::BecameIdle => None,
            };
        }

        if let Some(chunk_events) = &mut self.chunk_events {
            let max_events = chunk_events.capacity();
            for event in chunk_events.drain(max_events) {
                self.overview.apply(&event);
            }
            let dropped = chunk_events.dropped_count();
            if dropped > self.dropped_chunk_events {
                log::warn!(
                    "Dropped {} waveform chunk events",
                    dropped - self.dropped_chunk_events
                );
                self.dropped_chunk_events = dropped;
            }
        }

        let dropped = self.handle.dropped_trigger_events();
        if dropped > self.dropped_trigger_events {
            log::warn!(
                "Dropped {} grain trigger events",
                dropped - self.dropped_trigger_events
            );
            self.dropped_trigger_events = dropped;
        }
        let dropped = self.handle.dropped_commands();
        if dropped > self.dropped_commands {
            log::warn!("Dropped {} note commands", dropped - self.dropped_commands);
            self.dropped_commands = dropped;
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        generator::{granular_node, GranularNode},
        recorder::WaveRecorder,
        sample::SampleBuffer,
        utils::assert_eq_with_epsilon,
    };

    const SAMPLE_RATE: u32 = 44100;

    fn node(config: &Config) -> Result<(GranularNode, GranularHandle), Error> {
        let samples = (0..config.wave_len_samples(SAMPLE_RATE))
            .map(|i| (i as f32 * 0.02).sin() * 0.5)
            .collect();
        granular_node(SampleBuffer::new(samples)?, SAMPLE_RATE, config)
    }

    fn session(config: &Config) -> Result<(GranularNode, ControlSession), Error> {
        let (node, handle) = node(config)?;
        let session = ControlSession::new(handle, config, SAMPLE_RATE)?;
        Ok((node, session))
    }

    #[test]
    fn loop_toggle() -> Result<(), Box<Error>> {
        let config = Config::default().seed(1);
        let (mut node, mut session) = session(&config)?;
        assert!(!session.is_looping());
        assert!(session.toggle_loop()?);
        let mut output = vec![0.0; 256];
        node.process(&mut output);
        assert!(!node.voices().loop_voice().is_idle());
        assert!(!session.toggle_loop()?);
        assert!(!session.is_looping());
        Ok(())
    }

    #[test]
    fn selection_in_chunks() -> Result<(), Box<Error>> {
        let config = Config::default();
        let (mut node, mut session) = session(&config)?;
        session.set_selection_chunks(10, 100);
        assert_eq!(
            session.selection(),
            Selection {
                start_chunk: 10,
                size_chunks: 37
            }
        );
        session.set_selection_chunks(127, 4);
        assert_eq!(session.selection().start_chunk, 124);
        session.set_selection_chunks(3, 0);
        assert_eq!(session.selection().size_chunks, 1);

        session.set_selection_chunks(2, 2);
        let mut output = vec![0.0; 64];
        node.process(&mut output);
        let voice = &node.voices().voices()[0];
        assert_eq!(voice.selection_start(), 1378);
        assert_eq!(voice.trigger_period(), 1378);

        session.set_selection_size_from_cc(0);
        assert_eq!(session.selection().size_chunks, 1);
        session.set_selection_size_from_cc(127);
        assert_eq!(session.selection().size_chunks, 37);
        Ok(())
    }

    #[test]
    fn duration_from_cc() -> Result<(), Box<Error>> {
        let config = Config::default();
        let (_node, mut session) = session(&config)?;
        session.set_duration_coeff_from_cc(0);
        assert_eq!(session.duration_coeff(), 1.0);
        session.set_duration_coeff_from_cc(127);
        assert_eq!(session.duration_coeff(), 8.0);
        session.set_duration_coeff(0.0);
        assert_eq!(session.duration_coeff(), 1.0);
        session.set_duration_coeff(5.0);
        session.set_duration_coeff(f32::NAN);
        assert_eq!(session.duration_coeff(), 1.0);
        Ok(())
    }

    #[test]
    fn filter_cutoff_from_cc() -> Result<(), Box<Error>> {
        let config = Config::default();
        let (node, mut session) = session(&config)?;
        assert_eq!(session.filter_cutoff(), 22050.0);
        assert_eq!(node.filter_cutoff(), None);

        session.set_filter_cutoff_from_cc(0);
        assert_eq_with_epsilon!(session.filter_cutoff(), 200.0, 1e-3);
        assert!(node.filter_cutoff().is_some());
        session.set_filter_cutoff_from_cc(127);
        assert_eq!(session.filter_cutoff(), 22050.0);
        assert_eq!(node.filter_cutoff(), None);
        session.set_filter_cutoff_from_cc(64);
        assert!(session.filter_cutoff() > 2000.0 && session.filter_cutoff() < 2300.0);

        session.set_filter_cutoff(50_000.0);
        assert_eq!(session.filter_cutoff(), 22050.0);
        session.set_filter_cutoff(f32::NAN);
        assert_eq!(session.filter_cutoff(), 22050.0);
        Ok(())
    }

    #[test]
    fn cursors_follow_voices() -> Result<(), Box<Error>> {
        let config = Config::default().seed(3);
        let (mut node, mut session) = session(&config)?;
        session.set_selection_chunks(0, 2);
        session.set_duration_coeff(2.0);
        session.note_on(60)?;
        session.toggle_loop()?;

        let mut output = vec![0.0; 512];
        node.process(&mut output);
        session.update();
        let loop_id = config.max_voices;
        assert_eq_with_epsilon!(session.cursors()[0].unwrap_or(0.0), 4.0, 0.01);
        assert_eq_with_epsilon!(session.cursors()[loop_id].unwrap_or(0.0), 4.0, 0.01);
        assert!(session.cursors()[1].is_none());

        session.note_off(60)?;
        for _ in 0..20 {
            node.process(&mut output);
        }
        session.update();
        assert!(session.cursors()[0].is_none());
        assert!(session.cursors()[loop_id].is_some());
        Ok(())
    }

    #[test]
    fn new_handle_gets_current_state() -> Result<(), Box<Error>> {
        let config = Config::default().seed(4);
        let (_node, mut session) = session(&config)?;
        session.set_selection_chunks(4, 2);
        session.set_duration_coeff(3.0);
        session.toggle_loop()?;

        let (mut node, new_handle) = node(&config)?;
        session.set_handle(new_handle);
        assert!(session.is_looping());

        let mut output = vec![0.0; 64];
        node.process(&mut output);
        let loop_voice = node.voices().loop_voice();
        assert!(!loop_voice.is_idle());
        assert_eq!(loop_voice.selection_start(), 2756);
        assert_eq!(loop_voice.trigger_period(), 1378);
        assert_eq!(loop_voice.grains_duration(), 4134);
        Ok(())
    }

    #[test]
    fn overview_follows_recorder() -> Result<(), Box<Error>> {
        let config = Config::default();
        let (_node, session) = session(&config)?;
        let (mut recorder, chunk_events) = WaveRecorder::new(&config, SAMPLE_RATE)?;
        let mut session = session.with_chunk_events(chunk_events);

        recorder.start();
        let input = vec![0.5; 1000];
        recorder.write(&input);
        session.update();
        // 1000 samples cover the first chunk of 689 samples
        assert_eq!(session.overview().chunks()[0], WaveformPoint { min: 0.5, max: 0.5 });
        assert_eq!(session.overview().chunks()[1], WaveformPoint::default());

        recorder.start();
        session.update();
        assert_eq!(session.overview().chunks()[0], WaveformPoint::default());
        Ok(())
    }
}
