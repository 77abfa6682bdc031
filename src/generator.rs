//! Audio and control thread ends of a polyphonic granular synth.

use std::sync::Arc;

use crate::{
    channel::{channel, Receiver, Sender},
    config::Config,
    message::{NoteCommand, TriggerEvent},
    parameter::SharedParameters,
    sample::SampleBuffer,
    utils::filter::LowpassFilter,
    Error,
};

// -------------------------------------------------------------------------------------------------

pub mod granular;
pub mod voices;

use voices::VoiceManager;

// -------------------------------------------------------------------------------------------------

/// Create a new granular synth for the given sample buffer.
///
/// Returns the node, which should be moved to and processed in the audio thread, and a handle
/// to control the node from any other single thread.
pub fn granular_node(
    sample_buffer: SampleBuffer,
    sample_rate: u32,
    config: &Config,
) -> Result<(GranularNode, GranularHandle), Error> {
    config.validate()?;
    if sample_rate == 0 {
        return Err(Error::ParameterError("sample rate must be > 0".to_string()));
    }

    let (command_sender, command_receiver) = channel(config.note_channel_capacity);
    let (event_sender, event_receiver) = channel(config.trigger_channel_capacity);
    let parameters = Arc::new(SharedParameters::new(
        1.0,
        config.trim,
        config.max_filter_cutoff,
    ));
    let filter = LowpassFilter::new(
        sample_rate,
        config.max_filter_cutoff,
        LowpassFilter::DEFAULT_Q,
    )?;

    log::info!(
        "Creating granular node with {} voices for {} samples at {} Hz",
        config.max_voices,
        sample_buffer.len(),
        sample_rate
    );

    let node = GranularNode {
        voices: VoiceManager::new(sample_buffer.clone(), sample_rate, config),
        commands: command_receiver,
        events: event_sender,
        parameters: Arc::clone(&parameters),
        filter,
        max_filter_cutoff: config.max_filter_cutoff,
    };
    let handle = GranularHandle {
        commands: command_sender,
        events: event_receiver,
        parameters,
        buffer_len: sample_buffer.len(),
        max_duration_coeff: config.max_duration_coeff,
        min_filter_cutoff: config.min_filter_cutoff,
        max_filter_cutoff: config.max_filter_cutoff,
    };
    Ok((node, handle))
}

// -------------------------------------------------------------------------------------------------

/// Audio thread end of a granular synth. See [`granular_node`].
pub struct GranularNode {
    voices: VoiceManager,
    commands: Receiver<NoteCommand>,
    events: Sender<TriggerEvent>,
    parameters: Arc<SharedParameters>,
    filter: LowpassFilter,
    max_filter_cutoff: f32,
}

impl GranularNode {
    pub fn voices(&self) -> &VoiceManager {
        &self.voices
    }

    /// Cutoff of the output low-pass filter, or None when the filter is bypassed.
    pub fn filter_cutoff(&self) -> Option<f32> {
        let cutoff = self.parameters.snapshot().filter_cutoff;
        (cutoff < self.max_filter_cutoff).then_some(cutoff)
    }

    /// Render the next block of mono samples into `output`, overwriting its content.
    ///
    /// Never blocks and never allocates.
    pub fn process(&mut self, output: &mut [f32]) {
        assert_no_alloc(|| {
            let parameters = self.parameters.snapshot();
            self.voices.apply_parameters(&parameters);
            self.voices.process(output, &mut self.commands, &mut self.events);
            // a fully opened filter is bypassed
            if parameters.filter_cutoff < self.max_filter_cutoff {
                self.filter.set_cutoff(parameters.filter_cutoff);
                self.filter.process(output);
            } else {
                self.filter.reset();
            }
        })
    }
}

#[inline(always)]
fn assert_no_alloc<T, F: FnOnce() -> T>(func: F) -> T {
    #[cfg(feature = "assert-allocs")]
    return assert_no_alloc::assert_no_alloc::<T, F>(func);
    #[cfg(not(feature = "assert-allocs"))]
    return func();
}

// -------------------------------------------------------------------------------------------------

/// Control thread end of a granular synth. See [`granular_node`].
///
/// Parameter changes get picked up with the next processed block. Note commands are queued and
/// fail with [`Error::SendError`] when the node can't keep up.
pub struct GranularHandle {
    commands: Sender<NoteCommand>,
    events: Receiver<TriggerEvent>,
    parameters: Arc<SharedParameters>,
    buffer_len: usize,
    max_duration_coeff: f32,
    min_filter_cutoff: f32,
    max_filter_cutoff: f32,
}

impl GranularHandle {
    /// Set grain start position in samples. Wraps around at the end of the sample buffer.
    pub fn set_selection_start(&self, start: usize) {
        self.parameters.set_selection_start(start % self.buffer_len);
    }

    /// Set the selection size in samples. Also sets the distance between grain onsets.
    pub fn set_selection_size(&self, size: usize) {
        self.parameters.set_selection_size(size);
    }

    /// Set grain duration relative to the selection size. Clamped to [0, max_duration_coeff].
    pub fn set_grains_duration_coeff(&self, coeff: f32) {
        let coeff = if coeff.is_nan() { 1.0 } else { coeff };
        self.parameters
            .set_duration_coeff(coeff.clamp(0.0, self.max_duration_coeff));
    }

    /// Set output trim as linear gain. Clamped to [0, 1].
    pub fn set_trim(&self, trim: f32) {
        let trim = if trim.is_nan() { 0.0 } else { trim };
        self.parameters.set_trim(trim.clamp(0.0, 1.0));
    }

    /// Set the output low-pass cutoff in Hz. Clamped to the config's filter cutoff range.
    /// The max cutoff, which is also the default, bypasses the filter.
    pub fn set_filter_cutoff(&self, cutoff: f32) {
        let cutoff = if cutoff.is_nan() {
            self.max_filter_cutoff
        } else {
            cutoff
        };
        self.parameters
            .set_filter_cutoff(cutoff.clamp(self.min_filter_cutoff, self.max_filter_cutoff));
    }

    pub fn note_on(&mut self, note: i32, rate: f64) -> Result<(), Error> {
        self.send_command(NoteCommand::note_on(note, rate))
    }

    pub fn note_off(&mut self, note: i32) -> Result<(), Error> {
        self.send_command(NoteCommand::note_off(note))
    }

    pub fn loop_on(&mut self) -> Result<(), Error> {
        self.send_command(NoteCommand::loop_on())
    }

    pub fn loop_off(&mut self) -> Result<(), Error> {
        self.send_command(NoteCommand::loop_off())
    }

    fn send_command(&mut self, command: NoteCommand) -> Result<(), Error> {
        if self.commands.send(command) {
            Ok(())
        } else {
            Err(Error::SendError(format!(
                "note command queue is full, dropped {} command",
                command.kind
            )))
        }
    }

    /// Move all pending trigger events into `events`.
    pub fn poll_trigger_events(&mut self, events: &mut Vec<TriggerEvent>) {
        let max_events = self.events.capacity();
        events.extend(self.events.drain(max_events));
    }

    /// Number of note commands which got dropped because the queue was full.
    pub fn dropped_commands(&self) -> usize {
        self.commands.dropped_count()
    }

    /// Number of trigger events the audio thread dropped because nobody polled them in time.
    pub fn dropped_trigger_events(&self) -> usize {
        self.events.dropped_count()
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::TriggerKind;

    const SAMPLE_RATE: u32 = 44100;

    fn sample_buffer() -> Result<SampleBuffer, Error> {
        SampleBuffer::new(
            (0..SAMPLE_RATE as usize)
                .map(|i| (i as f32 * 0.005).sin() * 0.8)
                .collect(),
        )
    }

    #[test]
    fn invalid_setup() -> Result<(), Box<Error>> {
        assert!(granular_node(sample_buffer()?, 0, &Config::default()).is_err());
        let config = Config::default().max_voices(0);
        assert!(granular_node(sample_buffer()?, SAMPLE_RATE, &config).is_err());
        Ok(())
    }

    #[test]
    fn first_block_scenario() -> Result<(), Box<Error>> {
        let (mut node, mut handle) =
            granular_node(sample_buffer()?, SAMPLE_RATE, &Config::default().seed(42))?;
        handle.set_selection_size(1000);
        handle.set_grains_duration_coeff(1.0);
        handle.note_on(60, 1.0)?;

        let mut output = vec![0.0; 512];
        node.process(&mut output);

        let mut events = Vec::new();
        handle.poll_trigger_events(&mut events);
        assert_eq!(
            events,
            vec![TriggerEvent {
                kind: TriggerKind::NewGrain,
                voice_id: 0,
                grain_duration_samples: 1000
            }]
        );
        assert!(output.iter().any(|s| *s != 0.0));
        Ok(())
    }

    #[test]
    fn note_off_until_idle_scenario() -> Result<(), Box<Error>> {
        let (mut node, mut handle) =
            granular_node(sample_buffer()?, SAMPLE_RATE, &Config::default().seed(7))?;
        handle.set_selection_start(5000);
        handle.set_selection_size(3000);
        handle.set_grains_duration_coeff(2.0);
        handle.note_on(62, 1.1)?;

        let mut output = vec![0.0; 256];
        let mut events = Vec::new();
        for _ in 0..50 {
            node.process(&mut output);
        }
        handle.note_off(62)?;
        for _ in 0..50 {
            node.process(&mut output);
            handle.poll_trigger_events(&mut events);
        }
        assert!(node.voices().voices()[0].is_idle());
        assert!(output.iter().all(|s| *s == 0.0));
        let idle_events = events
            .iter()
            .filter(|e| e.kind == TriggerKind::BecameIdle)
            .count();
        assert_eq!(idle_events, 1);
        Ok(())
    }

    #[test]
    fn handle_clamps_parameters() -> Result<(), Box<Error>> {
        let (node, handle) = granular_node(sample_buffer()?, SAMPLE_RATE, &Config::default())?;
        handle.set_selection_start(SAMPLE_RATE as usize + 10);
        handle.set_grains_duration_coeff(100.0);
        handle.set_trim(2.0);
        let snapshot = node.parameters.snapshot();
        assert_eq!(snapshot.selection_start, 10);
        assert_eq!(snapshot.duration_coeff, 8.0);
        assert_eq!(snapshot.trim, 1.0);
        handle.set_grains_duration_coeff(f32::NAN);
        assert_eq!(node.parameters.snapshot().duration_coeff, 1.0);

        assert_eq!(node.filter_cutoff(), None);
        handle.set_filter_cutoff(10.0);
        assert_eq!(node.filter_cutoff(), Some(200.0));
        handle.set_filter_cutoff(1000.0);
        assert_eq!(node.filter_cutoff(), Some(1000.0));
        handle.set_filter_cutoff(f32::NAN);
        assert_eq!(node.filter_cutoff(), None);
        Ok(())
    }

    #[test]
    fn filter_damps_output() -> Result<(), Box<Error>> {
        // bright, noisy sample
        let samples = (0..SAMPLE_RATE as usize)
            .map(|i| if i % 2 == 0 { 0.8 } else { -0.8 })
            .collect::<Vec<f32>>();
        let render = |cutoff: Option<f32>| -> Result<f32, Error> {
            let config = Config::default().seed(9);
            let (mut node, mut handle) =
                granular_node(SampleBuffer::new(samples.clone())?, SAMPLE_RATE, &config)?;
            handle.set_selection_size(2000);
            handle.set_grains_duration_coeff(2.0);
            if let Some(cutoff) = cutoff {
                handle.set_filter_cutoff(cutoff);
            }
            handle.loop_on()?;
            let mut output = vec![0.0; 512];
            let mut energy = 0.0;
            for _ in 0..20 {
                node.process(&mut output);
                energy += output.iter().map(|s| s * s).sum::<f32>();
            }
            Ok(energy)
        };
        let unfiltered = render(None)?;
        let filtered = render(Some(200.0))?;
        assert!(unfiltered > 0.0);
        assert!(filtered < unfiltered * 0.01);
        Ok(())
    }

    #[test]
    fn full_command_queue_fails() -> Result<(), Box<Error>> {
        let config = Config::default().note_channel_capacity(2);
        let (_node, mut handle) = granular_node(sample_buffer()?, SAMPLE_RATE, &config)?;
        handle.loop_on()?;
        handle.loop_off()?;
        assert!(matches!(handle.note_on(60, 1.0), Err(Error::SendError(_))));
        assert_eq!(handle.dropped_commands(), 1);
        Ok(())
    }
}
