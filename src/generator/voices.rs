//! Polyphonic voice allocation for grain engines.

use crate::{
    channel::{Receiver, Sender},
    config::Config,
    message::{NoteCommand, NoteCommandKind, TriggerEvent},
    parameter::ParameterSnapshot,
    sample::SampleBuffer,
    utils::buffer::clear_buffer,
};

use super::granular::GrainEngine;

// -------------------------------------------------------------------------------------------------

/// Routes note and loop commands to a fixed set of [`GrainEngine`]s and mixes their output.
///
/// Note voices have the ids `0..max_voices`. The loop voice, which always plays at the original
/// speed, has the id `max_voices`.
pub struct VoiceManager {
    loop_voice: GrainEngine,
    voices: Vec<GrainEngine>,
    /// Note each voice got triggered with, or None when the voice is free.
    voice_notes: Vec<Option<i32>>,
    scratch_buffer: Vec<f32>,
}

impl VoiceManager {
    pub fn new(sample_buffer: SampleBuffer, sample_rate: u32, config: &Config) -> Self {
        let voices = (0..config.max_voices)
            .map(|id| GrainEngine::new(id, sample_buffer.clone(), sample_rate, config))
            .collect::<Vec<_>>();
        let loop_voice = GrainEngine::new(config.max_voices, sample_buffer, sample_rate, config);
        let voice_notes = vec![None; config.max_voices];
        let scratch_buffer = vec![0.0; config.max_block_size];
        Self {
            loop_voice,
            voices,
            voice_notes,
            scratch_buffer,
        }
    }

    pub fn loop_voice(&self) -> &GrainEngine {
        &self.loop_voice
    }

    pub fn voices(&self) -> &[GrainEngine] {
        &self.voices
    }

    /// Note the voice at the given index currently plays, if any.
    pub fn voice_note(&self, voice_index: usize) -> Option<i32> {
        self.voice_notes.get(voice_index).copied().flatten()
    }

    fn engines_mut(&mut self) -> impl Iterator<Item = &mut GrainEngine> {
        std::iter::once(&mut self.loop_voice).chain(self.voices.iter_mut())
    }

    /// Forward the latest control parameters to all voices.
    pub fn apply_parameters(&mut self, parameters: &ParameterSnapshot) {
        for engine in self.engines_mut() {
            engine.set_selection_start(parameters.selection_start);
            engine.set_selection_size(parameters.selection_size);
            engine.set_grains_duration_coeff(parameters.duration_coeff);
            engine.set_trim(parameters.trim);
        }
    }

    /// Apply a single note or loop command.
    pub fn handle_command(&mut self, command: NoteCommand) {
        match command.kind {
            NoteCommandKind::NoteOn => {
                // retrigger a voice which already plays the note, else use the first free one
                let voice_index = self
                    .voice_notes
                    .iter()
                    .position(|note| *note == Some(command.note))
                    .or_else(|| self.voice_notes.iter().position(Option::is_none));
                if let Some(voice_index) = voice_index {
                    self.voice_notes[voice_index] = Some(command.note);
                    self.voices[voice_index].note_on(command.rate);
                }
            }
            NoteCommandKind::NoteOff => {
                let voice_index = self
                    .voice_notes
                    .iter()
                    .zip(&self.voices)
                    .position(|(note, voice)| *note == Some(command.note) && !voice.is_idle());
                if let Some(voice_index) = voice_index {
                    self.voices[voice_index].note_off();
                }
            }
            NoteCommandKind::LoopOn => self.loop_voice.note_on(1.0),
            NoteCommandKind::LoopOff => self.loop_voice.note_off(),
        }
    }

    /// Release all note voices. The loop voice keeps playing.
    pub fn all_notes_off(&mut self) {
        for voice in &mut self.voices {
            voice.note_off();
        }
    }

    /// Quickly fade out all voices, including the loop voice.
    pub fn shutdown_all(&mut self) {
        for engine in self.engines_mut() {
            engine.shutdown();
        }
    }

    /// Process pending commands, then render all active voices into `output`.
    ///
    /// At most `commands.capacity()` commands are handled per call, so a busy control thread
    /// can't stall the audio thread.
    pub fn process(
        &mut self,
        output: &mut [f32],
        commands: &mut Receiver<NoteCommand>,
        events: &mut Sender<TriggerEvent>,
    ) {
        let max_commands = commands.capacity();
        for command in commands.drain(max_commands) {
            self.handle_command(command);
        }

        clear_buffer(output);
        let block_size = self.scratch_buffer.len();
        for output in output.chunks_mut(block_size) {
            let scratch = &mut self.scratch_buffer[..output.len()];
            self.loop_voice.process(output, scratch, events);
            for (voice, note) in self.voices.iter_mut().zip(self.voice_notes.iter_mut()) {
                if note.is_some() {
                    voice.process(output, scratch, events);
                    if voice.is_idle() {
                        *note = None;
                    }
                }
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
