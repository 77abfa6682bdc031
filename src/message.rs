//! Fixed size messages exchanged between the control and the audio thread.

// -------------------------------------------------------------------------------------------------

/// Kind of a [`NoteCommand`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, strum::EnumString, strum::Display, strum::VariantNames,
)]
pub enum NoteCommandKind {
    NoteOn,
    NoteOff,
    /// Start the looping voice, which plays at the original speed.
    LoopOn,
    LoopOff,
}

/// Control to audio thread: start or stop a note or the loop voice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteCommand {
    pub kind: NoteCommandKind,
    /// MIDI note number. Unused for loop commands.
    pub note: i32,
    /// Grain playback rate. Only used by note on commands.
    pub rate: f64,
}

impl NoteCommand {
    pub fn note_on(note: i32, rate: f64) -> Self {
        Self {
            kind: NoteCommandKind::NoteOn,
            note,
            rate,
        }
    }

    pub fn note_off(note: i32) -> Self {
        Self {
            kind: NoteCommandKind::NoteOff,
            note,
            rate: 0.0,
        }
    }

    pub fn loop_on() -> Self {
        Self {
            kind: NoteCommandKind::LoopOn,
            note: 0,
            rate: 1.0,
        }
    }

    pub fn loop_off() -> Self {
        Self {
            kind: NoteCommandKind::LoopOff,
            note: 0,
            rate: 0.0,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Kind of a [`TriggerEvent`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, strum::EnumString, strum::Display, strum::VariantNames,
)]
pub enum TriggerKind {
    /// At least one new grain got started in the last processed block.
    NewGrain,
    /// The voice's envelope finished and the voice got reset.
    BecameIdle,
}

/// Audio to control thread: grain activity of a single voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerEvent {
    pub kind: TriggerKind,
    pub voice_id: usize,
    /// Duration of the started grains. 0 for [`TriggerKind::BecameIdle`].
    pub grain_duration_samples: usize,
}

impl TriggerEvent {
    pub fn new_grain(voice_id: usize, grain_duration_samples: usize) -> Self {
        Self {
            kind: TriggerKind::NewGrain,
            voice_id,
            grain_duration_samples,
        }
    }

    pub fn became_idle(voice_id: usize) -> Self {
        Self {
            kind: TriggerKind::BecameIdle,
            voice_id,
            grain_duration_samples: 0,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Kind of a [`WaveChunkEvent`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, strum::EnumString, strum::Display, strum::VariantNames,
)]
pub enum WaveChunkKind {
    /// A recorded chunk got completed.
    ChunkUpdate,
    /// A new recording got started: all previous chunks are invalid now.
    RecordingStarted,
}

/// Recorder to control thread: waveform overview updates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveChunkEvent {
    pub kind: WaveChunkKind,
    pub chunk_index: usize,
    /// Lowest sample value in the chunk.
    pub low: f32,
    /// Highest sample value in the chunk.
    pub high: f32,
}

impl WaveChunkEvent {
    pub fn chunk_update(chunk_index: usize, low: f32, high: f32) -> Self {
        Self {
            kind: WaveChunkKind::ChunkUpdate,
            chunk_index,
            low,
            high,
        }
    }

    pub fn recording_started() -> Self {
        Self {
            kind: WaveChunkKind::RecordingStarted,
            chunk_index: 0,
            low: 0.0,
            high: 0.0,
        }
    }
}

// -------------------------------------------------------------------------------------------------
