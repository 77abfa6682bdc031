#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod error;
mod parameter;

// public, flat re-exports
pub use error::Error;

pub use config::Config;
pub use generator::{
    granular::{GrainEngine, GrainPoolPolicy},
    granular_node,
    voices::VoiceManager,
    GranularHandle, GranularNode,
};
pub use message::{
    NoteCommand, NoteCommandKind, TriggerEvent, TriggerKind, WaveChunkEvent, WaveChunkKind,
};
pub use recorder::WaveRecorder;
pub use sample::SampleBuffer;
pub use session::ControlSession;

// public mods
pub mod channel;
pub mod config;
pub mod generator;
pub mod message;
pub mod recorder;
pub mod sample;
pub mod session;
pub mod utils;
