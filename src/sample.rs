use std::{ops::Deref, sync::Arc};

#[cfg(feature = "wav-output")]
use std::path::Path;

use crate::Error;

// -------------------------------------------------------------------------------------------------

/// Immutable, shared mono sample buffer the grain engines read from.
///
/// Cloning is cheap: all clones share the same samples. Every engine holds a clone, so the
/// samples stay valid for as long as any engine reads them. A new recording results in a new
/// buffer and thus a new set of engines.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Arc<[f32]>,
}

impl SampleBuffer {
    /// Create a new sample buffer from the given mono samples.
    pub fn new(samples: Vec<f32>) -> Result<Self, Error> {
        if samples.is_empty() {
            return Err(Error::ParameterError(
                "sample buffer must not be empty".to_string(),
            ));
        }
        Ok(Self {
            samples: Arc::from(samples),
        })
    }

    /// Read a wav file's samples, mixed down to mono.
    ///
    /// The file is used as it is: its sample rate is not converted to the engine's rate.
    #[cfg(feature = "wav-output")]
    pub fn from_wav_file<P: AsRef<Path>>(file_path: P) -> Result<Self, Error> {
        let mut reader = hound::WavReader::open(file_path.as_ref())
            .map_err(|err| Error::AudioDecodingError(Box::new(err)))?;
        let spec = reader.spec();
        let channel_count = spec.channels as usize;
        let interleaved = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| Error::AudioDecodingError(Box::new(err)))?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|s| s as f32 * scale))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|err| Error::AudioDecodingError(Box::new(err)))?
            }
        };
        let mono = interleaved
            .chunks_exact(channel_count.max(1))
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect::<Vec<_>>();
        log::debug!(
            "Loaded {} mono samples from '{}' ({} Hz, {} channels)",
            mono.len(),
            file_path.as_ref().display(),
            spec.sample_rate,
            channel_count
        );
        Self::new(mono)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Deref for SampleBuffer {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.samples
    }
}

// -------------------------------------------------------------------------------------------------
