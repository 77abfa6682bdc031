//! Records a fixed length mono sample and reports its waveform overview while recording.

use crate::{
    channel::{channel, Receiver, Sender},
    config::Config,
    message::WaveChunkEvent,
    sample::SampleBuffer,
    utils::wave::{chunk_range, WaveformPoint},
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Fills a preallocated buffer of `wave_len_seconds` with incoming audio.
///
/// Each completed waveform chunk gets reported as [`WaveChunkEvent`] with the chunk's min and
/// max sample values, so the control thread can draw the wave while it's being recorded.
/// Writing never allocates, so the recorder can run in the audio input callback.
pub struct WaveRecorder {
    buffer: Vec<f32>,
    write_pos: usize,
    num_chunks: usize,
    next_chunk: usize,
    recording: bool,
    events: Sender<WaveChunkEvent>,
}

impl WaveRecorder {
    /// Create a new recorder and the receiver for its chunk events.
    pub fn new(
        config: &Config,
        sample_rate: u32,
    ) -> Result<(Self, Receiver<WaveChunkEvent>), Error> {
        config.validate()?;
        let wave_len = config.wave_len_samples(sample_rate);
        if wave_len < config.num_chunks {
            return Err(Error::ParameterError(format!(
                "recording length of {wave_len} samples is shorter than {} chunks",
                config.num_chunks
            )));
        }
        let (events, receiver) = channel(config.chunk_channel_capacity);
        log::debug!("Creating wave recorder with {wave_len} samples at {sample_rate} Hz");
        let recorder = Self {
            buffer: vec![0.0; wave_len],
            write_pos: 0,
            num_chunks: config.num_chunks,
            next_chunk: 0,
            recording: false,
            events,
        };
        Ok((recorder, receiver))
    }

    /// Rewind and start a new recording.
    pub fn start(&mut self) {
        self.write_pos = 0;
        self.next_chunk = 0;
        self.recording = true;
        self.events.send(WaveChunkEvent::recording_started());
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// True when the last recording filled the entire buffer.
    pub fn is_finished(&self) -> bool {
        !self.recording && self.write_pos == self.buffer.len()
    }

    /// Append the given input to the recording. Returns the number of consumed samples, which
    /// is smaller than the input length when the buffer got filled up.
    pub fn write(&mut self, input: &[f32]) -> usize {
        if !self.recording {
            return 0;
        }
        let count = input.len().min(self.buffer.len() - self.write_pos);
        self.buffer[self.write_pos..self.write_pos + count].copy_from_slice(&input[..count]);
        self.write_pos += count;

        // report all chunks which got completed
        while self.next_chunk < self.num_chunks {
            let (start, end) = chunk_range(self.buffer.len(), self.num_chunks, self.next_chunk);
            if end > self.write_pos {
                break;
            }
            let point = WaveformPoint::from_samples(&self.buffer[start..end]);
            self.events.send(WaveChunkEvent::chunk_update(
                self.next_chunk,
                point.min,
                point.max,
            ));
            self.next_chunk += 1;
        }

        if self.write_pos == self.buffer.len() {
            self.recording = false;
        }
        count
    }

    /// Copy the recorded samples into a new sample buffer. Allocates, so call this from the
    /// control thread only.
    pub fn sample_buffer(&self) -> Result<SampleBuffer, Error> {
        SampleBuffer::new(self.buffer.clone())
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::WaveChunkKind;

    #[test]
    fn records_and_reports_chunks() -> Result<(), Box<Error>> {
        let config = Config::default().num_chunks(4).wave_len_seconds(1.0);
        let config = Config {
            max_selection_chunks: 4,
            ..config
        };
        let (mut recorder, mut receiver) = WaveRecorder::new(&config, 10)?;
        assert!(!recorder.is_recording());
        assert_eq!(recorder.write(&[1.0; 4]), 0);

        recorder.start();
        let start = receiver.recv().map(|e| e.kind);
        assert_eq!(start, Some(WaveChunkKind::RecordingStarted));

        // 10 samples in 4 chunks: 2, 2, 2 and 4 samples
        assert_eq!(recorder.write(&[0.1, -0.2, 0.3]), 3);
        assert_eq!(
            receiver.drain(usize::MAX).collect::<Vec<_>>(),
            vec![WaveChunkEvent::chunk_update(0, -0.2, 0.1)]
        );
        assert_eq!(recorder.write(&[0.5, -0.5, 0.0, 0.25, 0.7, -0.9, 0.2, 1.0]), 7);
        assert_eq!(
            receiver.drain(usize::MAX).collect::<Vec<_>>(),
            vec![
                WaveChunkEvent::chunk_update(1, 0.3, 0.5),
                WaveChunkEvent::chunk_update(2, -0.5, 0.0),
                WaveChunkEvent::chunk_update(3, -0.9, 0.7),
            ]
        );
        assert!(recorder.is_finished());
        assert_eq!(recorder.write(&[1.0]), 0);

        let buffer = recorder.sample_buffer()?;
        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer[8], -0.9);

        // restart
        recorder.start();
        assert!(recorder.is_recording());
        assert!(!recorder.is_finished());
        Ok(())
    }

    #[test]
    fn too_short_recording() {
        let config = Config::default();
        assert!(WaveRecorder::new(&config, 10).is_err());
        assert!(WaveRecorder::new(&config, 44100).is_ok());
    }
}
