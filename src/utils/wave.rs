//! Helpers to summarize sample ranges for waveform displays.

// -------------------------------------------------------------------------------------------------

/// Lowest and highest sample value of a range of samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveformPoint {
    pub min: f32,
    pub max: f32,
}

impl Default for WaveformPoint {
    fn default() -> Self {
        Self { min: 0.0, max: 0.0 }
    }
}

impl WaveformPoint {
    /// Calculate min and max of the given samples. An empty slice results in a silent point.
    pub fn from_samples(samples: &[f32]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let (min, max) = samples
            .iter()
            .fold((f32::MAX, f32::MIN), |(min, max), s| (min.min(*s), max.max(*s)));
        Self { min, max }
    }
}

// -------------------------------------------------------------------------------------------------

/// Sample range `[start, end)` of the chunk at `chunk_index` when splitting `len` samples into
/// `chunk_count` chunks. The last chunk absorbs the remainder of the integer division.
pub fn chunk_range(len: usize, chunk_count: usize, chunk_index: usize) -> (usize, usize) {
    debug_assert!(chunk_count > 0 && chunk_index < chunk_count);
    let chunk_len = len / chunk_count;
    let start = chunk_index * chunk_len;
    let end = if chunk_index + 1 == chunk_count {
        len
    } else {
        start + chunk_len
    };
    (start, end)
}

// -------------------------------------------------------------------------------------------------
