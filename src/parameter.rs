//! Continuously varying engine parameters, shared between the control and the audio thread.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

// -------------------------------------------------------------------------------------------------

/// `f32` value which can be shared across threads. Stored as bits in an `AtomicU32`.
#[derive(Debug)]
pub(crate) struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed)
    }
}

// -------------------------------------------------------------------------------------------------

/// Values read by the audio thread once per block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSnapshot {
    pub selection_start: usize,
    pub selection_size: usize,
    pub duration_coeff: f32,
    pub trim: f32,
    pub filter_cutoff: f32,
}

// -------------------------------------------------------------------------------------------------

/// Lock-free parameter slots, written by the control thread and read by the audio thread.
///
/// Each slot is independent: a reader may see a new selection start together with an old
/// selection size. The latest written value always wins.
#[derive(Debug)]
pub struct SharedParameters {
    selection_start: AtomicUsize,
    selection_size: AtomicUsize,
    duration_coeff: AtomicF32,
    trim: AtomicF32,
    filter_cutoff: AtomicF32,
}

impl SharedParameters {
    pub fn new(duration_coeff: f32, trim: f32, filter_cutoff: f32) -> Self {
        Self {
            selection_start: AtomicUsize::new(0),
            selection_size: AtomicUsize::new(0),
            duration_coeff: AtomicF32::new(duration_coeff),
            trim: AtomicF32::new(trim),
            filter_cutoff: AtomicF32::new(filter_cutoff),
        }
    }

    pub fn set_selection_start(&self, start: usize) {
        self.selection_start.store(start, Ordering::Relaxed);
    }

    pub fn set_selection_size(&self, size: usize) {
        self.selection_size.store(size, Ordering::Relaxed);
    }

    pub fn set_duration_coeff(&self, coeff: f32) {
        self.duration_coeff.store(coeff);
    }

    pub fn set_trim(&self, trim: f32) {
        self.trim.store(trim);
    }

    pub fn set_filter_cutoff(&self, cutoff: f32) {
        self.filter_cutoff.store(cutoff);
    }

    /// Read all slots.
    #[inline]
    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            selection_start: self.selection_start.load(Ordering::Relaxed),
            selection_size: self.selection_size.load(Ordering::Relaxed),
            duration_coeff: self.duration_coeff.load(),
            trim: self.trim.load(),
            filter_cutoff: self.filter_cutoff.load(),
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_value_wins() {
        let parameters = SharedParameters::new(1.0, 0.5, 22050.0);
        parameters.set_selection_start(100);
        parameters.set_selection_size(2000);
        parameters.set_selection_size(3000);
        parameters.set_duration_coeff(2.5);
        parameters.set_trim(0.25);
        parameters.set_filter_cutoff(800.0);
        assert_eq!(
            parameters.snapshot(),
            ParameterSnapshot {
                selection_start: 100,
                selection_size: 3000,
                duration_coeff: 2.5,
                trim: 0.25,
                filter_cutoff: 800.0
            }
        );
    }
}
