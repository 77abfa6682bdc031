//! Various conversion and DSP helpers used by the engine and the control layer.

pub mod asr;
pub mod buffer;
pub mod filter;
pub mod ramp;
pub mod wave;

// -------------------------------------------------------------------------------------------------

const MINUS_INF_IN_DB: f32 = -200.0f32;

const LIN_TO_DB_FACTOR: f32 = 20.0f32 / std::f32::consts::LN_10;
const DB_TO_LIN_FACTOR: f32 = std::f32::consts::LN_10 / 20.0f32;

/// MIDI note number which plays the recorded sample at its original speed.
pub const CENTER_NOTE: i32 = 60;

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
macro_rules! assert_eq_with_epsilon {
    ($x:expr, $y:expr, $d:expr) => {
        if (($x - $y) as f64).abs() > ($d as f64) {
            panic!(
                "assertion failed: {} != {} (epsilon {})",
                $x as f64, $y as f64, $d as f64
            );
        }
    };
}
#[cfg(test)]
pub(crate) use assert_eq_with_epsilon;

// -------------------------------------------------------------------------------------------------

/// Convert a linear gain into decibels.
pub fn linear_to_db(value: f32) -> f32 {
    if value == 1.0 {
        0.0 // avoid rounding errors at exactly 0 dB
    } else if value > 1e-12f32 {
        value.ln() * LIN_TO_DB_FACTOR
    } else {
        MINUS_INF_IN_DB
    }
}

/// Convert decibels into a linear gain.
pub fn db_to_linear(value: f32) -> f32 {
    if value == 0.0f32 {
        1.0f32 // avoid rounding errors at exactly 0 dB
    } else if value > MINUS_INF_IN_DB {
        (value * DB_TO_LIN_FACTOR).exp()
    } else {
        0.0f32
    }
}

// -------------------------------------------------------------------------------------------------

/// Playback rate for the given MIDI note, relative to [`CENTER_NOTE`] in equal temperament.
pub fn speed_from_note(note: i32) -> f64 {
    2.0f64.powf((note - CENTER_NOTE) as f64 / 12.0)
}

// -------------------------------------------------------------------------------------------------
