//! Resonant low-pass filter for the mixed output of a granular node.

use std::f64::consts::PI;

use crate::Error;

// -------------------------------------------------------------------------------------------------

/// Second order low-pass state variable filter (SVF), designed by Andrew Simper of Cytomic.
/// See <http://cytomic.com/files/dsp/SvfLinearTrapOptimised2.pdf>
///
/// Has a cutoff slope of 12 dB/octave and stays stable when the cutoff gets modulated at block
/// rate. Cutoff values are clamped to the range the filter can represent at its sample rate, so
/// changing the cutoff never fails.
#[derive(Debug, Clone)]
pub struct LowpassFilter {
    sample_rate: u32,
    cutoff: f32,
    q: f32,
    a1: f64,
    a2: f64,
    a3: f64,
    ic1eq: f64,
    ic2eq: f64,
}

impl LowpassFilter {
    /// Q of a filter without resonant peaking.
    pub const DEFAULT_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

    /// Lowest cutoff frequency in Hz.
    const MIN_CUTOFF: f32 = 1.0;
    /// Highest cutoff relative to the sample rate. Must stay below nyquist.
    const MAX_RELATIVE_CUTOFF: f32 = 0.49;

    pub fn new(sample_rate: u32, cutoff: f32, q: f32) -> Result<Self, Error> {
        if sample_rate == 0 {
            return Err(Error::ParameterError(format!(
                "Invalid filter sample-rate: must be > 0, but is {sample_rate}"
            )));
        }
        if q <= 0.0 || q.is_nan() {
            return Err(Error::ParameterError(format!(
                "Invalid filter Q: must be > 0, but is {q}"
            )));
        }
        let mut filter = Self {
            sample_rate,
            cutoff: 0.0,
            q,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
            ic1eq: 0.0,
            ic2eq: 0.0,
        };
        filter.set_cutoff(cutoff);
        Ok(filter)
    }

    /// Currently applied cutoff frequency in Hz.
    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    /// Set the cutoff frequency in Hz. Only recalculates coefficients when the value changed.
    pub fn set_cutoff(&mut self, cutoff: f32) {
        let max_cutoff = self.sample_rate as f32 * Self::MAX_RELATIVE_CUTOFF;
        let cutoff = if cutoff.is_nan() {
            max_cutoff
        } else {
            cutoff.clamp(Self::MIN_CUTOFF, max_cutoff)
        };
        if cutoff != self.cutoff {
            self.cutoff = cutoff;
            let g = f64::tan(PI * cutoff as f64 / self.sample_rate as f64);
            let k = 1.0 / self.q as f64;
            self.a1 = 1.0 / (1.0 + g * (g + k));
            self.a2 = g * self.a1;
            self.a3 = g * self.a2;
        }
    }

    /// Filter the given buffer in place.
    #[inline]
    pub fn process(&mut self, output: &mut [f32]) {
        for sample in output.iter_mut() {
            *sample = self.process_sample(*sample as f64) as f32;
        }
    }

    #[inline]
    fn process_sample(&mut self, input: f64) -> f64 {
        let v3 = input - self.ic2eq;
        let v1 = self.a1 * self.ic1eq + self.a2 * v3;
        let v2 = self.ic2eq + self.a2 * self.ic1eq + self.a3 * v3;
        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;
        v2
    }

    /// Clear the filter's state.
    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (std::f32::consts::TAU * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0, |peak, s| peak.max(s.abs()))
    }

    #[test]
    fn invalid_setup() {
        assert!(LowpassFilter::new(0, 1000.0, LowpassFilter::DEFAULT_Q).is_err());
        assert!(LowpassFilter::new(44100, 1000.0, 0.0).is_err());
    }

    #[test]
    fn passes_lows_and_damps_highs() -> Result<(), Box<Error>> {
        let sample_rate = 44100;
        let mut filter = LowpassFilter::new(sample_rate, 500.0, LowpassFilter::DEFAULT_Q)?;

        let mut low = sine(50.0, sample_rate, 8820);
        filter.process(&mut low);
        assert!(peak(&low[4410..]) > 0.95);

        filter.reset();
        let mut high = sine(8000.0, sample_rate, 8820);
        filter.process(&mut high);
        // two octaves above 12 dB/oct: well below -24 dB
        assert!(peak(&high[4410..]) < 0.01);
        Ok(())
    }

    #[test]
    fn cutoff_gets_clamped() -> Result<(), Box<Error>> {
        let mut filter = LowpassFilter::new(44100, 100_000.0, LowpassFilter::DEFAULT_Q)?;
        assert_eq!(filter.cutoff(), 44100.0 * 0.49);
        filter.set_cutoff(-10.0);
        assert_eq!(filter.cutoff(), 1.0);
        filter.set_cutoff(f32::NAN);
        assert_eq!(filter.cutoff(), 44100.0 * 0.49);
        Ok(())
    }
}
