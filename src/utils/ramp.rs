//! Linear ramp towards a target value with a fixed slope.

// -------------------------------------------------------------------------------------------------

/// Direction of a [`LinearRamp`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RampState {
    Ascending,
    Descending,
    #[default]
    AtTarget,
}

// -------------------------------------------------------------------------------------------------

/// Moves its value linearly towards a target, then holds it there.
///
/// The slope is `1 / (time_to_target * sample_rate)` per sample: it's the time the ramp needs to
/// cover a full unit, not the time needed to reach the current target.
#[derive(Debug, Clone)]
pub struct LinearRamp {
    state: RampState,
    value: f32,
    target: f32,
    rate: f32,
}

impl LinearRamp {
    /// Time to target that gets used when the given time is zero or negative.
    pub const MIN_TIME_TO_TARGET: f32 = 0.001;

    pub fn new(sample_rate: u32, time_to_target: f32, initial_value: f32) -> Self {
        assert!(sample_rate > 0, "Invalid sample rate");
        let time_to_target = if time_to_target > 0.0 {
            time_to_target
        } else {
            Self::MIN_TIME_TO_TARGET
        };
        let rate = 1.0 / (time_to_target * sample_rate as f32);
        Self {
            state: RampState::AtTarget,
            value: initial_value,
            target: initial_value,
            rate,
        }
    }

    #[inline(always)]
    pub fn state(&self) -> RampState {
        self.state
    }

    #[inline(always)]
    pub fn value(&self) -> f32 {
        self.value
    }

    #[inline(always)]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline(always)]
    pub fn is_at_target(&self) -> bool {
        self.state == RampState::AtTarget
    }

    /// Start ramping from the current value to the given target.
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
        self.state = if target > self.value {
            RampState::Ascending
        } else if target < self.value {
            RampState::Descending
        } else {
            RampState::AtTarget
        };
    }

    /// Advance the ramp by one sample and return the new value.
    #[inline]
    pub fn tick(&mut self) -> f32 {
        match self.state {
            RampState::Ascending => {
                self.value += self.rate;
                if self.value >= self.target {
                    self.value = self.target;
                    self.state = RampState::AtTarget;
                }
            }
            RampState::Descending => {
                self.value -= self.rate;
                if self.value <= self.target {
                    self.value = self.target;
                    self.state = RampState::AtTarget;
                }
            }
            RampState::AtTarget => {}
        }
        self.value
    }

    /// Fill the given buffer with consecutive ramp values.
    pub fn process(&mut self, output: &mut [f32]) {
        if self.is_at_target() {
            output.fill(self.value);
        } else {
            for o in output.iter_mut() {
                *o = self.tick();
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaches_target_exactly() {
        let sample_rate = 1000;
        let mut ramp = LinearRamp::new(sample_rate, 0.1, 0.0);
        ramp.set_target(1.0);
        assert_eq!(ramp.state(), RampState::Ascending);

        // 100 samples per unit, plus some rounding slack
        let mut ticks = 0;
        while !ramp.is_at_target() {
            ramp.tick();
            ticks += 1;
            assert!(ticks <= 101, "ramp did not converge");
        }
        assert_eq!(ramp.value(), 1.0);
        assert!(ticks >= 99);

        // holds the target afterwards
        assert_eq!(ramp.tick(), 1.0);

        ramp.set_target(0.25);
        assert_eq!(ramp.state(), RampState::Descending);
        let mut buffer = [0.0; 200];
        ramp.process(&mut buffer);
        assert_eq!(*buffer.last().unwrap(), 0.25);
        assert!(buffer.windows(2).all(|w| w[1] <= w[0]));
        assert!(buffer.iter().all(|v| *v >= 0.25));
    }

    #[test]
    fn retarget_while_moving_reverses() {
        let mut ramp = LinearRamp::new(1000, 0.1, 0.0);
        ramp.set_target(1.0);
        for _ in 0..50 {
            ramp.tick();
        }
        let turning_point = ramp.value();
        assert!(turning_point > 0.4 && turning_point < 0.6);
        assert_eq!(ramp.state(), RampState::Ascending);

        ramp.set_target(0.0);
        assert_eq!(ramp.state(), RampState::Descending);
        assert!(ramp.tick() < turning_point);

        let mut ticks = 0;
        while !ramp.is_at_target() {
            let previous = ramp.value();
            assert!(ramp.tick() < previous);
            ticks += 1;
            assert!(ticks <= 60, "ramp did not converge");
        }
        assert_eq!(ramp.value(), 0.0);
        assert_eq!(ramp.tick(), 0.0);
    }

    #[test]
    fn zero_time_uses_minimum() {
        let mut ramp = LinearRamp::new(44100, 0.0, 0.0);
        ramp.set_target(1.0);
        // 0.001 s at 44100 Hz: 44.1 samples per unit
        let mut ticks = 0;
        while !ramp.is_at_target() {
            ramp.tick();
            ticks += 1;
        }
        assert_eq!(ticks, 45);
    }

    #[test]
    fn same_target_is_at_target() {
        let mut ramp = LinearRamp::new(44100, 1.0, 0.5);
        ramp.set_target(0.5);
        assert!(ramp.is_at_target());
        assert_eq!(ramp.tick(), 0.5);
    }
}
