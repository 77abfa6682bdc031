//! Attack-sustain-release envelope with an additional fast shut-down stage.

// -------------------------------------------------------------------------------------------------

/// Current processing stage in a [`AsrEnvelope`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AsrStage {
    #[default]
    /// Before attack and after release or shut-down (zero volume).
    Idle,
    Attack,
    Sustain,
    Release,
    /// Fast release, used to silence a voice without clicks.
    ShutDown,
}

// -------------------------------------------------------------------------------------------------

/// Linear ASR envelope.
///
/// Stages only change via [`Self::note_on`], [`Self::note_off`] and [`Self::shut_down`] or when a
/// ramp reaches its target. The output value can't be set from the outside, so every transition
/// ramps from the value the envelope currently is at.
#[derive(Debug, Clone)]
pub struct AsrEnvelope {
    stage: AsrStage,
    output: f32,
    sample_rate: u32,
    sustain_level: f32,
    attack_rate: f32,
    release_rate: f32,
    shut_down_rate: f32,
}

impl AsrEnvelope {
    /// Time used for attack or release when the given time is zero or negative.
    pub const MIN_TIME: f32 = 0.001;
    /// Duration of a full scale shut down ramp in seconds.
    pub const SHUT_DOWN_TIME: f32 = 0.1;

    pub fn new(attack_time: f32, sustain_level: f32, release_time: f32, sample_rate: u32) -> Self {
        assert!(sample_rate > 0, "Invalid sample rate");
        debug_assert!(
            (0.0..=1.0).contains(&sustain_level),
            "Sustain level must be in range [0.0, 1.0]"
        );
        let mut envelope = Self {
            stage: AsrStage::Idle,
            output: 0.0,
            sample_rate,
            sustain_level: sustain_level.clamp(0.0, 1.0),
            attack_rate: 0.0,
            release_rate: 0.0,
            shut_down_rate: Self::rate_from_time(Self::SHUT_DOWN_TIME, sample_rate),
        };
        envelope.set_attack_time(attack_time);
        envelope.set_release_time(release_time);
        envelope
    }

    fn rate_from_time(time: f32, sample_rate: u32) -> f32 {
        let time = if time > 0.0 { time } else { Self::MIN_TIME };
        1.0 / (time * sample_rate as f32)
    }

    #[inline(always)]
    pub fn stage(&self) -> AsrStage {
        self.stage
    }

    /// Last processed output value.
    #[inline(always)]
    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn sustain_level(&self) -> f32 {
        self.sustain_level
    }

    /// Set attack time in seconds. Applies to the currently running attack too.
    pub fn set_attack_time(&mut self, time: f32) {
        self.attack_rate = Self::rate_from_time(time, self.sample_rate);
    }

    /// Set release time in seconds. Applies to the currently running release too.
    pub fn set_release_time(&mut self, time: f32) {
        self.release_rate = Self::rate_from_time(time, self.sample_rate);
    }

    /// Start ramping up to the sustain level.
    pub fn note_on(&mut self) {
        self.stage = AsrStage::Attack;
    }

    /// Start ramping down to zero with the release rate.
    pub fn note_off(&mut self) {
        self.stage = AsrStage::Release;
    }

    /// Start ramping down to zero with the fast shut down rate.
    pub fn shut_down(&mut self) {
        self.stage = AsrStage::ShutDown;
    }

    /// Compute and return one output sample. Returns 0.0 in the Idle stage.
    #[inline]
    pub fn tick(&mut self) -> f32 {
        match self.stage {
            AsrStage::Idle => {
                self.output = 0.0;
            }
            AsrStage::Attack => {
                self.output += self.attack_rate;
                if self.output >= self.sustain_level {
                    self.output = self.sustain_level;
                    self.stage = AsrStage::Sustain;
                }
            }
            AsrStage::Sustain => {
                // wait for note off
            }
            AsrStage::Release | AsrStage::ShutDown => {
                let rate = if self.stage == AsrStage::Release {
                    self.release_rate
                } else {
                    self.shut_down_rate
                };
                self.output -= rate;
                if self.output <= 0.0 {
                    self.output = 0.0;
                    self.stage = AsrStage::Idle;
                }
            }
        }
        debug_assert!(
            (0.0..=self.sustain_level).contains(&self.output),
            "Envelope output {} left range [0, {}] in stage {}",
            self.output,
            self.sustain_level,
            self.stage
        );
        self.output
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_outputs_zero() {
        let mut env = AsrEnvelope::new(0.01, 1.0, 0.05, 44100);
        assert_eq!(env.stage(), AsrStage::Idle);
        assert!((0..100).all(|_| env.tick() == 0.0));
    }

    #[test]
    fn attack_sustain_release() {
        let sample_rate = 1000;
        let mut env = AsrEnvelope::new(0.1, 1.0, 0.2, sample_rate);
        env.note_on();
        assert_eq!(env.stage(), AsrStage::Attack);

        // attack: 100 samples for a full unit
        let mut ticks = 0;
        while env.stage() == AsrStage::Attack {
            env.tick();
            ticks += 1;
            assert!(ticks <= 101, "attack did not converge");
        }
        assert_eq!(env.stage(), AsrStage::Sustain);
        assert_eq!(env.output(), 1.0);
        assert_eq!(env.tick(), 1.0);

        // release: 200 samples for a full unit
        env.note_off();
        let mut ticks = 0;
        let mut last = env.output();
        while env.stage() != AsrStage::Idle {
            let value = env.tick();
            assert!(value <= last);
            last = value;
            ticks += 1;
            assert!(ticks <= 201, "release did not converge");
        }
        assert!(ticks >= 199);
        assert_eq!(env.output(), 0.0);
    }

    #[test]
    fn shut_down_is_fast() {
        let sample_rate = 1000;
        let mut env = AsrEnvelope::new(0.001, 1.0, 10.0, sample_rate);
        env.note_on();
        while env.stage() != AsrStage::Sustain {
            env.tick();
        }
        env.shut_down();
        // 0.1 seconds for a full unit
        let mut ticks = 0;
        while env.stage() != AsrStage::Idle {
            env.tick();
            ticks += 1;
            assert!(ticks <= 101, "shut down did not converge");
        }
    }

    #[test]
    fn retrigger_continues_from_current_value() {
        let sample_rate = 1000;
        let mut env = AsrEnvelope::new(0.1, 1.0, 0.1, sample_rate);
        env.note_on();
        for _ in 0..50 {
            env.tick();
        }
        env.note_off();
        for _ in 0..10 {
            env.tick();
        }
        let value = env.output();
        assert!(value > 0.3 && value < 0.5);
        env.note_on();
        assert!(env.tick() > value);
    }

    #[test]
    fn zero_times_use_minimum() {
        let mut env = AsrEnvelope::new(0.0, 0.5, -1.0, 1000);
        env.note_on();
        assert_eq!(env.tick(), 0.5);
        assert_eq!(env.stage(), AsrStage::Sustain);
        env.note_off();
        assert_eq!(env.tick(), 0.0);
        assert_eq!(env.stage(), AsrStage::Idle);
    }
}
