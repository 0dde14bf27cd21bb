//! Trapezoidal velocity-profile synthesis.
//!
//! A move accelerates from rest to cruise velocity, cruises, and decelerates
//! back to rest. Moves too short to reach cruise velocity degenerate to a
//! triangular profile with no cruise phase.

use libm::sqrtf;

use crate::error::{Error, Result};

/// Requested motion parameters for one move, in step units.
///
/// Constructed fresh per move request, never shared or mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionProfile {
    max_velocity: f32,
    acceleration: f32,
}

impl MotionProfile {
    /// Create a profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProfile`] unless both values are strictly
    /// positive and finite.
    pub fn new(max_velocity: f32, acceleration: f32) -> Result<Self> {
        if !(max_velocity.is_finite() && max_velocity > 0.0)
            || !(acceleration.is_finite() && acceleration > 0.0)
        {
            return Err(Error::InvalidProfile {
                max_velocity,
                acceleration,
            });
        }
        Ok(Self {
            max_velocity,
            acceleration,
        })
    }

    /// Maximum velocity in steps/s.
    #[inline]
    pub fn max_velocity(&self) -> f32 {
        self.max_velocity
    }

    /// Acceleration in steps/s².
    #[inline]
    pub fn acceleration(&self) -> f32 {
        self.acceleration
    }
}

/// Step pulse shape and the hardware period floor.
///
/// The DM860H-class drivers on this board need a minimum high and low time
/// per pulse; their sum is the shortest period ever emitted, regardless of
/// the velocity the profile asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTiming {
    pulse_high_ns: u32,
    pulse_low_ns: u32,
}

impl StepTiming {
    /// Create a timing from nanosecond widths.
    ///
    /// # Panics
    ///
    /// Panics if either width is zero.
    pub const fn new(pulse_high_ns: u32, pulse_low_ns: u32) -> Self {
        assert!(pulse_high_ns > 0 && pulse_low_ns > 0, "pulse widths must be > 0");
        Self {
            pulse_high_ns,
            pulse_low_ns,
        }
    }

    /// Create a timing from microsecond widths. Widths beyond the u32
    /// nanosecond range (about 4.29 s) saturate.
    pub const fn from_micros(pulse_high_us: u32, pulse_low_us: u32) -> Self {
        Self::new(
            pulse_high_us.saturating_mul(1_000),
            pulse_low_us.saturating_mul(1_000),
        )
    }

    /// High time per pulse in nanoseconds.
    #[inline]
    pub const fn pulse_high_ns(&self) -> u32 {
        self.pulse_high_ns
    }

    /// Low time per pulse in nanoseconds.
    #[inline]
    pub const fn pulse_low_ns(&self) -> u32 {
        self.pulse_low_ns
    }

    /// Shortest emittable pulse period.
    #[inline]
    pub const fn min_period_ns(&self) -> u64 {
        self.pulse_high_ns as u64 + self.pulse_low_ns as u64
    }
}

impl Default for StepTiming {
    fn default() -> Self {
        Self::from_micros(2, 2)
    }
}

/// Phase of a move at a given step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
    /// Ramping up from rest.
    Accelerating,
    /// Constant velocity.
    Cruising,
    /// Ramping down to rest.
    Decelerating,
    /// Past the last step.
    Complete,
}

/// A fully computed step schedule for one move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepPlan {
    total_steps: u32,
    accel_steps: u32,
    cruise_steps: u32,
    decel_steps: u32,
    max_velocity: f32,
    acceleration: f32,
}

impl StepPlan {
    /// Compute the phase split for `total_steps` under `profile`.
    ///
    /// `accel_steps = floor(v²/2a)`, floored to at least 1, so a nominally
    /// "instant" move still performs one ramp step. When the move is too
    /// short to reach cruise velocity the plan degenerates to a triangle:
    /// the acceleration ramp takes `total/2` steps and deceleration takes
    /// the remainder (the odd step, if any).
    pub fn compute(total_steps: u32, profile: &MotionProfile) -> Self {
        let v = profile.max_velocity();
        let a = profile.acceleration();

        if total_steps == 0 {
            return Self {
                total_steps: 0,
                accel_steps: 0,
                cruise_steps: 0,
                decel_steps: 0,
                max_velocity: v,
                acceleration: a,
            };
        }

        // v² = 2·a·s  =>  s = v²/(2a)
        let mut accel_steps = ((v * v) / (2.0 * a)) as u32;
        if accel_steps < 1 {
            accel_steps = 1;
        }

        // Compared in u64: a slow-accelerating profile can put the ramp
        // length near u32::MAX, where doubling would overflow.
        let (accel_steps, cruise_steps, decel_steps) =
            if 2 * accel_steps as u64 > total_steps as u64 {
                let accel = total_steps / 2;
                (accel, 0, total_steps - accel)
            } else {
                (accel_steps, total_steps - 2 * accel_steps, accel_steps)
            };

        Self {
            total_steps,
            accel_steps,
            cruise_steps,
            decel_steps,
            max_velocity: v,
            acceleration: a,
        }
    }

    /// Total steps in the move.
    #[inline]
    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    /// Steps in the acceleration ramp.
    #[inline]
    pub fn accel_steps(&self) -> u32 {
        self.accel_steps
    }

    /// Steps at cruise velocity.
    #[inline]
    pub fn cruise_steps(&self) -> u32 {
        self.cruise_steps
    }

    /// Steps in the deceleration ramp.
    #[inline]
    pub fn decel_steps(&self) -> u32 {
        self.decel_steps
    }

    /// Whether the plan contains no steps at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total_steps == 0
    }

    /// Phase at a 0-indexed step number.
    pub fn phase_at(&self, step: u32) -> MotionPhase {
        if step >= self.total_steps {
            MotionPhase::Complete
        } else if step < self.accel_steps {
            MotionPhase::Accelerating
        } else if step < self.accel_steps + self.cruise_steps {
            MotionPhase::Cruising
        } else {
            MotionPhase::Decelerating
        }
    }

    /// Target velocity at a 0-indexed step number, in steps/s.
    ///
    /// During acceleration step `s` (1-indexed within the ramp) the target
    /// is `min(v, sqrt(2·a·s))`; the deceleration ramp mirrors the same
    /// curve backward.
    pub fn velocity_at(&self, step: u32) -> f32 {
        match self.phase_at(step) {
            MotionPhase::Complete => 0.0,
            MotionPhase::Cruising => self.max_velocity,
            MotionPhase::Accelerating => {
                let s = (step + 1) as f32;
                sqrtf(2.0 * self.acceleration * s).min(self.max_velocity)
            }
            MotionPhase::Decelerating => {
                // counts down to 1 on the final step
                let remaining = (self.total_steps - step) as f32;
                sqrtf(2.0 * self.acceleration * remaining).min(self.max_velocity)
            }
        }
    }

    /// Pulse period at a 0-indexed step number, clamped to the timing floor.
    pub fn period_ns_at(&self, step: u32, timing: &StepTiming) -> u64 {
        let v = self.velocity_at(step);
        if v <= 0.0 {
            return u64::MAX;
        }
        let period = (1e9 / v) as u64;
        period.max(timing.min_period_ns())
    }
}
