//! A single valve axis: one step line plus its enable/direction pins on the
//! expander hub.

use core::fmt;
use std::sync::{MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::{I2c, SevenBitAddress};
use libm::roundf;
use tracing::debug;

use crate::error::{Error, Result};
use crate::expander::{ExpanderHub, SharedHub};
use crate::motion::{MotionProfile, StepChannel, StepPlan, StepTiming};

/// One of the eight valve axes, M1..M8.
///
/// A closed enum rather than a bare index: axis identifiers that don't exist
/// on the board are unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisId {
    /// Axis M1.
    M1,
    /// Axis M2.
    M2,
    /// Axis M3.
    M3,
    /// Axis M4.
    M4,
    /// Axis M5.
    M5,
    /// Axis M6.
    M6,
    /// Axis M7.
    M7,
    /// Axis M8.
    M8,
}

impl AxisId {
    /// Every axis, in M1..M8 order.
    pub const ALL: [AxisId; 8] = [
        AxisId::M1,
        AxisId::M2,
        AxisId::M3,
        AxisId::M4,
        AxisId::M5,
        AxisId::M6,
        AxisId::M7,
        AxisId::M8,
    ];

    /// Zero-based index, 0..=7.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            AxisId::M1 => 0,
            AxisId::M2 => 1,
            AxisId::M3 => 2,
            AxisId::M4 => 3,
            AxisId::M5 => 4,
            AxisId::M6 => 5,
            AxisId::M7 => 6,
            AxisId::M8 => 7,
        }
    }

    /// One-based axis number, 1..=8, as printed on the board.
    #[inline]
    pub const fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    /// The label used in configuration files and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            AxisId::M1 => "M1",
            AxisId::M2 => "M2",
            AxisId::M3 => "M3",
            AxisId::M4 => "M4",
            AxisId::M5 => "M5",
            AxisId::M6 => "M6",
            AxisId::M7 => "M7",
            AxisId::M8 => "M8",
        }
    }

    /// Parse a configuration key like `"M3"`.
    pub fn from_key(key: &str) -> Option<Self> {
        AxisId::ALL.into_iter().find(|id| id.as_str() == key)
    }
}

impl fmt::Display for AxisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rotation direction of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Positive steps; opens the valve.
    Forward,
    /// Negative steps; closes the valve.
    Reverse,
}

impl Direction {
    /// Direction implied by a signed step count. Zero maps to `Forward`,
    /// though a zero-step move never reaches the direction pin.
    #[inline]
    pub const fn from_steps(steps: i32) -> Self {
        if steps < 0 {
            Direction::Reverse
        } else {
            Direction::Forward
        }
    }
}

/// Immutable per-axis parameters, built once from the system configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisConfig {
    /// Which axis this is.
    pub id: AxisId,
    /// Microsteps per output revolution (driver DIP setting × gearing).
    pub microsteps_per_rev: u32,
    /// Flip the direction pin polarity for this axis.
    pub invert_dir: bool,
    /// Settle time after asserting the enable line, before stepping.
    pub ena_settle: Duration,
    /// Setup time after changing the direction line, before stepping.
    pub dir_setup: Duration,
}

/// One controllable axis: its step channel plus its share of the hub.
pub struct Axis<P, I2C>
where
    P: OutputPin + Send + 'static,
    I2C: I2c<SevenBitAddress>,
{
    cfg: AxisConfig,
    hub: SharedHub<I2C>,
    channel: StepChannel<P>,
}

impl<P, I2C> Axis<P, I2C>
where
    P: OutputPin + Send + 'static,
    I2C: I2c<SevenBitAddress>,
{
    /// Create an axis around its claimed step pin and the shared hub.
    pub fn new(cfg: AxisConfig, pin: P, timing: StepTiming, hub: SharedHub<I2C>) -> Self {
        Self {
            cfg,
            hub,
            channel: StepChannel::new(cfg.id, pin, timing),
        }
    }

    /// This axis's identifier.
    #[inline]
    pub fn id(&self) -> AxisId {
        self.cfg.id
    }

    /// This axis's immutable parameters.
    #[inline]
    pub fn config(&self) -> &AxisConfig {
        &self.cfg
    }

    /// Whether a move is currently in progress.
    pub fn is_busy(&self) -> bool {
        self.channel.is_busy()
    }

    /// Assert the driver enable line, then hold for the settle time.
    pub fn enable(&self) -> Result<()> {
        self.hub().set_motor_enable(self.cfg.id, true)?;
        thread::sleep(self.cfg.ena_settle);
        Ok(())
    }

    /// Release the driver enable line. No settle time applies.
    pub fn disable(&self) -> Result<()> {
        self.hub().set_motor_enable(self.cfg.id, false)
    }

    /// Drive the direction line, then hold for the setup time.
    pub fn set_direction(&self, direction: Direction) -> Result<()> {
        self.hub()
            .set_motor_direction(self.cfg.id, direction, self.cfg.invert_dir)?;
        thread::sleep(self.cfg.dir_setup);
        Ok(())
    }

    /// Start a signed relative move.
    ///
    /// Zero steps succeeds immediately with no bus traffic. Otherwise the
    /// driver is enabled, the direction line set from the sign, and the
    /// pulse worker launched; this returns as soon as the worker is running.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] before any I/O if the previous move has not finished;
    /// hub errors if enable or direction writes fail, in which case no
    /// pulses are emitted.
    pub fn move_steps(&mut self, steps: i32, profile: &MotionProfile) -> Result<()> {
        if self.is_busy() {
            return Err(Error::Busy(self.cfg.id));
        }
        if steps == 0 {
            return Ok(());
        }
        debug!(axis = %self.cfg.id, steps, "move");
        self.enable()?;
        self.set_direction(Direction::from_steps(steps))?;
        self.channel
            .start(StepPlan::compute(steps.unsigned_abs(), profile))
    }

    /// Start a signed relative move expressed in output revolutions.
    ///
    /// `max_rpm` and `accel_rpm_per_s` are converted to step units through
    /// this axis's `microsteps_per_rev`.
    pub fn move_revolutions(
        &mut self,
        turns: f32,
        max_rpm: f32,
        accel_rpm_per_s: f32,
    ) -> Result<()> {
        let (steps, profile) = self.revolution_request(turns, max_rpm, accel_rpm_per_s)?;
        self.move_steps(steps, &profile)
    }

    /// Signal the in-progress move to stop at the next pulse boundary.
    pub fn stop(&self) {
        self.channel.stop();
    }

    /// Block until the in-progress move finishes; returns steps emitted.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if the deadline elapses first; the move keeps
    /// running and a later `wait` can pick it up.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<u32> {
        self.channel.wait(timeout)
    }

    // Convert a turns request into step units. Shared with the group so the
    // whole-group profile is computed before any hub traffic.
    pub(crate) fn revolution_request(
        &self,
        turns: f32,
        max_rpm: f32,
        accel_rpm_per_s: f32,
    ) -> Result<(i32, MotionProfile)> {
        let steps_per_rev = self.cfg.microsteps_per_rev as f32;
        let steps = roundf(turns * steps_per_rev) as i32;
        let profile = MotionProfile::new(
            max_rpm / 60.0 * steps_per_rev,
            accel_rpm_per_s / 60.0 * steps_per_rev,
        )?;
        Ok((steps, profile))
    }

    // Launch the pulse worker without touching the hub; the group performs
    // the enable/direction phase for every member first.
    pub(crate) fn start_plan(&mut self, plan: StepPlan) -> Result<()> {
        self.channel.start(plan)
    }

    fn hub(&self) -> MutexGuard<'_, ExpanderHub<I2C>> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
