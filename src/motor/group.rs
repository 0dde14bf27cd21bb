//! The eight-axis motor group and its coordinated-move protocol.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::{I2c, SevenBitAddress};
use tracing::debug;

use crate::config::SystemConfig;
use crate::error::{Error, Result};
use crate::expander::{Chip, ExpanderHub, PinAddress, Port, SharedHub};
use crate::motion::{MotionProfile, StepPlan};

use super::axis::{Axis, AxisId, Direction};

/// All eight axes plus the expander hub they share.
///
/// Group moves follow a two-phase protocol: first every member's enable and
/// direction lines are written over the bus, then the pulse workers are
/// launched back-to-back. The slow I2C traffic all happens before the first
/// pulse, so members start within microseconds of each other instead of
/// being staggered by bus transactions.
pub struct MotorGroup<P, I2C>
where
    P: OutputPin + Send + 'static,
    I2C: I2c<SevenBitAddress>,
{
    hub: SharedHub<I2C>,
    axes: [Axis<P, I2C>; 8],
}

impl<P, I2C> MotorGroup<P, I2C>
where
    P: OutputPin + Send + 'static,
    I2C: I2c<SevenBitAddress>,
{
    /// Build the group from the system configuration and the claimed step
    /// pins, in M1..M8 order. Initializes the expander chips.
    pub fn new(i2c: I2C, pins: [P; 8], config: &SystemConfig) -> Result<Self> {
        let mut hub = ExpanderHub::new(i2c, config.chip_addresses(), config.bus_retry());
        hub.init()?;
        let hub: SharedHub<I2C> = Arc::new(Mutex::new(hub));

        let timing = config.step_timing();
        let [p1, p2, p3, p4, p5, p6, p7, p8] = pins;
        let axis = |id: AxisId, pin: P, hub: &SharedHub<I2C>| {
            Axis::new(config.axis_config(id), pin, timing, Arc::clone(hub))
        };
        let axes = [
            axis(AxisId::M1, p1, &hub),
            axis(AxisId::M2, p2, &hub),
            axis(AxisId::M3, p3, &hub),
            axis(AxisId::M4, p4, &hub),
            axis(AxisId::M5, p5, &hub),
            axis(AxisId::M6, p6, &hub),
            axis(AxisId::M7, p7, &hub),
            axis(AxisId::M8, p8, &hub),
        ];
        Ok(Self { hub, axes })
    }

    /// Shared access to one axis.
    pub fn axis(&self, id: AxisId) -> &Axis<P, I2C> {
        &self.axes[id.index()]
    }

    /// Exclusive access to one axis.
    pub fn axis_mut(&mut self, id: AxisId) -> &mut Axis<P, I2C> {
        &mut self.axes[id.index()]
    }

    /// Move several axes by the same number of output turns, together.
    ///
    /// All members' enable and direction lines are set before any member
    /// emits a pulse; a hub failure during that phase aborts the whole group
    /// with no pulses emitted. Zero-turn requests succeed without traffic.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] naming the first still-moving member, checked before
    /// any I/O; hub errors from the setup phase.
    ///
    /// # Panics
    ///
    /// Panics if `ids` is empty or contains a duplicate.
    pub fn move_group(
        &mut self,
        ids: &[AxisId],
        turns: f32,
        max_rpm: f32,
        accel_rpm_per_s: f32,
    ) -> Result<()> {
        assert!(!ids.is_empty(), "group move needs at least one axis");
        for (i, id) in ids.iter().enumerate() {
            assert!(!ids[..i].contains(id), "duplicate axis {} in group", id);
        }

        for &id in ids {
            if self.axis(id).is_busy() {
                return Err(Error::Busy(id));
            }
        }

        // Per-axis plans up front: axes may differ in microsteps_per_rev.
        let mut staged: Vec<(AxisId, i32, MotionProfile)> = Vec::with_capacity(ids.len());
        for &id in ids {
            let (steps, profile) =
                self.axis(id).revolution_request(turns, max_rpm, accel_rpm_per_s)?;
            if steps != 0 {
                staged.push((id, steps, profile));
            }
        }
        if staged.is_empty() {
            return Ok(());
        }
        debug!(axes = staged.len(), turns, "group move");

        // Phase 1: all bus traffic, serialized on the shared bus. Every
        // enable (each with its settle time) first, then every direction.
        for &(id, _, _) in &staged {
            self.axis(id).enable()?;
        }
        for &(id, steps, _) in &staged {
            self.axis(id).set_direction(Direction::from_steps(steps))?;
        }

        // Phase 2: launch workers back-to-back, no bus traffic.
        for &(id, steps, profile) in &staged {
            let plan = StepPlan::compute(steps.unsigned_abs(), &profile);
            self.axis_mut(id).start_plan(plan)?;
        }
        Ok(())
    }

    /// Open every valve by `turns` output revolutions.
    pub fn open_all(&mut self, turns: f32, max_rpm: f32, accel_rpm_per_s: f32) -> Result<()> {
        self.move_group(&AxisId::ALL, turns.abs(), max_rpm, accel_rpm_per_s)
    }

    /// Close every valve by `turns` output revolutions.
    pub fn close_all(&mut self, turns: f32, max_rpm: f32, accel_rpm_per_s: f32) -> Result<()> {
        self.move_group(&AxisId::ALL, -turns.abs(), max_rpm, accel_rpm_per_s)
    }

    /// Start a signed relative move on one axis.
    pub fn move_steps(&mut self, id: AxisId, steps: i32, profile: &MotionProfile) -> Result<()> {
        self.axis_mut(id).move_steps(steps, profile)
    }

    /// Start a signed relative move on one axis, in output revolutions.
    pub fn move_revolutions(
        &mut self,
        id: AxisId,
        turns: f32,
        max_rpm: f32,
        accel_rpm_per_s: f32,
    ) -> Result<()> {
        self.axis_mut(id).move_revolutions(turns, max_rpm, accel_rpm_per_s)
    }

    /// Whether an axis is currently moving.
    pub fn is_busy(&self, id: AxisId) -> bool {
        self.axis(id).is_busy()
    }

    /// Signal one axis to stop at the next pulse boundary.
    pub fn stop(&self, id: AxisId) {
        self.axis(id).stop();
    }

    /// Signal every axis to stop.
    pub fn stop_all(&self) {
        for axis in &self.axes {
            axis.stop();
        }
    }

    /// Block until one axis finishes; returns steps emitted.
    pub fn wait(&mut self, id: AxisId, timeout: Option<Duration>) -> Result<u32> {
        self.axis_mut(id).wait(timeout)
    }

    /// Block until every axis finishes.
    ///
    /// The same `timeout` is applied to each axis in turn, so the worst-case
    /// wall time is eight times the timeout; in practice the waits overlap
    /// because the moves run concurrently. Returns on the first timeout or
    /// failure.
    pub fn wait_all(&mut self, timeout: Option<Duration>) -> Result<()> {
        for axis in &mut self.axes {
            axis.wait(timeout)?;
        }
        Ok(())
    }

    /// Assert one axis's driver enable line.
    pub fn enable(&self, id: AxisId) -> Result<()> {
        self.axis(id).enable()
    }

    /// Release one axis's driver enable line.
    pub fn disable(&self, id: AxisId) -> Result<()> {
        self.axis(id).disable()
    }

    /// Assert every driver enable line.
    pub fn enable_all(&self) -> Result<()> {
        for axis in &self.axes {
            axis.enable()?;
        }
        Ok(())
    }

    /// Release every driver enable line.
    pub fn disable_all(&self) -> Result<()> {
        for axis in &self.axes {
            axis.disable()?;
        }
        Ok(())
    }

    /// Switch a program LED (1..=6).
    pub fn set_led(&self, index: u8, on: bool) -> Result<()> {
        self.hub().set_led(index, on)
    }

    /// Read one input pin on the expander board.
    pub fn read_digital_input(&self, pin: PinAddress) -> Result<bool> {
        self.hub().read_pin(pin)
    }

    /// Read a whole expander port.
    pub fn read_port(&self, chip: Chip, port: Port) -> Result<u8> {
        self.hub().read_port(chip, port)
    }

    fn hub(&self) -> MutexGuard<'_, ExpanderHub<I2C>> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
