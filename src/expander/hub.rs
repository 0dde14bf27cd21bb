//! The expander hub: serialized access to the three MCP23017 chips.

use std::sync::{Arc, Mutex};

use embedded_hal::i2c::{I2c, SevenBitAddress};
use tracing::{debug, info};

use crate::error::Result;
use crate::hal::{BusRetry, RegisterBus};
use crate::motor::{AxisId, Direction};

use super::pins::{direction_pin, enable_pin, Chip, PinAddress, Port, PROGRAM_LEDS};
use super::registers::{port_register, GPIOA, GPPUA, IODIRA, OLATA};

/// A hub shared between the motor group and its axes.
///
/// All hub operations must be serialized behind this single lock: the bus is
/// single-master and the latch cache is a read-modify-write resource.
pub type SharedHub<I2C> = Arc<Mutex<ExpanderHub<I2C>>>;

/// I2C addresses of the three expander chips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipAddresses {
    /// MCP1: buttons + LEDs.
    pub mcp1: u8,
    /// MCP2: selector inputs.
    pub mcp2: u8,
    /// MCP3: motor direction/enable outputs.
    pub mcp3: u8,
}

impl Default for ChipAddresses {
    fn default() -> Self {
        Self {
            mcp1: 0x24,
            mcp2: 0x25,
            mcp3: 0x26,
        }
    }
}

/// Owns the three expander chips and the output-latch cache.
///
/// The cache holds one byte per output port and is the source of truth for
/// read-modify-write pin operations. It is updated only after a successful
/// register write, so cache and hardware cannot diverge on a failed
/// transaction. Ports the hub has never written are cold (`None`) and are
/// seeded from a real OLAT read on first use — a previous invocation may
/// have left outputs non-zero.
pub struct ExpanderHub<I2C> {
    bus: RegisterBus<I2C>,
    addrs: ChipAddresses,
    olat: [[Option<u8>; 2]; 3],
}

impl<I2C> ExpanderHub<I2C>
where
    I2C: I2c<SevenBitAddress>,
{
    /// Create a hub. Call [`init`](Self::init) before any pin operation.
    pub fn new(i2c: I2C, addrs: ChipAddresses, retry: BusRetry) -> Self {
        Self {
            bus: RegisterBus::new(i2c, retry),
            addrs,
            olat: [[None; 2]; 3],
        }
    }

    /// Configure direction registers, pull-ups, and safe default outputs
    /// for all three chips.
    ///
    /// Defaults: every enable line inactive (high, the line is active low),
    /// all direction lines low, all LEDs off. The writes seed the latch
    /// cache for the output ports.
    pub fn init(&mut self) -> Result<()> {
        self.init_mcp1()?;
        self.init_mcp2()?;
        self.init_mcp3()?;
        info!("expander hub initialized");
        Ok(())
    }

    // MCP1: B0..B5 button inputs; A2..A7 LED outputs, A0..A1 spare inputs.
    fn init_mcp1(&mut self) -> Result<()> {
        let addr = self.addrs.mcp1;
        self.bus.write_register(addr, IODIRA, 0b0000_0011)?;
        self.bus
            .write_register(addr, port_register(IODIRA, Port::B), 0xFF)?;
        self.bus.write_register(addr, GPPUA, 0b0000_0011)?;
        self.bus
            .write_register(addr, port_register(GPPUA, Port::B), 0xFF)?;
        // LEDs off
        self.write_olat(Chip::Mcp1, Port::A, 0x00)
    }

    // MCP2: all inputs with pull-ups (VIC on B, AIR on A).
    fn init_mcp2(&mut self) -> Result<()> {
        let addr = self.addrs.mcp2;
        self.bus.write_register(addr, IODIRA, 0xFF)?;
        self.bus
            .write_register(addr, port_register(IODIRA, Port::B), 0xFF)?;
        self.bus.write_register(addr, GPPUA, 0xFF)?;
        self.bus
            .write_register(addr, port_register(GPPUA, Port::B), 0xFF)
    }

    // MCP3: all outputs, DIR on A, ENA on B.
    fn init_mcp3(&mut self) -> Result<()> {
        let addr = self.addrs.mcp3;
        self.bus.write_register(addr, IODIRA, 0x00)?;
        self.bus
            .write_register(addr, port_register(IODIRA, Port::B), 0x00)?;
        self.bus.write_register(addr, GPPUA, 0x00)?;
        self.bus
            .write_register(addr, port_register(GPPUA, Port::B), 0x00)?;
        // ENA is active low: all high = every driver disabled
        self.write_olat(Chip::Mcp3, Port::B, 0xFF)?;
        self.write_olat(Chip::Mcp3, Port::A, 0x00)
    }

    /// Set one output pin, touching only its own bit.
    pub fn write_pin(&mut self, pin: PinAddress, level: bool) -> Result<()> {
        let current = self.cached_olat(pin.chip(), pin.port())?;
        let value = if level {
            current | pin.mask()
        } else {
            current & !pin.mask()
        };
        self.write_olat(pin.chip(), pin.port(), value)
    }

    /// Write a whole output port at once.
    pub fn write_port(&mut self, chip: Chip, port: Port, value: u8) -> Result<()> {
        self.write_olat(chip, port, value)
    }

    /// Read one input pin. Inputs are never cached.
    pub fn read_pin(&mut self, pin: PinAddress) -> Result<bool> {
        let value = self.read_port(pin.chip(), pin.port())?;
        Ok(value & pin.mask() != 0)
    }

    /// Read a whole port from the GPIO register. Does not touch the cache.
    pub fn read_port(&mut self, chip: Chip, port: Port) -> Result<u8> {
        self.bus
            .read_register(self.address(chip), port_register(GPIOA, port))
    }

    /// Drive an axis's enable line. The line is active low at the driver;
    /// callers pass the logical state.
    pub fn set_motor_enable(&mut self, axis: AxisId, enabled: bool) -> Result<()> {
        debug!(axis = %axis, enabled, "motor enable");
        self.write_pin(enable_pin(axis), !enabled)
    }

    /// Drive an axis's direction line, applying that axis's inversion flag.
    pub fn set_motor_direction(
        &mut self,
        axis: AxisId,
        direction: Direction,
        invert: bool,
    ) -> Result<()> {
        let level = (direction == Direction::Forward) ^ invert;
        self.write_pin(direction_pin(axis), level)
    }

    /// Switch a program LED.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not in `1..=6`.
    pub fn set_led(&mut self, index: u8, on: bool) -> Result<()> {
        assert!((1..=6).contains(&index), "LED index must be 1..=6");
        self.write_pin(PROGRAM_LEDS[(index - 1) as usize], on)
    }

    /// Consume the hub and return the underlying I2C device.
    pub fn release(self) -> I2C {
        self.bus.release()
    }

    fn address(&self, chip: Chip) -> u8 {
        match chip {
            Chip::Mcp1 => self.addrs.mcp1,
            Chip::Mcp2 => self.addrs.mcp2,
            Chip::Mcp3 => self.addrs.mcp3,
        }
    }

    // Latch byte for a port, seeded from hardware if cold.
    fn cached_olat(&mut self, chip: Chip, port: Port) -> Result<u8> {
        if let Some(value) = self.olat[chip.index()][port.index()] {
            return Ok(value);
        }
        let value = self
            .bus
            .read_register(self.address(chip), port_register(OLATA, port))?;
        self.olat[chip.index()][port.index()] = Some(value);
        Ok(value)
    }

    // Cache update happens only after the write succeeded.
    fn write_olat(&mut self, chip: Chip, port: Port, value: u8) -> Result<()> {
        self.bus
            .write_register(self.address(chip), port_register(OLATA, port), value)?;
        self.olat[chip.index()][port.index()] = Some(value);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn cached(&self, chip: Chip, port: Port) -> Option<u8> {
        self.olat[chip.index()][port.index()]
    }
}
