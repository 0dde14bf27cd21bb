//! System configuration - root configuration structure.
//!
//! Every field carries the board's as-built default, so an empty TOML file
//! yields the stock wiring: three MCP23017s at 0x24..0x26, eight step lines
//! on the BCM pins the PCB routes, 3200 microsteps per output revolution.

use std::time::Duration;

use heapless::{FnvIndexMap, String};
use serde::Deserialize;

use crate::expander::ChipAddresses;
use crate::hal::BusRetry;
use crate::motion::StepTiming;
use crate::motor::{AxisConfig, AxisId};

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    /// I2C bus and expander addressing.
    #[serde(default)]
    pub i2c: I2cConfig,

    /// Step pulse shape.
    #[serde(default)]
    pub stepgen: StepgenConfig,

    /// Motor defaults and per-axis entries.
    #[serde(default)]
    pub motors: MotorsConfig,
}

/// I2C bus parameters and expander chip addresses.
#[derive(Debug, Clone, Deserialize)]
pub struct I2cConfig {
    /// Linux I2C bus number the expanders sit on.
    #[serde(default = "default_bus")]
    pub bus: u8,

    /// MCP1 address (buttons + LEDs).
    #[serde(default = "default_mcp1")]
    pub mcp1: u8,

    /// MCP2 address (selector inputs).
    #[serde(default = "default_mcp2")]
    pub mcp2: u8,

    /// MCP3 address (motor direction/enable).
    #[serde(default = "default_mcp3")]
    pub mcp3: u8,

    /// Attempts per register transaction before giving up.
    #[serde(default = "default_retries")]
    pub retries: u8,

    /// Delay between retry attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Step pulse widths.
#[derive(Debug, Clone, Deserialize)]
pub struct StepgenConfig {
    /// Step pulse high time, in microseconds.
    #[serde(default = "default_pulse_us")]
    pub pulse_high_us: u32,

    /// Step pulse low time, in microseconds.
    #[serde(default = "default_pulse_us")]
    pub pulse_low_us: u32,
}

/// Motor defaults plus the per-axis table.
#[derive(Debug, Clone, Deserialize)]
pub struct MotorsConfig {
    /// Microsteps per output revolution, unless an axis overrides it.
    #[serde(default = "default_microsteps")]
    pub microsteps_per_rev: u32,

    /// Settle time after asserting an enable line, in milliseconds.
    #[serde(default = "default_ena_settle_ms")]
    pub ena_settle_ms: u64,

    /// Setup time after changing a direction line, in microseconds.
    #[serde(default = "default_dir_setup_us")]
    pub dir_setup_us: u64,

    /// Per-axis entries keyed "M1".."M8".
    #[serde(default = "default_axes")]
    pub axes: FnvIndexMap<String<8>, AxisEntry, 8>,
}

/// One axis's wiring and overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct AxisEntry {
    /// BCM number of the step line.
    pub step_pin: u32,

    /// Flip the direction pin polarity for this axis.
    #[serde(default)]
    pub invert_dir: bool,

    /// Override the default microsteps per revolution.
    #[serde(default)]
    pub microsteps_per_rev: Option<u32>,
}

fn default_bus() -> u8 {
    1
}

fn default_mcp1() -> u8 {
    0x24
}

fn default_mcp2() -> u8 {
    0x25
}

fn default_mcp3() -> u8 {
    0x26
}

fn default_retries() -> u8 {
    3
}

fn default_retry_delay_ms() -> u64 {
    10
}

fn default_pulse_us() -> u32 {
    2
}

fn default_microsteps() -> u32 {
    3200
}

fn default_ena_settle_ms() -> u64 {
    10
}

fn default_dir_setup_us() -> u64 {
    5
}

// The PCB's step line routing, M1..M8 in order.
const DEFAULT_STEP_PINS: [u32; 8] = [17, 27, 22, 5, 18, 23, 24, 25];

fn default_axes() -> FnvIndexMap<String<8>, AxisEntry, 8> {
    let mut axes = FnvIndexMap::new();
    for (id, &step_pin) in AxisId::ALL.iter().zip(&DEFAULT_STEP_PINS) {
        let key = String::try_from(id.as_str()).unwrap_or_default();
        let _ = axes.insert(
            key,
            AxisEntry {
                step_pin,
                invert_dir: false,
                microsteps_per_rev: None,
            },
        );
    }
    axes
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            bus: default_bus(),
            mcp1: default_mcp1(),
            mcp2: default_mcp2(),
            mcp3: default_mcp3(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for StepgenConfig {
    fn default() -> Self {
        Self {
            pulse_high_us: default_pulse_us(),
            pulse_low_us: default_pulse_us(),
        }
    }
}

impl Default for MotorsConfig {
    fn default() -> Self {
        Self {
            microsteps_per_rev: default_microsteps(),
            ena_settle_ms: default_ena_settle_ms(),
            dir_setup_us: default_dir_setup_us(),
            axes: default_axes(),
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            i2c: I2cConfig::default(),
            stepgen: StepgenConfig::default(),
            motors: MotorsConfig::default(),
        }
    }
}

impl SystemConfig {
    /// Get an axis entry by id.
    pub fn axis_entry(&self, id: AxisId) -> Option<&AxisEntry> {
        self.motors
            .axes
            .iter()
            .find(|(k, _)| k.as_str() == id.as_str())
            .map(|(_, v)| v)
    }

    /// BCM number of an axis's step line, for the platform layer to claim.
    pub fn step_pin(&self, id: AxisId) -> Option<u32> {
        self.axis_entry(id).map(|e| e.step_pin)
    }

    /// Expander chip addresses.
    pub fn chip_addresses(&self) -> ChipAddresses {
        ChipAddresses {
            mcp1: self.i2c.mcp1,
            mcp2: self.i2c.mcp2,
            mcp3: self.i2c.mcp3,
        }
    }

    /// Bus retry policy.
    pub fn bus_retry(&self) -> BusRetry {
        BusRetry {
            attempts: self.i2c.retries,
            retry_delay: Duration::from_millis(self.i2c.retry_delay_ms),
        }
    }

    /// Step pulse timing. Widths are validated non-zero by
    /// [`validate_config`](super::validate_config) before use.
    pub fn step_timing(&self) -> StepTiming {
        StepTiming::from_micros(self.stepgen.pulse_high_us, self.stepgen.pulse_low_us)
    }

    /// Assemble the immutable per-axis parameters for one axis.
    ///
    /// Axes missing from the table fall back to the defaults; validation
    /// rejects such configurations up front.
    pub fn axis_config(&self, id: AxisId) -> AxisConfig {
        let entry = self.axis_entry(id);
        AxisConfig {
            id,
            microsteps_per_rev: entry
                .and_then(|e| e.microsteps_per_rev)
                .unwrap_or(self.motors.microsteps_per_rev),
            invert_dir: entry.map(|e| e.invert_dir).unwrap_or(false),
            ena_settle: Duration::from_millis(self.motors.ena_settle_ms),
            dir_setup: Duration::from_micros(self.motors.dir_setup_us),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_board() {
        let config = SystemConfig::default();
        assert_eq!(config.i2c.bus, 1);
        assert_eq!(
            config.chip_addresses(),
            ChipAddresses {
                mcp1: 0x24,
                mcp2: 0x25,
                mcp3: 0x26
            }
        );
        assert_eq!(config.bus_retry().attempts, 3);
        assert_eq!(config.step_timing().min_period_ns(), 4_000);
        assert_eq!(config.step_pin(AxisId::M1), Some(17));
        assert_eq!(config.step_pin(AxisId::M8), Some(25));

        let m4 = config.axis_config(AxisId::M4);
        assert_eq!(m4.microsteps_per_rev, 3200);
        assert!(!m4.invert_dir);
        assert_eq!(m4.ena_settle, Duration::from_millis(10));
        assert_eq!(m4.dir_setup, Duration::from_micros(5));
    }
}
