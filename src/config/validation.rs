//! Configuration validation.

use crate::error::{ConfigError, Result};
use crate::motor::AxisId;

use super::SystemConfig;

// A step pulse phase longer than a second is a typo, not a timing request.
const MAX_PULSE_WIDTH_US: u32 = 1_000_000;

/// Validate a system configuration.
///
/// Checks:
/// - Every key in the axis table names a real axis (`"M1"`..`"M8"`)
/// - Every axis has a step pin entry
/// - Microsteps per revolution are non-zero, defaults and overrides alike
/// - Pulse widths are non-zero and at most one second
/// - The retry count is at least 1
pub fn validate_config(config: &SystemConfig) -> Result<()> {
    for key in config.motors.axes.keys() {
        if AxisId::from_key(key.as_str()).is_none() {
            return Err(ConfigError::UnknownAxis(key.clone()).into());
        }
    }

    for id in AxisId::ALL {
        let entry = config
            .axis_entry(id)
            .ok_or(ConfigError::MissingStepPin(id))?;
        if let Some(0) = entry.microsteps_per_rev {
            return Err(ConfigError::InvalidMicrostepsPerRev(0).into());
        }
    }

    if config.motors.microsteps_per_rev == 0 {
        return Err(ConfigError::InvalidMicrostepsPerRev(0).into());
    }

    for width in [config.stepgen.pulse_high_us, config.stepgen.pulse_low_us] {
        if width == 0 || width > MAX_PULSE_WIDTH_US {
            return Err(ConfigError::InvalidPulseWidth(width).into());
        }
    }

    if config.i2c.retries == 0 {
        return Err(ConfigError::InvalidRetryCount(config.i2c.retries).into());
    }

    Ok(())
}
