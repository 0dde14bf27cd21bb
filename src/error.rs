//! Error types for the valve-motion library.
//!
//! Every fallible operation returns one [`Error`] type; nothing is raised or
//! silently swallowed. Hardware-facing failures (`Io`, `Hardware`) propagate
//! from the layer that observed them without further retries.

use core::fmt;

use crate::motor::AxisId;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all valve-motion operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error.
    Config(ConfigError),
    /// Motion profile parameters are not strictly positive and finite.
    InvalidProfile {
        /// Requested maximum velocity in steps/s.
        max_velocity: f32,
        /// Requested acceleration in steps/s².
        acceleration: f32,
    },
    /// A move was requested while the axis's previous move is still running.
    Busy(AxisId),
    /// An I2C transaction failed after exhausting its retries.
    Io {
        /// 7-bit device address of the failed transaction.
        address: u8,
        /// Register the transaction targeted.
        register: u8,
    },
    /// A GPIO step line could not be driven, or a worker could not be spawned.
    Hardware(&'static str),
    /// A `wait` deadline elapsed; the move may still be in progress.
    Timeout(AxisId),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration.
    ParseError(heapless::String<128>),
    /// File I/O error while loading configuration.
    IoError(heapless::String<128>),
    /// Microsteps per revolution must be > 0.
    InvalidMicrostepsPerRev(u32),
    /// Pulse high/low width must be 1..=1_000_000 microseconds.
    InvalidPulseWidth(u32),
    /// I2C retry count must be >= 1.
    InvalidRetryCount(u8),
    /// No step pin assigned for an axis.
    MissingStepPin(AxisId),
    /// A key in the configuration does not name an axis (expected "M1".."M8").
    UnknownAxis(heapless::String<8>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::InvalidProfile {
                max_velocity,
                acceleration,
            } => write!(
                f,
                "Invalid motion profile: max_velocity={} steps/s, acceleration={} steps/s² (both must be strictly positive)",
                max_velocity, acceleration
            ),
            Error::Busy(axis) => write!(f, "Axis {} is already moving", axis),
            Error::Io { address, register } => write!(
                f,
                "I2C transaction failed after retries: addr=0x{:02X} reg=0x{:02X}",
                address, register
            ),
            Error::Hardware(msg) => write!(f, "Hardware error: {}", msg),
            Error::Timeout(axis) => write!(f, "Timed out waiting for axis {}", axis),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
            ConfigError::InvalidMicrostepsPerRev(v) => {
                write!(f, "Invalid microsteps_per_rev: {}. Must be > 0", v)
            }
            ConfigError::InvalidPulseWidth(v) => {
                write!(f, "Invalid pulse width: {} us. Must be 1..=1000000", v)
            }
            ConfigError::InvalidRetryCount(v) => {
                write!(f, "Invalid I2C retry count: {}. Must be >= 1", v)
            }
            ConfigError::MissingStepPin(axis) => {
                write!(f, "No step pin configured for axis {}", axis)
            }
            ConfigError::UnknownAxis(key) => {
                write!(f, "Unknown axis key '{}'. Expected M1..M8", key)
            }
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl std::error::Error for Error {}

impl std::error::Error for ConfigError {}
