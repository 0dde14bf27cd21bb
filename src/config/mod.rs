//! Configuration module for valve-motion.
//!
//! Provides types for loading and validating the I2C, step-generation, and
//! per-axis motor configuration from TOML files or pre-parsed strings.

mod loader;
mod system;
mod validation;

pub use loader::{load_config, parse_config};
pub use system::{AxisEntry, I2cConfig, MotorsConfig, StepgenConfig, SystemConfig};
pub use validation::validate_config;
