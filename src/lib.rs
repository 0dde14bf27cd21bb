//! # valve-motion
//!
//! Multi-axis stepper positioning for an eight-valve actuator board, with
//! embedded-hal 1.0 support.
//!
//! ## Features
//!
//! - **Configuration-driven**: I2C addressing, step pins, and motion
//!   parameters in TOML files, with the board's as-built defaults
//! - **embedded-hal 1.0**: `OutputPin` for step lines, `I2c` for the
//!   MCP23017 expander hub
//! - **Trapezoidal profiles**: Acceleration-limited moves with triangular
//!   fallback for short distances
//! - **Per-axis workers**: Each moving axis pulses from its own thread,
//!   with cooperative stop and bounded waits
//! - **Coordinated groups**: Group moves write every member's enable and
//!   direction lines before the first pulse
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use valve_motion::{AxisId, MotorGroup};
//!
//! // Load configuration from TOML
//! let config = valve_motion::load_config("valves.toml")?;
//!
//! // Claim hardware with the platform layer of your choice, then:
//! let mut group = MotorGroup::new(i2c, step_pins, &config)?;
//!
//! // Open valves 1 and 2 by a quarter turn, together
//! group.move_group(&[AxisId::M1, AxisId::M2], 0.25, 60.0, 120.0)?;
//! group.wait_all(None)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary with heapless message strings
#![allow(clippy::result_large_err)]

// Core modules
pub mod config;
pub mod error;
pub mod expander;
pub mod hal;
pub mod motion;
pub mod motor;

// Re-exports for ergonomic API
pub use config::{load_config, parse_config, validate_config, SystemConfig};
pub use error::{Error, Result};
pub use expander::{Chip, ChipAddresses, ExpanderHub, PinAddress, Port, SharedHub};
pub use motion::{MotionPhase, MotionProfile, StepPlan, StepTiming};
pub use motor::{Axis, AxisConfig, AxisId, Direction, MotorGroup};
