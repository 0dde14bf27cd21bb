//! Axis abstraction and the eight-axis motor group.

mod axis;
mod group;

pub use axis::{Axis, AxisConfig, AxisId, Direction};
pub use group::MotorGroup;
