//! Hardware access seams.
//!
//! Step lines are plain `embedded_hal::digital::OutputPin` implementations
//! owned by their axis; the platform layer (e.g. `rppal` or
//! `linux-embedded-hal`) claims them. I2C register access goes through
//! [`RegisterBus`], which adds bounded retry on top of any
//! `embedded_hal::i2c::I2c` device.

mod i2c;

pub use i2c::{BusRetry, RegisterBus};
