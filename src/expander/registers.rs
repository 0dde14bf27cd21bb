//! MCP23017 register map (IOCON.BANK = 0).
//!
//! Port B registers sit one past their port A counterpart, which
//! [`port_register`] relies on.

use super::pins::Port;

pub(crate) const IODIRA: u8 = 0x00;
pub(crate) const GPPUA: u8 = 0x0C;
pub(crate) const GPIOA: u8 = 0x12;
pub(crate) const OLATA: u8 = 0x14;

/// Resolve a port-A base register for either port.
pub(crate) const fn port_register(base_a: u8, port: Port) -> u8 {
    match port {
        Port::A => base_a,
        Port::B => base_a + 1,
    }
}
