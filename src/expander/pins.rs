//! Pin addressing and the fixed I/O board pin maps.
//!
//! The maps mirror the PCB routing and are configuration data, not computed:
//!
//! - MCP1 (0x24): program buttons on B0..B5 (active low), program LEDs on
//!   A2..A7.
//! - MCP2 (0x25): VIC selector on B0..B4, AIR selector on A7..A4 = AIR1..AIR4
//!   (note the reversed order), all active low.
//! - MCP3 (0x26): direction outputs on port A with A7..A0 = axis 1..8
//!   (reversed), enable outputs on port B with B0..B7 = axis 1..8
//!   (active low at the driver).

use crate::motor::AxisId;

/// One of the three expander chips on the I/O board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip {
    /// Buttons and program LEDs.
    Mcp1,
    /// VIC and AIR selector inputs.
    Mcp2,
    /// Motor direction and enable outputs.
    Mcp3,
}

impl Chip {
    pub(crate) const fn index(self) -> usize {
        match self {
            Chip::Mcp1 => 0,
            Chip::Mcp2 => 1,
            Chip::Mcp3 => 2,
        }
    }
}

/// One of the two 8-bit ports on an expander chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    /// Port A (GPA0..GPA7).
    A,
    /// Port B (GPB0..GPB7).
    B,
}

impl Port {
    pub(crate) const fn index(self) -> usize {
        match self {
            Port::A => 0,
            Port::B => 1,
        }
    }
}

/// Address of exactly one bit on one expander port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinAddress {
    chip: Chip,
    port: Port,
    bit: u8,
}

impl PinAddress {
    /// Create a pin address.
    ///
    /// # Panics
    ///
    /// Panics if `bit` is not in `0..=7` — an out-of-range bit index is a
    /// programming-contract violation, not a runtime condition.
    pub const fn new(chip: Chip, port: Port, bit: u8) -> Self {
        assert!(bit < 8, "pin bit index must be 0..=7");
        Self { chip, port, bit }
    }

    /// The chip this pin lives on.
    #[inline]
    pub const fn chip(self) -> Chip {
        self.chip
    }

    /// The port this pin lives on.
    #[inline]
    pub const fn port(self) -> Port {
        self.port
    }

    /// Bit index within the port (0..=7).
    #[inline]
    pub const fn bit(self) -> u8 {
        self.bit
    }

    pub(crate) const fn mask(self) -> u8 {
        1 << self.bit
    }
}

/// Program buttons PRG1..PRG6 (active low).
pub const PROGRAM_BUTTONS: [PinAddress; 6] = [
    PinAddress::new(Chip::Mcp1, Port::B, 0),
    PinAddress::new(Chip::Mcp1, Port::B, 1),
    PinAddress::new(Chip::Mcp1, Port::B, 2),
    PinAddress::new(Chip::Mcp1, Port::B, 3),
    PinAddress::new(Chip::Mcp1, Port::B, 4),
    PinAddress::new(Chip::Mcp1, Port::B, 5),
];

/// Program LEDs LED1..LED6.
pub const PROGRAM_LEDS: [PinAddress; 6] = [
    PinAddress::new(Chip::Mcp1, Port::A, 2),
    PinAddress::new(Chip::Mcp1, Port::A, 3),
    PinAddress::new(Chip::Mcp1, Port::A, 4),
    PinAddress::new(Chip::Mcp1, Port::A, 5),
    PinAddress::new(Chip::Mcp1, Port::A, 6),
    PinAddress::new(Chip::Mcp1, Port::A, 7),
];

/// VIC selector positions 1..5 (active low).
pub const VIC_SELECTOR: [PinAddress; 5] = [
    PinAddress::new(Chip::Mcp2, Port::B, 0),
    PinAddress::new(Chip::Mcp2, Port::B, 1),
    PinAddress::new(Chip::Mcp2, Port::B, 2),
    PinAddress::new(Chip::Mcp2, Port::B, 3),
    PinAddress::new(Chip::Mcp2, Port::B, 4),
];

/// AIR selector positions 1..4 (active low, wired A7..A4).
pub const AIR_SELECTOR: [PinAddress; 4] = [
    PinAddress::new(Chip::Mcp2, Port::A, 7),
    PinAddress::new(Chip::Mcp2, Port::A, 6),
    PinAddress::new(Chip::Mcp2, Port::A, 5),
    PinAddress::new(Chip::Mcp2, Port::A, 4),
];

/// Enable output for an axis: MCP3 port B, B0..B7 = axis 1..8.
pub const fn enable_pin(axis: AxisId) -> PinAddress {
    PinAddress::new(Chip::Mcp3, Port::B, axis.index() as u8)
}

/// Direction output for an axis: MCP3 port A, A7..A0 = axis 1..8.
pub const fn direction_pin(axis: AxisId) -> PinAddress {
    PinAddress::new(Chip::Mcp3, Port::A, 7 - axis.index() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_pins_run_b0_to_b7() {
        assert_eq!(enable_pin(AxisId::M1).bit(), 0);
        assert_eq!(enable_pin(AxisId::M8).bit(), 7);
        assert_eq!(enable_pin(AxisId::M3).port(), Port::B);
    }

    #[test]
    fn direction_pins_are_reversed() {
        assert_eq!(direction_pin(AxisId::M1).bit(), 7);
        assert_eq!(direction_pin(AxisId::M8).bit(), 0);
        assert_eq!(direction_pin(AxisId::M5).port(), Port::A);
    }

    #[test]
    fn air_selector_order_is_reversed() {
        assert_eq!(AIR_SELECTOR[0].bit(), 7);
        assert_eq!(AIR_SELECTOR[3].bit(), 4);
    }

    #[test]
    #[should_panic(expected = "pin bit index")]
    fn out_of_range_bit_panics() {
        let _ = PinAddress::new(Chip::Mcp1, Port::A, 8);
    }
}
