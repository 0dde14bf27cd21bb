//! MCP23017 port-expander hub.
//!
//! Three fixed-function expander chips carry everything on the I/O board
//! that is not a step pulse: motor enable and direction lines, program
//! buttons and LEDs, and the VIC/AIR selector switches. [`ExpanderHub`]
//! is the only component that talks to these chips; all callers share one
//! hub instance behind a mutex ([`SharedHub`]) because the bus and the
//! output-latch cache are not safe for concurrent access.

mod hub;
mod pins;
mod registers;

pub use hub::{ChipAddresses, ExpanderHub, SharedHub};
pub use pins::{
    direction_pin, enable_pin, Chip, PinAddress, Port, AIR_SELECTOR, PROGRAM_BUTTONS,
    PROGRAM_LEDS, VIC_SELECTOR,
};
