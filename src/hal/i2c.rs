//! Byte-level register access with bounded retry.

use std::thread;
use std::time::Duration;

use embedded_hal::i2c::{I2c, SevenBitAddress};
use tracing::warn;

use crate::error::{Error, Result};

/// Retry policy for I2C transactions.
///
/// Transient bus glitches (clock stretching aborts, EMI on long runs to the
/// expander board) are retried up to `attempts` times with `retry_delay`
/// between attempts before the transaction is reported as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusRetry {
    /// Total attempts per transaction (>= 1).
    pub attempts: u8,
    /// Delay between attempts.
    pub retry_delay: Duration,
}

impl Default for BusRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay: Duration::from_millis(10),
        }
    }
}

/// Register-oriented wrapper over an `embedded-hal` I2C device.
///
/// Exposes exactly the two operations the expander chips need: read one
/// register byte, write one register byte. Failures are retried per
/// [`BusRetry`]; exhaustion yields [`Error::Io`] and no caller retries
/// further.
pub struct RegisterBus<I2C> {
    i2c: I2C,
    retry: BusRetry,
}

impl<I2C> RegisterBus<I2C>
where
    I2C: I2c<SevenBitAddress>,
{
    /// Wrap an I2C device with a retry policy.
    pub fn new(i2c: I2C, retry: BusRetry) -> Self {
        Self { i2c, retry }
    }

    /// Read one register byte from `address`.
    pub fn read_register(&mut self, address: u8, register: u8) -> Result<u8> {
        let attempts = self.retry.attempts.max(1);
        for attempt in 1..=attempts {
            let mut buf = [0u8; 1];
            match self.i2c.write_read(address, &[register], &mut buf) {
                Ok(()) => return Ok(buf[0]),
                Err(_) => {
                    warn!(
                        address = format_args!("0x{:02X}", address),
                        register = format_args!("0x{:02X}", register),
                        attempt,
                        "i2c read failed"
                    );
                    if attempt < attempts {
                        thread::sleep(self.retry.retry_delay);
                    }
                }
            }
        }
        Err(Error::Io { address, register })
    }

    /// Write one register byte to `address`.
    pub fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<()> {
        let attempts = self.retry.attempts.max(1);
        for attempt in 1..=attempts {
            match self.i2c.write(address, &[register, value]) {
                Ok(()) => return Ok(()),
                Err(_) => {
                    warn!(
                        address = format_args!("0x{:02X}", address),
                        register = format_args!("0x{:02X}", register),
                        attempt,
                        "i2c write failed"
                    );
                    if attempt < attempts {
                        thread::sleep(self.retry.retry_delay);
                    }
                }
            }
        }
        Err(Error::Io { address, register })
    }

    /// Consume the wrapper and return the underlying device.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    fn fast_retry(attempts: u8) -> BusRetry {
        BusRetry {
            attempts,
            retry_delay: Duration::from_millis(0),
        }
    }

    #[test]
    fn read_register_returns_byte() {
        let mock = I2cMock::new(&[I2cTransaction::write_read(0x24, vec![0x12], vec![0xA5])]);
        let mut bus = RegisterBus::new(mock, fast_retry(3));

        assert_eq!(bus.read_register(0x24, 0x12).unwrap(), 0xA5);
        bus.release().done();
    }

    #[test]
    fn write_register_sends_register_and_value() {
        let mock = I2cMock::new(&[I2cTransaction::write(0x26, vec![0x15, 0xFE])]);
        let mut bus = RegisterBus::new(mock, fast_retry(3));

        bus.write_register(0x26, 0x15, 0xFE).unwrap();
        bus.release().done();
    }

    #[test]
    fn read_retries_then_succeeds() {
        let mock = I2cMock::new(&[
            I2cTransaction::write_read(0x24, vec![0x12], vec![0x00])
                .with_error(embedded_hal::i2c::ErrorKind::Other),
            I2cTransaction::write_read(0x24, vec![0x12], vec![0x42]),
        ]);
        let mut bus = RegisterBus::new(mock, fast_retry(3));

        assert_eq!(bus.read_register(0x24, 0x12).unwrap(), 0x42);
        bus.release().done();
    }

    #[test]
    fn write_exhausts_retries() {
        let failed = I2cTransaction::write(0x25, vec![0x00, 0xFF])
            .with_error(embedded_hal::i2c::ErrorKind::Other);
        let mock = I2cMock::new(&[failed.clone(), failed]);
        let mut bus = RegisterBus::new(mock, fast_retry(2));

        assert_eq!(
            bus.write_register(0x25, 0x00, 0xFF),
            Err(Error::Io {
                address: 0x25,
                register: 0x00
            })
        );
        bus.release().done();
    }
}
