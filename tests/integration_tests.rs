//! Integration tests for the valve-motion library.
//!
//! These tests verify the complete workflow from TOML parsing through hub
//! initialization to coordinated group moves, with all I2C traffic mocked.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::{I2c, Operation, SevenBitAddress};
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

use valve_motion::{parse_config, AxisId, Chip, Error, MotorGroup, PinAddress, Port, SystemConfig};

// =============================================================================
// Register addresses (BANK=0)
// =============================================================================

const IODIRA: u8 = 0x00;
const IODIRB: u8 = 0x01;
const GPPUA: u8 = 0x0C;
const GPPUB: u8 = 0x0D;
const GPIOB: u8 = 0x13;
const OLATA: u8 = 0x14;
const OLATB: u8 = 0x15;

// =============================================================================
// Test doubles
// =============================================================================

/// Step pin double that counts rising edges into a shared counter.
#[derive(Clone)]
struct CountingPin {
    pulses: Arc<AtomicU32>,
}

impl CountingPin {
    fn new() -> (Self, Arc<AtomicU32>) {
        let pulses = Arc::new(AtomicU32::new(0));
        (
            Self {
                pulses: Arc::clone(&pulses),
            },
            pulses,
        )
    }
}

impl embedded_hal::digital::ErrorType for CountingPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for CountingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pulses.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// I2C double that accepts any transaction but flags traffic that arrives
/// after the first step pulse has been emitted.
#[derive(Clone)]
struct OrderWatchingI2c {
    pulses: Arc<AtomicU32>,
    bus_after_pulse: Arc<AtomicBool>,
}

impl OrderWatchingI2c {
    fn new(pulses: Arc<AtomicU32>) -> (Self, Arc<AtomicBool>) {
        let bus_after_pulse = Arc::new(AtomicBool::new(false));
        (
            Self {
                pulses,
                bus_after_pulse: Arc::clone(&bus_after_pulse),
            },
            bus_after_pulse,
        )
    }
}

impl embedded_hal::i2c::ErrorType for OrderWatchingI2c {
    type Error = core::convert::Infallible;
}

impl I2c<SevenBitAddress> for OrderWatchingI2c {
    fn transaction(
        &mut self,
        _address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.pulses.load(Ordering::Relaxed) > 0 {
            self.bus_after_pulse.store(true, Ordering::Relaxed);
        }
        for op in operations.iter_mut() {
            if let Operation::Read(buf) = op {
                buf.fill(0);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Configuration and expectation helpers
// =============================================================================

// Settle/setup times zeroed so tests don't spend wall time sleeping.
const TEST_CONFIG: &str = r#"
[stepgen]
pulse_high_us = 1
pulse_low_us = 1

[motors]
ena_settle_ms = 0
dir_setup_us = 0
"#;

fn test_config() -> SystemConfig {
    parse_config(TEST_CONFIG).unwrap()
}

// Everything ExpanderHub::init writes, in order.
fn init_transactions() -> Vec<I2cTransaction> {
    vec![
        I2cTransaction::write(0x24, vec![IODIRA, 0b0000_0011]),
        I2cTransaction::write(0x24, vec![IODIRB, 0xFF]),
        I2cTransaction::write(0x24, vec![GPPUA, 0b0000_0011]),
        I2cTransaction::write(0x24, vec![GPPUB, 0xFF]),
        I2cTransaction::write(0x24, vec![OLATA, 0x00]),
        I2cTransaction::write(0x25, vec![IODIRA, 0xFF]),
        I2cTransaction::write(0x25, vec![IODIRB, 0xFF]),
        I2cTransaction::write(0x25, vec![GPPUA, 0xFF]),
        I2cTransaction::write(0x25, vec![GPPUB, 0xFF]),
        I2cTransaction::write(0x26, vec![IODIRA, 0x00]),
        I2cTransaction::write(0x26, vec![IODIRB, 0x00]),
        I2cTransaction::write(0x26, vec![GPPUA, 0x00]),
        I2cTransaction::write(0x26, vec![GPPUB, 0x00]),
        I2cTransaction::write(0x26, vec![OLATB, 0xFF]),
        I2cTransaction::write(0x26, vec![OLATA, 0x00]),
    ]
}

fn counting_pins() -> ([CountingPin; 8], [Arc<AtomicU32>; 8]) {
    let pairs: Vec<(CountingPin, Arc<AtomicU32>)> = (0..8).map(|_| CountingPin::new()).collect();
    let mut pins = Vec::new();
    let mut counters = Vec::new();
    for (pin, counter) in pairs {
        pins.push(pin);
        counters.push(counter);
    }
    (
        pins.try_into().map_err(|_| ()).unwrap(),
        counters.try_into().map_err(|_| ()).unwrap(),
    )
}

// =============================================================================
// Group move protocol
// =============================================================================

#[test]
fn group_setup_traffic_precedes_every_pulse() {
    // all eight pins feed one counter so any pulse anywhere is visible
    let total_pulses = Arc::new(AtomicU32::new(0));
    let pins: [CountingPin; 8] = core::array::from_fn(|_| CountingPin {
        pulses: Arc::clone(&total_pulses),
    });
    let (i2c, bus_after_pulse) = OrderWatchingI2c::new(Arc::clone(&total_pulses));

    let mut group = MotorGroup::new(i2c, pins, &test_config()).unwrap();
    group
        .move_group(&[AxisId::M1, AxisId::M4, AxisId::M8], 0.01, 600.0, 6000.0)
        .unwrap();
    group.wait_all(Some(Duration::from_secs(5))).unwrap();

    // 0.01 turns at 3200 microsteps/rev = 32 steps per member
    assert_eq!(total_pulses.load(Ordering::Relaxed), 96);
    assert!(!bus_after_pulse.load(Ordering::Relaxed));
}

#[test]
fn group_move_enables_every_member_before_any_direction() {
    let mut transactions = init_transactions();
    transactions.extend([
        // enables first: M1 = B0, M2 = B1, active low
        I2cTransaction::write(0x26, vec![OLATB, 0xFE]),
        I2cTransaction::write(0x26, vec![OLATB, 0xFC]),
        // then directions: M1 = A7, M2 = A6, forward
        I2cTransaction::write(0x26, vec![OLATA, 0x80]),
        I2cTransaction::write(0x26, vec![OLATA, 0xC0]),
    ]);
    let mut i2c = I2cMock::new(&transactions);
    let (pins, _counters) = counting_pins();

    let mut group = MotorGroup::new(i2c.clone(), pins, &test_config()).unwrap();
    group
        .move_group(&[AxisId::M1, AxisId::M2], 0.01, 600.0, 6000.0)
        .unwrap();
    group.wait_all(Some(Duration::from_secs(5))).unwrap();

    i2c.done();
}

#[test]
fn negative_turns_clear_the_direction_bit() {
    let mut transactions = init_transactions();
    transactions.extend([
        I2cTransaction::write(0x26, vec![OLATB, 0xFE]),
        I2cTransaction::write(0x26, vec![OLATA, 0x00]), // reverse: A7 stays low
    ]);
    let mut i2c = I2cMock::new(&transactions);
    let (pins, counters) = counting_pins();

    let mut group = MotorGroup::new(i2c.clone(), pins, &test_config()).unwrap();
    group
        .move_group(&[AxisId::M1], -0.01, 600.0, 6000.0)
        .unwrap();
    group.wait_all(Some(Duration::from_secs(5))).unwrap();

    // magnitude unchanged by the sign
    assert_eq!(counters[0].load(Ordering::Relaxed), 32);
    i2c.done();
}

#[test]
fn zero_turn_group_move_touches_nothing() {
    let mut i2c = I2cMock::new(&init_transactions());
    let (pins, counters) = counting_pins();

    let mut group = MotorGroup::new(i2c.clone(), pins, &test_config()).unwrap();
    group
        .move_group(&[AxisId::M1, AxisId::M2], 0.0, 600.0, 6000.0)
        .unwrap();

    assert!(!group.is_busy(AxisId::M1));
    assert_eq!(counters[0].load(Ordering::Relaxed), 0);
    i2c.done();
}

#[test]
fn busy_member_aborts_the_group_before_any_io() {
    let mut transactions = init_transactions();
    transactions.extend([
        // only the first, single-axis move reaches the bus
        I2cTransaction::write(0x26, vec![OLATB, 0xFD]), // M2 ENA = B1
        I2cTransaction::write(0x26, vec![OLATA, 0x40]), // M2 DIR = A6
    ]);
    let mut i2c = I2cMock::new(&transactions);
    let (pins, _counters) = counting_pins();

    let mut group = MotorGroup::new(i2c.clone(), pins, &test_config()).unwrap();
    // long, slow move keeps M2 busy
    group.move_revolutions(AxisId::M2, 1.0, 6.0, 60.0).unwrap();

    assert_eq!(
        group.move_group(&[AxisId::M1, AxisId::M2], 0.01, 600.0, 6000.0),
        Err(Error::Busy(AxisId::M2))
    );

    group.stop_all();
    group.wait_all(Some(Duration::from_secs(5))).unwrap();
    i2c.done();
}

#[test]
#[should_panic(expected = "duplicate axis")]
fn duplicate_group_members_panic() {
    let (i2c, _) = OrderWatchingI2c::new(Arc::new(AtomicU32::new(0)));
    let (pins, _counters) = counting_pins();
    let mut group = MotorGroup::new(i2c, pins, &test_config()).unwrap();

    let _ = group.move_group(&[AxisId::M1, AxisId::M1], 0.01, 600.0, 6000.0);
}

// =============================================================================
// Stop and wait semantics
// =============================================================================

#[test]
fn stop_all_halts_a_group_move_early() {
    let (i2c, _) = OrderWatchingI2c::new(Arc::new(AtomicU32::new(0)));
    let (pins, counters) = counting_pins();

    let mut group = MotorGroup::new(i2c, pins, &test_config()).unwrap();
    // 1 turn at 6 rpm would take ten seconds
    group
        .move_group(&[AxisId::M1, AxisId::M2], 1.0, 6.0, 60.0)
        .unwrap();
    thread::sleep(Duration::from_millis(50));
    group.stop_all();
    group.wait_all(Some(Duration::from_secs(5))).unwrap();

    for counter in &counters[..2] {
        let emitted = counter.load(Ordering::Relaxed);
        assert!(emitted > 0);
        assert!(emitted < 3200);
    }
}

#[test]
fn wait_returns_steps_emitted_and_timeout_leaves_move_running() {
    let (i2c, _) = OrderWatchingI2c::new(Arc::new(AtomicU32::new(0)));
    let (pins, _counters) = counting_pins();

    let mut group = MotorGroup::new(i2c, pins, &test_config()).unwrap();
    group.move_revolutions(AxisId::M5, 1.0, 6.0, 60.0).unwrap();

    assert_eq!(
        group.wait(AxisId::M5, Some(Duration::from_millis(20))),
        Err(Error::Timeout(AxisId::M5))
    );
    assert!(group.is_busy(AxisId::M5));

    group.stop(AxisId::M5);
    let emitted = group.wait(AxisId::M5, Some(Duration::from_secs(5))).unwrap();
    assert!(emitted < 3200);
}

#[test]
fn whole_board_open_completes_within_the_deadline() {
    let (i2c, _) = OrderWatchingI2c::new(Arc::new(AtomicU32::new(0)));
    let (pins, counters) = counting_pins();

    let mut group = MotorGroup::new(i2c, pins, &test_config()).unwrap();
    group.open_all(0.01, 600.0, 6000.0).unwrap();
    group.wait_all(Some(Duration::from_secs(5))).unwrap();

    for counter in &counters {
        assert_eq!(counter.load(Ordering::Relaxed), 32);
    }
}

// =============================================================================
// End-to-end from TOML
// =============================================================================

#[test]
fn per_axis_microstep_override_changes_the_step_count() {
    let toml = r#"
[motors]
ena_settle_ms = 0
dir_setup_us = 0

[motors.axes.M1]
step_pin = 17
microsteps_per_rev = 1600

[motors.axes.M2]
step_pin = 27

[motors.axes.M3]
step_pin = 22

[motors.axes.M4]
step_pin = 5

[motors.axes.M5]
step_pin = 18

[motors.axes.M6]
step_pin = 23

[motors.axes.M7]
step_pin = 24

[motors.axes.M8]
step_pin = 25
"#;
    let config = parse_config(toml).unwrap();
    let (i2c, _) = OrderWatchingI2c::new(Arc::new(AtomicU32::new(0)));
    let (pins, counters) = counting_pins();

    let mut group = MotorGroup::new(i2c, pins, &config).unwrap();
    group
        .move_group(&[AxisId::M1, AxisId::M2], 0.02, 600.0, 6000.0)
        .unwrap();
    group.wait_all(Some(Duration::from_secs(5))).unwrap();

    // same turns, different microstepping
    assert_eq!(counters[0].load(Ordering::Relaxed), 32);
    assert_eq!(counters[1].load(Ordering::Relaxed), 64);
}

// =============================================================================
// Raw I/O pass-throughs
// =============================================================================

#[test]
fn led_and_input_passthroughs_reach_the_expanders() {
    let mut transactions = init_transactions();
    transactions.extend([
        // LED3 = MCP1 A4
        I2cTransaction::write(0x24, vec![OLATA, 0b0001_0000]),
        // VIC selector position 2 = MCP2 B1, active low
        I2cTransaction::write_read(0x25, vec![GPIOB], vec![0b0000_0010]),
        I2cTransaction::write_read(0x25, vec![GPIOB], vec![0b0001_0101]),
    ]);
    let mut i2c = I2cMock::new(&transactions);
    let (pins, _counters) = counting_pins();

    let group = MotorGroup::new(i2c.clone(), pins, &test_config()).unwrap();
    group.set_led(3, true).unwrap();

    let vic2 = PinAddress::new(Chip::Mcp2, Port::B, 1);
    assert!(group.read_digital_input(vic2).unwrap());
    assert_eq!(group.read_port(Chip::Mcp2, Port::B).unwrap(), 0b0001_0101);

    i2c.done();
}
