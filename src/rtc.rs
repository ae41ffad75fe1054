//! Driver for the board's real-time clock.
//!
//! The clock keeps BCD-coded calendar time in eight consecutive registers,
//! including a hundredths-of-a-second counter. Status and control bits share
//! bytes with the time fields and are masked off during decoding.

use embedded_hal::i2c;

use crate::error::{Error, Result};

/// I2C address of the clock.
pub const DEFAULT_ADDRESS: u8 = 0x51;

mod regs {
    pub const TIME: u8 = 0x00;
    pub const TIME_LEN: usize = 8;
    pub const OSCILLATOR: u8 = 0x25;
    pub const FUNCTION: u8 = 0x28;
}

/// Function register: count hundredths of a second.
const FUNCTION_100TH_SECONDS: u8 = 0x80;
/// Oscillator register: 12.5 pF crystal load capacitance.
const OSCILLATOR_LOAD_12_5PF: u8 = 0x20;

/// A decoded calendar time.
///
/// Two-digit fields as kept by the hardware: `year` counts from 0 to 99,
/// `week_day` from 0 (Sunday) to 6.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Time {
    pub year: u8,
    pub month: u8,
    pub week_day: u8,
    pub day: u8,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub hundredths: u8,
}

/// The real-time clock driver.
#[derive(Debug)]
pub struct Rtc<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> Rtc<I2C>
where
    I2C: i2c::I2c<Error = E>,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Enables hundredths counting and sets the oscillator load capacitance
    /// for the board's crystal.
    pub fn configure(&mut self) -> Result<(), E> {
        self.i2c
            .write(self.address, &[regs::FUNCTION, FUNCTION_100TH_SECONDS])
            .map_err(Error::I2c)?;
        self.i2c
            .write(self.address, &[regs::OSCILLATOR, OSCILLATOR_LOAD_12_5PF])
            .map_err(Error::I2c)
    }

    /// Reads the current time.
    pub fn measure(&mut self) -> Result<Time, E> {
        let mut buffer = [0u8; regs::TIME_LEN];
        self.i2c
            .write_read(self.address, &[regs::TIME], &mut buffer)
            .map_err(Error::I2c)?;
        Ok(decode_time(&buffer))
    }

    /// Destroys the driver and hands the I2C bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

fn from_bcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

/// Decodes the eight time registers, masking the status and control bits
/// that share bytes with the BCD digits.
fn decode_time(registers: &[u8; regs::TIME_LEN]) -> Time {
    Time {
        hundredths: from_bcd(registers[0]),
        seconds: from_bcd(registers[1] & 0x7F),
        minutes: from_bcd(registers[2] & 0x7F),
        hours: from_bcd(registers[3] & 0x3F),
        day: from_bcd(registers[4] & 0x3F),
        week_day: registers[5] & 0x07,
        month: from_bcd(registers[6] & 0x1F),
        year: from_bcd(registers[7]),
    }
}
