//! Driver for the board's standalone temperature sensor (NXP LM75B).

use embedded_hal::i2c;

use crate::error::{Error, Result};

/// I2C address with all address pins tied low.
pub const DEFAULT_ADDRESS: u8 = 0x48;

const REG_TEMPERATURE: u8 = 0x00;

/// The LM75B temperature sensor driver.
#[derive(Debug)]
pub struct Lm75b<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> Lm75b<I2C>
where
    I2C: i2c::I2c<Error = E>,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Temperature reading in degrees Celsius.
    pub fn measure(&mut self) -> Result<f64, E> {
        let mut buffer = [0u8; 2];
        self.i2c
            .write_read(self.address, &[REG_TEMPERATURE], &mut buffer)
            .map_err(Error::I2c)?;
        Ok(parse_temperature(buffer[0], buffer[1]))
    }

    /// Destroys the driver and hands the I2C bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

/// 11-bit two's-complement reading in the top bits, 0.125 °C per count.
fn parse_temperature(msb: u8, lsb: u8) -> f64 {
    f64::from(i16::from_be_bytes([msb, lsb]) >> 5) * 0.125
}
