//! Driver for the board's RGB/IR light sensor.
//!
//! The sensor accumulates counts in four channels. Absolute counts depend on
//! integration time and gain, so the driver reports each channel as a
//! fraction of the summed counts, which is what the board's colour-detection
//! workloads consume.

use embedded_hal::i2c;

use crate::error::{Error, Result};

/// I2C address of the light sensor.
pub const DEFAULT_ADDRESS: u8 = 0x38;

mod regs {
    pub const MODE_CONTROL: u8 = 0x00;
    pub const ID: u8 = 0x06;
    pub const DATA: u8 = 0x0A;
    pub const DATA_LEN: usize = 12;
}

const CHIP_ID_VALUE: u8 = 0xB2;
/// Light sensor enabled, colour sensing mode.
const MODE_COLOUR_SENSING: u8 = 0b0000_0110;

/// Per-channel fraction of the summed channel counts.
///
/// All zero when the sensor reports no light at all.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct LightMeasurement {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub infrared: f64,
}

/// The RGB/IR light sensor driver.
#[derive(Debug)]
pub struct RgbIrSensor<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> RgbIrSensor<I2C>
where
    I2C: i2c::I2c<Error = E>,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Checks the identification register.
    pub fn self_test(&mut self) -> Result<bool, E> {
        let mut buffer = [0];
        self.i2c
            .write_read(self.address, &[regs::ID], &mut buffer)
            .map_err(Error::I2c)?;
        Ok(buffer[0] == CHIP_ID_VALUE)
    }

    /// Enables the sensor in colour sensing mode.
    pub fn configure(&mut self) -> Result<(), E> {
        self.i2c
            .write(self.address, &[regs::MODE_CONTROL, MODE_COLOUR_SENSING])
            .map_err(Error::I2c)
    }

    /// Reads all four channels and normalises them.
    pub fn measure(&mut self) -> Result<LightMeasurement, E> {
        let mut buffer = [0u8; regs::DATA_LEN];
        self.i2c
            .write_read(self.address, &[regs::DATA], &mut buffer)
            .map_err(Error::I2c)?;
        Ok(normalise_channels(&buffer))
    }

    /// Destroys the driver and hands the I2C bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

/// Unpacks the four channel counts and divides each by their sum.
///
/// Each channel is packed as a low byte followed by a little-endian 16-bit
/// word carrying the upper bits. The register order is (IR, green, blue,
/// red).
fn normalise_channels(buffer: &[u8; regs::DATA_LEN]) -> LightMeasurement {
    let mut channels = [0u32; 4];
    for (channel, chunk) in channels.iter_mut().zip(buffer.chunks_exact(3)) {
        let word = u32::from(u16::from_le_bytes([chunk[1], chunk[2]]));
        *channel = (word << 16) | u32::from(chunk[0]);
    }

    let total: u64 = channels.iter().map(|&c| u64::from(c)).sum();
    if total == 0 {
        return LightMeasurement::default();
    }

    let fraction = |count: u32| f64::from(count) / total as f64;
    LightMeasurement {
        red: fraction(channels[3]),
        green: fraction(channels[1]),
        blue: fraction(channels[2]),
        infrared: fraction(channels[0]),
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    use super::*;

    // Channel counts (IR, green, blue, red) = (131116, 19660810, 5046279,
    // 65536), total 24903741.
    const DATA_BURST: [u8; 12] = [44, 2, 0, 10, 44, 1, 7, 77, 0, 0, 1, 0];

    #[test]
    fn channels_normalise_to_fractions_of_total() {
        let reading = normalise_channels(&DATA_BURST);

        assert!((reading.red - 0.0026315725014968636).abs() < 1e-12);
        assert!((reading.green - 0.7894721519951561).abs() < 1e-12);
        assert!((reading.blue - 0.2026313636975264).abs() < 1e-12);
        assert!((reading.infrared - 0.00526491180582066).abs() < 1e-12);

        let sum = reading.red + reading.green + reading.blue + reading.infrared;
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn dark_reading_is_all_zero() {
        assert_eq!(
            normalise_channels(&[0; regs::DATA_LEN]),
            LightMeasurement::default()
        );
    }

    #[test]
    fn identity_check() {
        let i2c = I2cMock::new(&[I2cTransaction::write_read(
            DEFAULT_ADDRESS,
            vec![regs::ID],
            vec![CHIP_ID_VALUE],
        )]);
        let mut sensor = RgbIrSensor::new(i2c, DEFAULT_ADDRESS);

        assert!(sensor.self_test().unwrap());
        sensor.release().done();
    }

    #[test]
    fn configure_enables_colour_sensing() {
        let i2c = I2cMock::new(&[I2cTransaction::write(
            DEFAULT_ADDRESS,
            vec![regs::MODE_CONTROL, MODE_COLOUR_SENSING],
        )]);
        let mut sensor = RgbIrSensor::new(i2c, DEFAULT_ADDRESS);

        sensor.configure().unwrap();
        sensor.release().done();
    }

    #[test]
    fn measure_reads_channel_burst() {
        let i2c = I2cMock::new(&[I2cTransaction::write_read(
            DEFAULT_ADDRESS,
            vec![regs::DATA],
            DATA_BURST.to_vec(),
        )]);
        let mut sensor = RgbIrSensor::new(i2c, DEFAULT_ADDRESS);

        let reading = sensor.measure().unwrap();
        assert!((reading.green - 0.7894721519951561).abs() < 1e-12);
        sensor.release().done();
    }
}
