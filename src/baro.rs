//! Driver for the board's barometric sensor (Bosch BME280).
//!
//! The driver uses the typestate pattern: a fresh [`Bme280`] is
//! `Uninitialized` and can only be measured after [`Bme280::init`] has reset
//! the device, verified its identity, and loaded the factory calibration ROM.
//! Compensation itself is delegated to the pure [`crate::calc`] engine.

use core::marker::PhantomData;

use embedded_hal::{delay::DelayNs, i2c};

use crate::calc::{
    self, Calibration, HumidityCalibration, Measurement, PressureCalibration, RawSample,
    TemperatureCalibration,
};
use crate::error::{Error, Result};
use crate::settings::{Config, Mode, Oversampling, OversamplingConfig};
use crate::{Ready, Uninitialized};

/// Factory I2C address with SDO tied low. With SDO high the device answers on
/// `0x77`.
pub const DEFAULT_ADDRESS: u8 = 0x76;

/// Memory addresses and sizes for the calibration ROM blocks.
///
/// The device stores calibration data in two non-contiguous blocks:
/// temperature/pressure words plus dig_H1 at `0x88..=0xA1`, the remaining
/// humidity words at `0xE1..=0xE7`.
mod calib_mem {
    pub const ADDR: [u8; 2] = [0x88, 0xE1];
    pub const SIZES: [usize; 2] = [26, 7];
    pub const TOTAL_SIZE: usize = 26 + 7;
}

/// Register addresses.
mod regs {
    pub const CHIP_ID: u8 = 0xD0;
    pub const RESET: u8 = 0xE0;
    pub const CTRL_HUM: u8 = 0xF2;
    pub const STATUS: u8 = 0xF3;
    pub const CTRL_MEAS: u8 = 0xF4;
    pub const CONFIG: u8 = 0xF5;
    pub const DATA: u8 = 0xF7;
    pub const DATA_LEN: usize = 8;
}

const CHIP_ID_VALUE: u8 = 0x60;
const RESET_COMMAND: u8 = 0xB6;
/// `status` bit 3: a conversion is running.
const STATUS_MEASURING: u8 = 1 << 3;
const STATUS_POLL_ATTEMPTS: u32 = 20;

/// The barometric sensor driver.
///
/// Use [`Bme280::new`] followed by [`Bme280::init`]. The `STATE` generic
/// tracks initialization status at compile time.
#[derive(Debug)]
pub struct Bme280<I2C, STATE> {
    i2c: I2C,
    address: u8,
    calibration: Calibration,
    _state: PhantomData<STATE>,
}

impl<I2C, E> Bme280<I2C, Uninitialized>
where
    I2C: i2c::I2c<Error = E>,
{
    /// Creates a new driver instance in the `Uninitialized` state.
    ///
    /// This does not communicate with the sensor yet.
    pub fn new(i2c: I2C, address: u8) -> Self {
        Bme280 {
            i2c,
            address,
            calibration: Calibration::default(),
            _state: PhantomData,
        }
    }

    /// Initializes the sensor: soft reset, identity check, calibration load.
    ///
    /// This transitions the driver state from `Uninitialized` to `Ready`.
    ///
    /// # Errors
    /// [`Error::UnknownChipId`] if the identity register does not read `0x60`;
    /// [`Error::I2c`] on bus failures.
    pub fn init(mut self, delay: &mut impl DelayNs) -> Result<Bme280<I2C, Ready>, E> {
        // Sensor requires time to start up before reset.
        delay.delay_ms(2);

        self.reset(delay)?;

        let chip_id = self.read_reg_byte(regs::CHIP_ID)?;
        if chip_id != CHIP_ID_VALUE {
            return Err(Error::UnknownChipId(chip_id));
        }

        let calibration = self.read_calibration()?;

        Ok(Bme280 {
            i2c: self.i2c,
            address: self.address,
            calibration,
            _state: PhantomData,
        })
    }

    /// Reads both factory calibration ROM blocks and decodes them into the
    /// named calibration words.
    fn read_calibration(&mut self) -> Result<Calibration, E> {
        let mut buffer = [0u8; calib_mem::TOTAL_SIZE];

        self.read_into(calib_mem::ADDR[0], &mut buffer[..calib_mem::SIZES[0]])?;
        self.read_into(calib_mem::ADDR[1], &mut buffer[calib_mem::SIZES[0]..])?;

        Ok(parse_calibration(&buffer))
    }
}

impl<I2C, STATE, E> Bme280<I2C, STATE>
where
    I2C: i2c::I2c<Error = E>,
{
    /// Performs a soft-reset of the sensor.
    ///
    /// Resets all internal registers to their default values. The device
    /// needs about 2 ms before it accepts the next command.
    fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), E> {
        self.write_reg(&[regs::RESET, RESET_COMMAND])?;
        delay.delay_ms(2);
        Ok(())
    }

    /// Reads data from a starting register address into a provided buffer.
    fn read_into(&mut self, reg_address: u8, buffer: &mut [u8]) -> Result<(), E> {
        self.i2c
            .write_read(self.address, &[reg_address], buffer)
            .map_err(Error::I2c)
    }

    /// Reads a single byte from a specific register address.
    fn read_reg_byte(&mut self, reg_address: u8) -> Result<u8, E> {
        let mut buffer = [0];
        self.read_into(reg_address, &mut buffer)?;
        Ok(buffer[0])
    }

    /// Writes a byte slice (typically `[Register, Value]`) to the sensor.
    fn write_reg(&mut self, data: &[u8]) -> Result<(), E> {
        self.i2c.write(self.address, data).map_err(Error::I2c)
    }

    /// Destroys the driver and hands the I2C bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C, E> Bme280<I2C, Ready>
where
    I2C: i2c::I2c<Error = E>,
{
    /// Applies a full sensor configuration.
    ///
    /// Writes humidity oversampling, temperature/pressure oversampling plus
    /// power mode, and standby/filter settings. Changes to `ctrl_hum` only
    /// take effect after the following `ctrl_meas` write.
    pub fn configure(&mut self, config: &Config) -> Result<(), E> {
        self.write_reg(&[regs::CTRL_HUM, config.oversampling.humidity as u8])?;
        self.write_reg(&[
            regs::CTRL_MEAS,
            ((config.oversampling.temperature as u8) << 5)
                | ((config.oversampling.pressure as u8) << 2)
                | config.mode as u8,
        ])?;
        self.write_reg(&[
            regs::CONFIG,
            ((config.standby as u8) << 5) | ((config.filter as u8) << 2),
        ])?;
        Ok(())
    }

    /// Reads the chip identification register (expected value: `0x60`).
    pub fn chip_id(&mut self) -> Result<u8, E> {
        self.read_reg_byte(regs::CHIP_ID)
    }

    /// The calibration words loaded at initialization.
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Reads the raw ADC codes for one measurement cycle.
    pub fn read_raw(&mut self) -> Result<RawSample, E> {
        let mut buffer = [0u8; regs::DATA_LEN];
        self.read_into(regs::DATA, &mut buffer)?;
        Ok(parse_raw_sample(&buffer))
    }

    /// Reads and compensates one measurement.
    ///
    /// Expects the sensor to be producing data, i.e. configured for normal
    /// mode; use [`Bme280::measure_forced`] for one-shot operation.
    pub fn measure(&mut self) -> Result<Measurement, E> {
        let raw = self.read_raw()?;
        Ok(calc::compensate(&self.calibration, raw))
    }

    /// Triggers a measurement in forced mode, waits for completion, and
    /// returns the compensated data.
    ///
    /// If every channel is configured as `Skipped`, no measurement is
    /// triggered and a default (all-zero) reading is returned.
    ///
    /// # Errors
    /// [`Error::Timeout`] if the conversion does not finish within the
    /// allotted status polls.
    pub fn measure_forced(&mut self, delay: &mut impl DelayNs) -> Result<Measurement, E> {
        let ctrl_meas = self.read_reg_byte(regs::CTRL_MEAS)?;
        let ctrl_hum = self.read_reg_byte(regs::CTRL_HUM)?;
        let oversampling = OversamplingConfig {
            temperature: Oversampling::from_u8(ctrl_meas >> 5),
            pressure: Oversampling::from_u8((ctrl_meas >> 2) & 0x07),
            humidity: Oversampling::from_u8(ctrl_hum & 0x07),
        };
        if oversampling.is_all_skipped() {
            return Ok(Measurement::default());
        }

        // Mode 01: forced. The sensor falls back to sleep on its own.
        self.write_reg(&[regs::CTRL_MEAS, (ctrl_meas & 0xFC) | Mode::Forced as u8])?;

        // Typical conversion time at 1x oversampling, then poll the
        // "measuring" status bit.
        delay.delay_ms(10);
        let mut attempts = STATUS_POLL_ATTEMPTS;
        while self.read_reg_byte(regs::STATUS)? & STATUS_MEASURING != 0 {
            attempts -= 1;
            if attempts == 0 {
                return Err(Error::Timeout);
            }
            delay.delay_us(500);
        }

        self.measure()
    }
}

/// Decodes the two concatenated calibration ROM blocks.
///
/// Word layout per the data sheet: little-endian 16-bit words for the
/// temperature and pressure stages, with dig_H4/dig_H5 packed as 12-bit
/// values sharing the nibbles of register `0xE5`.
fn parse_calibration(buffer: &[u8; calib_mem::TOTAL_SIZE]) -> Calibration {
    let unsigned = |lo: u8, hi: u8| u16::from(lo) | (u16::from(hi) << 8);
    let signed = |lo: u8, hi: u8| unsigned(lo, hi) as i16;

    Calibration {
        temperature: TemperatureCalibration {
            t1: unsigned(buffer[0], buffer[1]),
            t2: signed(buffer[2], buffer[3]),
            t3: signed(buffer[4], buffer[5]),
        },
        pressure: PressureCalibration {
            p1: unsigned(buffer[6], buffer[7]),
            p2: signed(buffer[8], buffer[9]),
            p3: signed(buffer[10], buffer[11]),
            p4: signed(buffer[12], buffer[13]),
            p5: signed(buffer[14], buffer[15]),
            p6: signed(buffer[16], buffer[17]),
            p7: signed(buffer[18], buffer[19]),
            p8: signed(buffer[20], buffer[21]),
            p9: signed(buffer[22], buffer[23]),
        },
        humidity: HumidityCalibration {
            h1: buffer[25],
            h2: signed(buffer[26], buffer[27]),
            h3: buffer[28],
            h4: (i16::from(buffer[29] as i8) * 16) | i16::from(buffer[30] & 0x0F),
            h5: (i16::from(buffer[31] as i8) * 16) | i16::from(buffer[30] >> 4),
            h6: buffer[32] as i8,
        },
    }
}

/// Reconstructs the 20-bit pressure/temperature and 16-bit humidity ADC codes
/// from the 8-byte data register burst.
fn parse_raw_sample(buffer: &[u8; regs::DATA_LEN]) -> RawSample {
    let wide = |msb: u8, lsb: u8, xlsb: u8| {
        (u32::from(msb) << 12) | (u32::from(lsb) << 4) | (u32::from(xlsb) >> 4)
    };

    RawSample {
        pressure: wide(buffer[0], buffer[1], buffer[2]),
        temperature: wide(buffer[3], buffer[4], buffer[5]),
        humidity: (u32::from(buffer[6]) << 8) | u32::from(buffer[7]),
    }
}

#[cfg(test)]
mod tests {
    use std::vec::Vec;

    use embedded_hal::delay::DelayNs;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    use super::*;
    use crate::settings::{ConfigBuilder, IirFilter, StandbyTime};

    /// Hardware delays are irrelevant against the bus mock.
    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    // ROM image for the workbench calibration words used by the calc tests:
    // T = (27504, 26435, -1000), P = (36477, -10685, 3024, 2855, 140, -7,
    // 15500, -14600, 6000), H = (75, 362, 0, 324, 50, 30).
    const CALIB_BLOCK_1: [u8; 26] = [
        112, 107, 67, 103, 24, 252, 125, 142, 67, 214, 208, 11, 39, 11, 140, 0, 249, 255, 140, 60,
        248, 198, 112, 23, 0, 75,
    ];
    const CALIB_BLOCK_2: [u8; 7] = [106, 1, 0, 20, 36, 3, 30];

    // Data register burst for adc_P = 415148, adc_T = 519888, adc_H = 28476.
    const DATA_BURST: [u8; 8] = [101, 90, 192, 126, 237, 0, 111, 60];

    fn init_transactions() -> Vec<I2cTransaction> {
        vec![
            I2cTransaction::write(DEFAULT_ADDRESS, vec![regs::RESET, RESET_COMMAND]),
            I2cTransaction::write_read(DEFAULT_ADDRESS, vec![regs::CHIP_ID], vec![CHIP_ID_VALUE]),
            I2cTransaction::write_read(
                DEFAULT_ADDRESS,
                vec![calib_mem::ADDR[0]],
                CALIB_BLOCK_1.to_vec(),
            ),
            I2cTransaction::write_read(
                DEFAULT_ADDRESS,
                vec![calib_mem::ADDR[1]],
                CALIB_BLOCK_2.to_vec(),
            ),
        ]
    }

    fn init_ready(extra: &[I2cTransaction]) -> (Bme280<I2cMock, Ready>, I2cMock) {
        let mut transactions = init_transactions();
        transactions.extend_from_slice(extra);
        let i2c = I2cMock::new(&transactions);
        let bus = i2c.clone();
        let baro = Bme280::new(i2c, DEFAULT_ADDRESS)
            .init(&mut NoDelay)
            .unwrap();
        (baro, bus)
    }

    #[test]
    fn init_loads_calibration() {
        let (baro, mut bus) = init_ready(&[]);

        let calibration = baro.calibration();
        assert_eq!(calibration.temperature.t1, 27504);
        assert_eq!(calibration.temperature.t2, 26435);
        assert_eq!(calibration.temperature.t3, -1000);
        assert_eq!(calibration.pressure.p1, 36477);
        assert_eq!(calibration.pressure.p2, -10685);
        assert_eq!(calibration.pressure.p9, 6000);
        assert_eq!(calibration.humidity.h1, 75);
        assert_eq!(calibration.humidity.h2, 362);
        assert_eq!(calibration.humidity.h4, 324);
        assert_eq!(calibration.humidity.h5, 50);
        assert_eq!(calibration.humidity.h6, 30);

        bus.done();
    }

    #[test]
    fn init_rejects_unknown_chip() {
        let transactions = [
            I2cTransaction::write(DEFAULT_ADDRESS, vec![regs::RESET, RESET_COMMAND]),
            I2cTransaction::write_read(DEFAULT_ADDRESS, vec![regs::CHIP_ID], vec![0x61]),
        ];
        let i2c = I2cMock::new(&transactions);
        let mut bus = i2c.clone();

        let err = Bme280::new(i2c, DEFAULT_ADDRESS)
            .init(&mut NoDelay)
            .unwrap_err();
        assert_eq!(err, Error::UnknownChipId(0x61));

        bus.done();
    }

    #[test]
    fn configure_packs_control_registers() {
        let (mut baro, mut bus) = init_ready(&[
            I2cTransaction::write(DEFAULT_ADDRESS, vec![regs::CTRL_HUM, 0b0000_0001]),
            // osrs_t = 2 (X2), osrs_p = 5 (X16), mode = 3 (normal)
            I2cTransaction::write(DEFAULT_ADDRESS, vec![regs::CTRL_MEAS, 0b0101_0111]),
            // t_sb = 2 (125 ms), filter = 2 (X4)
            I2cTransaction::write(DEFAULT_ADDRESS, vec![regs::CONFIG, 0b0100_1000]),
        ]);

        let config = ConfigBuilder::new()
            .temperature_oversampling(Oversampling::X2)
            .pressure_oversampling(Oversampling::X16)
            .humidity_oversampling(Oversampling::X1)
            .filter(IirFilter::X4)
            .standby_time(StandbyTime::Ms125)
            .mode(Mode::Normal)
            .build();
        baro.configure(&config).unwrap();

        bus.done();
    }

    #[test]
    fn measure_compensates_raw_sample() {
        let (mut baro, mut bus) = init_ready(&[I2cTransaction::write_read(
            DEFAULT_ADDRESS,
            vec![regs::DATA],
            DATA_BURST.to_vec(),
        )]);

        let reading = baro.measure().unwrap();
        assert!((reading.temperature - 25.08247793081682).abs() < 1e-9);
        assert!((reading.pressure - 100653.25814481472).abs() < 1e-6);
        assert!((reading.humidity - 42.58698147693947).abs() < 1e-9);

        bus.done();
    }

    #[test]
    fn measure_forced_polls_until_ready() {
        let ctrl_meas = 0b0010_0111u8; // X1/X1, normal mode bits set
        let (mut baro, mut bus) = init_ready(&[
            I2cTransaction::write_read(DEFAULT_ADDRESS, vec![regs::CTRL_MEAS], vec![ctrl_meas]),
            I2cTransaction::write_read(DEFAULT_ADDRESS, vec![regs::CTRL_HUM], vec![0x01]),
            I2cTransaction::write(
                DEFAULT_ADDRESS,
                vec![regs::CTRL_MEAS, (ctrl_meas & 0xFC) | 0x01],
            ),
            // Still converting on the first poll.
            I2cTransaction::write_read(DEFAULT_ADDRESS, vec![regs::STATUS], vec![STATUS_MEASURING]),
            I2cTransaction::write_read(DEFAULT_ADDRESS, vec![regs::STATUS], vec![0x00]),
            I2cTransaction::write_read(DEFAULT_ADDRESS, vec![regs::DATA], DATA_BURST.to_vec()),
        ]);

        let reading = baro.measure_forced(&mut NoDelay).unwrap();
        assert!((reading.temperature - 25.08247793081682).abs() < 1e-9);

        bus.done();
    }

    #[test]
    fn measure_forced_times_out() {
        let mut stuck = vec![
            I2cTransaction::write_read(DEFAULT_ADDRESS, vec![regs::CTRL_MEAS], vec![0b0010_0100]),
            I2cTransaction::write_read(DEFAULT_ADDRESS, vec![regs::CTRL_HUM], vec![0x01]),
            I2cTransaction::write(DEFAULT_ADDRESS, vec![regs::CTRL_MEAS, 0b0010_0101]),
        ];
        for _ in 0..STATUS_POLL_ATTEMPTS {
            stuck.push(I2cTransaction::write_read(
                DEFAULT_ADDRESS,
                vec![regs::STATUS],
                vec![STATUS_MEASURING],
            ));
        }
        let (mut baro, mut bus) = init_ready(&stuck);

        assert_eq!(baro.measure_forced(&mut NoDelay).unwrap_err(), Error::Timeout);

        bus.done();
    }

    #[test]
    fn measure_forced_skips_when_all_channels_disabled() {
        let (mut baro, mut bus) = init_ready(&[
            I2cTransaction::write_read(DEFAULT_ADDRESS, vec![regs::CTRL_MEAS], vec![0x00]),
            I2cTransaction::write_read(DEFAULT_ADDRESS, vec![regs::CTRL_HUM], vec![0x00]),
        ]);

        assert_eq!(
            baro.measure_forced(&mut NoDelay).unwrap(),
            Measurement::default()
        );

        bus.done();
    }

    #[test]
    fn calibration_rom_nibble_split() {
        let mut buffer = [0u8; calib_mem::TOTAL_SIZE];
        buffer[..26].copy_from_slice(&CALIB_BLOCK_1);
        buffer[26..].copy_from_slice(&CALIB_BLOCK_2);

        let calibration = parse_calibration(&buffer);
        // dig_H4/dig_H5 interleave their low nibbles in ROM byte 0xE5.
        assert_eq!(calibration.humidity.h4, 324);
        assert_eq!(calibration.humidity.h5, 50);
        assert_eq!(calibration.pressure.p6, -7);
        assert_eq!(calibration.pressure.p8, -14600);
    }

    #[test]
    fn raw_sample_bit_widths() {
        let raw = parse_raw_sample(&DATA_BURST);
        assert_eq!(raw.pressure, 415148);
        assert_eq!(raw.temperature, 519888);
        assert_eq!(raw.humidity, 28476);

        // 20-bit ceiling for pressure/temperature, 16-bit for humidity.
        let raw = parse_raw_sample(&[0xFF; 8]);
        assert_eq!(raw.pressure, 0xFFFFF);
        assert_eq!(raw.temperature, 0xFFFFF);
        assert_eq!(raw.humidity, 0xFFFF);
    }
}
