//! Drivers for the board's IMU (ST LSM9DS0).
//!
//! The chip exposes two I2C devices: the accelerometer/magnetometer die
//! (`XM`, [`Accelerometer`] and [`Magnetometer`]) and the gyroscope die
//! (`G`, [`Gyroscope`]). Each driver reads a six-byte little-endian sample
//! burst and scales it by the data-sheet sensitivity into physical units.

use embedded_hal::i2c;

use crate::error::{Error, Result};

/// Accelerometer/magnetometer die address with SDO_XM tied low.
pub const DEFAULT_ADDRESS_XM: u8 = 0x1D;
/// Gyroscope die address with SDO_G tied high.
pub const DEFAULT_ADDRESS_G: u8 = 0x6B;

/// Register addresses (shared across both dies where the layout overlaps).
mod regs {
    pub const WHO_AM_I: u8 = 0x0F;

    // Gyro control registers.
    pub const CTRL_REG1_G: u8 = 0x20;
    pub const CTRL_REG4_G: u8 = 0x23;

    // Accel and magneto control registers.
    pub const CTRL_REG1_XM: u8 = 0x20;
    pub const CTRL_REG2_XM: u8 = 0x21;
    pub const CTRL_REG5_XM: u8 = 0x24;
    pub const CTRL_REG6_XM: u8 = 0x25;
    pub const CTRL_REG7_XM: u8 = 0x26;

    // Output register bases.
    pub const OUT_X_L_M: u8 = 0x08;
    pub const OUT_X_L_A: u8 = 0x28;
    pub const OUT_X_L_G: u8 = 0x28;

    /// Register-address MSB; selects sub-address auto-increment so burst
    /// reads walk the six output registers.
    pub const AUTO_INCREMENT: u8 = 0x80;
}

const WHO_AM_I_XM: u8 = 0b0100_1001;
const WHO_AM_I_G: u8 = 0b1101_0100;

// Sensitivities from the LSM9DS0 data sheet, Table 3.
const ACCELERATION_SCALE: f64 = 0.000732 * 9.80665; // m/s² per LSB
const MAGNETIC_SCALE: f64 = 0.00048; // gauss per LSB
const ANGULAR_RATE_SCALE: f64 = 0.070; // °/s per LSB

/// A three-axis reading in physical units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

fn read_regs<I2C: i2c::I2c>(
    i2c: &mut I2C,
    address: u8,
    reg_address: u8,
    buffer: &mut [u8],
) -> Result<(), I2C::Error> {
    i2c.write_read(address, &[reg_address | regs::AUTO_INCREMENT], buffer)
        .map_err(Error::I2c)
}

fn read_who_am_i<I2C: i2c::I2c>(i2c: &mut I2C, address: u8) -> Result<u8, I2C::Error> {
    let mut buffer = [0];
    read_regs(i2c, address, regs::WHO_AM_I, &mut buffer)?;
    Ok(buffer[0])
}

/// Reads a six-byte output burst and scales the little-endian i16 triple.
fn read_vector<I2C: i2c::I2c>(
    i2c: &mut I2C,
    address: u8,
    reg_address: u8,
    scale: f64,
) -> Result<Vec3, I2C::Error> {
    let mut buffer = [0u8; 6];
    read_regs(i2c, address, reg_address, &mut buffer)?;

    Ok(Vec3 {
        x: f64::from(i16::from_le_bytes([buffer[0], buffer[1]])) * scale,
        y: f64::from(i16::from_le_bytes([buffer[2], buffer[3]])) * scale,
        z: f64::from(i16::from_le_bytes([buffer[4], buffer[5]])) * scale,
    })
}

/// Brings up the accel/magneto die: accelerometer at 100 Hz with all axes
/// enabled, magnetometer at 50 Hz in continuous-conversion mode.
fn configure_xm<I2C: i2c::I2c>(i2c: &mut I2C, address: u8) -> Result<(), I2C::Error> {
    i2c.write(address, &[regs::CTRL_REG1_XM, 0b0110_0111])
        .map_err(Error::I2c)?;
    i2c.write(address, &[regs::CTRL_REG2_XM, 0b0010_0000])
        .map_err(Error::I2c)?;

    i2c.write(address, &[regs::CTRL_REG5_XM, 0b1111_0000])
        .map_err(Error::I2c)?;
    i2c.write(address, &[regs::CTRL_REG6_XM, 0b0110_0000])
        .map_err(Error::I2c)?;
    i2c.write(address, &[regs::CTRL_REG7_XM, 0b0000_0000])
        .map_err(Error::I2c)?;
    Ok(())
}

/// Accelerometer on the LSM9DS0 `XM` die.
#[derive(Debug)]
pub struct Accelerometer<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> Accelerometer<I2C>
where
    I2C: i2c::I2c<Error = E>,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Checks the WHO_AM_I register against the accel/magneto die identity.
    pub fn self_test(&mut self) -> Result<bool, E> {
        Ok(read_who_am_i(&mut self.i2c, self.address)? == WHO_AM_I_XM)
    }

    /// Enables the accelerometer and magnetometer outputs.
    pub fn configure(&mut self) -> Result<(), E> {
        configure_xm(&mut self.i2c, self.address)
    }

    /// Acceleration as an (x, y, z) triple in m/s².
    pub fn measure(&mut self) -> Result<Vec3, E> {
        read_vector(
            &mut self.i2c,
            self.address,
            regs::OUT_X_L_A,
            ACCELERATION_SCALE,
        )
    }

    /// Destroys the driver and hands the I2C bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

/// Magnetometer on the LSM9DS0 `XM` die.
#[derive(Debug)]
pub struct Magnetometer<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> Magnetometer<I2C>
where
    I2C: i2c::I2c<Error = E>,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Checks the WHO_AM_I register against the accel/magneto die identity.
    pub fn self_test(&mut self) -> Result<bool, E> {
        Ok(read_who_am_i(&mut self.i2c, self.address)? == WHO_AM_I_XM)
    }

    /// Enables the accelerometer and magnetometer outputs.
    pub fn configure(&mut self) -> Result<(), E> {
        configure_xm(&mut self.i2c, self.address)
    }

    /// Magnetic field as an (x, y, z) triple in gauss.
    pub fn measure(&mut self) -> Result<Vec3, E> {
        read_vector(&mut self.i2c, self.address, regs::OUT_X_L_M, MAGNETIC_SCALE)
    }

    /// Destroys the driver and hands the I2C bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

/// Gyroscope on the LSM9DS0 `G` die.
#[derive(Debug)]
pub struct Gyroscope<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> Gyroscope<I2C>
where
    I2C: i2c::I2c<Error = E>,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Checks the WHO_AM_I register against the gyroscope die identity.
    pub fn self_test(&mut self) -> Result<bool, E> {
        Ok(read_who_am_i(&mut self.i2c, self.address)? == WHO_AM_I_G)
    }

    /// Enables the gyroscope with all axes at the default data rate and a
    /// 2000 dps full scale.
    pub fn configure(&mut self) -> Result<(), E> {
        self.i2c
            .write(self.address, &[regs::CTRL_REG1_G, 0b0000_1111])
            .map_err(Error::I2c)?;
        self.i2c
            .write(self.address, &[regs::CTRL_REG4_G, 0b0011_0000])
            .map_err(Error::I2c)?;
        Ok(())
    }

    /// Angular rate as an (x, y, z) triple in degrees per second.
    pub fn measure(&mut self) -> Result<Vec3, E> {
        read_vector(
            &mut self.i2c,
            self.address,
            regs::OUT_X_L_G,
            ANGULAR_RATE_SCALE,
        )
    }

    /// Destroys the driver and hands the I2C bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}
