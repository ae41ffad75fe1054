#![no_std]

//! # Meridian Sensor Board Driver
//!
//! A platform-agnostic, `no_std` driver crate for the I2C sensor suite on the
//! Meridian single-board-computer add-on:
//!
//! - **Barometer** (Bosch BME280): temperature, pressure, and relative
//!   humidity, compensated with the per-device factory calibration.
//! - **IMU** (ST LSM9DS0): accelerometer, magnetometer, and gyroscope.
//! - **RGB/IR light sensor**: four-channel colour readings.
//! - **Real-time clock**: BCD calendar time with hundredths of a second.
//! - **Temperature sensor** (NXP LM75B).
//!
//! All drivers speak through the [`embedded-hal`] 1.0 `I2c` trait, so they run
//! unchanged on microcontrollers and on Linux SBC hosts.
//!
//! ## Features
//! - **Typestate barometer**: the compensation formulas require calibration
//!   data, so the barometer cannot be read before `init` has loaded it.
//! - **Pure compensation engine**: the barometer math lives in [`calc`] as
//!   side-effect-free functions and can be exercised without any bus.
//! - `defmt-03`: derives `defmt::Format` on the public data types.
//!
//! ## Units
//! - **Temperature**: degrees Celsius (`f64`)
//! - **Pressure**: Pascal (`f64`) -> 101325.0 = 1013.25 hPa
//! - **Humidity**: percent relative humidity (`f64`), clamped to 0..=100
//! - **Acceleration**: m/s²; **Angular rate**: degrees per second;
//!   **Magnetic field**: gauss
//! - **Light**: per-channel fraction of the summed channel counts
//!
//! [`embedded-hal`]: https://docs.rs/embedded-hal/1.0

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod baro;
pub mod calc;
pub mod imu;
pub mod light;
pub mod rtc;
pub mod settings;
pub mod thermometer;

pub use baro::Bme280;
pub use calc::{
    compensate, compensate_humidity, compensate_pressure, compensate_temperature, Calibration,
    HumidityCalibration, Measurement, PressureCalibration, RawSample, TFine,
    TemperatureCalibration,
};
pub use imu::{Accelerometer, Gyroscope, Magnetometer, Vec3};
pub use light::{LightMeasurement, RgbIrSensor};
pub use rtc::{Rtc, Time};
pub use settings::{
    Config, ConfigBuilder, IirFilter, Mode, Oversampling, OversamplingConfig, StandbyTime,
};
pub use thermometer::Lm75b;

// --- Typestates ---

/// Sensor has been created but not yet initialized with calibration data.
#[derive(Debug, Clone, Copy)]
pub struct Uninitialized;
/// Sensor is initialized, configured, and ready for measurements.
#[derive(Debug, Clone, Copy)]
pub struct Ready;

/// Error types shared by the board's drivers.
pub mod error {
    /// Errors that can occur during communication or configuration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
    pub enum Error<E> {
        /// I2C bus error.
        I2c(E),
        /// The device identification register returned an unexpected value.
        UnknownChipId(u8),
        /// Sensor measurement timed out.
        Timeout,
    }

    /// Result type alias for driver operations.
    pub type Result<T, E> = core::result::Result<T, Error<E>>;
}
