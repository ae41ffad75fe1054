//! Compensation engine for the barometric sensor.
//!
//! The BME280 reports uncalibrated ADC codes; turning them into physical
//! readings takes the chip's factory calibration words and Bosch's
//! double-precision reference formulas. The math is pure and bus-free:
//! the temperature stage produces a [`TFine`] carrier that the pressure and
//! humidity stages of the *same* measurement cycle consume, so the
//! compensators can be exercised (and conformance-tested) without hardware.
//!
//! [`TFine`] can only be obtained from [`compensate_temperature`], and the
//! later stages take it as an explicit argument. Measurement cycles therefore
//! cannot share or reuse a stale intermediate, even across threads.

/// Temperature calibration words, factory-fused per device.
///
/// Register names `dig_T1..dig_T3` in the data sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct TemperatureCalibration {
    /// dig_T1, unsigned 16-bit.
    pub t1: u16,
    /// dig_T2, signed 16-bit.
    pub t2: i16,
    /// dig_T3, signed 16-bit.
    pub t3: i16,
}

/// Pressure calibration words, factory-fused per device.
///
/// Register names `dig_P1..dig_P9` in the data sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct PressureCalibration {
    /// dig_P1, unsigned 16-bit.
    pub p1: u16,
    /// dig_P2, signed 16-bit.
    pub p2: i16,
    /// dig_P3, signed 16-bit.
    pub p3: i16,
    /// dig_P4, signed 16-bit.
    pub p4: i16,
    /// dig_P5, signed 16-bit.
    pub p5: i16,
    /// dig_P6, signed 16-bit.
    pub p6: i16,
    /// dig_P7, signed 16-bit.
    pub p7: i16,
    /// dig_P8, signed 16-bit.
    pub p8: i16,
    /// dig_P9, signed 16-bit.
    pub p9: i16,
}

/// Humidity calibration words, factory-fused per device.
///
/// Register names `dig_H1..dig_H6` in the data sheet. dig_H4 and dig_H5 are
/// 12-bit values sharing a register nibble; the driver widens them to `i16`
/// when it unpacks the calibration ROM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct HumidityCalibration {
    /// dig_H1, unsigned 8-bit.
    pub h1: u8,
    /// dig_H2, signed 16-bit.
    pub h2: i16,
    /// dig_H3, unsigned 8-bit.
    pub h3: u8,
    /// dig_H4, signed 12-bit.
    pub h4: i16,
    /// dig_H5, signed 12-bit.
    pub h5: i16,
    /// dig_H6, signed 8-bit.
    pub h6: i8,
}

/// Complete calibration set read from the sensor at initialization.
///
/// Logically read-only for the lifetime of a measurement session; the
/// compensators only ever borrow it, so one set can serve concurrent readers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Calibration {
    /// Temperature stage words.
    pub temperature: TemperatureCalibration,
    /// Pressure stage words.
    pub pressure: PressureCalibration,
    /// Humidity stage words.
    pub humidity: HumidityCalibration,
}

/// Raw ADC codes for one measurement cycle, as read from the data registers.
///
/// The codes are device-defined: 20 bits for temperature and pressure, 16 for
/// humidity. The engine treats them as opaque integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct RawSample {
    /// Uncompensated temperature code (20-bit).
    pub temperature: u32,
    /// Uncompensated pressure code (20-bit).
    pub pressure: u32,
    /// Uncompensated humidity code (16-bit).
    pub humidity: u32,
}

/// Fine temperature carried from the temperature stage into the pressure and
/// humidity stages of the same cycle (temperature scaled by 5120, truncated).
///
/// Only [`compensate_temperature`] can produce one, which keeps the stage
/// ordering honest: there is no way to compensate pressure or humidity
/// without a temperature pass for that cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct TFine(i32);

/// Compensated measurement in physical units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Measurement {
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Pressure in Pascal.
    pub pressure: f64,
    /// Relative humidity in percent, clamped to `0.0..=100.0`.
    pub humidity: f64,
}

/// Compensates a raw temperature code into degrees Celsius.
///
/// Also returns the [`TFine`] intermediate required by
/// [`compensate_pressure`] and [`compensate_humidity`].
pub fn compensate_temperature(calib: &TemperatureCalibration, adc_t: u32) -> (f64, TFine) {
    let adc_t = f64::from(adc_t);
    let t1 = f64::from(calib.t1);

    let var1 = (adc_t / 16384.0 - t1 / 1024.0) * f64::from(calib.t2);
    let var2 = (adc_t / 131072.0 - t1 / 8192.0)
        * (adc_t / 131072.0 - t1 / 8192.0)
        * f64::from(calib.t3);

    ((var1 + var2) / 5120.0, TFine((var1 + var2) as i32))
}

/// Compensates a raw pressure code into Pascal.
///
/// `t_fine` must come from the temperature pass of the same cycle.
pub fn compensate_pressure(calib: &PressureCalibration, t_fine: TFine, adc_p: u32) -> f64 {
    let var1 = f64::from(t_fine.0) / 2.0 - 64000.0;
    let var2 = var1 * var1 * f64::from(calib.p6) / 32768.0;
    let var2 = var2 + var1 * f64::from(calib.p5) * 2.0;
    let var2 = var2 / 4.0 + f64::from(calib.p4) * 65536.0;
    let var1 =
        (f64::from(calib.p3) * var1 * var1 / 524288.0 + f64::from(calib.p2) * var1) / 524288.0;
    let var1 = (1.0 + var1 / 32768.0) * f64::from(calib.p1);
    if var1 == 0.0 {
        // A zeroed dig_P1 would divide by zero below; the reference formula
        // reports 0.0 rather than signalling.
        return 0.0;
    }

    let p = 1048576.0 - f64::from(adc_p);
    let p = (p - var2 / 4096.0) * 6250.0 / var1;
    let var1 = f64::from(calib.p9) * p * p / 2147483648.0;
    let var2 = p * f64::from(calib.p8) / 32768.0;
    p + (var1 + var2 + f64::from(calib.p7)) / 16.0
}

/// Compensates a raw humidity code into percent relative humidity.
///
/// `t_fine` must come from the temperature pass of the same cycle.
pub fn compensate_humidity(calib: &HumidityCalibration, t_fine: TFine, adc_h: u32) -> f64 {
    let var_h = f64::from(t_fine.0) - 76800.0;
    let var_h = (f64::from(adc_h)
        - (f64::from(calib.h4) * 64.0 + f64::from(calib.h5) / 16384.0 * var_h))
        * (f64::from(calib.h2) / 65536.0
            * (1.0
                + f64::from(calib.h6) / 67108864.0
                    * var_h
                    * (1.0 + f64::from(calib.h3) / 67108864.0 * var_h)));
    let var_h = var_h * (1.0 - f64::from(calib.h1) * var_h / 524288.0);

    if var_h > 100.0 {
        100.0
    } else if var_h < 0.0 {
        0.0
    } else {
        var_h
    }
}

/// Runs one full compensation cycle: temperature first (the sole producer of
/// the fine-temperature intermediate), then pressure and humidity with that
/// same intermediate.
///
/// Pure function of its inputs; identical inputs give bit-identical output.
pub fn compensate(calib: &Calibration, sample: RawSample) -> Measurement {
    let (temperature, t_fine) = compensate_temperature(&calib.temperature, sample.temperature);
    let pressure = compensate_pressure(&calib.pressure, t_fine, sample.pressure);
    let humidity = compensate_humidity(&calib.humidity, t_fine, sample.humidity);

    Measurement {
        temperature,
        pressure,
        humidity,
    }
}
