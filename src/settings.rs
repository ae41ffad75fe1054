//! Configuration types for the barometric sensor.
//!
//! The BME280 spreads its measurement configuration over three control
//! registers: humidity oversampling in `ctrl_hum`, temperature/pressure
//! oversampling plus the power mode in `ctrl_meas`, and standby time plus the
//! IIR filter in `config`. The types here carry one field per hardware
//! setting; [`crate::baro::Bme280::configure`] packs them into register
//! values.

/// Oversampling settings for Temperature, Pressure, and Humidity.
///
/// Higher oversampling rates increase accuracy (reduce noise) but lead to
/// longer measurement times and higher power consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum Oversampling {
    /// No measurement performed. Used to disable a specific channel.
    Skipped = 0,
    /// 1x Oversampling (default).
    #[default]
    X1 = 1,
    /// 2x Oversampling.
    X2 = 2,
    /// 4x Oversampling.
    X4 = 3,
    /// 8x Oversampling.
    X8 = 4,
    /// 16x Oversampling.
    X16 = 5,
}

impl Oversampling {
    /// Creates an instance from a raw register field (useful when reading the
    /// control registers back).
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Oversampling::Skipped,
            1 => Oversampling::X1,
            2 => Oversampling::X2,
            3 => Oversampling::X4,
            4 => Oversampling::X8,
            // Field values 6 and 7 alias 16x oversampling in the hardware.
            _ => Oversampling::X16,
        }
    }
}

/// Grouped oversampling settings for all three measurement channels.
///
/// Use `Oversampling::Skipped` to disable specific measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct OversamplingConfig {
    /// Temperature oversampling.
    pub temperature: Oversampling,
    /// Pressure oversampling.
    pub pressure: Oversampling,
    /// Humidity oversampling.
    pub humidity: Oversampling,
}

impl OversamplingConfig {
    /// Returns `true` if all channels are set to `Skipped`.
    ///
    /// Used to determine whether triggering a forced measurement would do any
    /// work at all.
    pub fn is_all_skipped(&self) -> bool {
        self.temperature == Oversampling::Skipped
            && self.pressure == Oversampling::Skipped
            && self.humidity == Oversampling::Skipped
    }
}

/// Infinite Impulse Response (IIR) filter coefficient.
///
/// Filters short-term disturbances (door slams, wind gusts) out of the
/// pressure and temperature readings. Does not affect humidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum IirFilter {
    /// Filter off.
    #[default]
    Off = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
}

/// Inactive period between measurements in normal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum StandbyTime {
    /// 0.5 ms.
    Ms0_5 = 0,
    /// 62.5 ms.
    Ms62_5 = 1,
    /// 125 ms.
    Ms125 = 2,
    /// 250 ms.
    Ms250 = 3,
    /// 500 ms.
    Ms500 = 4,
    /// 1000 ms (default).
    #[default]
    Ms1000 = 5,
    /// 10 ms.
    Ms10 = 6,
    /// 20 ms.
    Ms20 = 7,
}

/// Sensor power mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    /// No measurements; lowest power draw.
    Sleep = 0,
    /// One measurement cycle on demand, then back to sleep.
    Forced = 1,
    /// Free-running measurements, paced by [`StandbyTime`].
    #[default]
    Normal = 3,
}

/// Complete sensor configuration used for setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Config {
    /// Oversampling settings for T, P, H.
    pub oversampling: OversamplingConfig,
    /// IIR filter setting.
    pub filter: IirFilter,
    /// Standby time between normal-mode measurements.
    pub standby: StandbyTime,
    /// Power mode.
    pub mode: Mode,
}

/// Convenience builder for assembling a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the temperature oversampling.
    pub fn temperature_oversampling(mut self, os: Oversampling) -> Self {
        self.config.oversampling.temperature = os;
        self
    }

    /// Sets the pressure oversampling.
    pub fn pressure_oversampling(mut self, os: Oversampling) -> Self {
        self.config.oversampling.pressure = os;
        self
    }

    /// Sets the humidity oversampling.
    pub fn humidity_oversampling(mut self, os: Oversampling) -> Self {
        self.config.oversampling.humidity = os;
        self
    }

    /// Sets the IIR filter coefficient.
    pub fn filter(mut self, filter: IirFilter) -> Self {
        self.config.filter = filter;
        self
    }

    /// Sets the normal-mode standby time.
    pub fn standby_time(mut self, standby: StandbyTime) -> Self {
        self.config.standby = standby;
        self
    }

    /// Sets the power mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Finalizes the builder and returns the `Config` object.
    pub fn build(self) -> Config {
        self.config
    }
}
