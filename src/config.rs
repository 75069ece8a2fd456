//! Fan controller configuration.

use crate::{clock::Duration, thermometer::Temperature};

/// Interval between two PID updates, the classic Arduino PID default.
pub const SAMPLE_TIME: Duration = Duration::millis(100);

/// PID gains
///
/// `ki` and `kd` are per second. They are scaled by the sample time before use, so the loop
/// behaves the same whatever the sample time.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Gains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Gains {
    pub const DEFAULT: Self = Self {
        kp: 5.0,
        ki: 0.1,
        kd: 1.0,
    };

    fn is_finite(&self) -> bool {
        self.kp.is_finite() && self.ki.is_finite() && self.kd.is_finite()
    }
}

impl Default for Gains {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Sign convention of the feedback loop.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Output rises when the measurement is below the setpoint (heating).
    Direct,
    /// Output rises when the measurement is above the setpoint (cooling).
    #[default]
    Reverse,
}

impl Direction {
    pub const fn sign(self) -> f32 {
        match self {
            Self::Direct => 1.0,
            Self::Reverse => -1.0,
        }
    }
}

/// Offsets from the target temperature at which the fan starts and stops.
///
/// The fan starts once the temperature rises above `target + start_offset` and stops once it
/// falls below `target + stop_offset`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Hysteresis {
    pub start_offset: Temperature,
    pub stop_offset: Temperature,
}

impl Hysteresis {
    pub const DEFAULT: Self = Self {
        start_offset: Temperature::const_from_int(-1),
        stop_offset: Temperature::const_from_int(-2),
    };
}

impl Default for Hysteresis {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Minimum speed above maximum speed
    SpeedRange,
    /// Stop threshold not below the start threshold
    HysteresisBand,
    /// A gain is NaN or infinite
    Gain,
    /// Zero sample time
    SampleTime,
}

impl ConfigError {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SpeedRange => "Minimum speed above maximum speed",
            Self::HysteresisBand => "Stop offset not below start offset",
            Self::Gain => "Gain is not finite",
            Self::SampleTime => "Sample time is zero",
        }
    }
}

/// Immutable configuration of a [`FanController`](crate::FanController).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FanConfig {
    target: Temperature,
    min_speed: u8,
    max_speed: u8,
    gains: Gains,
    direction: Direction,
    hysteresis: Hysteresis,
    sample_time: Duration,
}

impl FanConfig {
    /// Configuration with the default gains, direction, hysteresis and sample time.
    pub fn new(
        target: impl Into<Temperature>,
        min_speed: u8,
        max_speed: u8,
    ) -> Result<Self, ConfigError> {
        if min_speed > max_speed {
            return Err(ConfigError::SpeedRange);
        }

        Ok(Self {
            target: target.into(),
            min_speed,
            max_speed,
            gains: Gains::DEFAULT,
            direction: Direction::Reverse,
            hysteresis: Hysteresis::DEFAULT,
            sample_time: SAMPLE_TIME,
        })
    }

    pub fn with_gains(self, gains: Gains) -> Result<Self, ConfigError> {
        if !gains.is_finite() {
            return Err(ConfigError::Gain);
        }
        Ok(Self { gains, ..self })
    }

    #[must_use]
    pub const fn with_direction(self, direction: Direction) -> Self {
        Self { direction, ..self }
    }

    pub fn with_hysteresis(self, hysteresis: Hysteresis) -> Result<Self, ConfigError> {
        if hysteresis.stop_offset >= hysteresis.start_offset {
            return Err(ConfigError::HysteresisBand);
        }
        Ok(Self { hysteresis, ..self })
    }

    pub fn with_sample_time(self, sample_time: Duration) -> Result<Self, ConfigError> {
        if sample_time.ticks() == 0 {
            return Err(ConfigError::SampleTime);
        }
        Ok(Self {
            sample_time,
            ..self
        })
    }

    pub const fn target(&self) -> Temperature {
        self.target
    }

    pub const fn min_speed(&self) -> u8 {
        self.min_speed
    }

    pub const fn max_speed(&self) -> u8 {
        self.max_speed
    }

    pub const fn gains(&self) -> Gains {
        self.gains
    }

    pub const fn direction(&self) -> Direction {
        self.direction
    }

    pub const fn hysteresis(&self) -> Hysteresis {
        self.hysteresis
    }

    /// Minimum time between two PID updates
    pub const fn sample_time(&self) -> Duration {
        self.sample_time
    }

    /// Temperature above which a stopped fan starts
    pub fn start_threshold(&self) -> Temperature {
        self.target + self.hysteresis.start_offset
    }

    /// Temperature below which a running fan stops
    pub fn stop_threshold(&self) -> Temperature {
        self.target + self.hysteresis.stop_offset
    }
}
