//! Periodic temperature report over a serial line.
//!
//! Lines look like `fan: 23.50C`, one per logging interval.

use core::fmt::Write;

use crate::{
    clock::{self, Duration, Instant},
    thermometer::Temperature,
};

pub const LINE_SIZE: usize = 32;

pub type Line = heapless::String<LINE_SIZE>;

/// Snapshot of a controller tick
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Sample {
    pub temperature: Option<Temperature>,
}

pub struct Telemetry {
    name: &'static str,
    interval: Option<Duration>,
    last_log: Option<Instant>,
}

impl Telemetry {
    /// Reports under `name` every `interval`, or never if `interval` is `None`.
    pub const fn new(name: &'static str, interval: Option<Duration>) -> Self {
        Self {
            name,
            interval,
            last_log: None,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Formats a report line if one is due.
    ///
    /// Samples without a temperature are skipped and do not restart the interval.
    pub fn poll(&mut self, now: Instant, sample: &Sample) -> Option<Line> {
        let interval = self.interval?;
        let temp = sample.temperature?;

        if let Some(last) = self.last_log {
            if clock::elapsed(last, now) < interval {
                return None;
            }
        }

        let mut line = Line::new();
        if write!(line, "{}: {:.2}C\r\n", self.name, temp.to_num::<f32>()).is_err() {
            error!("Telemetry line too long for {=str}", self.name);
            return None;
        }

        self.last_log = Some(now);
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(temp: f32) -> Sample {
        Sample {
            temperature: Some(Temperature::from_num(temp)),
        }
    }

    fn at(ms: u32) -> Instant {
        Instant::from_ticks(ms)
    }

    #[test]
    fn line_format() {
        let mut telemetry = Telemetry::new("fan", Some(Duration::millis(1_000)));
        let line = telemetry.poll(at(0), &sample(23.5)).unwrap();
        assert_eq!(line.as_str(), "fan: 23.50C\r\n");

        let line = telemetry.poll(at(1_000), &sample(-10.25)).unwrap();
        assert_eq!(line.as_str(), "fan: -10.25C\r\n");
    }

    #[test]
    fn respects_interval() {
        let mut telemetry = Telemetry::new("water", Some(Duration::millis(1_000)));
        assert!(telemetry.poll(at(5_000), &sample(20.0)).is_some());
        assert!(telemetry.poll(at(5_100), &sample(20.0)).is_none());
        assert!(telemetry.poll(at(5_999), &sample(20.0)).is_none());
        assert!(telemetry.poll(at(6_000), &sample(20.0)).is_some());
    }

    #[test]
    fn skips_missing_temperature() {
        let mut telemetry = Telemetry::new("fan", Some(Duration::millis(1_000)));
        let empty = Sample { temperature: None };
        assert!(telemetry.poll(at(0), &empty).is_none());
        // Nothing was logged, so the next sample goes out straight away
        assert!(telemetry.poll(at(10), &sample(20.0)).is_some());
    }

    #[test]
    fn disabled_without_interval() {
        let mut telemetry = Telemetry::new("fan", None);
        assert!(telemetry.poll(at(0), &sample(20.0)).is_none());
        assert!(telemetry.poll(at(60_000), &sample(20.0)).is_none());
    }

    #[test]
    fn name_too_long() {
        let mut telemetry = Telemetry::new(
            "a_sensor_name_that_is_far_too_long",
            Some(Duration::millis(1)),
        );
        assert!(telemetry.poll(at(0), &sample(20.0)).is_none());
    }
}
