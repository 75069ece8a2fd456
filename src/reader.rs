//! Non-blocking temperature polling.

use crate::{
    clock::{self, Clock, Duration, Instant},
    ds18b20::Resolution,
    thermometer::{is_sentinel, Temperature, Thermometer},
};

/// Minimum time between two readings, the DS18B20 conversion time at 12 bits.
pub const MEASUREMENT_INTERVAL: Duration = Resolution::Bits12.conversion_time();

/// Outcome of [`TemperatureReader::read`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Reading {
    /// A fresh measurement
    Ready(Temperature),
    /// A conversion is in flight
    Wait,
    /// No probe answered, or the probe reported an invalid value
    NoSensor,
}

/// Polls a [`Thermometer`] no more often than once per interval.
///
/// The probe is (re)connected on demand, so a probe that is unplugged and plugged back in is
/// picked up again without outside help.
pub struct TemperatureReader<T, C> {
    therm: T,
    clock: C,
    interval: Duration,
    connected: bool,
    last_measurement: Instant,
}

impl<T: Thermometer, C: Clock> TemperatureReader<T, C> {
    pub fn new(therm: T, clock: C) -> Self {
        Self::with_interval(therm, clock, MEASUREMENT_INTERVAL)
    }

    pub fn with_interval(therm: T, clock: C, interval: Duration) -> Self {
        Self {
            therm,
            clock,
            interval,
            connected: false,
            last_measurement: Instant::from_ticks(0),
        }
    }

    /// Whether the probe answered the last connection attempt and has not failed since
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    pub const fn thermometer(&self) -> &T {
        &self.therm
    }
    pub fn thermometer_mut(&mut self) -> &mut T {
        &mut self.therm
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Probes the bus and starts the first conversion if a probe answers.
    fn connect(&mut self) -> bool {
        if self.therm.probe() == 0 {
            return false;
        }

        info!("Temperature probe connected");
        self.connected = true;
        self.therm.request_conversion();
        self.last_measurement = self.clock.now();
        true
    }

    /// Poll the probe
    pub fn read(&mut self) -> Reading {
        if !self.connected && !self.connect() {
            return Reading::NoSensor;
        }

        let now = self.clock.now();
        if clock::elapsed(self.last_measurement, now) < self.interval {
            return Reading::Wait;
        }

        let temp = self.therm.read_converted();
        if is_sentinel(temp) {
            warn!(
                "Temperature probe lost (read {=f32})",
                temp.to_num::<f32>()
            );
            self.connected = false;
            return Reading::NoSensor;
        }

        // Start the next conversion right away so it is ready one interval from now
        self.therm.request_conversion();
        self.last_measurement = now;

        Reading::Ready(temp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::fake::FakeClock,
        thermometer::{fake::FakeThermometer, MockThermometer, DISCONNECTED, NOT_INITIALIZED},
    };

    fn temp(value: f32) -> Temperature {
        Temperature::from_num(value)
    }

    fn reader(t: f32) -> TemperatureReader<FakeThermometer, FakeClock> {
        TemperatureReader::new(FakeThermometer::new(temp(t)), FakeClock::new(10_000))
    }

    #[test]
    fn no_probe() {
        let mut therm = MockThermometer::new();
        therm.expect_probe().times(3).return_const(0u8);
        therm.expect_request_conversion().never();
        therm.expect_read_converted().never();

        let mut reader = TemperatureReader::new(therm, FakeClock::new(0));
        for _ in 0..3 {
            assert_eq!(reader.read(), Reading::NoSensor);
            reader.clock_mut().advance(Duration::millis(1_000));
        }
        assert!(!reader.is_connected());
    }

    #[test]
    fn connect_starts_conversion_and_waits() {
        let mut therm = MockThermometer::new();
        therm.expect_probe().times(1).return_const(1u8);
        // Once when connecting, once after the reading
        therm.expect_request_conversion().times(2).return_const(());
        therm
            .expect_read_converted()
            .times(1)
            .return_const(temp(21.5));

        let mut reader = TemperatureReader::new(therm, FakeClock::new(0));

        assert_eq!(reader.read(), Reading::Wait);
        assert!(reader.is_connected());

        reader.clock_mut().advance(Duration::millis(749));
        assert_eq!(reader.read(), Reading::Wait);

        reader.clock_mut().advance(Duration::millis(1));
        assert_eq!(reader.read(), Reading::Ready(temp(21.5)));
    }

    #[test]
    fn readings_are_at_least_one_interval_apart() {
        let mut reader = reader(30.0);
        let mut last_ready: Option<u32> = None;

        for _ in 0..5_000 {
            if let Reading::Ready(_) = reader.read() {
                let now = reader.clock().now().ticks();
                if let Some(last) = last_ready {
                    assert!(now - last >= 750, "{last} -> {now}");
                }
                last_ready = Some(now);
            }
            reader.clock_mut().advance(Duration::millis(7));
        }

        assert!(last_ready.is_some());
    }

    #[test]
    fn sentinel_disconnects_and_reconnects() {
        let mut reader = reader(30.0);
        assert_eq!(reader.read(), Reading::Wait);
        reader.clock_mut().advance(MEASUREMENT_INTERVAL);
        assert_eq!(reader.read(), Reading::Ready(temp(30.0)));

        *reader.thermometer_mut().temp_mut() = NOT_INITIALIZED;
        reader.clock_mut().advance(MEASUREMENT_INTERVAL);
        assert_eq!(reader.read(), Reading::NoSensor);
        assert!(!reader.is_connected());

        // Next call probes again and starts over
        *reader.thermometer_mut().temp_mut() = temp(31.0);
        assert_eq!(reader.read(), Reading::Wait);
        assert!(reader.is_connected());
        reader.clock_mut().advance(MEASUREMENT_INTERVAL);
        assert_eq!(reader.read(), Reading::Ready(temp(31.0)));
    }

    #[test]
    fn unplugged_probe() {
        let mut reader = reader(30.0);
        assert_eq!(reader.read(), Reading::Wait);

        reader.thermometer_mut().set_present(false);
        reader.clock_mut().advance(MEASUREMENT_INTERVAL);
        assert_eq!(reader.read(), Reading::NoSensor);
        assert_eq!(reader.read(), Reading::NoSensor);

        reader.thermometer_mut().set_present(true);
        assert_eq!(reader.read(), Reading::Wait);
    }

    #[test]
    fn disconnected_sentinel() {
        let mut therm = MockThermometer::new();
        therm.expect_probe().return_const(1u8);
        therm.expect_request_conversion().times(1).return_const(());
        therm.expect_read_converted().return_const(DISCONNECTED);

        let mut reader = TemperatureReader::new(therm, FakeClock::new(0));
        assert_eq!(reader.read(), Reading::Wait);
        reader.clock_mut().advance(MEASUREMENT_INTERVAL);
        assert_eq!(reader.read(), Reading::NoSensor);
    }

    #[test]
    fn wait_has_no_side_effects() {
        let mut reader = reader(30.0);
        assert_eq!(reader.read(), Reading::Wait);
        let conversions = reader.thermometer().conversions();

        for _ in 0..10 {
            assert_eq!(reader.read(), Reading::Wait);
        }
        assert_eq!(reader.thermometer().conversions(), conversions);
    }

    #[test]
    fn interval_survives_clock_wraparound() {
        let mut reader = TemperatureReader::new(
            FakeThermometer::new(temp(25.0)),
            FakeClock::new(u32::MAX - 100),
        );
        assert_eq!(reader.read(), Reading::Wait);

        // 500ms later the counter has wrapped, but the interval has not passed
        reader.clock_mut().set(399);
        assert_eq!(reader.read(), Reading::Wait);

        reader.clock_mut().set(649);
        assert_eq!(reader.read(), Reading::Ready(temp(25.0)));
    }

    #[test]
    fn custom_interval() {
        let mut reader = TemperatureReader::with_interval(
            FakeThermometer::new(temp(25.0)),
            FakeClock::new(0),
            Duration::millis(94),
        );
        assert_eq!(reader.interval(), Duration::millis(94));
        assert_eq!(reader.read(), Reading::Wait);
        reader.clock_mut().advance(Duration::millis(94));
        assert_eq!(reader.read(), Reading::Ready(temp(25.0)));
    }

    #[test]
    fn probe_count_above_one_connects() {
        let mut therm = MockThermometer::new();
        therm.expect_probe().times(1).return_const(3u8);
        therm.expect_request_conversion().return_const(());

        let mut reader = TemperatureReader::new(therm, FakeClock::new(0));
        assert_eq!(reader.read(), Reading::Wait);
        assert!(reader.is_connected());
    }
}
