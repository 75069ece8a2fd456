//! Temperature sensor interface

pub mod ds18b20;

use fixed::types::I28F4;

/// I28F4 is a fixed point number with 4 fractional bits and 28 integer bits.
/// This gives us a precision of 0.0625 degrees Celsius & a range of (-2^27, 2^27 - 0.0625).
pub type Temperature = I28F4;

/// Value reported by a probe whose first conversion has not completed yet (power-on scratchpad).
pub const NOT_INITIALIZED: Temperature = Temperature::const_from_int(85);

/// Value reported when the probe does not answer on the bus.
pub const DISCONNECTED: Temperature = Temperature::const_from_int(-127);

/// Returns true if `temp` is one of the values a probe reports instead of a measurement.
#[inline]
#[must_use]
pub fn is_sentinel(temp: Temperature) -> bool {
    temp == NOT_INITIALIZED || temp == DISCONNECTED
}

/// Non-blocking access to a single temperature probe.
///
/// Conversions are asynchronous: [`Thermometer::request_conversion`] returns immediately and the
/// value read by [`Thermometer::read_converted`] is only meaningful once the probe's conversion
/// time has passed.
#[cfg_attr(test, mockall::automock)]
pub trait Thermometer {
    /// Looks for probes on the bus and returns how many answered.
    fn probe(&mut self) -> u8;

    /// Starts a new conversion
    fn request_conversion(&mut self);

    /// Read the last converted temperature in degrees Celsius
    ///
    /// Returns [`NOT_INITIALIZED`] or [`DISCONNECTED`] when no valid measurement is available.
    fn read_converted(&mut self) -> Temperature;
}

/// Fake thermometer for testing
#[cfg(any(test, feature = "fake"))]
pub mod fake {
    use crate::thermometer::{Temperature, Thermometer, DISCONNECTED};

    /// A fake probe that reports a settable temperature and can be unplugged
    pub struct FakeThermometer {
        temp: Temperature,
        present: bool,
        conversions: u32,
    }

    impl FakeThermometer {
        pub fn new(temp: impl Into<Temperature>) -> Self {
            Self {
                temp: temp.into(),
                present: true,
                conversions: 0,
            }
        }

        /// A fake with no probe on the bus
        pub fn absent() -> Self {
            Self {
                temp: DISCONNECTED,
                present: false,
                conversions: 0,
            }
        }

        /// Get the current temperature
        pub fn temp(&self) -> Temperature {
            self.temp
        }
        /// Get a mutable reference to the current temperature
        pub fn temp_mut(&mut self) -> &mut Temperature {
            &mut self.temp
        }

        pub fn set_present(&mut self, present: bool) {
            self.present = present;
        }

        /// Number of conversions requested so far
        pub fn conversions(&self) -> u32 {
            self.conversions
        }
    }

    impl Thermometer for FakeThermometer {
        fn probe(&mut self) -> u8 {
            u8::from(self.present)
        }

        fn request_conversion(&mut self) {
            self.conversions += 1;
        }

        fn read_converted(&mut self) -> Temperature {
            if self.present {
                self.temp
            } else {
                DISCONNECTED
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        assert!(is_sentinel(Temperature::from_num(85)));
        assert!(is_sentinel(Temperature::from_num(-127)));
        assert!(!is_sentinel(Temperature::from_num(84.9375)));
        assert!(!is_sentinel(Temperature::from_num(25)));
    }
}
