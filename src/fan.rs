//! Fan output driver.

use embedded_hal::PwmPin;

/// A fan whose speed is set as a duty cycle from 0 (stopped) to 255 (full speed).
pub trait Fan {
    /// Set the fan speed. Writing is immediate and idempotent.
    fn set_speed(&mut self, speed: u8);
}

/// A fan driven by a PWM channel.
pub struct PwmFan<PIN> {
    pin: PIN,
}

impl<PIN: PwmPin<Duty = u16>> PwmFan<PIN> {
    /// Wraps `pin`, enabling the channel with the fan stopped.
    pub fn new(mut pin: PIN) -> Self {
        pin.set_duty(0);
        pin.enable();
        Self { pin }
    }

    pub fn release(mut self) -> PIN {
        self.pin.disable();
        self.pin
    }

    /// Duty for `speed` on a channel whose full scale is `max_duty`
    #[inline]
    #[must_use]
    pub fn duty_for(speed: u8, max_duty: u16) -> u16 {
        let duty = u32::from(max_duty) * u32::from(speed) / u32::from(u8::MAX);
        u16::try_from(duty).unwrap_or(max_duty)
    }
}

impl<PIN: PwmPin<Duty = u16>> Fan for PwmFan<PIN> {
    fn set_speed(&mut self, speed: u8) {
        let duty = Self::duty_for(speed, self.pin.get_max_duty());
        self.pin.set_duty(duty);
    }
}

/// Fake fan for testing
#[cfg(any(test, feature = "fake"))]
pub mod fake {
    use super::Fan;

    /// Remembers the last speed written and how many writes happened
    #[derive(Debug, Default)]
    pub struct FakeFan {
        speed: u8,
        writes: u32,
    }

    impl FakeFan {
        pub const fn new() -> Self {
            Self { speed: 0, writes: 0 }
        }

        pub const fn speed(&self) -> u8 {
            self.speed
        }

        pub const fn writes(&self) -> u32 {
            self.writes
        }
    }

    impl Fan for FakeFan {
        fn set_speed(&mut self, speed: u8) {
            self.speed = speed;
            self.writes += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakePwm {
        duty: u16,
        max: u16,
        enabled: bool,
    }

    impl PwmPin for FakePwm {
        type Duty = u16;

        fn disable(&mut self) {
            self.enabled = false;
        }

        fn enable(&mut self) {
            self.enabled = true;
        }

        fn get_duty(&self) -> u16 {
            self.duty
        }

        fn get_max_duty(&self) -> u16 {
            self.max
        }

        fn set_duty(&mut self, duty: u16) {
            self.duty = duty;
        }
    }

    #[test]
    fn starts_enabled_and_stopped() {
        let fan = PwmFan::new(FakePwm {
            duty: 123,
            max: 960,
            enabled: false,
        });
        let pin = fan.release();
        assert_eq!(pin.duty, 0);
        assert!(!pin.enabled);
    }

    #[test]
    fn scales_speed_to_duty() {
        let mut fan = PwmFan::new(FakePwm {
            duty: 0,
            max: 960,
            enabled: false,
        });
        assert!(fan.pin.enabled);

        fan.set_speed(255);
        assert_eq!(fan.pin.get_duty(), 960);

        fan.set_speed(40);
        assert_eq!(fan.pin.get_duty(), 150);

        fan.set_speed(0);
        assert_eq!(fan.pin.get_duty(), 0);
    }

    #[test]
    fn full_scale_u16() {
        assert_eq!(PwmFan::<FakePwm>::duty_for(255, u16::MAX), u16::MAX);
        assert_eq!(PwmFan::<FakePwm>::duty_for(128, u16::MAX), 32896);
    }
}
