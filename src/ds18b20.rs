//! Implementation for the DS18B20 temperature sensor.

use embedded_hal::{
    blocking::delay::DelayUs,
    digital::v2::{InputPin, OutputPin},
};

use crate::{
    clock::Duration,
    onewire::{crc::check_crc8, Address, Error, OneWire, Result},
    thermometer::Temperature,
};

pub const FAMILY_CODE: u8 = 0x28;

pub const CONVERT_T: u8 = 0x44;
pub const READ_SCRATCHPAD: u8 = 0xBE;
pub const WRITE_SCRATCHPAD: u8 = 0x4E;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ds18b20 {
    addr: Address,
}

impl Ds18b20 {
    /// Wraps the device at `addr`, checking that it is a DS18B20.
    pub fn new<E>(addr: Address) -> Result<Self, E> {
        if addr.family_code() == FAMILY_CODE {
            Ok(Self { addr })
        } else {
            Err(Error::FamilyCodeMismatch)
        }
    }

    #[inline]
    pub const fn address(&self) -> Address {
        self.addr
    }

    fn read_scratchpad<P, E>(
        &self,
        wire: &mut OneWire<P>,
        delay: &mut impl DelayUs<u32>,
    ) -> Result<[u8; 9], E>
    where
        P: InputPin<Error = E> + OutputPin<Error = E>,
    {
        wire.send_command(Some(&self.addr), READ_SCRATCHPAD, delay)?;

        let mut buf = [0u8; 9];
        for x in &mut buf {
            *x = wire.read_byte(delay)?;
        }

        check_crc8(&buf)?;

        Ok(buf)
    }

    fn write_scratchpad<P, E>(
        &mut self,
        wire: &mut OneWire<P>,
        delay: &mut impl DelayUs<u32>,
        data: [u8; 3],
    ) -> Result<(), E>
    where
        P: InputPin<Error = E> + OutputPin<Error = E>,
    {
        wire.send_command(Some(&self.addr), WRITE_SCRATCHPAD, delay)?;
        for byte in data {
            wire.write_byte(byte, delay)?;
        }
        wire.reset(delay)
    }

    /// Sets the resolution of the sensor
    pub fn set_resolution<P, E>(
        &mut self,
        wire: &mut OneWire<P>,
        delay: &mut impl DelayUs<u32>,
        res: Resolution,
    ) -> Result<(), E>
    where
        P: InputPin<Error = E> + OutputPin<Error = E>,
    {
        let mut buf = self.read_scratchpad(wire, delay)?;
        buf[4] = res.to_config_register();
        self.write_scratchpad(wire, delay, [buf[2], buf[3], buf[4]])
    }

    /// Reads the temperature data from the sensor
    pub fn read_data<P, E>(
        &self,
        wire: &mut OneWire<P>,
        delay: &mut impl DelayUs<u32>,
    ) -> Result<Temperature, E>
    where
        P: InputPin<Error = E> + OutputPin<Error = E>,
    {
        let buf = self.read_scratchpad(wire, delay)?;
        decode_scratchpad(&buf).ok_or(Error::UnexpectedResponse)
    }
}

/// Decodes the temperature held in a (CRC checked) scratchpad.
///
/// Bits below the configured resolution are undefined and get masked off.
pub fn decode_scratchpad(buf: &[u8; 9]) -> Option<Temperature> {
    let resolution = Resolution::from_config_register(buf[4])?;

    let lsb = match resolution {
        Resolution::Bits9 => buf[0] & 0b1111_1000,
        Resolution::Bits10 => buf[0] & 0b1111_1100,
        Resolution::Bits11 => buf[0] & 0b1111_1110,
        Resolution::Bits12 => buf[0],
    };

    let value = i16::from_le_bytes([lsb, buf[1]]);
    Some(Temperature::from_bits(i32::from(value)))
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    Bits9,
    Bits10,
    Bits11,
    Bits12,
}

impl Resolution {
    const fn from_config_register(reg: u8) -> Option<Self> {
        match reg {
            0b0001_1111 => Some(Self::Bits9),
            0b0011_1111 => Some(Self::Bits10),
            0b0101_1111 => Some(Self::Bits11),
            0b0111_1111 => Some(Self::Bits12),
            _ => None,
        }
    }

    pub const fn to_config_register(self) -> u8 {
        match self {
            Self::Bits9 => 0b0001_1111,
            Self::Bits10 => 0b0011_1111,
            Self::Bits11 => 0b0101_1111,
            Self::Bits12 => 0b0111_1111,
        }
    }

    /// Maximum conversion time
    pub const fn conversion_time(self) -> Duration {
        match self {
            Self::Bits9 => Duration::millis(94),
            Self::Bits10 => Duration::millis(188),
            Self::Bits11 => Duration::millis(375),
            Self::Bits12 => Duration::millis(750),
        }
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use super::*;
    use crate::onewire::crc::crc8;

    fn scratchpad(lsb: u8, msb: u8, config: u8) -> [u8; 9] {
        let mut buf = [lsb, msb, 0x4B, 0x46, config, 0xFF, 0x0C, 0x10, 0];
        buf[8] = crc8(&buf[..8]);
        buf
    }

    #[test]
    fn decodes_datasheet_values() {
        let cases = [
            (0x07, 0xD0, 125.0),
            (0x01, 0x91, 25.0625),
            (0x00, 0x08, 0.5),
            (0xFF, 0x5E, -10.125),
            (0xFC, 0x90, -55.0),
        ];
        for (msb, lsb, expected) in cases {
            let buf = scratchpad(lsb, msb, Resolution::Bits12.to_config_register());
            assert_eq!(
                decode_scratchpad(&buf),
                Some(Temperature::from_num(expected)),
                "raw {msb:02X}{lsb:02X}"
            );
        }
    }

    #[test]
    fn power_on_value_is_not_initialized_sentinel() {
        let buf = scratchpad(0x50, 0x05, Resolution::Bits12.to_config_register());
        assert_eq!(
            decode_scratchpad(&buf),
            Some(crate::thermometer::NOT_INITIALIZED)
        );
    }

    #[test]
    fn masks_undefined_bits() {
        // 25.0625 at 9 bits is reported as 25.0
        let buf = scratchpad(0x91, 0x01, Resolution::Bits9.to_config_register());
        assert_eq!(decode_scratchpad(&buf), Some(Temperature::from_num(25)));
    }

    #[test]
    fn rejects_unknown_config_register() {
        let buf = scratchpad(0x91, 0x01, 0x00);
        assert_eq!(decode_scratchpad(&buf), None);
    }

    #[test]
    fn family_code_checked() {
        assert!(Ds18b20::new::<Infallible>(Address(0x05_00_00_0F_83_FB_60_28)).is_ok());
        assert_eq!(
            Ds18b20::new::<Infallible>(Address(0x05_00_00_0F_83_FB_60_10)),
            Err(Error::FamilyCodeMismatch)
        );
    }

    #[test]
    fn conversion_times() {
        assert_eq!(Resolution::Bits12.conversion_time(), Duration::millis(750));
        assert_eq!(Resolution::Bits9.conversion_time(), Duration::millis(94));
    }
}
