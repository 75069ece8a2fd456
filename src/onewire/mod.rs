//! Bit-banged one-wire bus master.
//!
//! Works on any open-drain pin that can be both driven and sampled. Read slots run inside a
//! critical section since the sampling window is only a few microseconds wide.

mod address;
pub mod commands;
pub mod crc;
mod error;

use embedded_hal::{
    blocking::delay::DelayUs,
    digital::v2::{InputPin, OutputPin},
};

pub use self::{address::Address, error::*};

/// Reset pulse & presence timings in microseconds
const RESET_LOW_US: u32 = 480;
const PRESENCE_WAIT_US: u32 = 70;
const RESET_RECOVERY_US: u32 = 410;

pub struct OneWire<P> {
    pin: P,
}

impl<P, E> OneWire<P>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
{
    pub const fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn release(self) -> P {
        self.pin
    }

    /// Perform a reset initialization sequence
    ///
    /// Succeeds only if at least one device answered with a presence pulse.
    pub fn reset(&mut self, delay: &mut impl DelayUs<u32>) -> Result<(), E> {
        // Wait for the bus to be pulled high by the pull-up resistor
        let mut retries = 125;
        while self.pin.is_low()? {
            if retries == 0 {
                return Err(Error::BusNotHigh);
            }
            retries -= 1;
            delay.delay_us(2);
        }

        self.pin.set_low()?;
        delay.delay_us(RESET_LOW_US);

        self.pin.set_high()?;
        delay.delay_us(PRESENCE_WAIT_US);

        // Devices answer by holding the bus low
        let presence = self.pin.is_low()?;
        delay.delay_us(RESET_RECOVERY_US);

        if presence {
            Ok(())
        } else {
            Err(Error::UnexpectedResponse)
        }
    }

    /// Write a single bit to the bus
    pub fn write_bit(&mut self, bit: bool, delay: &mut impl DelayUs<u32>) -> Result<(), E> {
        // A 1 is a short low pulse, a 0 holds the bus low for most of the slot
        let (low, recovery) = if bit { (10, 55) } else { (65, 5) };

        self.pin.set_low()?;
        delay.delay_us(low);
        self.pin.set_high()?;
        delay.delay_us(recovery);

        Ok(())
    }

    /// Read a single bit from the bus
    pub fn read_bit(&mut self, delay: &mut impl DelayUs<u32>) -> Result<bool, E> {
        let bit = critical_section::with(|_| {
            self.pin.set_low()?;
            delay.delay_us(1);
            self.pin.set_high()?;

            // Give the device time to drive the bus
            delay.delay_us(1);
            self.pin.is_high()
        })?;

        // Wait for the end of the timeslot
        delay.delay_us(53);

        Ok(bit)
    }

    /// Write a single byte to the bus, LSB first
    pub fn write_byte(&mut self, byte: u8, delay: &mut impl DelayUs<u32>) -> Result<(), E> {
        for i in 0..8 {
            self.write_bit((byte >> i) & 1 == 1, delay)?;
        }
        Ok(())
    }

    /// Read a single byte from the bus, LSB first
    pub fn read_byte(&mut self, delay: &mut impl DelayUs<u32>) -> Result<u8, E> {
        let mut byte = 0;
        for i in 0..8 {
            if self.read_bit(delay)? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Do a ROM select
    pub fn select_address(
        &mut self,
        device: &Address,
        delay: &mut impl DelayUs<u32>,
    ) -> Result<(), E> {
        self.write_byte(commands::MATCH_ROM, delay)?;
        for byte in device.0.to_le_bytes() {
            self.write_byte(byte, delay)?;
        }
        Ok(())
    }

    /// Do a ROM skip, addressing every device on the bus
    pub fn skip_address(&mut self, delay: &mut impl DelayUs<u32>) -> Result<(), E> {
        self.write_byte(commands::SKIP_ROM, delay)
    }

    /// Get iterator over all devices on the bus
    pub fn devices<'a, 'd, D: DelayUs<u32>>(
        &'a mut self,
        delay: &'d mut D,
    ) -> DeviceSearch<'a, 'd, P, D> {
        DeviceSearch {
            wire: self,
            last_discrepancy: 0,
            last_device_flag: false,
            done: false,
            rom_no: [0; 8],
            delay,
        }
    }

    /// Send a command to the bus
    ///
    /// Does the following sequence:
    /// 1. Reset the bus
    /// 2. Select the given address, or skip if None
    /// 3. Write the command byte
    pub fn send_command(
        &mut self,
        address: Option<&Address>,
        command: u8,
        delay: &mut impl DelayUs<u32>,
    ) -> Result<(), E> {
        self.reset(delay)?;
        match address {
            Some(address) => self.select_address(address, delay)?,
            None => self.skip_address(delay)?,
        }
        self.write_byte(command, delay)
    }
}

/// ROM search over the bus (Maxim application note 187).
pub struct DeviceSearch<'a, 'd, P, D> {
    wire: &'a mut OneWire<P>,
    last_discrepancy: u8,
    last_device_flag: bool,
    done: bool,
    rom_no: [u8; 8],
    delay: &'d mut D,
}

impl<P, E, D> DeviceSearch<'_, '_, P, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayUs<u32>,
{
    /// Finds the next device, or `None` once every device has been returned.
    pub fn search(&mut self) -> Result<Option<Address>, E> {
        if self.done || self.last_device_flag {
            return Ok(None);
        }

        self.wire.reset(self.delay)?;
        self.wire.write_byte(commands::SEARCH_NORMAL, self.delay)?;

        let mut last_zero = 0u8;
        for id_bit_number in 1..=64u8 {
            let byte = usize::from((id_bit_number - 1) / 8);
            let mask = 1u8 << ((id_bit_number - 1) % 8);

            let id_bit = self.wire.read_bit(self.delay)?;
            let cmp_id_bit = self.wire.read_bit(self.delay)?;

            let direction = match (id_bit, cmp_id_bit) {
                // Nobody answered this bit
                (true, true) => {
                    self.done = true;
                    return Err(Error::UnexpectedResponse);
                }
                // Every remaining device agrees on this bit
                (a, b) if a != b => id_bit,
                // Discrepancy
                _ => {
                    let direction = if id_bit_number < self.last_discrepancy {
                        self.rom_no[byte] & mask != 0
                    } else {
                        id_bit_number == self.last_discrepancy
                    };
                    if !direction {
                        last_zero = id_bit_number;
                    }
                    direction
                }
            };

            if direction {
                self.rom_no[byte] |= mask;
            } else {
                self.rom_no[byte] &= !mask;
            }
            self.wire.write_bit(direction, self.delay)?;
        }

        self.last_discrepancy = last_zero;
        self.last_device_flag = last_zero == 0;

        if let Err(e) = crc::check_crc8(&self.rom_no) {
            self.done = true;
            return Err(e);
        }
        if self.rom_no[0] == 0 {
            self.done = true;
            return Err(Error::UnexpectedResponse);
        }

        Ok(Some(Address(u64::from_le_bytes(self.rom_no))))
    }
}

impl<P, E, D> Iterator for DeviceSearch<'_, '_, P, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayUs<u32>,
{
    type Item = Result<Address, E>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.search() {
            Ok(addr) => addr.map(Ok),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
