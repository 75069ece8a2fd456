use embedded_hal::{
    blocking::delay::DelayUs,
    digital::v2::{InputPin, OutputPin},
};

use crate::{
    ds18b20::{Ds18b20, Resolution, CONVERT_T, FAMILY_CODE},
    onewire::{Address, Error, OneWire},
    thermometer::{Temperature, Thermometer, DISCONNECTED},
};

/// A single DS18B20 probe on a one-wire bus.
///
/// The first DS18B20 found by [`Thermometer::probe`] is the one being read. Bus errors are
/// reported as [`DISCONNECTED`].
pub struct Ds18b20Thermometer<P, D> {
    ow: OneWire<P>,
    therm: Option<Ds18b20>,
    resolution: Resolution,
    delay: D,
}

impl<P, E, D> Ds18b20Thermometer<P, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayUs<u32>,
{
    pub const fn new(ow: OneWire<P>, delay: D) -> Self {
        Self {
            ow,
            therm: None,
            resolution: Resolution::Bits12,
            delay,
        }
    }

    /// Resolution set on the probe when it is found
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Address of the probe being read, if any
    pub fn address(&self) -> Option<Address> {
        self.therm.map(|therm| therm.address())
    }

    pub fn devices(&mut self) -> impl Iterator<Item = Result<Address, Error<E>>> + '_ {
        self.ow.devices(&mut self.delay)
    }

    /// Searches the bus, returning the number of DS18B20s and the first one found.
    fn search(&mut self) -> (u8, Option<Ds18b20>) {
        let mut count = 0u8;
        let mut first = None;

        for addr in self.ow.devices(&mut self.delay) {
            let addr = match addr {
                Ok(addr) => addr,
                Err(e) => {
                    // An empty bus ends the search with an error as well
                    trace!("Device search stopped: {=str}", e.as_str());
                    break;
                }
            };

            if addr.family_code() != FAMILY_CODE {
                debug!("Ignoring device {}", addr);
                continue;
            }

            count = count.saturating_add(1);
            if first.is_none() {
                first = Ds18b20::new::<E>(addr).ok();
            }
        }

        (count, first)
    }
}

impl<P, E, D> Thermometer for Ds18b20Thermometer<P, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayUs<u32>,
{
    fn probe(&mut self) -> u8 {
        let (count, first) = self.search();
        self.therm = first;

        if let Some(mut therm) = first {
            info!("Found DS18B20 {} ({=u8} on bus)", therm.address(), count);

            if let Err(e) = therm.set_resolution(&mut self.ow, &mut self.delay, self.resolution) {
                warn!("Failed to set resolution: {=str}", e.as_str());
            }
        }

        count
    }

    fn request_conversion(&mut self) {
        // Broadcast so every probe on the bus converts at once
        if let Err(e) = self.ow.send_command(None, CONVERT_T, &mut self.delay) {
            warn!("Failed to request conversion: {=str}", e.as_str());
        }
    }

    fn read_converted(&mut self) -> Temperature {
        let Some(therm) = self.therm else {
            return DISCONNECTED;
        };

        match therm.read_data(&mut self.ow, &mut self.delay) {
            Ok(temp) => temp,
            Err(e) => {
                warn!("Failed to read {}: {=str}", therm.address(), e.as_str());
                DISCONNECTED
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onewire::tests::{FakeLine, NoDelay};

    #[test]
    fn empty_bus_reads_as_disconnected() {
        let mut therm = Ds18b20Thermometer::new(OneWire::new(FakeLine::new(false)), NoDelay);

        assert_eq!(therm.probe(), 0);
        assert_eq!(therm.address(), None);
        assert_eq!(therm.read_converted(), DISCONNECTED);

        // Requesting a conversion with nobody listening is not fatal
        therm.request_conversion();
    }
}
