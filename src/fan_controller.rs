//! Fan speed controller

use num_traits::AsPrimitive;

use crate::{
    clock::Clock,
    config::FanConfig,
    controller::{pid::PidController, Controller, Mode},
    fan::Fan,
    reader::{Reading, TemperatureReader},
    thermometer::{Temperature, Thermometer},
};

/// Drives a fan from a temperature probe.
///
/// The fan is off until the temperature rises above the start threshold, then runs at a PID
/// controlled speed between the configured minimum and maximum until the temperature falls below
/// the stop threshold. Losing the probe stops the fan on the same tick.
pub struct FanController<T, C, F> {
    reader: TemperatureReader<T, C>,
    fan: F,
    pid: PidController,
    config: FanConfig,
    enabled: bool,
    temperature: Option<Temperature>,
    speed: f32,
}

impl<T: Thermometer, C: Clock, F: Fan> FanController<T, C, F> {
    pub fn new(reader: TemperatureReader<T, C>, fan: F, config: FanConfig) -> Self {
        Self {
            reader,
            fan,
            pid: PidController::from_config(&config),
            config,
            enabled: false,
            temperature: None,
            speed: 0.0,
        }
    }

    /// Run the controller for a single tick
    ///
    /// Polls the probe, updates the on/off state, computes the speed and writes it to the fan.
    /// Returns true if a fresh reading was used.
    #[cfg_attr(feature = "sizing", inline(never))]
    pub fn process(&mut self) -> bool {
        let reading = self.reader.read();

        match reading {
            Reading::NoSensor => {
                if self.enabled {
                    warn!("No temperature probe, stopping fan");
                }
                self.temperature = None;
                self.stop();
            }
            Reading::Ready(temp) => {
                self.temperature = Some(temp);
                self.apply_hysteresis();
            }
            Reading::Wait => self.apply_hysteresis(),
        }

        let mode = if self.enabled {
            Mode::Automatic
        } else {
            Mode::Manual
        };
        self.pid.set_mode(mode, self.speed);

        if let Some(temp) = self.temperature.filter(|_| self.enabled) {
            let now = self.reader.clock().now();
            if let Some(output) = self.pid.compute(now, temp, self.config.target()) {
                self.speed = output;
            }
        }

        let speed = self.speed();
        self.fan.set_speed(speed);

        if let Reading::Ready(temp) = reading {
            debug!(
                "Temperature: {=f32}, Fan: {=bool}, Speed: {=u8}",
                temp.to_num::<f32>(),
                self.enabled,
                speed
            );
            true
        } else {
            false
        }
    }

    fn apply_hysteresis(&mut self) {
        let Some(temp) = self.temperature else {
            return;
        };

        if self.enabled && temp < self.config.stop_threshold() {
            info!("Temperature {=f32} below stop threshold", temp.to_num::<f32>());
            self.stop();
        } else if !self.enabled && temp > self.config.start_threshold() {
            info!("Temperature {=f32} above start threshold", temp.to_num::<f32>());
            self.enabled = true;
            self.speed = f32::from(self.config.min_speed());
        }
    }

    fn stop(&mut self) {
        self.enabled = false;
        self.speed = 0.0;
    }

    /// Whether the feedback loop is driving the fan
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Speed last written to the fan
    pub fn speed(&self) -> u8 {
        self.speed.as_()
    }

    /// Last temperature read, `None` before the first reading or after the probe was lost
    pub const fn temperature(&self) -> Option<Temperature> {
        self.temperature
    }

    pub const fn target(&self) -> Temperature {
        self.config.target()
    }

    pub const fn config(&self) -> &FanConfig {
        &self.config
    }

    /// Whether the probe is currently connected
    pub const fn sensor_present(&self) -> bool {
        self.reader.is_connected()
    }

    pub const fn reader(&self) -> &TemperatureReader<T, C> {
        &self.reader
    }
    pub fn reader_mut(&mut self) -> &mut TemperatureReader<T, C> {
        &mut self.reader
    }

    pub const fn fan(&self) -> &F {
        &self.fan
    }
}
