//! Temperature driven fan controller.
//!
//! A [`reader::TemperatureReader`] polls a one-wire temperature probe without blocking, and a
//! [`fan_controller::FanController`] turns its readings into a PWM fan speed through a
//! hysteresis gate and a PID loop.
#![cfg_attr(not(test), no_std)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
mod fmt;

pub mod clock;
pub mod config;
pub mod controller;
pub mod ds18b20;
pub mod fan;
pub mod fan_controller;
pub mod onewire;
pub mod reader;
pub mod telemetry;
pub mod thermometer;

pub use self::{
    config::FanConfig,
    fan_controller::FanController,
    reader::{Reading, TemperatureReader},
    thermometer::Temperature,
};
