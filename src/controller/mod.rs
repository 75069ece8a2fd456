//! Feedback controllers turning a temperature into a fan speed.

use crate::{clock::Instant, thermometer::Temperature};

pub mod pid;

/// Whether the controller drives its output.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// The loop is closed; [`Controller::compute`] produces outputs.
    Automatic,
    /// The loop is open; internal state is frozen and no output is produced.
    Manual,
}

pub trait Controller {
    /// Clamp future outputs to `[min, max]`
    fn set_output_limits(&mut self, min: f32, max: f32);

    /// Switch between automatic and manual mode
    ///
    /// Switching from manual to automatic picks up from `output`, the value currently driving the
    /// plant, with no derivative history.
    fn set_mode(&mut self, mode: Mode, output: f32);

    fn mode(&self) -> Mode;

    /// Run the controller for a single tick
    ///
    /// The output is recomputed at most once per sample time. Returns the current clamped output,
    /// or `None` in manual mode.
    fn compute(&mut self, now: Instant, input: Temperature, setpoint: Temperature) -> Option<f32>;
}
