use pid::Pid;

use crate::{
    clock::{self, Duration, Instant},
    config::{Direction, FanConfig, Gains},
    controller::{Controller, Mode},
    thermometer::Temperature,
};

/// PID controller with explicit direction, sample time and asymmetric output limits.
///
/// [`Pid`] only supports symmetric limits, so it provides the proportional and derivative terms
/// while the integral is kept here, clamped to `[min, max]`. `ki` and `kd` are scaled by the
/// sample time, and the output is only recomputed once per sample time.
pub struct PidController {
    pid: Pid<f32>,
    gains: Gains,
    direction: Direction,
    sample_time: Duration,
    min: f32,
    max: f32,
    mode: Mode,
    integral: f32,
    output: f32,
    last_compute: Option<Instant>,
}

impl PidController {
    /// Creates a controller in manual mode with outputs limited to `[0, 255]`.
    pub fn new(gains: Gains, direction: Direction, sample_time: Duration) -> Self {
        Self {
            pid: proportional_derivative(gains, direction, sample_time),
            gains,
            direction,
            sample_time,
            min: 0.0,
            max: f32::from(u8::MAX),
            mode: Mode::Manual,
            integral: 0.0,
            output: 0.0,
            last_compute: None,
        }
    }

    pub fn from_config(config: &FanConfig) -> Self {
        let mut pid = Self::new(config.gains(), config.direction(), config.sample_time());
        pid.set_output_limits(
            f32::from(config.min_speed()),
            f32::from(config.max_speed()),
        );
        pid
    }

    pub const fn gains(&self) -> Gains {
        self.gains
    }

    pub const fn direction(&self) -> Direction {
        self.direction
    }

    pub const fn sample_time(&self) -> Duration {
        self.sample_time
    }

    /// Picks up from `output` with no derivative history
    fn initialize(&mut self, output: f32) {
        self.pid = proportional_derivative(self.gains, self.direction, self.sample_time);
        self.integral = output.clamp(self.min, self.max);
        self.output = self.integral;
        self.last_compute = None;
    }
}

#[allow(clippy::cast_precision_loss)]
fn seconds(duration: Duration) -> f32 {
    duration.ticks().max(1) as f32 / 1000.0
}

/// P and D terms only, unlimited. The caller clamps the sum.
fn proportional_derivative(gains: Gains, direction: Direction, sample_time: Duration) -> Pid<f32> {
    let sign = direction.sign();

    let mut pid = Pid::new(0.0_f32, f32::MAX);
    pid.p(sign * gains.kp, f32::MAX)
        .d(sign * gains.kd / seconds(sample_time), f32::MAX);
    pid
}

impl Controller for PidController {
    fn set_output_limits(&mut self, min: f32, max: f32) {
        if min > max {
            return;
        }

        self.min = min;
        self.max = max;

        if self.mode == Mode::Automatic {
            self.integral = self.integral.clamp(min, max);
            self.output = self.output.clamp(min, max);
        }
    }

    fn set_mode(&mut self, mode: Mode, output: f32) {
        if self.mode == Mode::Manual && mode == Mode::Automatic {
            self.initialize(output);
        }
        self.mode = mode;
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn compute(&mut self, now: Instant, input: Temperature, setpoint: Temperature) -> Option<f32> {
        if self.mode == Mode::Manual {
            return None;
        }

        let input = input.to_num::<f32>();
        let setpoint = setpoint.to_num::<f32>();
        self.pid.setpoint = setpoint;

        let Some(last) = self.last_compute else {
            // First tick in automatic: start the sample clock and record the input for the
            // derivative term
            self.last_compute = Some(now);
            let _ = self.pid.next_control_output(input);
            return Some(self.output);
        };

        if clock::elapsed(last, now) < self.sample_time {
            return Some(self.output);
        }
        self.last_compute = Some(now);

        let output = self.pid.next_control_output(input);
        let ki = self.direction.sign() * self.gains.ki * seconds(self.sample_time);
        self.integral = (self.integral + ki * (setpoint - input)).clamp(self.min, self.max);
        self.output = (output.output + self.integral).clamp(self.min, self.max);

        trace!(
            "PID p: {=f32}, i: {=f32}, d: {=f32}",
            output.p,
            self.integral,
            output.d
        );

        Some(self.output)
    }
}
