//! # PID controller
//!
//! A discrete PID controller evaluated once per control period. The integral
//! is a plain sum of the errors and the derivative a plain difference, so the
//! gains are expressed per control period rather than per second.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::Feedback;
use util::maths::clamp_sym;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains and limits of a PID controller.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct PidParams {
    /// Proportional gain
    pub kp: f64,

    /// Integral gain
    pub ki: f64,

    /// Derivative gain
    pub kd: f64,

    /// Bound on the magnitude of the integral accumulator.
    ///
    /// Unbounded if not given.
    #[serde(default = "default_integral_limit")]
    pub integral_limit: f64,

    /// Which signal the controller acts upon when used as a pipeline stage.
    #[serde(default)]
    pub input: PidInput,
}

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct Pid {
    params: PidParams,

    /// The integral accumulation
    integral: f64,

    /// Previous error
    prev_error: f64,
}

/// A PID controller wrapped for use in a [`super::Pipeline`].
#[derive(Debug, Clone)]
pub struct PidStage {
    pid: Pid,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The error fed to a PID stage.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidInput {
    /// The stage input is the error itself (position loop).
    Error,

    /// The stage input is a speed order, the error is the order minus the
    /// measured speed (speed loop).
    SpeedOrder,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PidInput {
    fn default() -> Self {
        PidInput::Error
    }
}

impl PidParams {
    /// Gains with no integral limit, acting on the stage input directly.
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral_limit: default_integral_limit(),
            input: PidInput::Error,
        }
    }

    pub fn with_integral_limit(mut self, integral_limit: f64) -> Self {
        self.integral_limit = integral_limit.abs();
        self
    }

    pub fn with_input(mut self, input: PidInput) -> Self {
        self.input = input;
        self
    }
}

impl Pid {
    /// Create a new controller with the given gains.
    pub fn new(params: PidParams) -> Self {
        Self {
            params,
            integral: 0.0,
            prev_error: 0.0,
        }
    }

    /// Get the value of the controller for the given error.
    pub fn compute(&mut self, error: f64) -> f64 {
        // Accumulate then bound the integral term
        self.integral = clamp_sym(self.integral + error, self.params.integral_limit);

        let derivative = error - self.prev_error;
        self.prev_error = error;

        self.params.kp * error + self.params.ki * self.integral + self.params.kd * derivative
    }

    /// Clear the integral and previous error.
    ///
    /// The controller is never reset implicitly, callers do so when the
    /// setpoint jumps.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn params(&self) -> &PidParams {
        &self.params
    }
}

impl PidStage {
    pub fn new(params: PidParams) -> Self {
        Self {
            pid: Pid::new(params),
        }
    }

    pub fn compute(&mut self, input: f64, measured: &Feedback) -> f64 {
        let error = match self.pid.params.input {
            PidInput::Error => input,
            PidInput::SpeedOrder => input - measured.speed,
        };

        self.pid.compute(error)
    }

    pub fn reset(&mut self) {
        self.pid.reset()
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn default_integral_limit() -> f64 {
    f64::INFINITY
}

#[cfg(test)]
mod test {
    use super::*;

    /// Deterministic pseudo random error sequence in [-scale, scale].
    fn error_sequence(len: usize, scale: f64) -> Vec<f64> {
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                ((state % 20_001) as f64 / 10_000.0 - 1.0) * scale
            })
            .collect()
    }

    #[test]
    fn test_integral_stays_bounded() {
        let mut pid = Pid::new(PidParams::new(1.0, 0.5, 0.1).with_integral_limit(25.0));

        for e in error_sequence(10_000, 40.0) {
            pid.compute(e);
            assert!(pid.integral().abs() <= 25.0);
        }

        // Constant error saturates exactly at the limit
        for _ in 0..100 {
            pid.compute(-3.0);
        }
        assert_eq!(pid.integral(), -25.0);
    }

    #[test]
    fn test_compute_terms() {
        let mut pid = Pid::new(PidParams::new(2.0, 0.5, 1.0));

        // integral = 4, derivative = 4
        assert_eq!(pid.compute(4.0), 2.0 * 4.0 + 0.5 * 4.0 + 1.0 * 4.0);

        // integral = 5, derivative = -3
        assert_eq!(pid.compute(1.0), 2.0 * 1.0 + 0.5 * 5.0 + 1.0 * -3.0);
    }

    #[test]
    fn test_reset_isolates_state() {
        let params = PidParams::new(1.5, 0.2, 0.7).with_integral_limit(10.0);

        let mut used = Pid::new(params);
        for e in error_sequence(50, 5.0) {
            used.compute(e);
        }
        used.compute(3.0);
        used.reset();

        let mut fresh = Pid::new(params);

        assert_eq!(used.compute(3.0), fresh.compute(3.0));
    }

    #[test]
    fn test_speed_order_stage() {
        let mut stage = PidStage::new(PidParams::new(1.0, 0.0, 0.0).with_input(PidInput::SpeedOrder));
        let measured = Feedback {
            position: 0.0,
            speed: 3.0,
        };

        assert_eq!(stage.compute(5.0, &measured), 2.0);
    }

    #[test]
    fn test_params_from_toml() {
        let params: PidParams = util::params::from_str("kp = 1.0\nki = 0.1\nkd = 0.0").unwrap();

        assert_eq!(params.integral_limit, f64::INFINITY);
        assert_eq!(params.input, PidInput::Error);
    }
}
