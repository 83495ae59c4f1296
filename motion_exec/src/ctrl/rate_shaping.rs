//! # Rate shaping filter
//!
//! Limits how fast a speed order may change from one cycle to the next
//! (acceleration) and bounds its magnitude (speed).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use util::maths::{clamp, clamp_sym};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the rate shaping filter.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct RateShapingParams {
    /// Maximum change of the output between two cycles.
    ///
    /// Units: axis units per control period per control period
    pub max_acceleration: f64,

    /// Maximum magnitude of the output at full speed ratio.
    ///
    /// Units: axis units per control period
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,

    /// Non-zero orders smaller than this are raised to it, so that the axis
    /// overcomes static friction.
    ///
    /// Units: axis units per control period
    #[serde(default)]
    pub min_speed: f64,
}

/// Ramp limiting stage.
#[derive(Debug, Clone)]
pub struct RateShapingFilter {
    params: RateShapingParams,

    /// Fraction of `max_speed` currently allowed, in [0, 1]
    speed_ratio: f64,

    previous_output: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RateShapingFilter {
    pub fn new(params: RateShapingParams) -> Self {
        Self {
            params,
            speed_ratio: 1.0,
            previous_output: 0.0,
        }
    }

    pub fn compute(&mut self, input: f64) -> f64 {
        let speed_limit = self.params.max_speed * self.speed_ratio;
        let target = clamp_sym(input, speed_limit);

        let step = clamp_sym(target - self.previous_output, self.params.max_acceleration);
        let mut output = self.previous_output + step;

        // Lift small orders towards the target, never past it
        if target != 0.0 && output.abs() < self.params.min_speed {
            let min_speed = self.params.min_speed.min(target.abs());
            if output.signum() == target.signum() || output == 0.0 {
                output = min_speed.copysign(target);
            }
        }

        output = clamp_sym(output, speed_limit);
        self.previous_output = output;

        output
    }

    pub fn reset(&mut self) {
        self.previous_output = 0.0;
    }

    /// Set the fraction of the maximum speed allowed. Survives `reset`.
    pub fn set_speed_ratio(&mut self, ratio: f64) {
        self.speed_ratio = clamp(ratio, 0.0, 1.0);
    }

    pub fn speed_ratio(&self) -> f64 {
        self.speed_ratio
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn default_max_speed() -> f64 {
    f64::INFINITY
}
