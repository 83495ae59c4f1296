//! Motor control engine parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::ctrl::PipelineParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of one motor control engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineParams {
    /// Period of the control loop.
    ///
    /// Units: milliseconds
    #[serde(default = "default_period_ms")]
    pub period_ms: u32,

    /// Timeout used when a command does not give one, 0 for no timeout.
    ///
    /// Units: milliseconds
    #[serde(default)]
    pub default_timeout_ms: u32,

    /// Bound of the duty cycle written to the driver.
    ///
    /// Units: percent
    #[serde(default = "default_max_duty_percent")]
    pub max_duty_percent: f64,

    /// Stages run each cycle, seeded with the position error
    pub pipeline: PipelineParams,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_period_ms() -> u32 {
    20
}

fn default_max_duty_percent() -> f64 {
    100.0
}
