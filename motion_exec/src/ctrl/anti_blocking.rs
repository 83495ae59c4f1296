//! # Anti-blocking filter
//!
//! Detects a stalled axis by comparing the speed order of the previous cycle
//! with the measured speed. An axis pushing against an obstacle still moves a
//! little, so a low speed threshold is used rather than zero.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use serde::{Deserialize, Serialize};

// Internal
use super::{Feedback, StageStatus};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the anti-blocking filter.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct AntiBlockingParams {
    /// Disabled filters pass their input through unchanged.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Measured speed under which the axis may be blocked.
    ///
    /// Units: axis units per control period
    pub speed_threshold: f64,

    /// Minimum difference between the previous order and the measured speed
    /// for the axis to be considered blocked.
    ///
    /// Units: axis units per control period
    pub error_threshold: f64,

    /// Number of consecutive blocked cycles to exceed before the axis is
    /// declared blocked.
    pub blocked_cycles_threshold: u32,
}

/// Stall detector stage.
#[derive(Debug, Clone)]
pub struct AntiBlockingFilter {
    params: AntiBlockingParams,

    /// Bypass requested for the current command
    bypass: bool,

    /// Consecutive cycles spent apparently blocked
    blocked_cycles: u32,

    /// Output of the previous cycle
    previous_order: f64,

    /// Latched once the threshold is exceeded, cleared by reset
    blocked: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AntiBlockingFilter {
    pub fn new(params: AntiBlockingParams) -> Self {
        Self {
            params,
            bypass: false,
            blocked_cycles: 0,
            previous_order: 0.0,
            blocked: false,
        }
    }

    /// Pass the speed order through, or zero once the axis is blocked.
    pub fn compute(&mut self, input: f64, measured: &Feedback) -> f64 {
        if !self.params.enabled || self.bypass {
            self.previous_order = input;
            return input;
        }

        if self.blocked {
            return 0.0;
        }

        if measured.speed.abs() < self.params.speed_threshold
            && (self.previous_order - measured.speed).abs() > self.params.error_threshold
        {
            self.blocked_cycles += 1;
        } else {
            self.blocked_cycles = 0;
        }

        self.previous_order = input;

        if self.blocked_cycles > self.params.blocked_cycles_threshold {
            debug!(
                "Axis blocked after {} cycles (speed {:.3}, order {:.3})",
                self.blocked_cycles, measured.speed, input
            );
            self.blocked = true;
            return 0.0;
        }

        input
    }

    pub fn reset(&mut self) {
        self.blocked_cycles = 0;
        self.previous_order = 0.0;
        self.blocked = false;
    }

    pub fn status(&self) -> StageStatus {
        if self.blocked {
            StageStatus::Blocked
        } else {
            StageStatus::Moving
        }
    }

    /// Ignore stalls for the current command. Survives `reset`.
    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
    }

    pub fn blocked_cycles(&self) -> u32 {
        self.blocked_cycles
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn default_enabled() -> bool {
    true
}
