//! # Control stages
//!
//! Controllers and filters sharing one contract: `compute` turns the input of
//! the stage into its output, `reset` clears whatever memory the stage has.
//! Stages are chained into a [`Pipeline`] to build a cascade, typically a slow
//! position loop producing a speed order for a fast speed loop:
//!
//! ```text
//! position error -> PoseReached -> Pid -> RateShaping -> Deceleration -> AntiBlocking -> Pid (speed) -> command
//! ```

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod anti_blocking;
mod deceleration;
mod pid;
mod pipeline;
mod pose_filter;
mod rate_shaping;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use anti_blocking::*;
pub use deceleration::*;
pub use pid::*;
pub use pipeline::*;
pub use pose_filter::*;
pub use rate_shaping::*;

use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Measured state of the controlled axis, sampled once at the start of a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Feedback {
    /// Units: axis units
    pub position: f64,

    /// Units: axis units per control period
    pub speed: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Status raised by a stage, ordered by increasing severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum StageStatus {
    Moving,
    Reached,
    Blocked,
}
