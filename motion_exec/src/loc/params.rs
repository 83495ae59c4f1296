//! Odometry parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::OdometryMode;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the encoder based odometry.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OdometryParams {
    /// Distance travelled by a wheel for one encoder pulse.
    ///
    /// Units: millimetres
    pub mm_per_pulse: f64,

    /// Distance between the two encoder wheels.
    ///
    /// Units: millimetres
    pub wheels_distance_mm: f64,

    /// Integration used by `Odometry::update`.
    #[serde(default)]
    pub mode: OdometryMode,
}
