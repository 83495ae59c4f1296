//! # Localisation module
//!
//! This module provides dead-reckoning localisation of the robot from its
//! wheel encoders. Positions are in millimetres in the table frame, angles in
//! radians, normalised into [-pi, pi). Degrees only appear when converting to
//! and from the outside world.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod odometry;
mod params;

pub use odometry::*;
pub use params::OdometryParams;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use util::maths::{norm_angle, norm_angle_deg_360};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose (position and orientation in the table frame) of the robot.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PoseDef")]
pub struct Pose {
    /// The position in the table frame
    ///
    /// Units: millimetres
    pub position_mm: Vector2<f64>,

    /// The orientation, angle to the table X axis, in [-pi, pi).
    ///
    /// Units: radians
    pub orientation_rad: f64,
}

/// Serialised representation of a pose, normalised through [`Pose::new`].
#[derive(Deserialize)]
struct PoseDef {
    position_mm: Vector2<f64>,
    orientation_rad: f64,
}

/// An incremental motion, or a speed when taken over one control period.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polar {
    /// Units: millimetres
    pub distance_mm: f64,

    /// Units: radians
    pub angle_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a new pose, normalising the orientation.
    pub fn new(x_mm: f64, y_mm: f64, orientation_rad: f64) -> Self {
        Self {
            position_mm: Vector2::new(x_mm, y_mm),
            orientation_rad: norm_angle(orientation_rad),
        }
    }

    /// Create a new pose from an orientation in degrees.
    pub fn from_deg(x_mm: f64, y_mm: f64, orientation_deg: f64) -> Self {
        Self::new(x_mm, y_mm, orientation_deg.to_radians())
    }

    pub fn x(&self) -> f64 {
        self.position_mm[0]
    }

    pub fn y(&self) -> f64 {
        self.position_mm[1]
    }

    /// The orientation in degrees, in [0, 360).
    pub fn orientation_deg(&self) -> f64 {
        norm_angle_deg_360(self.orientation_rad.to_degrees())
    }

    /// Straight line distance to another pose.
    pub fn distance_to(&self, other: &Pose) -> f64 {
        (other.position_mm - self.position_mm).norm()
    }

    /// Angle of the line from this pose to another, in [-pi, pi).
    pub fn bearing_to(&self, other: &Pose) -> f64 {
        let delta = other.position_mm - self.position_mm;
        norm_angle(delta[1].atan2(delta[0]))
    }

    /// The pose mirrored about the table Y axis, to play on the other side.
    ///
    /// x becomes -x and the orientation O becomes 180 - O (degrees).
    pub fn horizontal_mirror(&self) -> Self {
        Self::new(-self.x(), self.y(), PI - self.orientation_rad)
    }
}

impl From<PoseDef> for Pose {
    fn from(def: PoseDef) -> Self {
        Self::new(def.position_mm[0], def.position_mm[1], def.orientation_rad)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl Polar {
    pub fn new(distance_mm: f64, angle_rad: f64) -> Self {
        Self {
            distance_mm,
            angle_rad,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use util::maths::approx_eq;

    #[test]
    fn test_pose_conversions() {
        let pose = Pose::from_deg(100.0, -50.0, 270.0);

        assert!(approx_eq(pose.orientation_rad, -std::f64::consts::FRAC_PI_2, 1e-12));
        assert!(approx_eq(pose.orientation_deg(), 270.0, 1e-9));
        assert_eq!(pose.x(), 100.0);
        assert_eq!(pose.y(), -50.0);
    }

    #[test]
    fn test_distance_and_bearing() {
        let a = Pose::new(0.0, 0.0, 0.0);
        let b = Pose::new(-300.0, 400.0, 0.0);

        assert_eq!(a.distance_to(&b), 500.0);
        assert!(approx_eq(a.bearing_to(&b), 4f64.atan2(-3.0), 1e-12));
    }

    #[test]
    fn test_horizontal_mirror() {
        let pose = Pose::from_deg(-1200.0, 300.0, 30.0).horizontal_mirror();

        assert_eq!(pose.x(), 1200.0);
        assert_eq!(pose.y(), 300.0);
        assert!(approx_eq(pose.orientation_deg(), 150.0, 1e-9));
    }

    #[test]
    fn test_deserialise_normalises() {
        let raw = Pose {
            position_mm: Vector2::new(10.0, 20.0),
            orientation_rad: 3.0 * PI,
        };

        let json = serde_json::to_string(&raw).unwrap();
        let pose: Pose = serde_json::from_str(&json).unwrap();

        assert_eq!(pose.x(), 10.0);
        assert_eq!(pose.y(), 20.0);
        assert!(approx_eq(pose.orientation_rad, -PI, 1e-9));
    }
}
