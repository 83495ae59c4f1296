//! # Odometry
//!
//! Integrates incremental motions (distance and angle travelled over one
//! period) into a pose. The integrated state is published through an
//! `ArcSwap` so that control loops read it without ever blocking on the
//! writer.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use arc_swap::ArcSwap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// Internal
use super::{OdometryParams, Polar, Pose};
use util::maths::norm_angle;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Angular increments smaller than this are integrated as straight segments.
///
/// Units: radians
pub const ARC_MIN_ANGLE_RAD: f64 = 1e-9;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A source of position and speed measurements for one controlled axis.
///
/// Implementations must not block: they are read from inside control loops.
pub trait OdometrySource: Send {
    /// Units: axis units
    fn get_position(&self) -> f64;

    /// Units: axis units per control period
    fn get_speed(&self) -> f64;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// State integrated by the odometry.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct OdometryState {
    pub pose: Pose,

    /// Motion over the last update
    pub speed: Polar,

    /// Signed distance travelled since the last pose reset.
    ///
    /// Units: millimetres
    pub distance_mm: f64,

    /// Unwrapped angle turned since the last pose reset.
    ///
    /// Units: radians
    pub angle_rad: f64,
}

/// Encoder based dead-reckoning odometry.
pub struct Odometry {
    params: OdometryParams,
    state: ArcSwap<OdometryState>,
}

/// One axis of an [`Odometry`], seen as an [`OdometrySource`].
#[derive(Clone)]
pub struct OdometryAxis {
    odometry: Arc<Odometry>,
    axis: Axis,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Integration scheme for one pose update.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OdometryMode {
    /// The motion is approximated by a straight segment followed by a rotation.
    Segment,

    /// The motion is approximated by an arc of circle.
    Arc,
}

/// Axes of a differential drive.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Axis {
    /// Distance travelled, in millimetres
    Linear,

    /// Angle turned, in radians
    Angular,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for OdometryMode {
    fn default() -> Self {
        OdometryMode::Arc
    }
}

impl Odometry {
    /// Create a new odometry starting from the given pose.
    pub fn new(params: OdometryParams, initial_pose: Pose) -> Self {
        Self {
            params,
            state: ArcSwap::from_pointee(OdometryState {
                pose: initial_pose,
                ..Default::default()
            }),
        }
    }

    /// Get a copy of the latest integrated state. Never blocks.
    pub fn snapshot(&self) -> OdometryState {
        **self.state.load()
    }

    pub fn pose(&self) -> Pose {
        self.state.load().pose
    }

    pub fn params(&self) -> &OdometryParams {
        &self.params
    }

    /// Integrate one incremental motion with the configured mode.
    pub fn update(&self, delta_distance_mm: f64, delta_angle_rad: f64) -> OdometryState {
        self.update_with_mode(delta_distance_mm, delta_angle_rad, self.params.mode)
    }

    /// Integrate one incremental motion with the given mode.
    pub fn update_with_mode(
        &self,
        delta_distance_mm: f64,
        delta_angle_rad: f64,
        mode: OdometryMode,
    ) -> OdometryState {
        self.state.rcu(|state| OdometryState {
            pose: update_pose(&state.pose, delta_distance_mm, delta_angle_rad, mode),
            speed: Polar::new(delta_distance_mm, delta_angle_rad),
            distance_mm: state.distance_mm + delta_distance_mm,
            angle_rad: state.angle_rad + delta_angle_rad,
        });

        self.snapshot()
    }

    /// Integrate the pulses counted by the left and right encoders since the
    /// last update.
    pub fn update_from_encoders(&self, left_pulses: i32, right_pulses: i32) -> OdometryState {
        let left_mm = left_pulses as f64 * self.params.mm_per_pulse;
        let right_mm = right_pulses as f64 * self.params.mm_per_pulse;

        self.update(
            (left_mm + right_mm) / 2.0,
            (right_mm - left_mm) / self.params.wheels_distance_mm,
        )
    }

    /// Force the pose, for instance at the start of a match or after a
    /// calibration against a border. Travelled distance and angle restart
    /// from zero.
    pub fn reset_pose(&self, pose: Pose) {
        debug!(
            "Odometry pose reset to ({:.1}, {:.1}, {:.1} deg)",
            pose.x(),
            pose.y(),
            pose.orientation_deg()
        );

        self.state.store(Arc::new(OdometryState {
            pose,
            ..Default::default()
        }));
    }
}

impl OdometryAxis {
    pub fn new(odometry: Arc<Odometry>, axis: Axis) -> Self {
        Self { odometry, axis }
    }
}

impl OdometrySource for OdometryAxis {
    fn get_position(&self) -> f64 {
        let state = self.odometry.snapshot();
        match self.axis {
            Axis::Linear => state.distance_mm,
            Axis::Angular => state.angle_rad,
        }
    }

    fn get_speed(&self) -> f64 {
        let state = self.odometry.snapshot();
        match self.axis {
            Axis::Linear => state.speed.distance_mm,
            Axis::Angular => state.speed.angle_rad,
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the pose reached after an incremental motion.
pub fn update_pose(
    pose: &Pose,
    delta_distance_mm: f64,
    delta_angle_rad: f64,
    mode: OdometryMode,
) -> Pose {
    let o = pose.orientation_rad;

    match mode {
        OdometryMode::Arc if delta_angle_rad.abs() >= ARC_MIN_ANGLE_RAD => {
            // Radius of the arc and its centre
            let r = delta_distance_mm / delta_angle_rad;
            let centre_x = pose.x() - r * o.sin();
            let centre_y = pose.y() + r * o.cos();

            let new_o = o + delta_angle_rad;

            Pose::new(
                centre_x + r * new_o.sin(),
                centre_y - r * new_o.cos(),
                norm_angle(new_o),
            )
        }
        _ => Pose::new(
            pose.x() + delta_distance_mm * o.cos(),
            pose.y() + delta_distance_mm * o.sin(),
            norm_angle(o + delta_angle_rad),
        ),
    }
}
