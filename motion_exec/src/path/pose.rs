//! # Path poses
//!
//! A path pose is a target pose plus the constraints applied while moving
//! towards it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::loc::Pose;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A waypoint of a [`super::Path`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "PathPoseDef")]
pub struct PathPose {
    /// Target pose
    pub pose: Pose,

    /// Direction the robot may move in to reach the pose
    pub motion_direction: MotionDirection,

    /// Ratios of the maximum speeds allowed, in [0, 1]
    pub max_speed_ratio: SpeedRatio,

    /// Do not check for stalls while moving to this pose
    pub bypass_anti_blocking: bool,

    /// Do not turn to the pose orientation once its position is reached
    pub bypass_final_orientation: bool,

    /// Time allowed to reach the pose, `None` to use the actuator default.
    ///
    /// Units: milliseconds
    pub timeout_ms: Option<u32>,

    /// The pose only shapes the trajectory, nothing is done once it is reached
    pub is_intermediate: bool,
}

/// Linear and angular speed ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedRatio {
    pub linear: f64,
    pub angular: f64,
}

/// Parameter file representation of a path pose, orientation in degrees.
#[derive(Debug, Clone, Deserialize)]
struct PathPoseDef {
    x_mm: f64,
    y_mm: f64,
    orientation_deg: f64,

    #[serde(default)]
    motion_direction: MotionDirection,

    #[serde(default = "default_ratio")]
    max_speed_ratio_linear: f64,

    #[serde(default = "default_ratio")]
    max_speed_ratio_angular: f64,

    #[serde(default)]
    bypass_anti_blocking: bool,

    #[serde(default)]
    bypass_final_orientation: bool,

    /// 0 means no specific timeout
    #[serde(default)]
    timeout_ms: u32,

    #[serde(default)]
    is_intermediate: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Allowed motion direction towards a pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionDirection {
    Bidirectional,
    ForwardOnly,
    BackwardOnly,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for MotionDirection {
    fn default() -> Self {
        MotionDirection::Bidirectional
    }
}

impl SpeedRatio {
    /// Create a new ratio pair, clamped into [0, 1].
    pub fn new(linear: f64, angular: f64) -> Self {
        Self {
            linear: clamp(linear, 0.0, 1.0),
            angular: clamp(angular, 0.0, 1.0),
        }
    }
}

impl SpeedRatio {
    /// The same ratios bounded to [0, 1].
    pub fn clamped(&self) -> Self {
        Self::new(self.linear, self.angular)
    }
}

impl Default for SpeedRatio {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

impl PathPose {
    /// A pose reachable in any direction at full speed with default timeout.
    pub fn new(pose: Pose) -> Self {
        Self {
            pose,
            motion_direction: MotionDirection::default(),
            max_speed_ratio: SpeedRatio::default(),
            bypass_anti_blocking: false,
            bypass_final_orientation: false,
            timeout_ms: None,
            is_intermediate: false,
        }
    }

    pub fn with_speed_ratio(mut self, linear: f64, angular: f64) -> Self {
        self.max_speed_ratio = SpeedRatio::new(linear, angular);
        self
    }

    pub fn with_motion_direction(mut self, direction: MotionDirection) -> Self {
        self.motion_direction = direction;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = Some(timeout_ms).filter(|t| *t != 0);
        self
    }

    /// Mirror the pose about the table Y axis.
    pub fn horizontal_mirror(&mut self) {
        self.pose = self.pose.horizontal_mirror();
    }
}

impl From<PathPoseDef> for PathPose {
    fn from(def: PathPoseDef) -> Self {
        Self {
            pose: Pose::from_deg(def.x_mm, def.y_mm, def.orientation_deg),
            motion_direction: def.motion_direction,
            max_speed_ratio: SpeedRatio::new(
                def.max_speed_ratio_linear,
                def.max_speed_ratio_angular,
            ),
            bypass_anti_blocking: def.bypass_anti_blocking,
            bypass_final_orientation: def.bypass_final_orientation,
            timeout_ms: Some(def.timeout_ms).filter(|t| *t != 0),
            is_intermediate: def.is_intermediate,
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn default_ratio() -> f64 {
    1.0
}
