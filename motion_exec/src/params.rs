//! # Motion Executable Parameters
//!
//! This module provides the parameters of the motion executable, loaded from
//! `motion_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use motion_lib::{
    actuator::{MotorParams, OnOffParams, ServoParams},
    engine::EngineParams,
    loc::{OdometryParams, Pose},
    sim::{SimDriveParams, SimMotorParams},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MotionExecParams {
    /// Target period of one main loop cycle.
    ///
    /// Units: milliseconds
    pub cycle_period_ms: u32,

    /// Stop the execution after this duration, 0 to run until the path is finished.
    ///
    /// Units: seconds
    #[serde(default)]
    pub max_duration_s: f64,

    /// Pose of the robot at startup
    pub initial_pose: InitialPoseParams,

    pub odometry: OdometryParams,

    /// Engines of the drive base
    pub drive: DriveParams,

    #[serde(default)]
    pub sim_drive: SimDriveParams,

    #[serde(default)]
    pub actuators: ActuatorsParams,

    /// Commands dispatched to the actuators once they are built, in JSON
    #[serde(default)]
    pub startup_commands: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct InitialPoseParams {
    /// Units: millimetres
    pub x_mm: f64,

    /// Units: millimetres
    pub y_mm: f64,

    /// Units: degrees
    pub orientation_deg: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriveParams {
    /// Engine on the distance travelled, in millimetres
    pub linear: EngineParams,

    /// Engine on the angle turned, in radians
    pub angular: EngineParams,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActuatorsParams {
    #[serde(default)]
    pub motors: Vec<MotorParams>,

    #[serde(default)]
    pub on_offs: Vec<OnOffParams>,

    #[serde(default)]
    pub servos: Vec<ServoParams>,

    /// Number of channels of the servo driver board
    #[serde(default = "default_servo_board_channels")]
    pub servo_board_channels: u8,

    /// Plant simulating each motor
    #[serde(default)]
    pub sim_motor: SimMotorParams,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl InitialPoseParams {
    pub fn pose(&self) -> Pose {
        Pose::from_deg(self.x_mm, self.y_mm, self.orientation_deg)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_servo_board_channels() -> u8 {
    16
}

#[cfg(test)]
mod test {
    use super::*;
    use util::maths::approx_eq;

    #[test]
    fn test_load_exec_params() {
        let params: MotionExecParams = util::params::from_str(
            r#"
            cycle_period_ms = 20

            [initial_pose]
            x_mm = -1200.0
            y_mm = 300.0
            orientation_deg = 90.0

            [odometry]
            mm_per_pulse = 0.1
            wheels_distance_mm = 200.0
            mode = "Arc"

            [drive.linear]
            [[drive.linear.pipeline]]
            kind = "PoseReached"
            threshold = 2.0

            [[drive.linear.pipeline]]
            kind = "Pid"
            kp = 1.0
            ki = 0.0
            kd = 0.0

            [drive.angular]
            default_timeout_ms = 3000
            [[drive.angular.pipeline]]
            kind = "PoseReached"
            threshold = 0.02

            [[actuators.on_offs]]
            index = 0
            "#,
        )
        .unwrap();

        assert_eq!(params.cycle_period_ms, 20);
        assert_eq!(params.max_duration_s, 0.0);
        assert!(approx_eq(params.initial_pose.pose().orientation_deg(), 90.0, 1e-9));
        assert_eq!(params.drive.linear.period_ms, 20);
        assert_eq!(params.drive.linear.pipeline.len(), 2);
        assert_eq!(params.drive.angular.default_timeout_ms, 3000);
        assert_eq!(params.actuators.on_offs.len(), 1);
        assert_eq!(params.actuators.servo_board_channels, 16);
        assert!(params.startup_commands.is_empty());
    }
}
