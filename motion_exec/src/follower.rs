//! # Path follower
//!
//! Drives the linear and angular engines of the base towards one path pose at
//! a time. A pose is reached by turning towards it, driving straight to it,
//! then turning to its orientation.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use std::{f64::consts::PI, sync::Arc};

use motion_lib::{
    engine::{Engine, EngineError, EngineMode, EngineStatus, Fault},
    loc::Odometry,
    path::{MotionDirection, PathPose},
};
use util::maths::{get_ang_dist, norm_angle};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Below this distance the robot only turns to the pose orientation.
///
/// Units: millimetres
const POSITION_TOLERANCE_MM: f64 = 1.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct Follower {
    linear: Engine,
    angular: Engine,
    odometry: Arc<Odometry>,
    phase: Phase,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// No pose requested
    Idle,

    /// Turning towards the pose, then driving `distance_mm`
    Rotate { distance_mm: f64 },

    Translate,

    /// Turning to the pose orientation
    Orient,

    Done,
}

/// Progress towards the current pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    Moving,
    Reached,

    /// An engine was disabled, with the fault if it disabled itself
    Failed(Option<Fault>),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Follower {
    pub fn new(linear: Engine, angular: Engine, odometry: Arc<Odometry>) -> Self {
        Self {
            linear,
            angular,
            odometry,
            phase: Phase::Idle,
        }
    }

    /// Start moving to a new pose.
    pub fn start(&mut self, target: &PathPose) -> Result<(), EngineError> {
        let state = self.odometry.snapshot();
        let distance = state.pose.distance_to(&target.pose);

        let ratio = target.max_speed_ratio;
        self.linear.set_speed_ratio(ratio.linear)?;
        self.angular.set_speed_ratio(ratio.angular)?;
        self.linear.set_bypass_anti_blocking(target.bypass_anti_blocking)?;
        self.angular.set_bypass_anti_blocking(target.bypass_anti_blocking)?;

        // Hold the distance while turning
        self.linear.actuate(state.distance_mm, target.timeout_ms)?;

        if distance < POSITION_TOLERANCE_MM {
            self.orient(target)?;
            return Ok(());
        }

        let bearing = state.pose.bearing_to(&target.pose);
        let (rotation, distance_mm) = plan_motion(
            state.pose.orientation_rad,
            bearing,
            distance,
            target.motion_direction,
        );

        info!(
            "Moving to ({:.1}, {:.1}): turn {:.1} deg then drive {:.1} mm",
            target.pose.x(),
            target.pose.y(),
            rotation.to_degrees(),
            distance_mm
        );

        self.angular
            .actuate(state.angle_rad + rotation, target.timeout_ms)?;
        self.phase = Phase::Rotate { distance_mm };

        Ok(())
    }

    /// Advance through the phases of the current pose.
    pub fn update(&mut self, target: &PathPose) -> Result<Progress, EngineError> {
        let linear = self.linear.status()?;
        let angular = self.angular.status()?;

        if self.phase != Phase::Idle && self.phase != Phase::Done {
            if let Some(fault) = failure(&linear).or_else(|| failure(&angular)) {
                self.phase = Phase::Idle;
                self.linear.disable()?;
                self.angular.disable()?;
                return Ok(Progress::Failed(fault));
            }
        }

        match self.phase {
            Phase::Idle => return Ok(Progress::Moving),
            Phase::Rotate { distance_mm } if angular.reached => {
                let state = self.odometry.snapshot();
                debug!("Heading reached, driving {:.1} mm", distance_mm);

                self.linear
                    .actuate(state.distance_mm + distance_mm, target.timeout_ms)?;
                self.phase = Phase::Translate;
            }
            Phase::Translate if linear.reached => {
                if target.bypass_final_orientation || target.is_intermediate {
                    self.phase = Phase::Done;
                } else {
                    self.orient(target)?;
                }
            }
            Phase::Orient if angular.reached => self.phase = Phase::Done,
            _ => (),
        }

        if self.phase == Phase::Done {
            Ok(Progress::Reached)
        } else {
            Ok(Progress::Moving)
        }
    }

    /// Stop both engines and their workers.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        self.phase = Phase::Idle;
        self.linear.stop()?;
        self.angular.stop()
    }

    pub fn linear(&self) -> &Engine {
        &self.linear
    }

    pub fn angular(&self) -> &Engine {
        &self.angular
    }

    fn orient(&mut self, target: &PathPose) -> Result<(), EngineError> {
        let state = self.odometry.snapshot();
        let rotation = get_ang_dist(state.pose.orientation_rad, target.pose.orientation_rad);

        debug!("Turning {:.1} deg to the pose orientation", rotation.to_degrees());

        self.angular
            .actuate(state.angle_rad + rotation, target.timeout_ms)?;
        self.phase = Phase::Orient;

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Rotation to apply and signed distance to drive to cover `distance` along `bearing`.
fn plan_motion(
    orientation: f64,
    bearing: f64,
    distance: f64,
    direction: MotionDirection,
) -> (f64, f64) {
    let forward = get_ang_dist(orientation, bearing);
    let backward = get_ang_dist(orientation, norm_angle(bearing + PI));

    match direction {
        MotionDirection::ForwardOnly => (forward, distance),
        MotionDirection::BackwardOnly => (backward, -distance),
        MotionDirection::Bidirectional if forward.abs() <= backward.abs() => (forward, distance),
        MotionDirection::Bidirectional => (backward, -distance),
    }
}

fn failure(status: &EngineStatus) -> Option<Option<Fault>> {
    if status.mode == EngineMode::Disabled {
        if status.fault.is_none() {
            warn!("Engine disabled while following the path");
        }
        Some(status.fault)
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use motion_lib::{
        engine::EngineParams,
        loc::{Axis, OdometryAxis, OdometryMode, OdometryParams, Pose},
        sim::{SimDrive, SimDriveParams},
    };
    use std::f64::consts::FRAC_PI_2;
    use util::maths::approx_eq;

    const LINEAR: &str = r#"
        default_timeout_ms = 20000

        [[pipeline]]
        kind = "PoseReached"
        threshold = 2.0

        [[pipeline]]
        kind = "Pid"
        kp = 1.0
        ki = 0.0
        kd = 0.0

        [[pipeline]]
        kind = "RateShaping"
        max_acceleration = 10.0
        max_speed = 100.0
    "#;

    const ANGULAR: &str = r#"
        default_timeout_ms = 20000

        [[pipeline]]
        kind = "PoseReached"
        threshold = 0.01

        [[pipeline]]
        kind = "Pid"
        kp = 200.0
        ki = 0.0
        kd = 0.0

        [[pipeline]]
        kind = "RateShaping"
        max_acceleration = 10.0
        max_speed = 100.0
    "#;

    fn follower() -> (Follower, SimDrive) {
        let odometry = Arc::new(Odometry::new(
            OdometryParams {
                mm_per_pulse: 0.1,
                wheels_distance_mm: 200.0,
                mode: OdometryMode::Arc,
            },
            Pose::default(),
        ));
        let drive = SimDrive::new(
            SimDriveParams {
                max_wheel_speed_mm: 5.0,
                response: 1.0,
            },
            odometry.clone(),
        );

        let linear_params: EngineParams = util::params::from_str(LINEAR).unwrap();
        let angular_params: EngineParams = util::params::from_str(ANGULAR).unwrap();

        let linear = Engine::new(
            "linear",
            linear_params,
            Box::new(drive.linear()),
            Box::new(OdometryAxis::new(odometry.clone(), Axis::Linear)),
        )
        .unwrap();
        let angular = Engine::new(
            "angular",
            angular_params,
            Box::new(drive.angular()),
            Box::new(OdometryAxis::new(odometry.clone(), Axis::Angular)),
        )
        .unwrap();

        (Follower::new(linear, angular, odometry), drive)
    }

    /// Step the engines and the plant by hand until the pose is reached or failed.
    fn run(follower: &mut Follower, drive: &SimDrive, target: &PathPose) -> Progress {
        follower.start(target).unwrap();

        for _ in 0..5000 {
            follower.linear().step().unwrap();
            follower.angular().step().unwrap();
            drive.tick();

            match follower.update(target).unwrap() {
                Progress::Moving => (),
                p => return p,
            }
        }

        panic!("pose not reached");
    }

    #[test]
    fn test_plan_motion() {
        let (rotation, distance) =
            plan_motion(0.0, PI * 0.75, 100.0, MotionDirection::Bidirectional);
        assert!(approx_eq(rotation, -PI * 0.25, 1e-12));
        assert_eq!(distance, -100.0);

        let (rotation, distance) =
            plan_motion(0.0, PI * 0.75, 100.0, MotionDirection::ForwardOnly);
        assert!(approx_eq(rotation, PI * 0.75, 1e-12));
        assert_eq!(distance, 100.0);

        let (rotation, distance) =
            plan_motion(FRAC_PI_2, FRAC_PI_2, 100.0, MotionDirection::BackwardOnly);
        assert!(approx_eq(rotation.abs(), PI, 1e-12));
        assert_eq!(distance, -100.0);
    }

    #[test]
    fn test_reach_pose() {
        let (mut follower, drive) = follower();
        let target = PathPose::new(Pose::from_deg(0.0, 200.0, 0.0))
            .with_motion_direction(MotionDirection::ForwardOnly);

        assert_eq!(run(&mut follower, &drive, &target), Progress::Reached);

        let pose = drive.odometry().pose();
        assert!(pose.distance_to(&target.pose) < 10.0);
        assert!(get_ang_dist(pose.orientation_rad, 0.0).abs() < 0.05);
    }

    #[test]
    fn test_bypass_final_orientation() {
        let (mut follower, drive) = follower();
        let mut target = PathPose::new(Pose::from_deg(150.0, 0.0, 90.0));
        target.bypass_final_orientation = true;

        assert_eq!(run(&mut follower, &drive, &target), Progress::Reached);

        let pose = drive.odometry().pose();
        assert!(pose.distance_to(&target.pose) < 10.0);
        assert!(pose.orientation_rad.abs() < 0.05);
    }

    #[test]
    fn test_timeout_fails_pose() {
        let (mut follower, drive) = follower();
        let target = PathPose::new(Pose::from_deg(0.0, 500.0, 0.0)).with_timeout_ms(100);

        assert_eq!(
            run(&mut follower, &drive, &target),
            Progress::Failed(Some(Fault::Timeout))
        );
        assert!(!follower.linear().is_enabled());
        assert!(!follower.angular().is_enabled());
    }
}
