//! # Path
//!
//! This module defines the path followed by the robot: a fixed table of
//! waypoints and a cursor on the waypoint currently targeted. The table is
//! sized once at construction, afterwards only the cursor moves, except for
//! the explicit calibration and mirroring operations.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod pose;

pub use pose::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info};
use serde::Deserialize;
use std::convert::TryFrom;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of poses in a path.
pub const MAX_POSES: usize = 16;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameter file representation of a path.
#[derive(Debug, Clone, Deserialize)]
pub struct PathParams {
    /// Restart from the first pose once the last one is reached
    #[serde(default)]
    pub play_in_loop: bool,

    pub poses: Vec<PathPose>,
}

/// A sequence of waypoints and the index of the current one.
#[derive(Debug, Clone)]
pub struct Path {
    poses: Vec<PathPose>,

    play_in_loop: bool,

    /// Always a valid index of `poses`
    current_index: usize,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PathError {
    #[error("Attempted to create a path from an empty sequence")]
    EmptySequence,

    #[error("A path holds at most {} poses, found {0}", MAX_POSES)]
    TooManyPoses(usize),

    #[error("Index {index} is outside of the path (length {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Path {
    /// Create a new path, with the cursor on the first pose.
    pub fn new(mut poses: Vec<PathPose>, play_in_loop: bool) -> Result<Self, PathError> {
        if poses.is_empty() {
            return Err(PathError::EmptySequence);
        }
        if poses.len() > MAX_POSES {
            return Err(PathError::TooManyPoses(poses.len()));
        }

        for pose in poses.iter_mut() {
            pose.max_speed_ratio = pose.max_speed_ratio.clamped();
        }

        info!(
            "New path of {} poses{}",
            poses.len(),
            if play_in_loop { ", played in loop" } else { "" }
        );

        Ok(Self {
            poses,
            play_in_loop,
            current_index: 0,
        })
    }

    /// The pose under the cursor.
    pub fn current(&self) -> &PathPose {
        &self.poses[self.current_index]
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Move the cursor to the next pose, wrapping to the first if the path is
    /// played in loop. On the last pose of a non-looping path nothing happens.
    ///
    /// Returns the new index.
    pub fn increment(&mut self) -> usize {
        if self.current_index + 1 < self.poses.len() {
            self.current_index += 1;
        } else if self.play_in_loop {
            self.current_index = 0;
        }

        debug!("Path index incremented to {}", self.current_index);

        self.current_index
    }

    /// Move the cursor to the previous pose, wrapping to the last if the path
    /// is played in loop. On the first pose of a non-looping path nothing
    /// happens.
    ///
    /// Returns the new index.
    pub fn decrement(&mut self) -> usize {
        if self.current_index > 0 {
            self.current_index -= 1;
        } else if self.play_in_loop {
            self.current_index = self.poses.len() - 1;
        }

        debug!("Path index decremented to {}", self.current_index);

        self.current_index
    }

    /// Go to the next pose.
    pub fn next(&mut self) -> usize {
        self.increment()
    }

    /// Skip the current pose as it cannot be reached.
    pub fn unreachable(&mut self) -> usize {
        info!("Pose {} is unreachable, skipping it", self.current_index);
        self.next()
    }

    pub fn reset_current_index(&mut self) {
        self.current_index = 0;
    }

    /// True if the cursor is on the last pose and the path is not looping.
    pub fn is_finished(&self) -> bool {
        !self.play_in_loop && self.current_index + 1 == self.poses.len()
    }

    /// Speed ratios bounding the motion towards the pose at `index`.
    pub fn max_speed_ratio_at(&self, index: usize) -> Result<SpeedRatio, PathError> {
        self.poses
            .get(index)
            .map(|p| p.max_speed_ratio)
            .ok_or(PathError::IndexOutOfRange {
                index,
                len: self.poses.len(),
            })
    }

    /// Speed ratios bounding the motion towards the current pose.
    pub fn current_max_speed_ratio(&self) -> SpeedRatio {
        self.current().max_speed_ratio
    }

    /// Mirror every pose of the path, to play it on the other side of the
    /// table.
    pub fn horizontal_mirror(&mut self) {
        info!("Mirroring all path poses");
        self.poses.iter_mut().for_each(PathPose::horizontal_mirror);
    }

    /// Replace a pose of the path, during calibration only.
    pub fn calibrate_pose(&mut self, index: usize, pose: PathPose) -> Result<(), PathError> {
        let len = self.poses.len();
        let slot = self
            .poses
            .get_mut(index)
            .ok_or(PathError::IndexOutOfRange { index, len })?;

        info!("Pose {} calibrated: {:?} -> {:?}", index, slot.pose, pose.pose);
        *slot = pose;
        slot.max_speed_ratio = pose.max_speed_ratio.clamped();

        Ok(())
    }

    pub fn poses(&self) -> &[PathPose] {
        &self.poses
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn play_in_loop(&self) -> bool {
        self.play_in_loop
    }
}

impl TryFrom<PathParams> for Path {
    type Error = PathError;

    fn try_from(params: PathParams) -> Result<Self, Self::Error> {
        Path::new(params.poses, params.play_in_loop)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loc::Pose;
    use util::maths::{approx_eq, norm_angle_deg_360};

    fn game_path(play_in_loop: bool) -> Path {
        Path::new(
            vec![
                PathPose::new(Pose::from_deg(-1200.0, 1000.0, 0.0)),
                PathPose::new(Pose::from_deg(1200.0, 1000.0, 180.0)),
                PathPose::new(Pose::from_deg(-1200.0, 1000.0, 0.0)).with_speed_ratio(0.5, 2.0),
            ],
            play_in_loop,
        )
        .unwrap()
    }

    #[test]
    fn test_increment_loop() {
        let mut path = game_path(true);
        let expected: Vec<PathPose> = path.poses().to_vec();

        let mut visited = vec![path.current_index()];
        let mut currents = vec![*path.current()];
        for _ in 0..9 {
            visited.push(path.increment());
            currents.push(*path.current());
        }

        assert_eq!(visited, vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0]);
        for (i, pose) in currents.iter().enumerate() {
            assert_eq!(*pose, expected[i % 3]);
        }
    }

    #[test]
    fn test_increment_no_loop() {
        let mut path = game_path(false);

        assert_eq!(path.increment(), 1);
        assert_eq!(path.increment(), 2);
        assert!(path.is_finished());
        assert_eq!(path.increment(), 2);
        assert_eq!(path.next(), 2);
    }

    #[test]
    fn test_decrement() {
        let mut looping = game_path(true);
        assert_eq!(looping.decrement(), 2);
        assert_eq!(looping.decrement(), 1);

        let mut once = game_path(false);
        assert_eq!(once.decrement(), 0);
        once.increment();
        once.increment();
        assert_eq!(once.decrement(), 1);
        once.reset_current_index();
        assert_eq!(once.current_index(), 0);
    }

    #[test]
    fn test_max_speed_ratio() {
        let mut path = game_path(false);

        assert_eq!(path.max_speed_ratio_at(0), Ok(SpeedRatio::new(1.0, 1.0)));
        // Ratios are bounded to [0, 1]
        assert_eq!(path.max_speed_ratio_at(2), Ok(SpeedRatio::new(0.5, 1.0)));
        assert_eq!(
            path.max_speed_ratio_at(3),
            Err(PathError::IndexOutOfRange { index: 3, len: 3 })
        );

        path.increment();
        path.increment();
        assert_eq!(path.current_max_speed_ratio().linear, 0.5);
    }

    #[test]
    fn test_horizontal_mirror() {
        let mut path = Path::new(
            vec![
                PathPose::new(Pose::from_deg(-1200.0, 1000.0, 0.0)),
                PathPose::new(Pose::from_deg(350.0, -20.0, 90.0)),
                PathPose::new(Pose::from_deg(10.0, 0.0, 200.0)),
                PathPose::new(Pose::from_deg(0.0, 0.0, 359.5)),
            ],
            false,
        )
        .unwrap();
        let original: Vec<PathPose> = path.poses().to_vec();

        path.horizontal_mirror();
        for (mirrored, orig) in path.poses().iter().zip(original.iter()) {
            assert_eq!(mirrored.pose.x(), -orig.pose.x());
            assert_eq!(mirrored.pose.y(), orig.pose.y());

            let expected_deg = norm_angle_deg_360(180.0 - orig.pose.orientation_deg());
            let diff = norm_angle_deg_360(mirrored.pose.orientation_deg() - expected_deg + 180.0);
            assert!(approx_eq(diff, 180.0, 1e-9), "{:?} vs {}", mirrored, expected_deg);
        }

        // 0 deg wraps to 180 deg and 359.5 deg to 180.5 deg
        assert!(approx_eq(path.poses()[0].pose.orientation_deg(), 180.0, 1e-9));
        assert!(approx_eq(path.poses()[3].pose.orientation_deg(), 180.5, 1e-9));

        // Mirroring twice restores x exactly and the orientation modulo 360
        path.horizontal_mirror();
        for (restored, orig) in path.poses().iter().zip(original.iter()) {
            assert!(approx_eq(restored.pose.x(), orig.pose.x(), 1e-9));
            let diff =
                norm_angle_deg_360(restored.pose.orientation_deg() - orig.pose.orientation_deg() + 180.0);
            assert!(approx_eq(diff, 180.0, 1e-9), "{:?} vs {:?}", restored, orig);
        }
    }

    #[test]
    fn test_ratios_clamped_at_construction() {
        let mut pose = PathPose::new(Pose::default());
        pose.max_speed_ratio = SpeedRatio {
            linear: 1.5,
            angular: -0.2,
        };

        let mut path = Path::new(vec![pose], false).unwrap();
        assert_eq!(path.current_max_speed_ratio(), SpeedRatio::new(1.0, 0.0));

        path.calibrate_pose(0, pose).unwrap();
        assert_eq!(path.current_max_speed_ratio(), SpeedRatio::new(1.0, 0.0));
    }

    #[test]
    fn test_construction_errors() {
        assert_eq!(Path::new(vec![], true).unwrap_err(), PathError::EmptySequence);

        let poses = vec![PathPose::new(Pose::default()); MAX_POSES + 1];
        assert_eq!(
            Path::new(poses, false).unwrap_err(),
            PathError::TooManyPoses(MAX_POSES + 1)
        );
    }

    #[test]
    fn test_calibrate_pose() {
        let mut path = game_path(false);
        let calibrated = PathPose::new(Pose::from_deg(-1180.0, 995.0, 2.0));

        path.calibrate_pose(0, calibrated).unwrap();
        assert_eq!(*path.current(), calibrated);
        assert!(path.calibrate_pose(7, calibrated).is_err());
    }

    #[test]
    fn test_from_params() {
        let params: PathParams = util::params::from_str(
            r#"
            play_in_loop = true

            [[poses]]
            x_mm = -1200.0
            y_mm = 1000.0
            orientation_deg = 0.0

            [[poses]]
            x_mm = 1200.0
            y_mm = 1000.0
            orientation_deg = 180.0
            motion_direction = "BackwardOnly"
            max_speed_ratio_linear = 0.4
            timeout_ms = 3000
            bypass_final_orientation = true
            "#,
        )
        .unwrap();

        let path = Path::try_from(params).unwrap();
        assert!(path.play_in_loop());
        assert_eq!(path.len(), 2);

        let second = path.poses()[1];
        assert_eq!(second.motion_direction, MotionDirection::BackwardOnly);
        assert_eq!(second.max_speed_ratio, SpeedRatio::new(0.4, 1.0));
        assert_eq!(second.timeout_ms, Some(3000));
        assert!(second.bypass_final_orientation);
        assert!(approx_eq(second.pose.orientation_deg(), 180.0, 1e-9));
        assert_eq!(path.poses()[0].timeout_ms, None);
    }
}
