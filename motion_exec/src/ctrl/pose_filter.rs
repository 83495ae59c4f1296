//! # Pose reached filter
//!
//! Zeroes the position error once the axis is within tolerance of its target,
//! and signals that the target has been reached.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::StageStatus;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the pose reached filter.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct PoseReachedParams {
    /// Position error under which the target is reached.
    ///
    /// Units: axis units
    pub threshold: f64,
}

#[derive(Debug, Clone)]
pub struct PoseReachedFilter {
    params: PoseReachedParams,
    reached: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PoseReachedFilter {
    pub fn new(params: PoseReachedParams) -> Self {
        Self {
            params,
            reached: false,
        }
    }

    pub fn compute(&mut self, position_error: f64) -> f64 {
        self.reached = position_error.abs() <= self.params.threshold;

        if self.reached {
            0.0
        } else {
            position_error
        }
    }

    pub fn reset(&mut self) {
        self.reached = false;
    }

    pub fn status(&self) -> StageStatus {
        if self.reached {
            StageStatus::Reached
        } else {
            StageStatus::Moving
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_reached() {
        let mut filter = PoseReachedFilter::new(PoseReachedParams { threshold: 2.0 });

        assert_eq!(filter.compute(-10.0), -10.0);
        assert_eq!(filter.status(), StageStatus::Moving);

        assert_eq!(filter.compute(1.5), 0.0);
        assert_eq!(filter.status(), StageStatus::Reached);

        // Pushed away again
        assert_eq!(filter.compute(3.0), 3.0);
        assert_eq!(filter.status(), StageStatus::Moving);
    }
}
