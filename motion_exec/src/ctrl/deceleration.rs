//! # Deceleration filter
//!
//! Caps a speed order so that the axis can still stop on its target with a
//! bounded deceleration. Inside the braking distance of the measured speed,
//! `v² / 2a`, the order is limited to `sqrt(2 a |error|)`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::{Deserialize, Serialize};

// Internal
use super::Feedback;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the deceleration filter.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct DecelerationParams {
    /// Deceleration available to stop the axis.
    ///
    /// Units: axis units per control period per control period
    pub deceleration: f64,
}

/// Braking stage, placed after the stage producing the speed order.
#[derive(Debug, Clone)]
pub struct DecelerationFilter {
    params: DecelerationParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DecelerationFilter {
    pub fn new(params: DecelerationParams) -> Self {
        Self { params }
    }

    /// Limit `speed_order` given the remaining `position_error` of the axis.
    pub fn compute(&mut self, speed_order: f64, position_error: f64, measured: &Feedback) -> f64 {
        let deceleration = self.params.deceleration;

        // A null deceleration cannot stop anything, leave the order alone
        if deceleration <= 0.0 {
            return speed_order;
        }

        let distance = position_error.abs();
        let braking_distance = measured.speed * measured.speed / (2.0 * deceleration);

        if distance > braking_distance {
            return speed_order;
        }

        let max_speed = (2.0 * deceleration * distance).sqrt();

        if max_speed < speed_order.abs() {
            trace!(
                "Deceleration: order {:.3} limited to {:.3}",
                speed_order,
                max_speed
            );
            max_speed.copysign(speed_order)
        } else {
            speed_order
        }
    }

    /// Stateless, nothing to clear.
    pub fn reset(&mut self) {}
}
