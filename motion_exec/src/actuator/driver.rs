//! # Hardware drivers
//!
//! Capability interfaces of the physical outputs driven by the actuators. The
//! concrete bindings live outside of the control code.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A motor power stage.
pub trait MotorDriver: Send {
    /// Apply a duty cycle in [0, 1] in the given direction.
    fn set(&mut self, duty_cycle: f64, direction: Direction) -> Result<(), DriverError>;

    /// Power the stage, before the first `set`.
    fn enable(&mut self) -> Result<(), DriverError>;

    /// Cut the power and brake the motor.
    fn brake(&mut self) -> Result<(), DriverError>;
}

/// A binary output.
pub trait OutputPin: Send {
    fn set(&mut self, on: bool) -> Result<(), DriverError>;
}

/// A board generating servo pulses on several channels.
///
/// Boards are shared between the servos plugged on them, so channels are plain
/// numbers rather than a driver specific type.
pub trait ServoDriver: Send {
    /// Set the duty cycle of a channel.
    ///
    /// ## Arguments
    /// - `channel` - The channel to set the duty cycle for
    /// - `duty_cycle` - Must be between 0.0 and 1.0, other values are rejected.
    fn set_duty_cycle(&mut self, channel: u8, duty_cycle: f64) -> Result<(), DriverError>;

    /// Stop generating pulses on a channel.
    fn disable(&mut self, channel: u8) -> Result<(), DriverError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Direction of rotation of a motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Channel {0} does not exist on this driver")]
    ChannelMissing(u8),

    #[error("Duty cycle must be between 0.0 and 1.0, found {0}")]
    InvalidDutyCycle(f64),

    #[error("Communication with the driver failed: {0}")]
    Io(String),

    #[error("The driver lock was poisoned")]
    LockPoisoned,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Direction {
    /// Split a signed duty cycle percentage into a duty cycle in [0, 1] and a direction.
    pub fn from_percent(percent: f64) -> (f64, Direction) {
        let direction = if percent < 0.0 {
            Direction::Backward
        } else {
            Direction::Forward
        };

        ((percent.abs() / 100.0).min(1.0), direction)
    }

    pub fn sign(&self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Check that a duty cycle is within [0, 1].
pub fn check_duty_cycle(duty_cycle: f64) -> Result<f64, DriverError> {
    if (0.0..=1.0).contains(&duty_cycle) {
        Ok(duty_cycle)
    } else {
        Err(DriverError::InvalidDutyCycle(duty_cycle))
    }
}
