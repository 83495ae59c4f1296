//! # Actuators
//!
//! Every output of the robot is driven through the [`Actuator`] trait, whatever
//! the hardware behind it:
//!
//! - [`Motor`] - closed loop positional motor, backed by an [`Engine`](crate::engine::Engine)
//! - [`OnOff`] - a binary output such as a pump or a valve
//! - [`AnalogServo`] - a servo moved between predefined positions
//!
//! The [`Actuators`] registry owns them all and routes the commands of the
//! external dispatcher.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod deadline;
mod driver;
mod motor;
mod on_off;
mod registry;
mod servo;

pub use deadline::Deadline;
pub use driver::*;
pub use motor::*;
pub use on_off::*;
pub use registry::*;
pub use servo::*;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::Instant;

use crate::engine::EngineError;
use comms_if::eqpt::act::{ActId, ActState};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Common interface of all actuators.
///
/// Commands are integers whose meaning depends on the actuator, see
/// [`ActState::command`].
pub trait Actuator: Send {
    fn id(&self) -> ActId;

    /// Apply a command with the default timeout of the actuator.
    fn actuate(&mut self, command: i32) -> Result<(), ActuatorError>;

    /// Apply a command, disabling the actuator if not done within `timeout_ms`.
    fn actuate_with_timeout(&mut self, command: i32, timeout_ms: u32) -> Result<(), ActuatorError>;

    fn disable(&mut self) -> Result<(), ActuatorError>;

    /// Evaluate the safety interlock of the actuator, returns true if the
    /// actuator was disabled.
    fn disable_on_check(&mut self) -> Result<bool, ActuatorError>;

    fn is_enabled(&self) -> bool;

    fn is_blocked(&self) -> bool {
        false
    }

    /// Last accepted command.
    fn get_command(&self) -> i32;

    /// Disable the actuator if its timeout expired at `now`, returns true if it did.
    ///
    /// Actuators running their own control loop handle their timeout there.
    fn poll(&mut self, _now: Instant) -> Result<bool, ActuatorError> {
        Ok(false)
    }

    /// Telemetry snapshot.
    fn state(&self) -> ActState {
        ActState {
            id: self.id(),
            command: self.get_command(),
            enabled: self.is_enabled(),
            blocked: self.is_blocked(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("{id}: command {command} is out of range [{min}, {max}]")]
    OutOfRange {
        id: ActId,
        command: i32,
        min: i32,
        max: i32,
    },

    #[error("{0}: no such actuator")]
    HardwareAbsent(ActId),

    #[error("{0}: an actuator with this id already exists")]
    DuplicateId(ActId),

    #[error("{0}: invalid parameters: {1}")]
    InvalidParams(ActId, String),

    #[error("Driver error: {0}")]
    Driver(DriverError),

    #[error("Engine error: {0}")]
    Engine(EngineError),
}
