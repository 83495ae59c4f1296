//! # Positional motor
//!
//! A motor moved to a target position by its own [`Engine`]. Commands are
//! positions in millimetres along the axis of the motor.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};
use serde::Deserialize;
use std::sync::mpsc::Receiver;

use super::{Actuator, ActuatorError, MotorDriver};
use crate::engine::{DisableCheck, Engine, EngineEvent, EngineParams};
use crate::loc::OdometrySource;
use comms_if::eqpt::act::{ActGroup, ActId};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MotorParams {
    /// Index of the motor within the motor group
    pub index: u8,

    /// Units: millimetres
    pub min_command: i32,

    /// Units: millimetres
    pub max_command: i32,

    pub engine: EngineParams,
}

pub struct Motor {
    id: ActId,
    min_command: i32,
    max_command: i32,
    command: i32,
    engine: Engine,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Motor {
    /// Create a new motor, disabled. Its engine is not started.
    pub fn new(
        params: MotorParams,
        driver: Box<dyn MotorDriver>,
        odometry: Box<dyn OdometrySource>,
    ) -> Result<Self, ActuatorError> {
        let id = ActId::new(ActGroup::Motor, params.index);

        if params.min_command > params.max_command {
            return Err(ActuatorError::InvalidParams(
                id,
                format!(
                    "min_command ({}) is greater than max_command ({})",
                    params.min_command, params.max_command
                ),
            ));
        }

        let engine = Engine::new(&id.to_string(), params.engine, driver, odometry)
            .map_err(ActuatorError::Engine)?;

        Ok(Self {
            id,
            min_command: params.min_command,
            max_command: params.max_command,
            command: 0,
            engine,
        })
    }

    /// Start the control loop of the motor.
    pub fn start(&mut self) -> Result<(), ActuatorError> {
        self.engine.start().map_err(ActuatorError::Engine)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Install the interlock evaluated by the engine each cycle and by
    /// `disable_on_check`, a limit switch for instance.
    pub fn set_disable_check(&self, check: DisableCheck) -> Result<(), ActuatorError> {
        self.engine
            .set_disable_check(check)
            .map_err(ActuatorError::Engine)
    }

    pub fn subscribe(&self) -> Result<Receiver<EngineEvent>, ActuatorError> {
        self.engine.subscribe().map_err(ActuatorError::Engine)
    }

    fn move_to(&mut self, command: i32, timeout_ms: Option<u32>) -> Result<(), ActuatorError> {
        if command < self.min_command || command > self.max_command {
            warn!(
                "{}: rejected command {} outside of [{}, {}]",
                self.id, command, self.min_command, self.max_command
            );
            return Err(ActuatorError::OutOfRange {
                id: self.id,
                command,
                min: self.min_command,
                max: self.max_command,
            });
        }

        info!("{}: move to {} mm", self.id, command);

        self.engine
            .actuate(command as f64, timeout_ms)
            .map_err(ActuatorError::Engine)?;
        self.command = command;

        Ok(())
    }
}

impl Actuator for Motor {
    fn id(&self) -> ActId {
        self.id
    }

    fn actuate(&mut self, command: i32) -> Result<(), ActuatorError> {
        self.move_to(command, None)
    }

    fn actuate_with_timeout(&mut self, command: i32, timeout_ms: u32) -> Result<(), ActuatorError> {
        self.move_to(command, Some(timeout_ms))
    }

    fn disable(&mut self) -> Result<(), ActuatorError> {
        self.engine.disable().map_err(ActuatorError::Engine)
    }

    fn disable_on_check(&mut self) -> Result<bool, ActuatorError> {
        self.engine.check_disable().map_err(ActuatorError::Engine)
    }

    fn is_enabled(&self) -> bool {
        self.engine.is_enabled()
    }

    fn is_blocked(&self) -> bool {
        self.engine.is_blocked()
    }

    fn get_command(&self) -> i32 {
        self.command
    }
}
