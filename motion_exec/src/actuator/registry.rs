//! # Actuators registry
//!
//! Owns every actuator of the robot, keyed by its [`ActId`], and routes the
//! commands of the external dispatcher to them.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{error, info, warn};
use std::{collections::BTreeMap, time::Instant};

use super::{Actuator, ActuatorError};
use comms_if::{
    eqpt::act::{ActId, ActTelemetry},
    tc::ActCommand,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Default)]
pub struct Actuators {
    actuators: BTreeMap<ActId, Box<dyn Actuator>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Actuators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new actuator.
    pub fn insert(&mut self, actuator: Box<dyn Actuator>) -> Result<(), ActuatorError> {
        let id = actuator.id();

        if self.actuators.contains_key(&id) {
            return Err(ActuatorError::DuplicateId(id));
        }

        info!("{}: registered", id);
        self.actuators.insert(id, actuator);

        Ok(())
    }

    pub fn get(&self, id: ActId) -> Result<&dyn Actuator, ActuatorError> {
        self.actuators
            .get(&id)
            .map(|a| a.as_ref())
            .ok_or(ActuatorError::HardwareAbsent(id))
    }

    pub fn get_mut(&mut self, id: ActId) -> Result<&mut (dyn Actuator + 'static), ActuatorError> {
        self.actuators
            .get_mut(&id)
            .map(|a| a.as_mut())
            .ok_or(ActuatorError::HardwareAbsent(id))
    }

    /// Execute a command from the dispatcher.
    pub fn dispatch(&mut self, cmd: &ActCommand) -> Result<(), ActuatorError> {
        let result = self.route(cmd);

        if let Err(ref e) = result {
            warn!("Command {:?} rejected: {}", cmd, e);
        }

        result
    }

    fn route(&mut self, cmd: &ActCommand) -> Result<(), ActuatorError> {
        match *cmd {
            ActCommand::Actuate { id, command } => self.get_mut(id)?.actuate(command),
            ActCommand::ActuateTimeout {
                id,
                command,
                timeout_ms,
            } => self.get_mut(id)?.actuate_with_timeout(command, timeout_ms),
            ActCommand::Disable { id } => self.get_mut(id)?.disable(),
            ActCommand::DisableAll => self.disable_all(),
        }
    }

    /// Disable the actuators whose timeout has expired, returns their ids.
    pub fn poll(&mut self, now: Instant) -> Vec<ActId> {
        let mut expired = Vec::new();

        for (id, actuator) in self.actuators.iter_mut() {
            match actuator.poll(now) {
                Ok(true) => expired.push(*id),
                Ok(false) => (),
                Err(e) => error!("{}: could not disable on timeout: {}", id, e),
            }
        }

        expired
    }

    /// Evaluate the interlocks of every actuator, returns the ids of those
    /// which were disabled.
    pub fn disable_on_check(&mut self) -> Vec<ActId> {
        let mut disabled = Vec::new();

        for (id, actuator) in self.actuators.iter_mut() {
            match actuator.disable_on_check() {
                Ok(true) => disabled.push(*id),
                Ok(false) => (),
                Err(e) => error!("{}: interlock check failed: {}", id, e),
            }
        }

        disabled
    }

    /// Disable every actuator, even if some of them fail to, returning the
    /// first error.
    pub fn disable_all(&mut self) -> Result<(), ActuatorError> {
        let mut first_err = None;

        for (id, actuator) in self.actuators.iter_mut() {
            if let Err(e) = actuator.disable() {
                error!("{}: could not disable: {}", id, e);
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Snapshot of every actuator, in id order.
    pub fn telemetry(&self) -> ActTelemetry {
        ActTelemetry::now(self.actuators.values().map(|a| a.state()).collect())
    }

    pub fn ids(&self) -> impl Iterator<Item = &ActId> {
        self.actuators.keys()
    }

    pub fn len(&self) -> usize {
        self.actuators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }
}
