//! # Analog servo
//!
//! A servo moved between a set of predefined positions. The command is the
//! index of the position, each position is the duty cycle of the pulse sent on
//! the servo channel of a [`ServoDriver`] board.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use serde::Deserialize;
use std::{
    convert::TryFrom,
    sync::{Arc, Mutex},
    time::Instant,
};

use super::{check_duty_cycle, Actuator, ActuatorError, Deadline, DriverError, ServoDriver};
use comms_if::eqpt::act::{ActGroup, ActId};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum number of positions of a servo.
pub const MAX_SERVO_POSITIONS: usize = 10;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ServoParams {
    /// Index of the servo within the servo group
    pub index: u8,

    /// Channel of the servo on the driver board
    pub channel: u8,

    /// Duty cycle of each position, in [0, 1]
    pub positions: Vec<f64>,

    /// Time after which the servo is released, 0 to hold it.
    ///
    /// Units: milliseconds
    #[serde(default)]
    pub default_timeout_ms: u32,
}

pub struct AnalogServo {
    id: ActId,
    params: ServoParams,
    driver: Arc<Mutex<dyn ServoDriver>>,
    command: i32,
    enabled: bool,
    deadline: Deadline,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl AnalogServo {
    /// Create a new servo on a driver board shared with other servos. The servo
    /// is not moved until the first command.
    pub fn new(
        params: ServoParams,
        driver: Arc<Mutex<dyn ServoDriver>>,
    ) -> Result<Self, ActuatorError> {
        let id = ActId::new(ActGroup::Servo, params.index);

        if params.positions.is_empty() || params.positions.len() > MAX_SERVO_POSITIONS {
            return Err(ActuatorError::InvalidParams(
                id,
                format!(
                    "expected 1 to {} positions, found {}",
                    MAX_SERVO_POSITIONS,
                    params.positions.len()
                ),
            ));
        }
        for duty_cycle in params.positions.iter() {
            check_duty_cycle(*duty_cycle).map_err(ActuatorError::Driver)?;
        }

        Ok(Self {
            id,
            params,
            driver,
            command: 0,
            enabled: false,
            deadline: Deadline::default(),
        })
    }

    fn move_to(&mut self, command: i32, timeout_ms: u32) -> Result<(), ActuatorError> {
        let duty_cycle = usize::try_from(command)
            .ok()
            .and_then(|i| self.params.positions.get(i))
            .copied();

        let duty_cycle = match duty_cycle {
            Some(d) => d,
            None => {
                warn!("{}: no position {}", self.id, command);
                return Err(ActuatorError::OutOfRange {
                    id: self.id,
                    command,
                    min: 0,
                    max: self.params.positions.len() as i32 - 1,
                });
            }
        };

        self.driver
            .lock()
            .map_err(|_| ActuatorError::Driver(DriverError::LockPoisoned))?
            .set_duty_cycle(self.params.channel, duty_cycle)
            .map_err(ActuatorError::Driver)?;

        self.command = command;
        self.enabled = true;
        self.deadline.arm(Instant::now(), timeout_ms);

        info!(
            "{}: moved to position {} (duty cycle {:.3})",
            self.id, command, duty_cycle
        );

        Ok(())
    }
}

impl Actuator for AnalogServo {
    fn id(&self) -> ActId {
        self.id
    }

    fn actuate(&mut self, command: i32) -> Result<(), ActuatorError> {
        self.move_to(command, self.params.default_timeout_ms)
    }

    fn actuate_with_timeout(&mut self, command: i32, timeout_ms: u32) -> Result<(), ActuatorError> {
        let timeout_ms = match timeout_ms {
            0 => self.params.default_timeout_ms,
            t => t,
        };
        self.move_to(command, timeout_ms)
    }

    fn disable(&mut self) -> Result<(), ActuatorError> {
        self.driver
            .lock()
            .map_err(|_| ActuatorError::Driver(DriverError::LockPoisoned))?
            .disable(self.params.channel)
            .map_err(ActuatorError::Driver)?;

        self.enabled = false;
        self.deadline.clear();

        debug!("{}: released", self.id);

        Ok(())
    }

    /// No interlock, the servo is always released.
    fn disable_on_check(&mut self) -> Result<bool, ActuatorError> {
        self.disable()?;
        Ok(true)
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn get_command(&self) -> i32 {
        self.command
    }

    fn poll(&mut self, now: Instant) -> Result<bool, ActuatorError> {
        if self.deadline.expired(now) {
            info!("{}: timeout expired", self.id);
            self.disable()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
