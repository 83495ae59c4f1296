//! # On/off actuator
//!
//! A single binary output. Any non-zero command switches it on.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info};
use serde::Deserialize;
use std::time::Instant;

use super::{Actuator, ActuatorError, Deadline, OutputPin};
use comms_if::eqpt::act::{ActGroup, ActId};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct OnOffParams {
    /// Index of the actuator within the on/off group
    pub index: u8,

    /// Level of the pin when the actuator is on
    #[serde(default = "default_active_high")]
    pub active_high: bool,

    /// Time after which the actuator is switched off, 0 to keep it on.
    ///
    /// Units: milliseconds
    #[serde(default)]
    pub default_timeout_ms: u32,
}

pub struct OnOff {
    id: ActId,
    params: OnOffParams,
    pin: Box<dyn OutputPin>,
    command: i32,
    deadline: Deadline,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OnOff {
    /// Create a new actuator, switched off.
    pub fn new(params: OnOffParams, pin: Box<dyn OutputPin>) -> Result<Self, ActuatorError> {
        let mut on_off = Self {
            id: ActId::new(ActGroup::OnOff, params.index),
            params,
            pin,
            command: 0,
            deadline: Deadline::default(),
        };

        on_off.disable()?;

        Ok(on_off)
    }

    fn switch(&mut self, command: i32, timeout_ms: u32) -> Result<(), ActuatorError> {
        let on = command != 0;

        self.pin
            .set(on == self.params.active_high)
            .map_err(ActuatorError::Driver)?;
        self.command = on as i32;

        if on {
            self.deadline.arm(Instant::now(), timeout_ms);
        } else {
            self.deadline.clear();
        }

        info!("{}: switched {}", self.id, if on { "on" } else { "off" });

        Ok(())
    }
}

impl Actuator for OnOff {
    fn id(&self) -> ActId {
        self.id
    }

    fn actuate(&mut self, command: i32) -> Result<(), ActuatorError> {
        self.switch(command, self.params.default_timeout_ms)
    }

    fn actuate_with_timeout(&mut self, command: i32, timeout_ms: u32) -> Result<(), ActuatorError> {
        let timeout_ms = match timeout_ms {
            0 => self.params.default_timeout_ms,
            t => t,
        };
        self.switch(command, timeout_ms)
    }

    fn disable(&mut self) -> Result<(), ActuatorError> {
        self.pin
            .set(!self.params.active_high)
            .map_err(ActuatorError::Driver)?;
        self.command = 0;
        self.deadline.clear();

        debug!("{}: disabled", self.id);

        Ok(())
    }

    /// No interlock, the output is always switched off.
    fn disable_on_check(&mut self) -> Result<bool, ActuatorError> {
        self.disable()?;
        Ok(true)
    }

    fn is_enabled(&self) -> bool {
        self.command != 0
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

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_active_high() -> bool {
    true
}

#[cfg(all(test, feature = "sim"))]
mod test {
    use super::*;
    use crate::sim::SimPin;
    use std::time::Duration;

    fn on_off(active_high: bool, default_timeout_ms: u32) -> (OnOff, SimPin) {
        let pin = SimPin::default();
        let on_off = OnOff::new(
            OnOffParams {
                index: 0,
                active_high,
                default_timeout_ms,
            },
            Box::new(pin.clone()),
        )
        .unwrap();

        (on_off, pin)
    }

    #[test]
    fn test_switch() {
        let (mut pump, pin) = on_off(true, 0);
        assert!(!pin.is_high());
        assert!(!pump.is_enabled());

        pump.actuate(42).unwrap();
        assert!(pin.is_high());
        assert_eq!(pump.get_command(), 1);

        pump.actuate(0).unwrap();
        assert!(!pin.is_high());
        assert!(!pump.is_enabled());

        // Active low outputs are inverted
        let (mut valve, pin) = on_off(false, 0);
        assert!(pin.is_high());
        valve.actuate(1).unwrap();
        assert!(!pin.is_high());
        assert!(valve.disable_on_check().unwrap());
        assert!(pin.is_high());
    }

    #[test]
    fn test_timeout() {
        let (mut pump, pin) = on_off(true, 1000);

        pump.actuate_with_timeout(1, 100).unwrap();
        let now = Instant::now();
        assert!(!pump.poll(now).unwrap());
        assert!(pump.poll(now + Duration::from_millis(150)).unwrap());
        assert!(!pin.is_high());
        assert!(!pump.is_enabled());

        // Default timeout when none is given
        pump.actuate(1).unwrap();
        assert!(!pump.poll(Instant::now() + Duration::from_millis(500)).unwrap());
        assert!(pump.poll(Instant::now() + Duration::from_millis(1100)).unwrap());
    }
}
