//! # Actuator identifiers and telemetry

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Identifier of a single actuator.
///
/// Actuators are grouped by kind, the index distinguishes actuators within one group.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Copy, Clone)]
pub struct ActId {
    pub group: ActGroup,
    pub index: u8,
}

/// Telemetry snapshot of one actuator.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct ActState {
    pub id: ActId,

    /// Last accepted command.
    ///
    /// Units: millimetres for motors, 0/1 for on/off actuators, position index for servos.
    pub command: i32,

    /// True while the actuator is driven.
    pub enabled: bool,

    /// True if the last motion was stopped by a stall.
    pub blocked: bool,
}

/// A timestamped set of actuator snapshots, as published to the protocol layer.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ActTelemetry {
    pub timestamp: DateTime<Utc>,
    pub states: Vec<ActState>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Kinds of actuator.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Copy, Clone)]
pub enum ActGroup {
    /// Closed loop positional motor
    Motor,

    /// Binary output, pumps and valves for instance
    OnOff,

    /// Analog servo with a set of predefined positions
    Servo,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ActId {
    pub fn new(group: ActGroup, index: u8) -> Self {
        Self { group, index }
    }
}

impl fmt::Display for ActId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.group, self.index)
    }
}

impl ActTelemetry {
    /// Build a telemetry message stamped with the current time.
    pub fn now(states: Vec<ActState>) -> Self {
        Self {
            timestamp: Utc::now(),
            states,
        }
    }
}
