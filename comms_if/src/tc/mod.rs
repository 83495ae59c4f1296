//! # Telecommand module
//!
//! Commands addressed to the actuators by the external dispatcher. The
//! dispatcher hands them over as JSON strings.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use serde_json;
use thiserror::Error;

// Internal
use crate::eqpt::act::ActId;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A command for a single actuator.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "type")]
pub enum ActCommand {
    /// Move the actuator to `command`, with the actuator's default timeout.
    Actuate { id: ActId, command: i32 },

    /// Move the actuator to `command`, disabling it if not done within `timeout_ms`.
    ActuateTimeout {
        id: ActId,
        command: i32,
        timeout_ms: u32,
    },

    /// Stop the actuator immediately.
    Disable { id: ActId },

    /// Stop every actuator immediately.
    DisableAll,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ActCommand {
    /// Parse a command from its JSON representation.
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }

    /// Serialise the command into JSON.
    pub fn to_json(&self) -> Result<String, TcParseError> {
        serde_json::to_string(self).map_err(TcParseError::InvalidJson)
    }

    /// The actuator addressed by this command, if any.
    pub fn id(&self) -> Option<ActId> {
        match self {
            ActCommand::Actuate { id, .. }
            | ActCommand::ActuateTimeout { id, .. }
            | ActCommand::Disable { id } => Some(*id),
            ActCommand::DisableAll => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::eqpt::act::ActGroup;

    #[test]
    fn test_parse_actuate_timeout() {
        let cmd = ActCommand::from_json(
            r#"{"type":"ActuateTimeout","id":{"group":"Motor","index":0},"command":150,"timeout_ms":2000}"#,
        )
        .unwrap();

        assert_eq!(
            cmd,
            ActCommand::ActuateTimeout {
                id: ActId::new(ActGroup::Motor, 0),
                command: 150,
                timeout_ms: 2000
            }
        );
        assert_eq!(cmd.id(), Some(ActId::new(ActGroup::Motor, 0)));
    }

    #[test]
    fn test_json_round_trip() {
        let cmd = ActCommand::Actuate {
            id: ActId::new(ActGroup::Servo, 3),
            command: -40,
        };

        let json = cmd.to_json().unwrap();
        assert!(json.contains(r#""type":"Actuate""#), "{}", json);
        assert_eq!(ActCommand::from_json(&json).unwrap(), cmd);
        assert_eq!(
            ActCommand::from_json(&ActCommand::DisableAll.to_json().unwrap()).unwrap(),
            ActCommand::DisableAll
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            ActCommand::from_json(r#"{"type":"Explode"}"#),
            Err(TcParseError::InvalidJson(_))
        ));
        assert_eq!(ActCommand::DisableAll.id(), None);
    }
}
