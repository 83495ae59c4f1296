//! Timeout of actuators without a control loop

use std::time::{Duration, Instant};

/// Instant at which an actuator must be disabled, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Deadline {
    expires: Option<Instant>,
}

impl Deadline {
    /// Arm the deadline `timeout_ms` after `now`, or clear it if `timeout_ms` is 0.
    pub fn arm(&mut self, now: Instant, timeout_ms: u32) {
        self.expires = match timeout_ms {
            0 => None,
            t => Some(now + Duration::from_millis(t as u64)),
        };
    }

    pub fn clear(&mut self) {
        self.expires = None;
    }

    pub fn is_armed(&self) -> bool {
        self.expires.is_some()
    }

    pub fn expired(&self, now: Instant) -> bool {
        matches!(self.expires, Some(e) if now >= e)
    }
}
