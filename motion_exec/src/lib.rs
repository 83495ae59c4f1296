//! # Motion library.
//!
//! This library provides the motion control core of the robot: control stages,
//! odometry, motor control engines, actuators and the path sequencer. The
//! `motion_exec` executable builds on it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuators - motors, on/off outputs and servos, and their registry
pub mod actuator;

/// Control stages - PID controllers and filters chained into pipelines
pub mod ctrl;

/// Motor control engine - runs a pipeline periodically on one motor axis
pub mod engine;

/// Localisation module - dead-reckoning odometry
pub mod loc;

/// Path sequencer - the waypoints followed by the robot
pub mod path;

/// Simulation - simulated motors, drive base, pins and servo boards
#[cfg(feature = "sim")]
pub mod sim;
