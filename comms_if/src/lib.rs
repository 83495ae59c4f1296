//! # Communications interface crate.
//!
//! Provides the interface types exchanged between the motion control core and
//! the external protocol layer. Framing and encoding of these types are the
//! protocol layer's business, this crate only fixes their content.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Commands sent to the motion core by the dispatcher
pub mod tc;

/// Identifiers and state snapshots of the equipment (actuators)
pub mod eqpt;
