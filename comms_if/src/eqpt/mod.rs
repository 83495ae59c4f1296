//! # Equipment Interface
//!
//! This module defines the interface structures which describe the equipment driven by the motion
//! core.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod act;
