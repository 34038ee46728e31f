//! Shared data model for Delve worlds.

pub mod defs;
pub mod validate;

pub use defs::*;
pub use validate::{ValidationError, validate_action, validate_exit_condition, validate_item, validate_room};
