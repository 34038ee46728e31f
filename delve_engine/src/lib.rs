#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! ** Delve **
//! Persistent world-state engine for room-and-item adventures.

pub const DELVE_VERSION: &str = env!("CARGO_PKG_VERSION");

// Storage
pub mod error;
pub mod schema;
pub mod store;
pub mod world;

// Services
pub mod action;
pub mod authoring;
pub mod layout;
pub mod mutation;
pub mod query;

// Front end
pub mod command;
pub mod repl;
pub mod settings;
pub mod style;

// Re-exports for convenience
pub use action::{CombineOutcome, UseOutcome};
pub use authoring::WorldAuthor;
pub use error::{StoreError, StoreResult};
pub use layout::{LAYOUT_SCALE, LayoutReport, auto_layout};
pub use mutation::{TakeOutcome, TravelOutcome, WorldMutator};
pub use query::WorldQuery;
pub use repl::run_repl;
pub use settings::{Settings, resolve_startup_store};
pub use store::WorldStore;
pub use world::{Location, Placement};
