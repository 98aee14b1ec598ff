//! Component definitions for the agent population.
//!
//! Components are pure data structs attached to entities.
//! They have no behavior - that lives in systems.

mod agent;

pub use agent::*;
