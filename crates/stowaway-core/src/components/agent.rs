//! Agent components: Identity, Vitals, Location, Working.
//!
//! The agent's [`Role`] is attached directly as a component.

use serde::{Deserialize, Serialize};

pub use stowaway_logic::Role;

/// Unique agent name. Events and indices refer to agents by this name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
}

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Life state of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vitals {
    pub alive: bool,
    /// A dead agent whose body has been reported or cleared by a meeting.
    /// Always false while alive.
    pub reported: bool,
}

impl Default for Vitals {
    fn default() -> Self {
        Self {
            alive: true,
            reported: false,
        }
    }
}

/// Room the agent currently occupies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub room: String,
}

impl Location {
    pub fn new(room: impl Into<String>) -> Self {
        Self { room: room.into() }
    }
}

/// Task in progress. Only present between a task start and its completion;
/// moving or dying abandons it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Working {
    pub task: String,
    pub room: String,
}

/// Owned snapshot of one agent, handed to controllers and observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    pub name: String,
    pub role: Role,
    pub alive: bool,
    pub room: String,
}
