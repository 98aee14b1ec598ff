//! Stowaway Core - Discrete-Event Social Deduction Engine
//!
//! Crewmates and imposters wander a graph of rooms. Every agent's next
//! action is a timestamped event; the engine pops events in time order,
//! applies them to the population, checks whether a faction has won, and
//! asks the acting agent what it does next.
//!
//! # Architecture
//!
//! - **Population**: agents live in a `hecs` world (identity, role, vitals,
//!   location) with name and room indices kept alongside
//! - **Scheduler**: min-heap of events, FIFO among equal times
//! - **Systems**: role controllers, body discovery, meetings and voting
//! - **Engine**: the run loop tying it all together
//!
//! # Example
//!
//! ```rust,no_run
//! use stowaway_core::prelude::*;
//!
//! let (graph, population) = MapConfig::default_ship().build().unwrap();
//! let mut sim = SimulationController::new(graph, population, SimulationConfig::seeded(7))
//!     .with_observer(LogObserver)
//!     .with_discussion(SuspicionOracle);
//!
//! let report = sim.run().unwrap();
//! println!("{}", report.outcome.message());
//! ```

pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod generation;
pub mod observer;
pub mod population;
pub mod scheduler;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::{ActionTiming, DelayRange, DiscussionConfig, SimulationConfig};
    pub use crate::engine::{RunOutcome, RunReport, SimulationController};
    pub use crate::error::{ConfigError, OracleError, SimError};
    pub use crate::event::{Event, EventKind, EventPayload};
    pub use crate::generation::{AgentSpec, MapConfig};
    pub use crate::observer::{EventLog, LogObserver, NullObserver, SimObserver};
    pub use crate::population::Population;
    pub use crate::scheduler::Scheduler;
    pub use crate::systems::{AbstainOracle, Ballot, SuspicionOracle, VoteOracle, VoteRequest};
    pub use stowaway_logic::{Phase, RoomGraph};
}
