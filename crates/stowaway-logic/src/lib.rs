//! Pure game logic for Stowaway.
//!
//! Everything here is plain data and functions: no ECS world, no rng, no
//! logging. The engine in `stowaway-core` builds on these types.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`roles`] | Crewmate/Imposter roles and the Tasks/Discussion/Voting phase |
//! | [`room_graph`] | Undirected adjacency over named rooms |
//! | [`voting`] | Weighted ballot tallying and leader sets |

pub mod roles;
pub mod room_graph;
pub mod voting;

pub use roles::{Phase, Role};
pub use room_graph::RoomGraph;
pub use voting::Tally;
