//! Error types for the engine, its configuration, and vote oracles.

use std::fmt;

/// Failure while applying an event or mutating the population.
///
/// Everything except [`SimError::Fatal`] is scoped to a single event: the run
/// loop logs it, drops the event, and keeps draining the queue.
#[derive(Debug)]
pub enum SimError {
    /// Event names an agent that is not in the population
    UnknownAgent(String),
    /// Event names a room that is not in the graph
    UnknownRoom(String),
    /// Two agents spawned with the same name
    DuplicateAgent(String),
    /// Population indices disagree with the ECS world
    Fatal(String),
}

impl SimError {
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SimError::Fatal(_))
    }
}

impl From<hecs::ComponentError> for SimError {
    fn from(e: hecs::ComponentError) -> Self {
        SimError::Fatal(format!("population index out of sync: {}", e))
    }
}

impl From<hecs::NoSuchEntity> for SimError {
    fn from(e: hecs::NoSuchEntity) -> Self {
        SimError::Fatal(format!("population index out of sync: {}", e))
    }
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::UnknownAgent(name) => write!(f, "Unknown agent: {}", name),
            SimError::UnknownRoom(name) => write!(f, "Unknown room: {}", name),
            SimError::DuplicateAgent(name) => write!(f, "Duplicate agent name: {}", name),
            SimError::Fatal(msg) => write!(f, "Fatal simulation error: {}", msg),
        }
    }
}

impl std::error::Error for SimError {}

/// Invalid map, roster or simulation settings
#[derive(Debug)]
pub enum ConfigError {
    Json(serde_json::Error),
    /// Roster entry placed in a room the graph does not contain
    UnknownRoom { agent: String, room: String },
    DuplicateAgent(String),
    /// Delay range with min > max or a minimum that is not positive
    InvalidDelay { name: &'static str, min: f64, max: f64 },
    /// Population rejected the roster for another reason
    Population(SimError),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

impl From<SimError> for ConfigError {
    fn from(e: SimError) -> Self {
        match e {
            SimError::DuplicateAgent(name) => ConfigError::DuplicateAgent(name),
            other => ConfigError::Population(other),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Json(e) => write!(f, "JSON error: {}", e),
            ConfigError::UnknownRoom { agent, room } => {
                write!(f, "Agent {} starts in unknown room {}", agent, room)
            }
            ConfigError::DuplicateAgent(name) => write!(f, "Duplicate agent name: {}", name),
            ConfigError::InvalidDelay { name, min, max } => {
                write!(f, "Invalid {} range: {}..{}", name, min, max)
            }
            ConfigError::Population(e) => write!(f, "Roster rejected: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Json(e) => Some(e),
            ConfigError::Population(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure reported by a vote oracle. Always treated as an abstention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Backend unreachable, timed out, or refused
    Unavailable(String),
    /// Response could not be parsed into a ballot
    Malformed(String),
    /// Oracle had nobody to accuse
    NoSuspect,
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::Unavailable(msg) => write!(f, "Oracle unavailable: {}", msg),
            OracleError::Malformed(msg) => write!(f, "Malformed ballot: {}", msg),
            OracleError::NoSuspect => write!(f, "No suspect named"),
        }
    }
}

impl std::error::Error for OracleError {}
