//! Timestamped intentions produced by controllers and consumed by the run loop.

use serde::{Deserialize, Serialize};

/// Types of events that can be scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Agent walks to an adjacent room
    Move,
    /// Agent starts a task in its current room
    TaskStart,
    /// Agent finishes a task
    TaskComplete,
    /// Imposter eliminates a crewmate
    Kill,
    /// Reported body opens a meeting
    Meeting,
    /// Meeting ballots are tallied
    Vote,
}

impl EventKind {
    /// Stable label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Move => "agent_movement",
            EventKind::TaskStart => "task_start",
            EventKind::TaskComplete => "task_complete",
            EventKind::Kill => "kill",
            EventKind::Meeting => "emergency_meeting",
            EventKind::Vote => "voting",
        }
    }

    /// Actions performed in the world, as opposed to meeting bookkeeping.
    /// Only these are gated by the game phase.
    pub fn is_action(&self) -> bool {
        matches!(
            self,
            EventKind::Move | EventKind::TaskStart | EventKind::TaskComplete | EventKind::Kill
        )
    }
}

/// Kind-specific event data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Move {
        source: String,
        destination: String,
        path: Vec<String>,
    },
    TaskStart {
        room: String,
        task: String,
    },
    TaskComplete {
        room: String,
        task: String,
    },
    Kill {
        target: String,
        room: String,
        /// No eyewitness mechanic; always empty.
        witnesses: Vec<String>,
    },
    Meeting {
        body: String,
        room: String,
    },
    Vote,
}

/// A scheduled intention to change world state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Simulation time the event fires at
    pub time: f64,
    /// Name of the acting agent
    pub agent: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(time: f64, agent: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            time,
            agent: agent.into(),
            payload,
        }
    }

    /// Direct move between two adjacent rooms.
    pub fn movement(time: f64, agent: impl Into<String>, source: &str, destination: &str) -> Self {
        Self::new(
            time,
            agent,
            EventPayload::Move {
                source: source.to_string(),
                destination: destination.to_string(),
                path: vec![source.to_string(), destination.to_string()],
            },
        )
    }

    pub fn task_start(time: f64, agent: impl Into<String>, room: &str, task: &str) -> Self {
        Self::new(
            time,
            agent,
            EventPayload::TaskStart {
                room: room.to_string(),
                task: task.to_string(),
            },
        )
    }

    pub fn task_complete(time: f64, agent: impl Into<String>, room: &str, task: &str) -> Self {
        Self::new(
            time,
            agent,
            EventPayload::TaskComplete {
                room: room.to_string(),
                task: task.to_string(),
            },
        )
    }

    pub fn kill(time: f64, agent: impl Into<String>, target: &str, room: &str) -> Self {
        Self::new(
            time,
            agent,
            EventPayload::Kill {
                target: target.to_string(),
                room: room.to_string(),
                witnesses: Vec::new(),
            },
        )
    }

    pub fn meeting(time: f64, reporter: impl Into<String>, body: &str, room: &str) -> Self {
        Self::new(
            time,
            reporter,
            EventPayload::Meeting {
                body: body.to_string(),
                room: room.to_string(),
            },
        )
    }

    pub fn vote(time: f64, agent: impl Into<String>) -> Self {
        Self::new(time, agent, EventPayload::Vote)
    }

    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Move { .. } => EventKind::Move,
            EventPayload::TaskStart { .. } => EventKind::TaskStart,
            EventPayload::TaskComplete { .. } => EventKind::TaskComplete,
            EventPayload::Kill { .. } => EventKind::Kill,
            EventPayload::Meeting { .. } => EventKind::Meeting,
            EventPayload::Vote => EventKind::Vote,
        }
    }
}
