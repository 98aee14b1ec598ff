//! Hooks for whoever is watching a run.
//!
//! The engine calls these as it applies events. Every method has a no-op
//! default, and no return value flows back into the simulation, so an
//! observer can never change the outcome.

use serde::{Deserialize, Serialize};

use crate::event::EventKind;

pub trait SimObserver {
    /// One call per applied event
    fn on_event(&mut self, _time: f64, _agent: &str, _kind: EventKind) {}
    /// One call per successful kill
    fn on_kill(&mut self, _killer: &str, _victim: &str) {}
    fn on_meeting(&mut self, _time: f64, _reporter: &str, _body: &str) {}
    fn on_ejection(&mut self, _ejected: &str, _votes: u32) {}
    /// Final call with the human-readable result
    fn on_end(&mut self, _result: &str) {}
}

/// Ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl SimObserver for NullObserver {}

/// `[12.50] agent1 - agent_movement`
pub fn event_line(time: f64, agent: &str, kind: EventKind) -> String {
    format!("[{:.2}] {} - {}", time, agent, kind.label())
}

/// `imposter killed agent1!`
pub fn kill_line(killer: &str, victim: &str) -> String {
    format!("{} killed {}!", killer, victim)
}

/// Forwards to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl SimObserver for LogObserver {
    fn on_event(&mut self, time: f64, agent: &str, kind: EventKind) {
        log::info!("{}", event_line(time, agent, kind));
    }

    fn on_kill(&mut self, killer: &str, victim: &str) {
        log::info!("{}", kill_line(killer, victim));
    }

    fn on_meeting(&mut self, time: f64, reporter: &str, body: &str) {
        log::info!("[{:.2}] meeting called by {} over {}", time, reporter, body);
    }

    fn on_ejection(&mut self, ejected: &str, votes: u32) {
        log::info!("{} ejected ({} votes)", ejected, votes);
    }

    fn on_end(&mut self, result: &str) {
        log::info!("{}", result);
    }
}

/// One recorded observer call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    Event {
        time: f64,
        agent: String,
        kind: EventKind,
    },
    Kill {
        killer: String,
        victim: String,
    },
    Meeting {
        time: f64,
        reporter: String,
        body: String,
    },
    Ejection {
        ejected: String,
        votes: u32,
    },
    End {
        result: String,
    },
}

/// Records every call in order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    pub entries: Vec<LogEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kinds of every applied event, in order
    pub fn kinds(&self) -> Vec<EventKind> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                LogEntry::Event { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect()
    }

    pub fn kills(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                LogEntry::Kill { killer, victim } => Some((killer.as_str(), victim.as_str())),
                _ => None,
            })
            .collect()
    }

    /// The terminal result, if the run ended
    pub fn result(&self) -> Option<&str> {
        self.entries.iter().rev().find_map(|e| match e {
            LogEntry::End { result } => Some(result.as_str()),
            _ => None,
        })
    }
}

impl SimObserver for EventLog {
    fn on_event(&mut self, time: f64, agent: &str, kind: EventKind) {
        self.entries.push(LogEntry::Event {
            time,
            agent: agent.to_string(),
            kind,
        });
    }

    fn on_kill(&mut self, killer: &str, victim: &str) {
        self.entries.push(LogEntry::Kill {
            killer: killer.to_string(),
            victim: victim.to_string(),
        });
    }

    fn on_meeting(&mut self, time: f64, reporter: &str, body: &str) {
        self.entries.push(LogEntry::Meeting {
            time,
            reporter: reporter.to_string(),
            body: body.to_string(),
        });
    }

    fn on_ejection(&mut self, ejected: &str, votes: u32) {
        self.entries.push(LogEntry::Ejection {
            ejected: ejected.to_string(),
            votes,
        });
    }

    fn on_end(&mut self, result: &str) {
        self.entries.push(LogEntry::End {
            result: result.to_string(),
        });
    }
}
