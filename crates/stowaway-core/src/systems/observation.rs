//! Who-saw-whom bookkeeping used to build meeting context.
//!
//! Every time an agent walks into a room, everyone alive in that room sees
//! everyone else. Each observer keeps a count of the pairs it watched
//! together, and each agent keeps a short trace of where it was and with
//! whom.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

/// One observed pair and how often it was seen together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairSighting {
    pub first: String,
    pub second: String,
    pub count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ObservationLog {
    /// observer → (a, b) sorted pair → times seen together
    witnessed: HashMap<String, BTreeMap<(String, String), u32>>,
    /// (a, b) sorted pair → times the two shared a room
    together: BTreeMap<(String, String), u32>,
    traces: HashMap<String, VecDeque<String>>,
    trace_len: usize,
}

fn sorted_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl ObservationLog {
    pub fn new(trace_len: usize) -> Self {
        Self {
            trace_len,
            ..Default::default()
        }
    }

    /// Record everyone alive in `room` at `time` seeing each other.
    pub fn record_room(&mut self, time: f64, room: &str, occupants: &[String]) {
        for (i, a) in occupants.iter().enumerate() {
            for b in &occupants[i + 1..] {
                *self.together.entry(sorted_pair(a, b)).or_insert(0) += 1;
            }
        }

        for observer in occupants {
            let others: Vec<&str> = occupants
                .iter()
                .filter(|o| *o != observer)
                .map(|o| o.as_str())
                .collect();

            let seen = self.witnessed.entry(observer.clone()).or_default();
            for (i, a) in others.iter().enumerate() {
                for b in &others[i + 1..] {
                    *seen.entry(sorted_pair(a, b)).or_insert(0) += 1;
                }
            }

            if self.trace_len == 0 {
                continue;
            }
            let line = if others.is_empty() {
                format!("t={:.1} {} alone", time, room)
            } else {
                format!("t={:.1} {} with {}", time, room, others.join(", "))
            };
            let trace = self.traces.entry(observer.clone()).or_default();
            trace.push_back(line);
            while trace.len() > self.trace_len {
                trace.pop_front();
            }
        }
    }

    /// Pairs `observer` watched together, most frequent first
    pub fn witnessed_by(&self, observer: &str) -> Vec<PairSighting> {
        let mut pairs: Vec<PairSighting> = self
            .witnessed
            .get(observer)
            .map(|m| {
                m.iter()
                    .map(|((a, b), &count)| PairSighting {
                        first: a.clone(),
                        second: b.clone(),
                        count,
                    })
                    .collect()
            })
            .unwrap_or_default();
        pairs.sort_by(|x, y| y.count.cmp(&x.count));
        pairs
    }

    /// How often `a` and `b` shared a room
    pub fn times_together(&self, a: &str, b: &str) -> u32 {
        self.together.get(&sorted_pair(a, b)).copied().unwrap_or(0)
    }

    /// Everyone ever seen with `name` and how often, most frequent first
    pub fn companions_of(&self, name: &str) -> Vec<(String, u32)> {
        let mut companions: Vec<(String, u32)> = self
            .together
            .iter()
            .filter_map(|((a, b), &count)| {
                if a == name {
                    Some((b.clone(), count))
                } else if b == name {
                    Some((a.clone(), count))
                } else {
                    None
                }
            })
            .collect();
        companions.sort_by(|x, y| y.1.cmp(&x.1).then_with(|| x.0.cmp(&y.0)));
        companions
    }

    /// Most recent trace lines for an agent, oldest first
    pub fn trace(&self, name: &str) -> Vec<String> {
        self.traces
            .get(name)
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default()
    }
}
