//! Pure vote tallying.
//!
//! Ballots are accumulated into a [`Tally`]; the engine asks for the set of
//! leaders and breaks ties itself with its seeded rng. Keeping the leader set
//! sorted makes that tie-break reproducible for a given seed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Upper bound of a ballot's confidence.
pub const MAX_CONFIDENCE: u8 = 100;

/// Weight a single ballot contributes to its suspect.
///
/// Weighted ballots count their confidence (0-100); unweighted ballots
/// count 1 regardless of confidence.
pub fn ballot_weight(confidence: u8, weighted: bool) -> u32 {
    if weighted {
        u32::from(confidence.min(MAX_CONFIDENCE))
    } else {
        1
    }
}

/// Accumulated votes per suspect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    votes: BTreeMap<String, u32>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, suspect: &str, weight: u32) {
        *self.votes.entry(suspect.to_string()).or_insert(0) += weight;
    }

    pub fn get(&self, suspect: &str) -> u32 {
        self.votes.get(suspect).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Highest total, or 0 for an empty tally.
    pub fn max_tally(&self) -> u32 {
        self.votes.values().copied().max().unwrap_or(0)
    }

    /// Every suspect sharing the highest non-zero total, sorted by name.
    pub fn leaders(&self) -> Vec<&str> {
        let max = self.max_tally();
        if max == 0 {
            return Vec::new();
        }
        self.votes
            .iter()
            .filter(|(_, v)| **v == max)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.votes.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: AsRef<str>> FromIterator<(S, u32)> for Tally {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        let mut tally = Tally::new();
        for (suspect, weight) in iter {
            tally.add(suspect.as_ref(), weight);
        }
        tally
    }
}
