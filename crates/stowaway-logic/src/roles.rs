//! Roles and game phases.
//!
//! Plain enums with no engine dependency, shared by the engine and the
//! harness.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which faction an agent belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Crewmate,
    Imposter,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Crewmate, Role::Imposter];

    pub fn label(self) -> &'static str {
        match self {
            Role::Crewmate => "crewmate",
            Role::Imposter => "imposter",
        }
    }

    /// The faction that wins when this one has no living members.
    pub fn opponent(self) -> Role {
        match self {
            Role::Crewmate => Role::Imposter,
            Role::Imposter => Role::Crewmate,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse game state. Only `Tasks` lets movement, tasks and kills through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Tasks,
    /// A body was reported; the meeting is about to open.
    Discussion,
    /// Ballots are in; waiting for the tally.
    Voting,
}

impl Phase {
    pub fn allows_actions(self) -> bool {
        matches!(self, Phase::Tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opponent() {
        assert_eq!(Role::Crewmate.opponent(), Role::Imposter);
        assert_eq!(Role::Imposter.opponent(), Role::Crewmate);
    }

    #[test]
    fn test_only_tasks_phase_allows_actions() {
        assert!(Phase::Tasks.allows_actions());
        assert!(!Phase::Discussion.allows_actions());
        assert!(!Phase::Voting.allows_actions());
        assert_eq!(Phase::default(), Phase::Tasks);
    }

    #[test]
    fn test_role_labels() {
        assert_eq!(Role::Crewmate.to_string(), "crewmate");
        assert_eq!(Role::Imposter.label(), "imposter");
    }
}
