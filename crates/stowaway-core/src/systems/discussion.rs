//! Body reports, meetings and ejection votes.
//!
//! The engine runs in the `Tasks` phase until a [`BodyDiscovery`] policy
//! reports a body. The report schedules a Meeting event; the meeting asks a
//! [`VoteOracle`] for one ballot per living agent and schedules a Vote
//! event; the vote tallies, ejects, and returns the game to `Tasks`.
//!
//! While a meeting is pending, actions popped off the queue are not applied
//! and their agents are parked until the vote resolves.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use stowaway_logic::voting::{ballot_weight, Tally, MAX_CONFIDENCE};
use stowaway_logic::Phase;

use super::observation::{ObservationLog, PairSighting};
use crate::components::Role;
use crate::config::DiscussionConfig;
use crate::error::{OracleError, SimError};
use crate::event::Event;
use crate::population::Population;

/// One agent's accusation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub suspect: String,
    pub reason: String,
    /// 0-100
    pub confidence: u8,
}

/// Wire shape of a text-generation response. The suspect may come back as
/// a bare number and confidence is optional.
#[derive(Deserialize)]
struct RawBallot {
    suspect: serde_json::Value,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

impl Ballot {
    pub fn new(suspect: impl Into<String>, reason: impl Into<String>, confidence: u8) -> Self {
        Self {
            suspect: suspect.into(),
            reason: reason.into(),
            confidence,
        }
    }

    /// Parse `{"suspect": "...", "reason": "...", "confidence": n}`.
    ///
    /// Markdown code fences around the object are ignored. A missing
    /// confidence counts as full confidence.
    pub fn from_json(text: &str) -> Result<Self, OracleError> {
        let body = text.replace("```json", "").replace("```", "");
        let raw: RawBallot =
            serde_json::from_str(body.trim()).map_err(|e| OracleError::Malformed(e.to_string()))?;

        let suspect = match raw.suspect {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            other => return Err(OracleError::Malformed(format!("suspect {}", other))),
        };
        if suspect.is_empty() {
            return Err(OracleError::NoSuspect);
        }

        let confidence = raw.confidence.unwrap_or(f64::from(MAX_CONFIDENCE));
        if !(0.0..=f64::from(MAX_CONFIDENCE)).contains(&confidence) {
            return Err(OracleError::Malformed(format!(
                "confidence {} out of range",
                confidence
            )));
        }

        Ok(Self {
            suspect,
            reason: raw.reason.unwrap_or_default(),
            confidence: confidence.round() as u8,
        })
    }
}

/// Match a suspect as written by an oracle to an agent name.
///
/// Exact names win; otherwise an `Agent ` prefix is stripped and the rest
/// matched again, so `"Agent 3"` finds agent `3`.
pub fn resolve_suspect(raw: &str, population: &Population) -> Option<String> {
    let raw = raw.trim();
    if population.contains(raw) {
        return Some(raw.to_string());
    }
    let stripped = raw
        .strip_prefix("Agent ")
        .or_else(|| raw.strip_prefix("agent "))?
        .trim();
    population
        .contains(stripped)
        .then(|| stripped.to_string())
}

/// Everything a voter is told before casting a ballot
#[derive(Debug, Clone, Serialize)]
pub struct VoteRequest {
    pub role: Role,
    pub agent: String,
    pub victim: String,
    pub death_location: String,
    /// Pairs the victim saw together before dying
    pub suspicions: Vec<PairSighting>,
    /// Agents the victim shared rooms with, most frequent first
    pub victim_companions: Vec<(String, u32)>,
    pub living_crewmates: Vec<String>,
    /// Living agents the voter may accuse
    pub candidates: Vec<String>,
    /// Voter's recent whereabouts, oldest first
    pub trace: Vec<String>,
}

/// Source of ballots, typically a text-generation backend.
///
/// Any error is an abstention for that voter.
pub trait VoteOracle {
    fn cast_vote(&mut self, request: &VoteRequest) -> Result<Ballot, OracleError>;
}

impl<F> VoteOracle for F
where
    F: FnMut(&VoteRequest) -> Result<Ballot, OracleError>,
{
    fn cast_vote(&mut self, request: &VoteRequest) -> Result<Ballot, OracleError> {
        self(request)
    }
}

/// Never votes
#[derive(Debug, Clone, Copy, Default)]
pub struct AbstainOracle;

impl VoteOracle for AbstainOracle {
    fn cast_vote(&mut self, _request: &VoteRequest) -> Result<Ballot, OracleError> {
        Err(OracleError::Unavailable("abstain".to_string()))
    }
}

/// Local stand-in for a language model: accuse whoever was seen with the
/// victim most often. A voter topping that list names the runner-up.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuspicionOracle;

impl VoteOracle for SuspicionOracle {
    fn cast_vote(&mut self, request: &VoteRequest) -> Result<Ballot, OracleError> {
        let (suspect, count) = request
            .victim_companions
            .iter()
            .find(|(name, _)| *name != request.agent && request.candidates.contains(name))
            .ok_or(OracleError::NoSuspect)?;

        let confidence = (count.saturating_mul(25)).clamp(10, u32::from(MAX_CONFIDENCE)) as u8;
        Ok(Ballot::new(
            suspect.clone(),
            format!(
                "{} was seen with {} {} time(s)",
                suspect, request.victim, count
            ),
            confidence,
        ))
    }
}

/// A body and the agent who found it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyReport {
    pub reporter: String,
    pub body: String,
    pub room: String,
}

/// Decides whether a body has been found after an event is applied.
pub trait BodyDiscovery {
    fn discover(&mut self, population: &Population) -> Option<BodyReport>;
}

/// A living crewmate sharing a room with an unreported body reports it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameRoomDiscovery;

impl BodyDiscovery for SameRoomDiscovery {
    fn discover(&mut self, population: &Population) -> Option<BodyReport> {
        population
            .unreported_bodies()
            .into_iter()
            .find_map(|(body, room)| {
                let reporter = population
                    .living_in_room(&room, Role::Crewmate)
                    .into_iter()
                    .next()?;
                Some(BodyReport {
                    reporter,
                    body,
                    room,
                })
            })
    }
}

/// A ballot that passed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastBallot {
    pub voter: String,
    pub ballot: Ballot,
    pub weight: u32,
}

/// History entry for one meeting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub reported_at: f64,
    pub report: BodyReport,
    pub ballots: Vec<CastBallot>,
    pub abstentions: Vec<String>,
    pub tally: Tally,
    pub ejected: Option<String>,
    pub resolved_at: Option<f64>,
}

/// Phase machine for the discussion extension
pub struct Discussion {
    config: DiscussionConfig,
    oracle: Box<dyn VoteOracle>,
    discovery: Box<dyn BodyDiscovery>,
    phase: Phase,
    /// Agents whose actions were gated, resumed when the vote resolves
    suspended: BTreeSet<String>,
    current: Option<MeetingRecord>,
    history: Vec<MeetingRecord>,
}

impl Discussion {
    pub fn new(config: DiscussionConfig, oracle: Box<dyn VoteOracle>) -> Self {
        Self {
            config,
            oracle,
            discovery: Box::new(SameRoomDiscovery),
            phase: Phase::Tasks,
            suspended: BTreeSet::new(),
            current: None,
            history: Vec::new(),
        }
    }

    pub fn with_discovery(mut self, discovery: Box<dyn BodyDiscovery>) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn history(&self) -> &[MeetingRecord] {
        &self.history
    }

    /// Park an agent until the current meeting ends.
    pub fn suspend(&mut self, agent: &str) {
        self.suspended.insert(agent.to_string());
    }

    /// Agents to resume, emptying the parked set.
    pub fn take_suspended(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.suspended)
    }

    /// Look for a body during `Tasks`. On a find, flag the body, move to
    /// `Discussion`, and hand back the Meeting event to schedule.
    pub fn check_for_bodies(
        &mut self,
        population: &mut Population,
        now: f64,
    ) -> Result<Option<Event>, SimError> {
        if self.phase != Phase::Tasks {
            return Ok(None);
        }
        let Some(report) = self.discovery.discover(population) else {
            return Ok(None);
        };
        population.mark_reported(&report.body)?;
        log::info!(
            "{} found the body of {} in {} at {:.2}",
            report.reporter,
            report.body,
            report.room,
            now
        );

        let meeting = Event::meeting(
            now + self.config.discussion_delay,
            &report.reporter,
            &report.body,
            &report.room,
        );
        self.phase = Phase::Discussion;
        self.current = Some(MeetingRecord {
            reported_at: now,
            report,
            ballots: Vec::new(),
            abstentions: Vec::new(),
            tally: Tally::new(),
            ejected: None,
            resolved_at: None,
        });
        Ok(Some(meeting))
    }

    /// Collect ballots from every living agent and move to `Voting`.
    /// Returns the Vote event to schedule.
    pub fn hold_meeting(
        &mut self,
        chair: &str,
        population: &Population,
        observations: &ObservationLog,
        now: f64,
    ) -> Option<Event> {
        if self.phase != Phase::Discussion {
            log::debug!("meeting at {:.2} ignored in phase {:?}", now, self.phase);
            return None;
        }
        let Some(record) = self.current.as_mut() else {
            return None;
        };

        let living: Vec<_> = population.agents().into_iter().filter(|a| a.alive).collect();
        let candidates: Vec<String> = living.iter().map(|a| a.name.clone()).collect();
        let living_crewmates = population.living_names(Role::Crewmate);
        let victim = record.report.body.clone();
        let suspicions = observations.witnessed_by(&victim);
        let victim_companions = observations.companions_of(&victim);

        for voter in living {
            let request = VoteRequest {
                role: voter.role,
                agent: voter.name.clone(),
                victim: victim.clone(),
                death_location: record.report.room.clone(),
                suspicions: suspicions.clone(),
                victim_companions: victim_companions.clone(),
                living_crewmates: living_crewmates.clone(),
                candidates: candidates.clone(),
                trace: observations.trace(&voter.name),
            };

            let ballot = match self.oracle.cast_vote(&request) {
                Ok(ballot) => ballot,
                Err(e) => {
                    log::warn!("{} abstains: {}", voter.name, e);
                    record.abstentions.push(voter.name);
                    continue;
                }
            };

            let suspect = match resolve_suspect(&ballot.suspect, population) {
                Some(s) if s != voter.name && population.is_alive(&s) => s,
                _ => {
                    log::info!("{} named invalid suspect {:?}", voter.name, ballot.suspect);
                    record.abstentions.push(voter.name);
                    continue;
                }
            };

            let weight = ballot_weight(ballot.confidence, self.config.weighted);
            record.tally.add(&suspect, weight);
            log::info!(
                "{} votes {} ({}): {}",
                voter.name,
                suspect,
                ballot.confidence,
                ballot.reason
            );
            record.ballots.push(CastBallot {
                voter: voter.name,
                ballot: Ballot { suspect, ..ballot },
                weight,
            });
        }

        self.phase = Phase::Voting;
        Some(Event::vote(now + self.config.voting_delay, chair))
    }

    /// Tally, eject at most one agent, and return to `Tasks`.
    ///
    /// Ties among the top tally are broken uniformly at random. Returns the
    /// finished meeting record.
    pub fn resolve_vote(
        &mut self,
        population: &mut Population,
        rng: &mut impl Rng,
        now: f64,
    ) -> Result<Option<MeetingRecord>, SimError> {
        if self.phase != Phase::Voting {
            log::debug!("vote at {:.2} ignored in phase {:?}", now, self.phase);
            return Ok(None);
        }
        let Some(mut record) = self.current.take() else {
            self.phase = Phase::Tasks;
            return Ok(None);
        };

        record.ejected = pick_ejection(&record.tally, rng);
        if let Some(ejected) = &record.ejected {
            population.kill(ejected)?;
            log::info!(
                "{} was ejected with {} votes",
                ejected,
                record.tally.get(ejected)
            );
        } else {
            log::info!("no one was ejected");
        }

        population.clear_bodies();
        record.resolved_at = Some(now);
        self.phase = Phase::Tasks;
        self.history.push(record.clone());
        Ok(Some(record))
    }
}

/// Uniform choice among the agents sharing the highest tally.
pub fn pick_ejection(tally: &Tally, rng: &mut impl Rng) -> Option<String> {
    tally.leaders().choose(rng).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tie() -> Tally {
        [("A", 2), ("B", 2), ("C", 1)].into_iter().collect()
    }

    #[test]
    fn test_tie_break_reproducible_per_seed() {
        for seed in 0..20 {
            let first = pick_ejection(&tie(), &mut StdRng::seed_from_u64(seed));
            for _ in 0..5 {
                let again = pick_ejection(&tie(), &mut StdRng::seed_from_u64(seed));
                assert_eq!(first, again);
            }
            let chosen = first.unwrap();
            assert!(chosen == "A" || chosen == "B");
        }
    }

    #[test]
    fn test_tie_break_roughly_uniform() {
        let mut a = 0;
        let trials = 2000;
        for seed in 0..trials {
            if pick_ejection(&tie(), &mut StdRng::seed_from_u64(seed)).as_deref() == Some("A") {
                a += 1;
            }
        }
        assert!((850..=1150).contains(&a), "A chosen {} of {}", a, trials);
    }

    #[test]
    fn test_empty_tally_ejects_nobody() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(pick_ejection(&Tally::new(), &mut rng), None);
    }

    #[test]
    fn test_ballot_from_json() {
        let b = Ballot::from_json(r#"{"suspect": "Agent 3", "reason": "vented", "confidence": 80}"#)
            .unwrap();
        assert_eq!(b, Ballot::new("Agent 3", "vented", 80));

        let b = Ballot::from_json(r#"{"suspect": 7}"#).unwrap();
        assert_eq!(b.suspect, "7");
        assert_eq!(b.confidence, 100);

        let fenced = "```json\n{\"suspect\": \"Agent 3\", \"reason\": \"x\", \"confidence\": 70}\n```";
        assert_eq!(Ballot::from_json(fenced).unwrap(), Ballot::new("Agent 3", "x", 70));

        let bare_fence = "```\n{\"suspect\": \"agent2\"}\n```\n";
        assert_eq!(Ballot::from_json(bare_fence).unwrap().suspect, "agent2");
    }

    #[test]
    fn test_ballot_from_json_failures() {
        assert!(matches!(Ballot::from_json("not json"), Err(OracleError::Malformed(_))));
        assert!(matches!(
            Ballot::from_json(r#"{"suspect": "x", "confidence": 140}"#),
            Err(OracleError::Malformed(_))
        ));
        assert_eq!(
            Ballot::from_json(r#"{"suspect": "  "}"#),
            Err(OracleError::NoSuspect)
        );
        assert!(matches!(
            Ballot::from_json(r#"{"suspect": null}"#),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn test_resolve_suspect() {
        let mut pop = Population::new();
        pop.spawn("3", Role::Crewmate, "E").unwrap();
        pop.spawn("agent2", Role::Crewmate, "E").unwrap();
        assert_eq!(resolve_suspect("Agent 3", &pop), Some("3".to_string()));
        assert_eq!(resolve_suspect(" agent2 ", &pop), Some("agent2".to_string()));
        assert_eq!(resolve_suspect("Agent 9", &pop), None);
        assert_eq!(resolve_suspect("nobody", &pop), None);
    }

    #[test]
    fn test_same_room_discovery() {
        let mut pop = Population::new();
        pop.spawn("victim", Role::Crewmate, "Admin").unwrap();
        pop.spawn("imp", Role::Imposter, "Admin").unwrap();
        pop.spawn("crew", Role::Crewmate, "Storage").unwrap();
        pop.kill("victim").unwrap();

        let mut discovery = SameRoomDiscovery;
        // only the imposter is with the body
        assert!(discovery.discover(&pop).is_none());

        pop.move_agent("crew", "Admin").unwrap();
        let report = discovery.discover(&pop).unwrap();
        assert_eq!(report.reporter, "crew");
        assert_eq!(report.body, "victim");
        assert_eq!(report.room, "Admin");
    }

    fn meeting_population() -> Population {
        let mut pop = Population::new();
        pop.spawn("victim", Role::Crewmate, "Admin").unwrap();
        pop.spawn("crew", Role::Crewmate, "Admin").unwrap();
        pop.spawn("other", Role::Crewmate, "Storage").unwrap();
        pop.spawn("imp", Role::Imposter, "Storage").unwrap();
        pop.kill("victim").unwrap();
        pop
    }

    #[test]
    fn test_full_meeting_cycle() {
        let mut pop = meeting_population();
        let observations = ObservationLog::new(5);
        let oracle = |req: &VoteRequest| -> Result<Ballot, OracleError> {
            if req.agent == "imp" {
                Ok(Ballot::new("other", "sus", 90))
            } else {
                Ok(Ballot::new("imp", "saw it", 60))
            }
        };
        let mut d = Discussion::new(DiscussionConfig::default(), Box::new(oracle));
        let mut rng = StdRng::seed_from_u64(1);

        let meeting = d.check_for_bodies(&mut pop, 10.0).unwrap().unwrap();
        assert_eq!(d.phase(), Phase::Discussion);
        assert_eq!(meeting.time, 15.0);
        assert_eq!(meeting.agent, "crew");
        assert!(pop.is_reported("victim"));
        // already in discussion, nothing new is reported
        assert!(d.check_for_bodies(&mut pop, 11.0).unwrap().is_none());

        let vote = d.hold_meeting("crew", &pop, &observations, 15.0).unwrap();
        assert_eq!(d.phase(), Phase::Voting);
        assert_eq!(vote.time, 20.0);

        let record = d.resolve_vote(&mut pop, &mut rng, 20.0).unwrap().unwrap();
        // crew + other at 60 each beat the imposter's 90
        assert_eq!(record.tally.get("imp"), 120);
        assert_eq!(record.tally.get("other"), 90);
        assert_eq!(record.ejected.as_deref(), Some("imp"));
        assert!(!pop.is_alive("imp"));
        assert!(pop.unreported_bodies().is_empty());
        assert_eq!(d.phase(), Phase::Tasks);
        assert_eq!(d.history().len(), 1);
    }

    #[test]
    fn test_oracle_failures_abstain() {
        let mut pop = meeting_population();
        let observations = ObservationLog::new(5);
        let mut d = Discussion::new(DiscussionConfig::default(), Box::new(AbstainOracle));
        let mut rng = StdRng::seed_from_u64(1);

        d.check_for_bodies(&mut pop, 0.0).unwrap();
        d.hold_meeting("crew", &pop, &observations, 5.0).unwrap();
        let record = d.resolve_vote(&mut pop, &mut rng, 10.0).unwrap().unwrap();
        assert!(record.ballots.is_empty());
        assert_eq!(record.abstentions, vec!["crew", "other", "imp"]);
        assert_eq!(record.ejected, None);
        assert_eq!(pop.living_count(Role::Crewmate), 2);
        assert_eq!(pop.living_count(Role::Imposter), 1);
    }

    #[test]
    fn test_invalid_suspects_abstain() {
        let mut pop = meeting_population();
        let observations = ObservationLog::new(5);
        let oracle = |req: &VoteRequest| -> Result<Ballot, OracleError> {
            match req.agent.as_str() {
                "crew" => Ok(Ballot::new("crew", "me", 50)),
                "other" => Ok(Ballot::new("victim", "dead", 50)),
                _ => Ok(Ballot::new("ghost", "?", 50)),
            }
        };
        let mut d = Discussion::new(DiscussionConfig::default(), Box::new(oracle));
        d.check_for_bodies(&mut pop, 0.0).unwrap();
        d.hold_meeting("crew", &pop, &observations, 5.0).unwrap();
        let record = d
            .resolve_vote(&mut pop, &mut StdRng::seed_from_u64(0), 10.0)
            .unwrap()
            .unwrap();
        assert!(record.ballots.is_empty());
        assert_eq!(record.abstentions.len(), 3);
    }

    #[test]
    fn test_suspicion_oracle_picks_frequent_companion() {
        let mut pop = meeting_population();
        let mut observations = ObservationLog::new(5);
        let pair = |a: &str, b: &str| vec![a.to_string(), b.to_string()];
        observations.record_room(1.0, "Admin", &pair("victim", "imp"));
        observations.record_room(2.0, "Admin", &pair("victim", "imp"));
        observations.record_room(3.0, "Admin", &pair("victim", "other"));

        let mut d = Discussion::new(DiscussionConfig::default(), Box::new(SuspicionOracle));
        d.check_for_bodies(&mut pop, 4.0).unwrap();
        d.hold_meeting("crew", &pop, &observations, 9.0).unwrap();
        let record = d
            .resolve_vote(&mut pop, &mut StdRng::seed_from_u64(0), 14.0)
            .unwrap()
            .unwrap();

        // crew and other accuse imp at 50; imp deflects onto other at 25
        assert_eq!(record.tally.get("imp"), 100);
        assert_eq!(record.tally.get("other"), 25);
        assert_eq!(record.ejected.as_deref(), Some("imp"));
    }
}
