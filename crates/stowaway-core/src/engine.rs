//! Simulation engine - owns the world and drains the event queue

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use stowaway_logic::{Phase, RoomGraph};

use crate::components::Role;
use crate::config::SimulationConfig;
use crate::error::SimError;
use crate::event::{Event, EventPayload};
use crate::observer::{NullObserver, SimObserver};
use crate::population::Population;
use crate::scheduler::Scheduler;
use crate::systems::*;

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// One faction has no living members
    Victory(Role),
    /// Nothing left to pop and nobody won
    QueueDrained,
    /// `max_events` reached
    EventLimit,
}

impl RunOutcome {
    pub fn winner(&self) -> Option<Role> {
        match self {
            RunOutcome::Victory(role) => Some(*role),
            _ => None,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RunOutcome::Victory(Role::Imposter) => "All crewmates are dead. Imposters win!",
            RunOutcome::Victory(Role::Crewmate) => "All imposters are dead. Crewmates win!",
            RunOutcome::QueueDrained => "No events left. Nobody wins.",
            RunOutcome::EventLimit => "Event limit reached. Nobody wins.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillRecord {
    pub time: f64,
    pub killer: String,
    pub victim: String,
    pub room: String,
}

/// Counters kept while the queue drains
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub events_applied: u64,
    /// Action events held back during a meeting
    pub gated_events: u64,
    /// Action events whose agent died after deciding them
    pub stale_events: u64,
    /// Events dropped by a recoverable error
    pub rejected_events: u64,
    pub kills: Vec<KillRecord>,
    pub ejections: Vec<String>,
    pub tasks_started: BTreeMap<String, u32>,
    /// Finished tasks per agent. Never exceeds `tasks_started`.
    pub tasks_completed: BTreeMap<String, u32>,
}

/// Everything `run` hands back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub final_time: f64,
    #[serde(flatten)]
    pub stats: RunStats,
    pub meetings: Vec<MeetingRecord>,
}

/// What happened to one popped event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Done,
    Gated,
    Stale,
}

/// Main simulation engine
pub struct SimulationController<O: SimObserver = NullObserver> {
    graph: RoomGraph,
    population: Population,
    scheduler: Scheduler,
    config: SimulationConfig,
    rng: StdRng,
    observer: O,
    /// Meetings and votes, only when an oracle is attached
    discussion: Option<Discussion>,
    observations: ObservationLog,
    stats: RunStats,
    seeded: bool,
}

impl SimulationController<NullObserver> {
    pub fn new(graph: RoomGraph, population: Population, config: SimulationConfig) -> Self {
        let rng = config.make_rng();
        let observations = ObservationLog::new(config.discussion.trace_len);
        Self {
            graph,
            population,
            scheduler: Scheduler::new(),
            config,
            rng,
            observer: NullObserver,
            discussion: None,
            observations,
            stats: RunStats::default(),
            seeded: false,
        }
    }
}

impl<O: SimObserver> SimulationController<O> {
    /// Swap in a different observer, keeping all other state.
    pub fn with_observer<P: SimObserver>(self, observer: P) -> SimulationController<P> {
        SimulationController {
            graph: self.graph,
            population: self.population,
            scheduler: self.scheduler,
            config: self.config,
            rng: self.rng,
            observer,
            discussion: self.discussion,
            observations: self.observations,
            stats: self.stats,
            seeded: self.seeded,
        }
    }

    /// Turn on body reports, meetings and votes.
    pub fn with_discussion(mut self, oracle: impl VoteOracle + 'static) -> Self {
        self.discussion = Some(Discussion::new(
            self.config.discussion.clone(),
            Box::new(oracle),
        ));
        self
    }

    /// Replace the body discovery policy. No effect before `with_discussion`.
    pub fn with_discovery(mut self, discovery: impl BodyDiscovery + 'static) -> Self {
        self.discussion = self
            .discussion
            .take()
            .map(|d| d.with_discovery(Box::new(discovery)));
        self
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn graph(&self) -> &RoomGraph {
        &self.graph
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn observations(&self) -> &ObservationLog {
        &self.observations
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn clock(&self) -> f64 {
        self.scheduler.clock()
    }

    pub fn phase(&self) -> Phase {
        self.discussion
            .as_ref()
            .map_or(Phase::Tasks, |d| d.phase())
    }

    /// Queue an event directly, bypassing the controllers.
    pub fn schedule(&mut self, event: Event) {
        self.scheduler.schedule(event);
    }

    /// Run until a faction wins, the queue drains, or the event limit hits.
    ///
    /// Only a [`SimError::Fatal`] comes back as `Err`.
    pub fn run(&mut self) -> Result<RunReport, SimError> {
        if let Some(winner) = self.check_winner() {
            return Ok(self.finish(RunOutcome::Victory(winner)));
        }
        self.seed();

        let mut popped: u64 = 0;
        loop {
            if let Some(limit) = self.config.max_events {
                if popped >= limit {
                    return Ok(self.finish(RunOutcome::EventLimit));
                }
            }
            popped += 1;
            if let Some(outcome) = self.step()? {
                return Ok(self.finish(outcome));
            }
        }
    }

    /// Ask every agent for its first action, in roster order. Runs once.
    pub fn seed(&mut self) {
        if self.seeded {
            return;
        }
        self.seeded = true;
        let roster = self.population.roster().to_vec();
        for name in &roster {
            self.decide(name, 0.0);
        }
        log::debug!("seeded {} events for {} agents", self.scheduler.len(), roster.len());
    }

    /// Pop and fully process one event. `Some` means the run is over.
    pub fn step(&mut self) -> Result<Option<RunOutcome>, SimError> {
        let Some(event) = self.scheduler.pop_next() else {
            return Ok(Some(RunOutcome::QueueDrained));
        };
        let now = self.scheduler.clock();

        match self.apply(&event, now) {
            Ok(Applied::Done) => self.stats.events_applied += 1,
            Ok(Applied::Gated) => {
                log::debug!("{} holds {} until the vote", event.agent, event.kind().label());
                self.stats.gated_events += 1;
                if let Some(discussion) = self.discussion.as_mut() {
                    discussion.suspend(&event.agent);
                }
                return Ok(None);
            }
            Ok(Applied::Stale) => {
                log::debug!(
                    "dropping {} from dead agent {} at {:.2}",
                    event.kind().label(),
                    event.agent,
                    now
                );
                self.stats.stale_events += 1;
                return Ok(None);
            }
            Err(e) if e.is_recoverable() => {
                log::warn!(
                    "rejected {} from {} at {:.2}: {}",
                    event.kind().label(),
                    event.agent,
                    now,
                    e
                );
                self.stats.rejected_events += 1;
            }
            Err(e) => return Err(e),
        }

        if let Some(winner) = self.check_winner() {
            return Ok(Some(RunOutcome::Victory(winner)));
        }

        if let Some(discussion) = self.discussion.as_mut() {
            if let Some(meeting) = discussion.check_for_bodies(&mut self.population, now)? {
                self.scheduler.schedule(meeting);
            }
        }

        self.redecide(&event, now);
        Ok(None)
    }

    fn apply(&mut self, event: &Event, now: f64) -> Result<Applied, SimError> {
        let kind = event.kind();
        if kind.is_action() {
            let actor = self
                .population
                .agent(&event.agent)
                .ok_or_else(|| SimError::UnknownAgent(event.agent.clone()))?;
            if !actor.alive && !self.config.dead_agents_act {
                return Ok(Applied::Stale);
            }
            if !self.phase().allows_actions() {
                return Ok(Applied::Gated);
            }
        }
        if let EventPayload::Move { destination, .. } = &event.payload {
            if !self.graph.has_room(destination) {
                return Err(SimError::UnknownRoom(destination.clone()));
            }
        }

        self.observer.on_event(now, &event.agent, kind);

        match &event.payload {
            EventPayload::Move { destination, .. } => {
                let source = self.population.move_agent(&event.agent, destination)?;
                log::debug!("{} moved {} -> {} at {:.2}", event.agent, source, destination, now);
                let occupants = self.population.living_occupants(destination);
                self.observations.record_room(now, destination, &occupants);
            }
            EventPayload::Kill { target, room, .. } => match self.population.kill(target) {
                Ok(true) => {
                    log::info!("{} killed {} in {} at {:.2}", event.agent, target, room, now);
                    self.stats.kills.push(KillRecord {
                        time: now,
                        killer: event.agent.clone(),
                        victim: target.clone(),
                        room: room.clone(),
                    });
                    self.observer.on_kill(&event.agent, target);
                }
                Ok(false) => log::info!("{} is already dead, kill ignored", target),
                Err(SimError::UnknownAgent(_)) => {
                    log::info!("kill target {} does not exist, ignored", target)
                }
                Err(e) => return Err(e),
            },
            EventPayload::TaskStart { room, task } => {
                self.population.start_task(&event.agent, task)?;
                log::debug!("{} started {} in {} at {:.2}", event.agent, task, room, now);
                *self
                    .stats
                    .tasks_started
                    .entry(event.agent.clone())
                    .or_insert(0) += 1;
            }
            EventPayload::TaskComplete { room, task } => {
                if self.population.finish_task(&event.agent, task)? {
                    log::info!("{} completed {} in {} at {:.2}", event.agent, task, room, now);
                    *self
                        .stats
                        .tasks_completed
                        .entry(event.agent.clone())
                        .or_insert(0) += 1;
                } else {
                    log::debug!("{} is not working on {}, completion ignored", event.agent, task);
                }
            }
            EventPayload::Meeting { body, .. } => {
                let Some(discussion) = self.discussion.as_mut() else {
                    log::debug!("meeting without a vote oracle ignored");
                    return Ok(Applied::Done);
                };
                self.observer.on_meeting(now, &event.agent, body);
                if let Some(vote) =
                    discussion.hold_meeting(&event.agent, &self.population, &self.observations, now)
                {
                    self.scheduler.schedule(vote);
                }
            }
            EventPayload::Vote => {
                let Some(discussion) = self.discussion.as_mut() else {
                    log::debug!("vote without a vote oracle ignored");
                    return Ok(Applied::Done);
                };
                let record = discussion.resolve_vote(&mut self.population, &mut self.rng, now)?;
                if let Some(ejected) = record.as_ref().and_then(|r| {
                    r.ejected
                        .as_ref()
                        .map(|name| (name.clone(), r.tally.get(name)))
                }) {
                    self.stats.ejections.push(ejected.0.clone());
                    self.observer.on_ejection(&ejected.0, ejected.1);
                }
            }
        }
        Ok(Applied::Done)
    }

    /// Crewmates are checked first, so an empty ship is an imposter win.
    fn check_winner(&self) -> Option<Role> {
        if self.population.living_count(Role::Crewmate) == 0 {
            Some(Role::Imposter)
        } else if self.population.living_count(Role::Imposter) == 0 {
            Some(Role::Crewmate)
        } else {
            None
        }
    }

    /// Give the acting agent its next turn and wake anyone parked by a
    /// meeting that just ended. Meeting and Vote events are not turns.
    fn redecide(&mut self, event: &Event, now: f64) {
        let open = self.phase().allows_actions();
        if event.kind().is_action() {
            if open {
                self.decide(&event.agent, now);
            } else if let Some(discussion) = self.discussion.as_mut() {
                discussion.suspend(&event.agent);
            }
        }
        if !open {
            return;
        }

        let resumed = self
            .discussion
            .as_mut()
            .map(Discussion::take_suspended)
            .unwrap_or_default();
        for name in &resumed {
            self.decide(name, now);
        }
    }

    fn decide(&mut self, name: &str, now: f64) {
        if let Some(event) = decide_next_action(
            name,
            now,
            &self.population,
            &self.graph,
            &self.config.timing,
            &mut self.rng,
        ) {
            self.scheduler.schedule(event);
        }
    }

    fn finish(&mut self, outcome: RunOutcome) -> RunReport {
        self.observer.on_end(outcome.message());
        RunReport {
            outcome,
            final_time: self.scheduler.clock(),
            stats: std::mem::take(&mut self.stats),
            meetings: self
                .discussion
                .as_ref()
                .map(|d| d.history().to_vec())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::EventLog;

    fn chain_world() -> (RoomGraph, Population) {
        let graph = RoomGraph::from_edges(&[("E", "S"), ("S", "M")]);
        let mut pop = Population::new();
        pop.spawn("crew", Role::Crewmate, "E").unwrap();
        pop.spawn("imp", Role::Imposter, "M").unwrap();
        (graph, pop)
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(
            RunOutcome::Victory(Role::Imposter).message(),
            "All crewmates are dead. Imposters win!"
        );
        assert_eq!(
            RunOutcome::Victory(Role::Crewmate).message(),
            "All imposters are dead. Crewmates win!"
        );
        assert_eq!(RunOutcome::QueueDrained.winner(), None);
    }

    #[test]
    fn test_empty_queue_drains() {
        let (graph, pop) = chain_world();
        let mut sim = SimulationController::new(graph, pop, SimulationConfig::seeded(1));
        assert_eq!(sim.step().unwrap(), Some(RunOutcome::QueueDrained));
    }

    #[test]
    fn test_manual_kill_ends_run() {
        let (graph, mut pop) = chain_world();
        pop.move_agent("imp", "E").unwrap();
        let mut sim = SimulationController::new(graph, pop, SimulationConfig::seeded(1))
            .with_observer(EventLog::new());
        sim.schedule(Event::kill(0.5, "imp", "crew", "E"));

        assert_eq!(sim.step().unwrap(), Some(RunOutcome::Victory(Role::Imposter)));
        assert_eq!(sim.stats().kills.len(), 1);
        assert_eq!(sim.observer().kills(), vec![("imp", "crew")]);
        assert_eq!(sim.clock(), 0.5);
    }

    #[test]
    fn test_move_to_unknown_room_is_rejected() {
        let (graph, pop) = chain_world();
        let mut sim = SimulationController::new(graph, pop, SimulationConfig::seeded(1));
        sim.schedule(Event::movement(1.0, "crew", "E", "Reactor"));

        assert_eq!(sim.step().unwrap(), None);
        assert_eq!(sim.stats().rejected_events, 1);
        assert_eq!(sim.population().agent("crew").unwrap().room, "E");
        // the agent keeps acting after a rejection
        assert_eq!(sim.scheduler().len(), 1);
    }

    #[test]
    fn test_unknown_actor_is_rejected() {
        let (graph, pop) = chain_world();
        let mut sim = SimulationController::new(graph, pop, SimulationConfig::seeded(1));
        sim.schedule(Event::movement(1.0, "ghost", "E", "S"));
        assert_eq!(sim.step().unwrap(), None);
        assert_eq!(sim.stats().rejected_events, 1);
        assert!(sim.scheduler().is_empty());
    }

    #[test]
    fn test_stale_action_from_dead_agent_dropped() {
        let graph = RoomGraph::from_edges(&[("E", "S")]);
        let mut pop = Population::new();
        pop.spawn("crew", Role::Crewmate, "E").unwrap();
        pop.spawn("crew2", Role::Crewmate, "E").unwrap();
        pop.spawn("imp", Role::Imposter, "S").unwrap();
        pop.kill("crew").unwrap();

        let mut sim = SimulationController::new(graph, pop, SimulationConfig::seeded(1));
        sim.schedule(Event::movement(1.0, "crew", "E", "S"));
        assert_eq!(sim.step().unwrap(), None);
        assert_eq!(sim.stats().stale_events, 1);
        assert_eq!(sim.population().agent("crew").unwrap().room, "E");
    }

    #[test]
    fn test_dead_agents_act_when_enabled() {
        let graph = RoomGraph::from_edges(&[("E", "S")]);
        let mut pop = Population::new();
        pop.spawn("crew", Role::Crewmate, "E").unwrap();
        pop.spawn("crew2", Role::Crewmate, "E").unwrap();
        pop.spawn("imp", Role::Imposter, "S").unwrap();
        pop.kill("crew").unwrap();

        let config = SimulationConfig {
            dead_agents_act: true,
            ..SimulationConfig::seeded(1)
        };
        let mut sim = SimulationController::new(graph, pop, config);
        sim.schedule(Event::movement(1.0, "crew", "E", "S"));
        assert_eq!(sim.step().unwrap(), None);
        assert_eq!(sim.stats().stale_events, 0);
        assert_eq!(sim.population().agent("crew").unwrap().room, "S");
        // dead agents still produce no follow-up
        assert!(sim.scheduler().is_empty());
    }

    #[test]
    fn test_event_limit() {
        let (graph, pop) = chain_world();
        let config = SimulationConfig {
            max_events: Some(0),
            ..SimulationConfig::seeded(4)
        };
        let mut sim = SimulationController::new(graph, pop, config);
        let report = sim.run().unwrap();
        assert_eq!(report.outcome, RunOutcome::EventLimit);
        assert_eq!(report.stats.events_applied, 0);
    }

    #[test]
    fn test_report_serializes() {
        let (graph, pop) = chain_world();
        let mut sim = SimulationController::new(graph, pop, SimulationConfig::seeded(2));
        let report = sim.run().unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("events_applied").is_some());
        assert!(json.get("outcome").is_some());
    }

    #[test]
    fn test_task_start_schedules_completion() {
        let graph = RoomGraph::from_edges(&[("E", "S")]);
        let mut pop = Population::new();
        pop.spawn("crew", Role::Crewmate, "E").unwrap();
        pop.spawn("imp", Role::Imposter, "S").unwrap();
        let mut sim = SimulationController::new(graph, pop, SimulationConfig::seeded(6));
        sim.schedule(Event::task_start(1.0, "crew", "E", "Task_2"));

        assert_eq!(sim.step().unwrap(), None);
        assert_eq!(sim.stats().tasks_started.get("crew"), Some(&1));
        assert_eq!(sim.population().current_task("crew").unwrap().task, "Task_2");
        assert_eq!(sim.scheduler().peek_time(), Some(4.0));

        assert_eq!(sim.step().unwrap(), None);
        assert_eq!(sim.clock(), 4.0);
        assert_eq!(sim.stats().tasks_completed.get("crew"), Some(&1));
        assert!(sim.population().current_task("crew").is_none());
    }

    #[test]
    fn test_completion_without_start_is_ignored() {
        let (graph, pop) = chain_world();
        let mut sim = SimulationController::new(graph, pop, SimulationConfig::seeded(2));
        sim.schedule(Event::task_complete(1.0, "crew", "E", "Task_1"));
        assert_eq!(sim.step().unwrap(), None);
        assert!(sim.stats().tasks_completed.is_empty());
        assert_eq!(sim.stats().rejected_events, 0);
    }
}
