//! Per-role decision strategies.
//!
//! One entry point, [`decide_next_action`], dispatches on the agent's
//! [`Role`]. Each call yields at most one future event, stamped strictly
//! after `now` by a delay drawn from [`ActionTiming`].
//!
//! A crewmate with a task in progress finishes it before choosing anything
//! else.

use rand::seq::SliceRandom;
use rand::Rng;
use stowaway_logic::RoomGraph;

use crate::components::{AgentState, Role};
use crate::config::ActionTiming;
use crate::event::Event;
use crate::population::Population;

/// What a crewmate chose to do this turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CrewIntent {
    Move,
    Task,
}

/// Ask an agent's controller for its next event.
///
/// Dead and unknown agents never act.
pub fn decide_next_action(
    name: &str,
    now: f64,
    population: &Population,
    graph: &RoomGraph,
    timing: &ActionTiming,
    rng: &mut impl Rng,
) -> Option<Event> {
    let agent = population.agent(name)?;
    if !agent.alive {
        return None;
    }

    match agent.role {
        Role::Crewmate => crewmate_action(&agent, now, population, graph, timing, rng),
        Role::Imposter => imposter_action(&agent, now, population, graph, timing, rng),
    }
}

fn crewmate_action(
    agent: &AgentState,
    now: f64,
    population: &Population,
    graph: &RoomGraph,
    timing: &ActionTiming,
    rng: &mut impl Rng,
) -> Option<Event> {
    if let Some(working) = population.current_task(&agent.name) {
        if working.room == agent.room {
            let at = now + timing.task_duration.sample(rng);
            return Some(Event::task_complete(at, &agent.name, &agent.room, &working.task));
        }
    }

    let intent = if rng.gen_bool(0.5) {
        CrewIntent::Move
    } else {
        CrewIntent::Task
    };

    match intent {
        CrewIntent::Move => plan_move(agent, now, graph, timing, rng),
        CrewIntent::Task => {
            let task = format!("Task_{}", rng.gen_range(1..=timing.task_pool_size.max(1)));
            let at = now + timing.task_delay.sample(rng);
            Some(Event::task_start(at, &agent.name, &agent.room, &task))
        }
    }
}

fn imposter_action(
    agent: &AgentState,
    now: f64,
    population: &Population,
    graph: &RoomGraph,
    timing: &ActionTiming,
    rng: &mut impl Rng,
) -> Option<Event> {
    let targets = population.living_in_room(&agent.room, Role::Crewmate);
    if let Some(target) = targets.choose(rng) {
        let at = now + timing.kill_delay.sample(rng);
        return Some(Event::kill(at, &agent.name, target, &agent.room));
    }

    plan_move(agent, now, graph, timing, rng)
}

/// Step to a uniformly random neighbor. Nothing to do without neighbors.
fn plan_move(
    agent: &AgentState,
    now: f64,
    graph: &RoomGraph,
    timing: &ActionTiming,
    rng: &mut impl Rng,
) -> Option<Event> {
    let destination = graph.neighbors(&agent.room).choose(rng)?;
    let at = now + timing.move_delay.sample(rng);
    Some(Event::movement(at, &agent.name, &agent.room, destination))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, EventPayload};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn chain() -> RoomGraph {
        RoomGraph::from_edges(&[("E", "S"), ("S", "M")])
    }

    #[test]
    fn test_dead_agent_never_acts() {
        let graph = chain();
        let mut pop = Population::new();
        pop.spawn("crew", Role::Crewmate, "S").unwrap();
        pop.spawn("imp", Role::Imposter, "S").unwrap();
        pop.spawn("victim", Role::Crewmate, "S").unwrap();
        pop.kill("crew").unwrap();
        pop.kill("imp").unwrap();

        let mut rng = StdRng::seed_from_u64(0);
        let timing = ActionTiming::default();
        for t in 0..200 {
            let now = t as f64 * 1.5;
            assert!(decide_next_action("crew", now, &pop, &graph, &timing, &mut rng).is_none());
            assert!(decide_next_action("imp", now, &pop, &graph, &timing, &mut rng).is_none());
        }
    }

    #[test]
    fn test_unknown_agent_is_none() {
        let pop = Population::new();
        let mut rng = StdRng::seed_from_u64(0);
        let result =
            decide_next_action("ghost", 0.0, &pop, &chain(), &ActionTiming::default(), &mut rng);
        assert!(result.is_none());
    }

    #[test]
    fn test_crewmate_events_are_in_the_future() {
        let graph = chain();
        let mut pop = Population::new();
        pop.spawn("crew", Role::Crewmate, "S").unwrap();
        let timing = ActionTiming::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut saw_move = false;
        let mut saw_task = false;

        for _ in 0..200 {
            let e = decide_next_action("crew", 10.0, &pop, &graph, &timing, &mut rng).unwrap();
            match &e.payload {
                EventPayload::Move {
                    source,
                    destination,
                    path,
                } => {
                    saw_move = true;
                    assert!((11.0..=15.0).contains(&e.time));
                    assert_eq!(source, "S");
                    assert!(graph.is_connected("S", destination));
                    assert_eq!(path, &vec![source.clone(), destination.clone()]);
                }
                EventPayload::TaskStart { room, task } => {
                    saw_task = true;
                    assert!((11.0..=13.0).contains(&e.time));
                    assert_eq!(room, "S");
                    let n: u32 = task.trim_start_matches("Task_").parse().unwrap();
                    assert!((1..=5).contains(&n));
                }
                other => panic!("crewmate produced {:?}", other),
            }
        }
        assert!(saw_move && saw_task);
    }

    #[test]
    fn test_working_crewmate_completes_its_task() {
        let graph = chain();
        let mut pop = Population::new();
        pop.spawn("crew", Role::Crewmate, "S").unwrap();
        pop.start_task("crew", "Task_4").unwrap();
        let timing = ActionTiming::default();
        let mut rng = StdRng::seed_from_u64(21);

        for _ in 0..20 {
            let e = decide_next_action("crew", 4.0, &pop, &graph, &timing, &mut rng).unwrap();
            assert_eq!(e.time, 7.0);
            assert_eq!(
                e.payload,
                EventPayload::TaskComplete {
                    room: "S".to_string(),
                    task: "Task_4".to_string(),
                }
            );
        }

        pop.finish_task("crew", "Task_4").unwrap();
        let e = decide_next_action("crew", 7.0, &pop, &graph, &timing, &mut rng).unwrap();
        assert_ne!(e.kind(), EventKind::TaskComplete);
    }

    #[test]
    fn test_isolated_crewmate_move_branch_is_none() {
        let mut graph = RoomGraph::new();
        graph.add_room("Closet");
        let mut pop = Population::new();
        pop.spawn("crew", Role::Crewmate, "Closet").unwrap();
        let timing = ActionTiming::default();
        let mut rng = StdRng::seed_from_u64(11);

        let mut nones = 0;
        for _ in 0..200 {
            match decide_next_action("crew", 0.0, &pop, &graph, &timing, &mut rng) {
                None => nones += 1,
                Some(e) => assert_eq!(e.kind(), EventKind::TaskStart),
            }
        }
        // the move branch is picked about half the time and always yields nothing
        assert!(nones > 50);
    }

    #[test]
    fn test_imposter_prefers_kill() {
        let graph = chain();
        let mut pop = Population::new();
        pop.spawn("imp", Role::Imposter, "S").unwrap();
        pop.spawn("a", Role::Crewmate, "S").unwrap();
        pop.spawn("b", Role::Crewmate, "S").unwrap();
        pop.spawn("far", Role::Crewmate, "E").unwrap();
        let timing = ActionTiming::default();
        let mut rng = StdRng::seed_from_u64(5);

        let mut targets = std::collections::BTreeSet::new();
        for _ in 0..100 {
            let e = decide_next_action("imp", 2.0, &pop, &graph, &timing, &mut rng).unwrap();
            assert!((3.0..=4.0).contains(&e.time));
            match e.payload {
                EventPayload::Kill {
                    target,
                    room,
                    witnesses,
                } => {
                    assert_eq!(room, "S");
                    assert!(witnesses.is_empty());
                    targets.insert(target);
                }
                other => panic!("expected kill, got {:?}", other),
            }
        }
        let expected: std::collections::BTreeSet<String> =
            ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(targets, expected);
    }

    #[test]
    fn test_imposter_ignores_dead_and_fellow_imposters() {
        let graph = chain();
        let mut pop = Population::new();
        pop.spawn("imp", Role::Imposter, "S").unwrap();
        pop.spawn("imp2", Role::Imposter, "S").unwrap();
        pop.spawn("body", Role::Crewmate, "S").unwrap();
        pop.kill("body").unwrap();
        let timing = ActionTiming::default();
        let mut rng = StdRng::seed_from_u64(8);

        for _ in 0..50 {
            let e = decide_next_action("imp", 0.0, &pop, &graph, &timing, &mut rng).unwrap();
            assert_eq!(e.kind(), EventKind::Move);
        }
    }

    #[test]
    fn test_isolated_imposter_without_targets_is_none() {
        let mut graph = RoomGraph::new();
        graph.add_room("Vent");
        let mut pop = Population::new();
        pop.spawn("imp", Role::Imposter, "Vent").unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let result =
            decide_next_action("imp", 0.0, &pop, &graph, &ActionTiming::default(), &mut rng);
        assert!(result.is_none());
    }
}
