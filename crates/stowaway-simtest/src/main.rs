//! Stowaway Headless Simulation Harness
//!
//! Plays many seeded games and checks engine invariants along the way.
//! Runs entirely in-process: no logger, no rendering, no oracle backend.
//!
//! Usage:
//!   cargo run -p stowaway-simtest
//!   cargo run -p stowaway-simtest -- --verbose

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stowaway_core::observer::LogEntry;
use stowaway_core::prelude::*;
use stowaway_core::systems::{decide_next_action, pick_ejection};
use stowaway_logic::Tally;

// ── Map shipped with the harness ────────────────────────────────────────
const MAP_JSON: &str = include_str!("../../../data/default_map.json");

const GAMES: u64 = 200;
const EVENT_CAP: u64 = 50_000;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== Stowaway Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Map file validation
    results.extend(validate_map(verbose));

    // 2. Scheduler ordering sweep
    results.extend(validate_scheduler(verbose));

    // 3. Controller decision sweep
    results.extend(validate_controllers(verbose));

    // 4. Seeded games without meetings
    results.extend(validate_plain_games(verbose));

    // 5. Seeded games with meetings
    results.extend(validate_meeting_games(verbose));

    // 6. Vote tie-breaking
    results.extend(validate_tie_break(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn load_map() -> Result<MapConfig, ConfigError> {
    MapConfig::from_json(MAP_JSON)
}

fn capped(seed: u64) -> SimulationConfig {
    SimulationConfig {
        max_events: Some(EVENT_CAP),
        ..SimulationConfig::seeded(seed)
    }
}

// ── 1. Map ──────────────────────────────────────────────────────────────

fn validate_map(verbose: bool) -> Vec<TestResult> {
    println!("--- Map ---");
    let mut results = Vec::new();

    let map = match load_map() {
        Ok(m) => m,
        Err(e) => {
            results.push(TestResult {
                name: "map_parse".into(),
                passed: false,
                detail: format!("{}", e),
            });
            return results;
        }
    };

    results.push(TestResult {
        name: "map_matches_builtin".into(),
        passed: map == MapConfig::default_ship(),
        detail: format!("'{}' with {} edges", map.name, map.edges.len()),
    });

    match map.build() {
        Ok((graph, population)) => {
            let asymmetric: Vec<String> = graph
                .rooms()
                .flat_map(|a| {
                    graph
                        .neighbors(a)
                        .iter()
                        .filter(|b| !graph.neighbors(b).iter().any(|n| n == a))
                        .map(move |b| format!("{}->{}", a, b))
                        .collect::<Vec<_>>()
                })
                .collect();
            results.push(TestResult {
                name: "map_edges_symmetric".into(),
                passed: asymmetric.is_empty(),
                detail: if asymmetric.is_empty() {
                    format!("{} rooms", graph.room_count())
                } else {
                    format!("one-way: {}", asymmetric.join(", "))
                },
            });

            let dead_ends: Vec<&str> = graph
                .rooms()
                .filter(|r| graph.neighbors(r).is_empty())
                .collect();
            results.push(TestResult {
                name: "map_no_isolated_rooms".into(),
                passed: dead_ends.is_empty(),
                detail: format!("{} isolated", dead_ends.len()),
            });

            results.push(TestResult {
                name: "map_both_factions".into(),
                passed: population.living_count(Role::Crewmate) > 0
                    && population.living_count(Role::Imposter) > 0,
                detail: format!(
                    "{} crewmates, {} imposters",
                    population.living_count(Role::Crewmate),
                    population.living_count(Role::Imposter)
                ),
            });
        }
        Err(e) => results.push(TestResult {
            name: "map_build".into(),
            passed: false,
            detail: format!("{}", e),
        }),
    }

    if verbose {
        for r in &results {
            println!("  {}: {}", r.name, r.detail);
        }
    }
    results
}

// ── 2. Scheduler ────────────────────────────────────────────────────────

fn validate_scheduler(verbose: bool) -> Vec<TestResult> {
    println!("--- Scheduler ---");
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(2024);

    let mut out_of_order = 0;
    let mut fifo_breaks = 0;
    for _ in 0..50 {
        let mut scheduler = Scheduler::new();
        for i in 0..500 {
            // coarse times force plenty of ties
            let time = rng.gen_range(0..50) as f64;
            scheduler.schedule(Event::vote(time, format!("{:04}", i)));
        }
        let mut last: Option<(f64, String)> = None;
        while let Some(event) = scheduler.pop_next() {
            if let Some((t, seq)) = &last {
                if event.time < *t {
                    out_of_order += 1;
                }
                if event.time == *t && event.agent < *seq {
                    fifo_breaks += 1;
                }
            }
            last = Some((event.time, event.agent));
        }
    }
    results.push(TestResult {
        name: "scheduler_non_decreasing".into(),
        passed: out_of_order == 0,
        detail: format!("{} inversions over 25000 pops", out_of_order),
    });
    results.push(TestResult {
        name: "scheduler_fifo_ties".into(),
        passed: fifo_breaks == 0,
        detail: format!("{} tie inversions", fifo_breaks),
    });

    let mut empty = Scheduler::new();
    results.push(TestResult {
        name: "scheduler_empty_pop".into(),
        passed: empty.pop_next().is_none(),
        detail: "empty queue pops None".into(),
    });

    if verbose {
        println!("  {} inversions, {} tie inversions", out_of_order, fifo_breaks);
    }
    results
}

// ── 3. Controllers ──────────────────────────────────────────────────────

fn validate_controllers(verbose: bool) -> Vec<TestResult> {
    println!("--- Controllers ---");
    let mut results = Vec::new();
    let graph = RoomGraph::from_edges(&[("E", "S"), ("S", "M")]);
    let timing = ActionTiming::default();
    let mut rng = StdRng::seed_from_u64(7);

    let mut pop = Population::new();
    let spawned = pop
        .spawn("crew", Role::Crewmate, "S")
        .and_then(|_| pop.spawn("imp", Role::Imposter, "S"))
        .and_then(|_| pop.spawn("ghost", Role::Crewmate, "S"))
        .and_then(|_| pop.kill("ghost"));
    if let Err(e) = spawned {
        results.push(TestResult {
            name: "controller_setup".into(),
            passed: false,
            detail: format!("{}", e),
        });
        return results;
    }

    let mut ghost_actions = 0;
    let mut past_events = 0;
    let mut kills = 0;
    let mut bad_moves = 0;
    for step in 0..1000 {
        let now = step as f64 * 0.5;
        if decide_next_action("ghost", now, &pop, &graph, &timing, &mut rng).is_some() {
            ghost_actions += 1;
        }
        for name in ["crew", "imp"] {
            let Some(event) = decide_next_action(name, now, &pop, &graph, &timing, &mut rng)
            else {
                continue;
            };
            if event.time <= now {
                past_events += 1;
            }
            match &event.payload {
                EventPayload::Kill { target, .. } if target == "crew" => kills += 1,
                EventPayload::Move {
                    source,
                    destination,
                    ..
                } if !graph.is_connected(source, destination) => bad_moves += 1,
                _ => {}
            }
        }
    }

    results.push(TestResult {
        name: "controller_dead_never_act".into(),
        passed: ghost_actions == 0,
        detail: format!("{} actions from a dead agent", ghost_actions),
    });
    results.push(TestResult {
        name: "controller_future_times".into(),
        passed: past_events == 0,
        detail: format!("{} events at or before now", past_events),
    });
    results.push(TestResult {
        name: "controller_imposter_kills".into(),
        passed: kills == 1000,
        detail: format!("{}/1000 imposter turns were kills", kills),
    });
    results.push(TestResult {
        name: "controller_moves_adjacent".into(),
        passed: bad_moves == 0,
        detail: format!("{} non-adjacent moves", bad_moves),
    });

    if verbose {
        println!("  {} kills, {} bad moves", kills, bad_moves);
    }
    results
}

// ── 4. Plain games ──────────────────────────────────────────────────────

fn validate_plain_games(verbose: bool) -> Vec<TestResult> {
    println!("--- Games without meetings ---");
    let mut results = Vec::new();
    let map = match load_map() {
        Ok(m) => m,
        Err(e) => {
            results.push(TestResult {
                name: "plain_map".into(),
                passed: false,
                detail: format!("{}", e),
            });
            return results;
        }
    };

    let mut imposter_wins = 0;
    let mut other_endings = Vec::new();
    let mut total_events = 0;
    let mut total_time = 0.0;
    let mut tasks_done: u32 = 0;
    let mut overfinished = Vec::new();
    let mut errors = Vec::new();

    for seed in 0..GAMES {
        match play(&map, capped(seed), false) {
            Ok((report, _)) => {
                total_events += report.stats.events_applied;
                total_time += report.final_time;
                for (agent, done) in &report.stats.tasks_completed {
                    tasks_done += done;
                    let started = report.stats.tasks_started.get(agent).copied().unwrap_or(0);
                    if *done > started {
                        overfinished.push(format!("seed {}: {} {}/{}", seed, agent, done, started));
                    }
                }
                match report.outcome {
                    RunOutcome::Victory(Role::Imposter) => imposter_wins += 1,
                    other => other_endings.push(format!("seed {}: {:?}", seed, other)),
                }
            }
            Err(e) => errors.push(format!("seed {}: {}", seed, e)),
        }
    }

    results.push(TestResult {
        name: "plain_no_fatal_errors".into(),
        passed: errors.is_empty(),
        detail: if errors.is_empty() {
            format!("{} games", GAMES)
        } else {
            errors.join("; ")
        },
    });
    results.push(TestResult {
        name: "plain_imposter_always_wins".into(),
        passed: other_endings.is_empty(),
        detail: format!(
            "{}/{} imposter wins {}",
            imposter_wins,
            GAMES,
            other_endings.join("; ")
        ),
    });

    results.push(TestResult {
        name: "plain_tasks_completed".into(),
        passed: tasks_done > 0 && overfinished.is_empty(),
        detail: if overfinished.is_empty() {
            format!("{} tasks completed", tasks_done)
        } else {
            overfinished.join("; ")
        },
    });

    let same = play(&map, capped(4242), false).ok() == play(&map, capped(4242), false).ok();
    results.push(TestResult {
        name: "plain_deterministic".into(),
        passed: same,
        detail: "seed 4242 replayed".into(),
    });

    if verbose {
        println!(
            "  avg {:.1} events, avg end time {:.1}",
            total_events as f64 / GAMES as f64,
            total_time / GAMES as f64
        );
    }
    results
}

// ── 5. Games with meetings ──────────────────────────────────────────────

fn validate_meeting_games(verbose: bool) -> Vec<TestResult> {
    println!("--- Games with meetings ---");
    let mut results = Vec::new();
    let map = match load_map() {
        Ok(m) => m,
        Err(e) => {
            results.push(TestResult {
                name: "meeting_map".into(),
                passed: false,
                detail: format!("{}", e),
            });
            return results;
        }
    };

    let mut crew_wins = 0;
    let mut imposter_wins = 0;
    let mut meetings = 0;
    let mut double_votes = 0;
    let mut wrong_ejections = 0;
    let mut gated_leaks = 0;
    let mut errors = Vec::new();

    for seed in 0..GAMES {
        let (report, log) = match play(&map, capped(seed), true) {
            Ok(r) => r,
            Err(e) => {
                errors.push(format!("seed {}: {}", seed, e));
                continue;
            }
        };
        match report.outcome.winner() {
            Some(Role::Crewmate) => crew_wins += 1,
            Some(Role::Imposter) => imposter_wins += 1,
            None => {}
        }

        for record in &report.meetings {
            meetings += 1;
            let mut voters: Vec<&str> = record.ballots.iter().map(|b| b.voter.as_str()).collect();
            let cast = voters.len();
            voters.sort_unstable();
            voters.dedup();
            if voters.len() != cast {
                double_votes += 1;
            }
            if let Some(ejected) = &record.ejected {
                if !record.tally.leaders().contains(&ejected.as_str()) {
                    wrong_ejections += 1;
                }
            }
        }

        // no action may land between a meeting call and its ejection
        let mut in_meeting = false;
        for entry in &log.entries {
            match entry {
                LogEntry::Meeting { .. } => in_meeting = true,
                LogEntry::Event { kind, .. } if in_meeting && kind.is_action() => gated_leaks += 1,
                LogEntry::Event {
                    kind: EventKind::Vote,
                    ..
                } => in_meeting = false,
                _ => {}
            }
        }
    }

    results.push(TestResult {
        name: "meeting_no_fatal_errors".into(),
        passed: errors.is_empty(),
        detail: if errors.is_empty() {
            format!("{} games, {} meetings", GAMES, meetings)
        } else {
            errors.join("; ")
        },
    });
    results.push(TestResult {
        name: "meeting_one_ballot_each".into(),
        passed: double_votes == 0,
        detail: format!("{} meetings with repeated voters", double_votes),
    });
    results.push(TestResult {
        name: "meeting_ejects_a_leader".into(),
        passed: wrong_ejections == 0,
        detail: format!("{} ejections outside the top tally", wrong_ejections),
    });
    results.push(TestResult {
        name: "meeting_gates_actions".into(),
        passed: gated_leaks == 0,
        detail: format!("{} actions applied mid-meeting", gated_leaks),
    });
    results.push(TestResult {
        name: "meeting_both_sides_can_win".into(),
        passed: crew_wins > 0 && imposter_wins > 0,
        detail: format!("crew {} / imposter {}", crew_wins, imposter_wins),
    });

    if verbose {
        println!(
            "  crew {} / imposter {} over {} meetings",
            crew_wins, imposter_wins, meetings
        );
    }
    results
}

// ── 6. Tie-break ────────────────────────────────────────────────────────

fn validate_tie_break(verbose: bool) -> Vec<TestResult> {
    println!("--- Tie-break ---");
    let mut results = Vec::new();
    let tally: Tally = [("A", 2), ("B", 2), ("C", 1)].into_iter().collect();

    let mut a = 0;
    let mut outsiders = 0;
    for seed in 0..2000 {
        match pick_ejection(&tally, &mut StdRng::seed_from_u64(seed)).as_deref() {
            Some("A") => a += 1,
            Some("B") => {}
            _ => outsiders += 1,
        }
    }
    results.push(TestResult {
        name: "tie_only_leaders".into(),
        passed: outsiders == 0,
        detail: format!("{} picks outside {{A, B}}", outsiders),
    });
    results.push(TestResult {
        name: "tie_roughly_uniform".into(),
        passed: (850..=1150).contains(&a),
        detail: format!("A chosen {}/2000", a),
    });

    let first = pick_ejection(&tally, &mut StdRng::seed_from_u64(31));
    let stable = (0..10).all(|_| pick_ejection(&tally, &mut StdRng::seed_from_u64(31)) == first);
    results.push(TestResult {
        name: "tie_fixed_per_seed".into(),
        passed: stable,
        detail: format!("seed 31 -> {:?}", first),
    });

    if verbose {
        println!("  A {} / B {}", a, 2000 - a - outsiders);
    }
    results
}

fn play(
    map: &MapConfig,
    config: SimulationConfig,
    meetings: bool,
) -> Result<(RunReport, EventLog), String> {
    let (graph, population) = map.build().map_err(|e| e.to_string())?;
    let sim = SimulationController::new(graph, population, config).with_observer(EventLog::new());
    let mut sim = if meetings {
        sim.with_discussion(SuspicionOracle)
    } else {
        sim
    };
    let report = sim.run().map_err(|e| e.to_string())?;
    Ok((report, sim.into_observer()))
}
