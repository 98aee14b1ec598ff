//! Simulation settings.
//!
//! All settings deserialize from JSON with missing fields falling back to
//! their defaults, so `{}` is a valid configuration.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Closed interval for a uniform delay draw
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: f64,
    pub max: f64,
}

impl DelayRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Uniform draw in `[min, max]`. A collapsed range returns `min`.
    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        if self.max <= self.min {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.min <= 0.0 || self.min > self.max || !self.min.is_finite() || !self.max.is_finite() {
            return Err(ConfigError::InvalidDelay {
                name,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// How far in the future each decided action lands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionTiming {
    pub move_delay: DelayRange,
    pub task_delay: DelayRange,
    pub kill_delay: DelayRange,
    /// Time from starting a task to completing it
    pub task_duration: DelayRange,
    /// Tasks are named `Task_1` ..= `Task_<task_pool_size>`
    pub task_pool_size: u32,
}

impl Default for ActionTiming {
    fn default() -> Self {
        Self {
            move_delay: DelayRange::new(1.0, 5.0),
            task_delay: DelayRange::new(1.0, 3.0),
            kill_delay: DelayRange::new(1.0, 2.0),
            task_duration: DelayRange::new(3.0, 3.0),
            task_pool_size: 5,
        }
    }
}

/// Meeting pacing and vote weighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscussionConfig {
    /// Time between a body report and the meeting
    pub discussion_delay: f64,
    /// Time between the meeting and the tally
    pub voting_delay: f64,
    /// Count ballots by confidence instead of one each
    pub weighted: bool,
    /// Observation lines kept per agent for the vote context
    pub trace_len: usize,
}

impl Default for DiscussionConfig {
    fn default() -> Self {
        Self {
            discussion_delay: 5.0,
            voting_delay: 5.0,
            weighted: true,
            trace_len: 20,
        }
    }
}

/// Top-level settings for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for every random draw. `None` seeds from the OS.
    pub seed: Option<u64>,
    pub timing: ActionTiming,
    /// Apply Move/Kill events whose acting agent died after deciding them.
    pub dead_agents_act: bool,
    /// Stop after this many popped events.
    pub max_events: Option<u64>,
    /// Used once a vote oracle is attached.
    pub discussion: DiscussionConfig,
}

impl SimulationConfig {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timing.move_delay.validate("move_delay")?;
        self.timing.task_delay.validate("task_delay")?;
        self.timing.kill_delay.validate("kill_delay")?;
        self.timing.task_duration.validate("task_duration")?;
        Ok(())
    }

    pub fn make_rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}
