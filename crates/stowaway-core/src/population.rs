//! Agent population: an ECS world plus name and room indices.
//!
//! Agents live as `hecs` entities carrying [`Identity`], [`Role`],
//! [`Vitals`] and [`Location`]. Lookups by name and by room go through two
//! indices that are updated in the same call as every mutation, so callers
//! never scan the whole world to find an agent or its roommates.
//!
//! Dead agents stay in both indices: their bodies still occupy a room.
//!
//! A task in progress is an optional [`Working`] component, inserted when
//! the task starts and removed when it completes or is abandoned.

use std::collections::{BTreeSet, HashMap};

use hecs::{Entity, World};

use crate::components::{AgentState, Identity, Location, Role, Vitals, Working};
use crate::error::SimError;

pub struct Population {
    world: World,
    by_name: HashMap<String, Entity>,
    /// room → names of everyone in it, living or dead
    by_room: HashMap<String, BTreeSet<String>>,
    /// Names in spawn order
    roster: Vec<String>,
}

impl Population {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            by_name: HashMap::new(),
            by_room: HashMap::new(),
            roster: Vec::new(),
        }
    }

    /// Add a living agent. Room membership in the graph is the caller's
    /// responsibility.
    pub fn spawn(&mut self, name: &str, role: Role, room: &str) -> Result<Entity, SimError> {
        if self.by_name.contains_key(name) {
            return Err(SimError::DuplicateAgent(name.to_string()));
        }
        let entity = self.world.spawn((
            Identity::new(name),
            role,
            Vitals::default(),
            Location::new(room),
        ));
        self.by_name.insert(name.to_string(), entity);
        self.by_room
            .entry(room.to_string())
            .or_default()
            .insert(name.to_string());
        self.roster.push(name.to_string());
        Ok(entity)
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Agent names in spawn order
    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Snapshot of one agent
    pub fn agent(&self, name: &str) -> Option<AgentState> {
        let entity = *self.by_name.get(name)?;
        let role = *self.world.get::<&Role>(entity).ok()?;
        let alive = self.world.get::<&Vitals>(entity).ok()?.alive;
        let room = self.world.get::<&Location>(entity).ok()?.room.clone();
        Some(AgentState {
            name: name.to_string(),
            role,
            alive,
            room,
        })
    }

    /// Snapshots of every agent in spawn order
    pub fn agents(&self) -> Vec<AgentState> {
        self.roster.iter().filter_map(|n| self.agent(n)).collect()
    }

    pub fn is_alive(&self, name: &str) -> bool {
        self.by_name
            .get(name)
            .and_then(|&e| self.world.get::<&Vitals>(e).ok().map(|v| v.alive))
            .unwrap_or(false)
    }

    /// Everyone in a room, living or dead, sorted by name
    pub fn occupants(&self, room: &str) -> impl Iterator<Item = &str> {
        self.by_room
            .get(room)
            .into_iter()
            .flat_map(|names| names.iter().map(|n| n.as_str()))
    }

    /// Living agents of `role` in `room`, sorted by name
    pub fn living_in_room(&self, room: &str, role: Role) -> Vec<String> {
        self.occupants(room)
            .filter(|name| {
                self.agent(name)
                    .map(|a| a.alive && a.role == role)
                    .unwrap_or(false)
            })
            .map(|name| name.to_string())
            .collect()
    }

    /// Living agents in `room` of any role, sorted by name
    pub fn living_occupants(&self, room: &str) -> Vec<String> {
        self.occupants(room)
            .filter(|name| self.is_alive(name))
            .map(|name| name.to_string())
            .collect()
    }

    pub fn living_count(&self, role: Role) -> usize {
        self.world
            .query::<(&Role, &Vitals)>()
            .iter()
            .filter(|(_, (r, v))| **r == role && v.alive)
            .count()
    }

    /// Living agents of `role` in spawn order
    pub fn living_names(&self, role: Role) -> Vec<String> {
        self.agents()
            .into_iter()
            .filter(|a| a.alive && a.role == role)
            .map(|a| a.name)
            .collect()
    }

    /// Relocate an agent, returning the room it left.
    pub fn move_agent(&mut self, name: &str, destination: &str) -> Result<String, SimError> {
        let entity = self.entity(name)?;
        let source = {
            let mut location = self.world.get::<&mut Location>(entity)?;
            std::mem::replace(&mut location.room, destination.to_string())
        };
        if source != destination {
            let _ = self.world.remove_one::<Working>(entity);
        }
        if let Some(names) = self.by_room.get_mut(&source) {
            names.remove(name);
        }
        self.by_room
            .entry(destination.to_string())
            .or_default()
            .insert(name.to_string());
        Ok(source)
    }

    /// Mark an agent dead. Returns `false` when it was already dead.
    pub fn kill(&mut self, name: &str) -> Result<bool, SimError> {
        let entity = self.entity(name)?;
        let mut vitals = self.world.get::<&mut Vitals>(entity)?;
        if !vitals.alive {
            return Ok(false);
        }
        vitals.alive = false;
        vitals.reported = false;
        drop(vitals);
        let _ = self.world.remove_one::<Working>(entity);
        Ok(true)
    }

    /// Begin `task` in the agent's current room, replacing any task it had.
    pub fn start_task(&mut self, name: &str, task: &str) -> Result<(), SimError> {
        let entity = self.entity(name)?;
        let room = self.world.get::<&Location>(entity)?.room.clone();
        self.world.insert_one(
            entity,
            Working {
                task: task.to_string(),
                room,
            },
        )?;
        Ok(())
    }

    /// Task the agent is working on, if any
    pub fn current_task(&self, name: &str) -> Option<Working> {
        let entity = *self.by_name.get(name)?;
        let working = self.world.get::<&Working>(entity).ok()?;
        Some((*working).clone())
    }

    /// Complete `task` if it is the one in progress. Returns `false` when the
    /// agent was doing something else or nothing at all.
    pub fn finish_task(&mut self, name: &str, task: &str) -> Result<bool, SimError> {
        let entity = self.entity(name)?;
        let matches = self
            .world
            .get::<&Working>(entity)
            .map(|w| w.task == task)
            .unwrap_or(false);
        if matches {
            self.world.remove_one::<Working>(entity)?;
        }
        Ok(matches)
    }

    /// Dead agents nobody has reported yet, as (name, room) in spawn order
    pub fn unreported_bodies(&self) -> Vec<(String, String)> {
        self.agents()
            .into_iter()
            .filter(|a| !a.alive && !self.is_reported(&a.name))
            .map(|a| (a.name, a.room))
            .collect()
    }

    pub fn is_reported(&self, name: &str) -> bool {
        self.by_name
            .get(name)
            .and_then(|&e| self.world.get::<&Vitals>(e).ok().map(|v| v.reported))
            .unwrap_or(false)
    }

    /// Flag a dead agent's body as reported. No effect on the living.
    pub fn mark_reported(&mut self, name: &str) -> Result<(), SimError> {
        let entity = self.entity(name)?;
        let mut vitals = self.world.get::<&mut Vitals>(entity)?;
        if !vitals.alive {
            vitals.reported = true;
        }
        Ok(())
    }

    /// Flag every body as reported
    pub fn clear_bodies(&mut self) {
        for (_, vitals) in self.world.query_mut::<&mut Vitals>() {
            if !vitals.alive {
                vitals.reported = true;
            }
        }
    }

    fn entity(&self, name: &str) -> Result<Entity, SimError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SimError::UnknownAgent(name.to_string()))
    }
}

impl Default for Population {
    fn default() -> Self {
        Self::new()
    }
}
