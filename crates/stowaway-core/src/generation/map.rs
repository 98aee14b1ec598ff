//! Map and roster setup - turns a `MapConfig` into a graph and population

use serde::{Deserialize, Serialize};
use stowaway_logic::RoomGraph;

use crate::components::Role;
use crate::error::ConfigError;
use crate::population::Population;

/// Starting state for one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub role: Role,
    pub room: String,
}

impl AgentSpec {
    pub fn new(name: &str, role: Role, room: &str) -> Self {
        Self {
            name: name.to_string(),
            role,
            room: room.to_string(),
        }
    }
}

/// Rooms, edges and who starts where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapConfig {
    pub name: String,
    /// Rooms without edges. Rooms named by edges are added automatically.
    #[serde(default)]
    pub rooms: Vec<String>,
    pub edges: Vec<(String, String)>,
    pub roster: Vec<AgentSpec>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self::default_ship()
    }
}

impl MapConfig {
    /// Stock five-edge ship with two crewmates and one imposter.
    pub fn default_ship() -> Self {
        let edges = [
            ("Electrical", "Storage"),
            ("Storage", "MedBay"),
            ("MedBay", "Cafeteria"),
            ("Cafeteria", "Navigation"),
            ("Storage", "Admin"),
        ];
        Self {
            name: "Skeleton Ship".to_string(),
            rooms: Vec::new(),
            edges: edges
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
            roster: vec![
                AgentSpec::new("agent1", Role::Crewmate, "Electrical"),
                AgentSpec::new("agent2", Role::Crewmate, "Storage"),
                AgentSpec::new("imposter", Role::Imposter, "MedBay"),
            ],
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        Ok(config)
    }

    pub fn build_graph(&self) -> RoomGraph {
        let mut graph = RoomGraph::new();
        for room in &self.rooms {
            graph.add_room(room);
        }
        for (a, b) in &self.edges {
            graph.connect(a, b);
        }
        graph
    }

    /// Spawn the roster, checking every start room exists in `graph`.
    pub fn spawn_population(&self, graph: &RoomGraph) -> Result<Population, ConfigError> {
        let mut population = Population::new();
        for spec in &self.roster {
            if !graph.has_room(&spec.room) {
                return Err(ConfigError::UnknownRoom {
                    agent: spec.name.clone(),
                    room: spec.room.clone(),
                });
            }
            population.spawn(&spec.name, spec.role, &spec.room)?;
        }
        log::info!(
            "{}: {} rooms, {} agents ({} imposters)",
            self.name,
            graph.room_count(),
            population.len(),
            population.living_count(Role::Imposter)
        );
        Ok(population)
    }

    /// Graph and population in one go
    pub fn build(&self) -> Result<(RoomGraph, Population), ConfigError> {
        let graph = self.build_graph();
        let population = self.spawn_population(&graph)?;
        Ok((graph, population))
    }
}
