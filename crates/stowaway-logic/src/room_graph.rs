//! Undirected adjacency graph over named rooms.
//!
//! `RoomGraph` is the map the agents walk on. It only answers adjacency
//! questions; it never fails on an unknown room name, it just reports an
//! empty neighborhood.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Adjacency list keyed by room name.
///
/// Edges are inserted in both directions by [`RoomGraph::connect`], so the
/// graph stays symmetric. Connecting the same pair twice stores the edge
/// twice: neighbor lists are not deduplicated, and a room with a doubled
/// edge is proportionally more likely to be picked by a uniform draw.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomGraph {
    /// room name → neighbor names, in insertion order (may repeat)
    adj: HashMap<String, Vec<String>>,
    /// Room names in the order they were first seen.
    order: Vec<String>,
}

impl RoomGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a list of undirected edges.
    pub fn from_edges<A: AsRef<str>, B: AsRef<str>>(edges: &[(A, B)]) -> Self {
        let mut graph = Self::new();
        for (a, b) in edges {
            graph.connect(a.as_ref(), b.as_ref());
        }
        graph
    }

    /// Ensure `name` exists. Existing rooms keep their neighbors.
    pub fn add_room(&mut self, name: &str) {
        if !self.adj.contains_key(name) {
            self.adj.insert(name.to_string(), Vec::new());
            self.order.push(name.to_string());
        }
    }

    /// Insert an undirected edge between `a` and `b`, creating either room
    /// if needed.
    pub fn connect(&mut self, a: &str, b: &str) {
        self.add_room(a);
        self.add_room(b);
        if let Some(n) = self.adj.get_mut(a) {
            n.push(b.to_string());
        }
        if let Some(n) = self.adj.get_mut(b) {
            n.push(a.to_string());
        }
    }

    /// Neighbors of a room. Empty for unknown rooms.
    pub fn neighbors(&self, name: &str) -> &[String] {
        self.adj.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Whether `b` appears in `a`'s neighbor list.
    pub fn is_connected(&self, a: &str, b: &str) -> bool {
        self.neighbors(a).iter().any(|n| n == b)
    }

    /// Check if a room exists in the graph.
    pub fn has_room(&self, name: &str) -> bool {
        self.adj.contains_key(name)
    }

    /// Number of rooms in the graph.
    pub fn room_count(&self) -> usize {
        self.adj.len()
    }

    /// Room names in first-insertion order.
    pub fn rooms(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }
}

impl fmt::Display for RoomGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, room) in self.order.iter().enumerate() {
            let mut neighbors: Vec<&str> = self.neighbors(room).iter().map(|s| s.as_str()).collect();
            neighbors.sort_unstable();
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: [{}]", room, neighbors.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> RoomGraph {
        // Electrical -- Storage -- MedBay
        RoomGraph::from_edges(&[("Electrical", "Storage"), ("Storage", "MedBay")])
    }

    #[test]
    fn test_connect_is_symmetric() {
        let graph = chain();
        assert!(graph.is_connected("Electrical", "Storage"));
        assert!(graph.is_connected("Storage", "Electrical"));
        assert!(graph.is_connected("MedBay", "Storage"));
        assert!(!graph.is_connected("Electrical", "MedBay"));
    }

    #[test]
    fn test_neighbors() {
        let graph = chain();
        assert_eq!(graph.neighbors("Storage"), ["Electrical", "MedBay"]);
        assert_eq!(graph.neighbors("MedBay"), ["Storage"]);
    }

    #[test]
    fn test_unknown_room_is_empty() {
        let graph = chain();
        assert!(graph.neighbors("Reactor").is_empty());
        assert!(!graph.is_connected("Reactor", "Storage"));
        assert!(!graph.has_room("Reactor"));
    }

    #[test]
    fn test_add_room_idempotent() {
        let mut graph = chain();
        graph.add_room("Storage");
        assert_eq!(graph.neighbors("Storage").len(), 2);
        graph.add_room("Admin");
        assert!(graph.has_room("Admin"));
        assert!(graph.neighbors("Admin").is_empty());
        assert_eq!(graph.room_count(), 4);
    }

    #[test]
    fn test_duplicate_connect_appends() {
        let mut graph = RoomGraph::new();
        graph.connect("A", "B");
        graph.connect("A", "B");
        assert_eq!(graph.neighbors("A"), ["B", "B"]);
        assert_eq!(graph.neighbors("B"), ["A", "A"]);
    }

    #[test]
    fn test_rooms_in_insertion_order() {
        let graph = chain();
        let rooms: Vec<&str> = graph.rooms().collect();
        assert_eq!(rooms, vec!["Electrical", "Storage", "MedBay"]);
    }

    #[test]
    fn test_display_sorts_neighbors() {
        let graph = RoomGraph::from_edges(&[("Hub", "Zeta"), ("Hub", "Alpha")]);
        let text = graph.to_string();
        assert_eq!(text.lines().next(), Some("Hub: [Alpha, Zeta]"));
        assert_eq!(text.lines().count(), 3);
    }
}
