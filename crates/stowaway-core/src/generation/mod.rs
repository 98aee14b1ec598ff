//! World setup - maps, rosters and their validation

mod map;

pub use map::*;
