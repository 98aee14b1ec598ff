//! Systems - logic that reads and mutates the population

mod controller;
mod discussion;
mod observation;

pub use controller::*;
pub use discussion::*;
pub use observation::*;
