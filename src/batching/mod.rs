//! Order batching: route grouping, price filter, USD ranking, quantity
//! sort and greedy simulation
//!
//! Created: 2026-10-18

pub mod engine;
pub mod quicksort;
pub mod ranking;
pub mod routing;

pub use engine::{BatchEngine, EngineSettings, SimulationOutcome};
pub use routing::{GroupKey, OrderGroup};
