//! Pool state, venue discovery and local swap simulation
//!
//! Created: 2026-10-18

pub mod discovery;
pub mod reference;
pub mod simulator;
pub mod state;

pub use discovery::PoolDiscovery;
pub use reference::ReferencePool;
pub use state::{select_best, MarketCache};
