//! Limit Order Execution Bot Library
//!
//! Keeps an in-memory replica of the limit-order router's active orders and
//! of the liquidity pools they trade through, decides which orders are
//! executable after each block, and submits them in simulated batches.
//!
//! Pipeline: block header → [`sync`] → [`batching`] → [`execution`].
//!
//! Created: 2026-10-18

pub mod batching;
pub mod config;
pub mod contracts;
pub mod error;
pub mod execution;
pub mod orders;
pub mod pool;
pub mod rpc;
pub mod sync;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use batching::BatchEngine;
pub use config::BotConfig;
pub use error::{DecodeError, ExecutionError, RpcError, SimulationError, StartupError};
pub use execution::{ExecutionDispatcher, NonceManagedSigner, TransactionSender};
pub use orders::{GasCreditLedger, OrderBook, PendingExecution};
pub use pool::{MarketCache, PoolDiscovery, ReferencePool};
pub use rpc::{AlloyChainClient, ChainClient};
pub use sync::{Stores, Synchronizer};
pub use types::{LimitOrder, OrderId, PoolState, Side};
