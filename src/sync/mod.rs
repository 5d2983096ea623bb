//! Chain-event synchronization: log classification, per-block
//! reconciliation and historical backfill
//!
//! Created: 2026-10-18

pub mod backfill;
pub mod events;
pub mod listener;

use crate::orders::{GasCreditLedger, OrderBook};
use crate::pool::{MarketCache, ReferencePool};

pub use backfill::{backfill, BackfillRange};
pub use events::{classify, ChainEvent};
pub use listener::{SyncSettings, Synchronizer};

/// Handles to the stores the synchronizer mutates. Cloning shares them.
#[derive(Debug, Clone)]
pub struct Stores {
    pub book: OrderBook,
    pub markets: MarketCache,
    pub reference: ReferencePool,
    pub ledger: GasCreditLedger,
}
