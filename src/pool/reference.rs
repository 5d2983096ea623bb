//! USD/WETH reference pool
//!
//! The single pool used to turn WETH notional into USD when ranking
//! batches. Synchronizer tasks check it before the general cache.
//!
//! Created: 2026-10-18

use crate::types::{LogPosition, PoolState};
use alloy::primitives::{Address, U256};
use std::sync::{Arc, RwLock};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ReferencePool {
    pool: Arc<RwLock<Option<PoolState>>>,
}

impl ReferencePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, pool: PoolState) {
        let mut slot = self.pool.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(pool);
    }

    /// USD per one WETH, when the pool is set and priced.
    pub fn usd_per_weth(&self) -> Option<f64> {
        self.pool
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .filter(|p| p.is_priced())
            .map(|p| p.token_per_weth)
    }

    /// Apply a reserve event if it belongs to the reference pool.
    pub fn apply_reserve_event(
        &self,
        pool_address: Address,
        reserve0: U256,
        reserve1: U256,
        at: Option<LogPosition>,
    ) -> bool {
        let mut slot = self.pool.write().unwrap_or_else(|e| e.into_inner());
        match slot.as_mut() {
            Some(pool) if pool.address == pool_address => {
                let applied = pool.apply_event(reserve0, reserve1, at);
                if applied {
                    debug!("USD/WETH reference price: {:.4}", pool.token_per_weth);
                }
                applied
            }
            _ => false,
        }
    }
}
