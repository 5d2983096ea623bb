//! Pool/Market Cache
//!
//! Thread-safe `token -> [PoolState]` store using DashMap.
//!
//! All reserve mutation goes through the cache's own methods, which hold
//! the per-token shard lock only for in-memory work. Network discovery in
//! `ensure_market` runs with no lock held: the `(token, fee tier)` key is
//! reserved in the seen-set first, so concurrent callers never discover the
//! same market twice.
//!
//! Created: 2026-10-18

use super::discovery::PoolDiscovery;
use crate::error::RpcError;
use crate::rpc::ChainClient;
use crate::types::{LogPosition, PoolState, Side};
use alloy::primitives::{Address, U256};
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Index of the pool offering the best price for `side`:
/// lowest token-per-WETH for buys, highest for sells.
pub fn select_best(pools: &[PoolState], side: Side) -> Option<usize> {
    let priced = pools.iter().enumerate().filter(|(_, p)| p.is_priced());
    let best = match side {
        Side::Buy => priced.min_by(|(_, a), (_, b)| a.token_per_weth.total_cmp(&b.token_per_weth)),
        Side::Sell => priced.max_by(|(_, a), (_, b)| a.token_per_weth.total_cmp(&b.token_per_weth)),
    };
    best.map(|(i, _)| i)
}

/// Thread-safe market cache
#[derive(Debug, Clone)]
pub struct MarketCache {
    weth: Address,
    /// Pools indexed by their non-WETH token
    markets: Arc<DashMap<Address, Vec<PoolState>>>,
    /// Pool address -> token it is filed under
    pool_tokens: Arc<DashMap<Address, Address>>,
    /// (token, fee tier) pairs already discovered or being discovered
    seen: Arc<DashSet<(Address, u32)>>,
}

impl MarketCache {
    pub fn new(weth: Address) -> Self {
        Self {
            weth,
            markets: Arc::new(DashMap::new()),
            pool_tokens: Arc::new(DashMap::new()),
            seen: Arc::new(DashSet::new()),
        }
    }

    pub fn weth(&self) -> Address {
        self.weth
    }

    /// Discover and cache every venue's pool for (token, WETH) at `fee_tier`.
    ///
    /// Idempotent per `(token, fee_tier)`. Returns the number of pools added.
    /// On a discovery error the key is released so a later call retries.
    pub async fn ensure_market<C: ChainClient + ?Sized>(
        &self,
        discovery: &PoolDiscovery<C>,
        token: Address,
        fee_tier: u32,
    ) -> Result<usize, RpcError> {
        if token == self.weth {
            return Ok(0);
        }
        if !self.seen.insert((token, fee_tier)) {
            return Ok(0);
        }

        match discovery.discover(token, fee_tier).await {
            Ok(pools) => {
                let added = self.insert_pools(token, pools);
                info!(
                    "Market {:?} @ fee {}: {} new pools ({} total)",
                    token,
                    fee_tier,
                    added,
                    self.markets.get(&token).map(|m| m.len()).unwrap_or(0)
                );
                Ok(added)
            }
            Err(e) => {
                self.seen.remove(&(token, fee_tier));
                Err(e)
            }
        }
    }

    /// Insert pools under `token`, skipping venue addresses already present.
    pub fn insert_pools(&self, token: Address, pools: Vec<PoolState>) -> usize {
        let mut market = self.markets.entry(token).or_default();
        let mut added = 0;
        for pool in pools {
            if market.iter().any(|p| p.address == pool.address) {
                continue;
            }
            self.pool_tokens.insert(pool.address, token);
            market.push(pool);
            added += 1;
        }
        added
    }

    /// Apply a venue reserve event to the tracked pool at `pool_address`.
    ///
    /// Returns the pool's token when reserves changed, `None` for untracked
    /// venues or stale events.
    pub fn apply_reserve_event(
        &self,
        pool_address: Address,
        reserve0: U256,
        reserve1: U256,
        at: Option<LogPosition>,
    ) -> Option<Address> {
        let token = *self.pool_tokens.get(&pool_address)?;
        let mut market = self.markets.get_mut(&token)?;
        let pool = market.iter_mut().find(|p| p.address == pool_address)?;
        if !pool.apply_event(reserve0, reserve1, at) {
            return None;
        }
        debug!(
            "Pool {:?} ({:?}): token={} weth={} price={:.6}",
            pool_address, token, pool.token_reserves, pool.weth_reserves, pool.token_per_weth
        );
        Some(token)
    }

    pub fn best_pool(&self, token: Address, side: Side) -> Option<PoolState> {
        let market = self.markets.get(&token)?;
        select_best(&market, side).map(|i| market[i].clone())
    }

    /// Token-per-WETH price of the best pool for `side`. WETH itself is 1.0.
    pub fn best_price(&self, token: Address, side: Side) -> Option<f64> {
        if token == self.weth {
            return Some(1.0);
        }
        self.best_pool(token, side).map(|p| p.token_per_weth)
    }

    /// Deep copy of the token's pools for exploratory simulation.
    pub fn clone_market(&self, token: Address) -> Vec<PoolState> {
        self.markets
            .get(&token)
            .map(|m| m.value().clone())
            .unwrap_or_default()
    }

    pub fn token_decimals(&self, token: Address) -> Option<u8> {
        self.markets
            .get(&token)
            .and_then(|m| m.first().map(|p| p.token_decimals))
    }

    /// (token count, pool count)
    pub fn stats(&self) -> (usize, usize) {
        (self.markets.len(), self.pool_tokens.len())
    }
}
