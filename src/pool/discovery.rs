//! Venue discovery
//!
//! Looks up a token's (token, WETH) pool on every registered venue and
//! reads its initial reserves, direction and decimals. Venues are queried
//! concurrently via join_all.
//!
//! Created: 2026-10-18

use crate::error::RpcError;
use crate::rpc::ChainClient;
use crate::types::{Dex, PoolState, VenueKind};
use alloy::primitives::Address;
use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

/// Registered venues plus the client used to query them
pub struct PoolDiscovery<C: ?Sized> {
    client: Arc<C>,
    dexes: Vec<Dex>,
    weth: Address,
    weth_decimals: u8,
}

impl<C: ChainClient + ?Sized> PoolDiscovery<C> {
    pub fn new(client: Arc<C>, dexes: Vec<Dex>, weth: Address, weth_decimals: u8) -> Self {
        Self {
            client,
            dexes,
            weth,
            weth_decimals,
        }
    }

    /// Read the venue registry from the swap router.
    pub async fn load_dexes(client: &C, count: u64) -> Result<Vec<Dex>, RpcError> {
        let mut dexes = Vec::with_capacity(count as usize);
        for index in 0..count {
            let dex = client.dex(index).await?;
            debug!("Venue {}: {} factory {:?}", index, dex.kind, dex.factory);
            dexes.push(dex);
        }
        Ok(dexes)
    }

    /// Every venue's pool for (token, WETH). Venues without one are skipped.
    pub async fn discover(&self, token: Address, fee_tier: u32) -> Result<Vec<PoolState>, RpcError> {
        let token_decimals = self.client.token_decimals(token).await?;

        let lookups = self
            .dexes
            .iter()
            .map(|dex| self.pool_on_dex(*dex, token, token_decimals, fee_tier));
        let mut pools = Vec::new();
        for result in join_all(lookups).await {
            if let Some(pool) = result? {
                pools.push(pool);
            }
        }
        Ok(pools)
    }

    /// The (token, WETH) pool holding the most WETH across all venues.
    pub async fn most_liquid(&self, token: Address, fee_tier: u32) -> Result<Option<PoolState>, RpcError> {
        let pools = self.discover(token, fee_tier).await?;
        Ok(pools.into_iter().max_by_key(|p| p.weth_reserves))
    }

    async fn pool_on_dex(
        &self,
        dex: Dex,
        token: Address,
        token_decimals: u8,
        fee_tier: u32,
    ) -> Result<Option<PoolState>, RpcError> {
        let Some(address) = self
            .client
            .pool_address(&dex, token, self.weth, fee_tier)
            .await?
        else {
            debug!("No {} pool for {:?} on {:?}", dex.kind, token, dex.factory);
            return Ok(None);
        };

        let token0 = self.client.pool_token0(address).await?;
        let (reserve0, reserve1) = self.client.pool_reserves(address, dex.kind).await?;
        let pool_fee = match dex.kind {
            VenueKind::ConstantProduct => 0,
            VenueKind::ConcentratedLiquidity => fee_tier,
        };

        Ok(Some(PoolState::from_raw(
            address,
            dex.kind,
            pool_fee,
            token,
            token_decimals,
            self.weth_decimals,
            token0 == token,
            reserve0,
            reserve1,
        )))
    }
}
