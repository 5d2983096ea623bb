//! Core data structures
//!
//! Orders, venues and pool state shared by the synchronizer, the batching
//! engine and the dispatcher.
//!
//! Created: 2026-10-18

use crate::pool::simulator;
use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content-addressed order id assigned by the router.
pub type OrderId = B256;

/// Position of a log inside the chain: (block number, log index).
pub type LogPosition = (u64, u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// AMM family of a venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VenueKind {
    /// Uniswap V2 style x*y=k pair
    ConstantProduct,
    /// Uniswap V3 style tick-based pool
    ConcentratedLiquidity,
}

impl fmt::Display for VenueKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VenueKind::ConstantProduct => write!(f, "V2"),
            VenueKind::ConcentratedLiquidity => write!(f, "V3"),
        }
    }
}

/// A venue registered on the swap router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dex {
    pub factory: Address,
    pub kind: VenueKind,
}

/// Active limit order as mirrored from the router
#[derive(Debug, Clone, PartialEq)]
pub struct LimitOrder {
    pub id: OrderId,
    pub owner: Address,
    pub side: Side,
    pub taxed: bool,
    /// Share of an inbound transfer that reaches the pool, in units of 1/100000
    pub tax_in: u32,
    pub last_refresh: u64,
    pub expiration: u64,
    /// Limit price, tokenIn per tokenOut
    pub price: f64,
    pub amount_out_min: U256,
    pub quantity: U256,
    pub token_in: Address,
    pub token_out: Address,
    pub fee_in: u32,
    pub fee_out: u32,
}

impl LimitOrder {
    pub fn route(&self) -> RouteKey {
        RouteKey {
            token_in: self.token_in,
            token_out: self.token_out,
            fee_in: self.fee_in,
        }
    }

    /// An expiration of zero means the order never expires.
    pub fn is_expired(&self, now_secs: u64) -> bool {
        self.expiration != 0 && self.expiration < now_secs
    }
}

/// Orders sharing this key are batched together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub token_in: Address,
    pub token_out: Address,
    pub fee_in: u32,
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}->{:?}@{}", self.token_in, self.token_out, self.fee_in)
    }
}

/// One venue's (token, WETH) market.
///
/// Reserves are kept in raw on-chain units. `token_per_weth` is always
/// recomputed together with the reserves so a reader never sees a price
/// from one update next to reserves from another.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolState {
    pub address: Address,
    pub kind: VenueKind,
    pub fee_tier: u32,
    pub token: Address,
    pub token_reserves: U256,
    pub token_decimals: u8,
    pub weth_reserves: U256,
    pub weth_decimals: u8,
    /// True when `token` is token0 of the pool
    pub token_is_base: bool,
    pub token_per_weth: f64,
    /// Last reserve event applied, used to drop stale concurrent updates
    pub last_event: Option<LogPosition>,
}

impl PoolState {
    /// Build a pool from raw (reserve0, reserve1) as reported by the venue.
    #[allow(clippy::too_many_arguments)]
    pub fn from_raw(
        address: Address,
        kind: VenueKind,
        fee_tier: u32,
        token: Address,
        token_decimals: u8,
        weth_decimals: u8,
        token_is_base: bool,
        reserve0: U256,
        reserve1: U256,
    ) -> Self {
        let mut pool = Self {
            address,
            kind,
            fee_tier,
            token,
            token_reserves: U256::ZERO,
            token_decimals,
            weth_reserves: U256::ZERO,
            weth_decimals,
            token_is_base,
            token_per_weth: 0.0,
            last_event: None,
        };
        pool.set_raw_reserves(reserve0, reserve1);
        pool
    }

    /// Map (reserve0, reserve1) onto token/WETH and refresh the price.
    pub fn set_raw_reserves(&mut self, reserve0: U256, reserve1: U256) {
        let (token, weth) = if self.token_is_base {
            (reserve0, reserve1)
        } else {
            (reserve1, reserve0)
        };
        self.set_reserves(token, weth);
    }

    pub fn set_reserves(&mut self, token_reserves: U256, weth_reserves: U256) {
        self.token_reserves = token_reserves;
        self.weth_reserves = weth_reserves;
        self.token_per_weth = simulator::token_per_weth(
            token_reserves,
            self.token_decimals,
            weth_reserves,
            self.weth_decimals,
        );
    }

    /// Apply a reserve event unless a later one was already applied.
    /// Returns true when the pool changed.
    pub fn apply_event(&mut self, reserve0: U256, reserve1: U256, at: Option<LogPosition>) -> bool {
        if let (Some(seen), Some(incoming)) = (self.last_event, at) {
            if incoming <= seen {
                return false;
            }
        }
        self.set_raw_reserves(reserve0, reserve1);
        if at.is_some() {
            self.last_event = at;
        }
        true
    }

    /// A pool with an empty side cannot be priced or swapped against.
    pub fn is_priced(&self) -> bool {
        self.token_per_weth.is_finite() && self.token_per_weth > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(token_is_base: bool) -> PoolState {
        PoolState::from_raw(
            Address::repeat_byte(0x11),
            VenueKind::ConstantProduct,
            3000,
            Address::repeat_byte(0x22),
            6,
            18,
            token_is_base,
            U256::from(2_000_000_000u64),
            U256::from(1_000_000_000_000_000_000u64),
        )
    }

    #[test]
    fn test_raw_reserves_follow_direction() {
        let base = pool(true);
        assert_eq!(base.token_reserves, U256::from(2_000_000_000u64));
        assert!((base.token_per_weth - 2000.0).abs() < 1e-9);

        let quote = pool(false);
        assert_eq!(quote.weth_reserves, U256::from(2_000_000_000u64));
        assert_eq!(quote.token_reserves, U256::from(1_000_000_000_000_000_000u64));
    }

    #[test]
    fn test_stale_event_is_ignored() {
        let mut p = pool(true);
        assert!(p.apply_event(U256::from(10u64), U256::from(20u64), Some((5, 3))));
        assert!(!p.apply_event(U256::from(99u64), U256::from(99u64), Some((5, 1))));
        assert_eq!(p.token_reserves, U256::from(10u64));
        assert!(p.apply_event(U256::from(11u64), U256::from(21u64), Some((6, 0))));
        assert_eq!(p.last_event, Some((6, 0)));
    }

    #[test]
    fn test_expiry() {
        let mut order = LimitOrder {
            id: B256::ZERO,
            owner: Address::ZERO,
            side: Side::Buy,
            taxed: false,
            tax_in: 0,
            last_refresh: 0,
            expiration: 100,
            price: 1.0,
            amount_out_min: U256::ZERO,
            quantity: U256::from(1u64),
            token_in: Address::ZERO,
            token_out: Address::ZERO,
            fee_in: 3000,
            fee_out: 3000,
        };
        assert!(order.is_expired(101));
        assert!(!order.is_expired(100));
        order.expiration = 0;
        assert!(!order.is_expired(u64::MAX));
    }
}
