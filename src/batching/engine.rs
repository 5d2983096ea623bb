//! Batching/Matching Engine
//!
//! Turns a set of candidate order ids into batches that should succeed on
//! chain:
//!
//! 1. group by route `(tokenIn, tokenOut, feeIn)`
//! 2. keep orders whose limit price beats the current price, split by
//!    `(route, side, taxed)`
//! 3. rank groups by USD notional, smallest first
//! 4. sort each group by quantity, smallest first
//! 5. simulate greedily on cloned markets; the first order that misses
//!    its minimum output ends the group
//!
//! Each surviving batch is optionally dry-run against the router before it
//! is returned.
//!
//! Created: 2026-10-18

use super::quicksort::quicksort_by_quantity;
use super::ranking::{group_notional_usd, rank_by_notional};
use super::routing::{filter_executable, group_by_route, split_by_side_and_tax, OrderGroup};
use crate::error::SimulationError;
use crate::orders::{OrderBook, PendingExecution};
use crate::pool::simulator::{apply_transfer_tax, commit_swap, simulate_pool_swap};
use crate::pool::{select_best, MarketCache, ReferencePool};
use crate::rpc::ChainClient;
use crate::types::{LimitOrder, OrderId, PoolState, Side};
use alloy::primitives::{Address, U256};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub weth_decimals: u8,
    /// Dry-run every batch with `eth_call` before returning it
    pub validate_on_chain: bool,
}

/// Local verdict for one order. Missing the minimum output is an expected
/// outcome, not a [`SimulationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationOutcome {
    Filled { amount_out: U256 },
    Rejected { amount_out: U256 },
}

pub struct BatchEngine<C: ?Sized> {
    client: Arc<C>,
    book: OrderBook,
    markets: MarketCache,
    reference: ReferencePool,
    pending: PendingExecution,
    settings: EngineSettings,
}

impl<C: ChainClient + ?Sized> BatchEngine<C> {
    pub fn new(
        client: Arc<C>,
        book: OrderBook,
        markets: MarketCache,
        reference: ReferencePool,
        pending: PendingExecution,
        settings: EngineSettings,
    ) -> Self {
        Self {
            client,
            book,
            markets,
            reference,
            pending,
            settings,
        }
    }

    /// Build execution batches from `candidates`, in group-rank order.
    pub async fn build_batches(&self, candidates: &[OrderId]) -> Vec<Vec<OrderId>> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let mut seen = HashSet::new();
        let orders: Vec<LimitOrder> = candidates
            .iter()
            .filter(|id| seen.insert(**id))
            .filter(|id| !self.pending.is_pending(id))
            .filter_map(|id| self.book.get(id))
            .filter(|order| {
                let expired = order.is_expired(now);
                if expired {
                    debug!("Order {} expired at {}, skipping", order.id, order.expiration);
                }
                !expired
            })
            .collect();
        if orders.is_empty() {
            return Vec::new();
        }

        let groups = self.executable_groups(orders);
        let mut batches = Vec::new();
        for mut group in groups {
            quicksort_by_quantity(&mut group.orders);
            let batch = self.simulate_group(&group).await;
            if batch.is_empty() {
                continue;
            }
            if self.settings.validate_on_chain && !self.validate(&batch).await {
                continue;
            }
            debug!(
                "Batch ready: {} orders on {} ({})",
                batch.len(),
                group.key.route,
                group.key.side
            );
            batches.push(batch);
        }

        if !batches.is_empty() {
            info!(
                "{} batches ready from {} candidate orders",
                batches.len(),
                candidates.len()
            );
        }
        batches
    }

    /// Stages 1-3: group, price-filter, split and rank.
    pub fn executable_groups(&self, orders: Vec<LimitOrder>) -> Vec<OrderGroup> {
        let price_of = |token: Address, side: Side| self.markets.best_price(token, side);
        let decimals_of = |token: Address| {
            if token == self.markets.weth() {
                Some(self.settings.weth_decimals)
            } else {
                self.markets.token_decimals(token)
            }
        };

        let mut groups = Vec::new();
        for route_group in group_by_route(orders) {
            let route = route_group.route;
            let executable = filter_executable(route_group, &price_of);
            groups.extend(split_by_side_and_tax(route, executable));
        }

        let usd_per_weth = self.reference.usd_per_weth();
        if usd_per_weth.is_none() {
            warn!("USD reference price unavailable, groups keep discovery order");
        }
        rank_by_notional(groups, |group| {
            usd_per_weth.and_then(|usd| group_notional_usd(group, &decimals_of, &price_of, usd))
        })
    }

    /// Stage 5: greedy simulation of an already sorted group on cloned markets.
    pub async fn simulate_group(&self, group: &OrderGroup) -> Vec<OrderId> {
        let mut token_in_market = self.markets.clone_market(group.key.route.token_in);
        let mut token_out_market = self.markets.clone_market(group.key.route.token_out);

        let mut batch = Vec::new();
        for order in &group.orders {
            match self
                .simulate_order(order, &mut token_in_market, &mut token_out_market)
                .await
            {
                Ok(SimulationOutcome::Filled { .. }) => batch.push(order.id),
                Ok(SimulationOutcome::Rejected { amount_out }) => {
                    debug!(
                        "Order {} simulated {} < min {}, closing group after {} orders",
                        order.id,
                        amount_out,
                        order.amount_out_min,
                        batch.len()
                    );
                    break;
                }
                Err(e) => {
                    debug!("Order {} could not be simulated: {}", order.id, e);
                    break;
                }
            }
        }
        batch
    }

    /// Simulate tokenIn -> WETH -> tokenOut on the cloned markets. Reserves
    /// are only advanced when the order meets its minimum output.
    async fn simulate_order(
        &self,
        order: &LimitOrder,
        token_in_market: &mut [PoolState],
        token_out_market: &mut [PoolState],
    ) -> Result<SimulationOutcome, SimulationError> {
        let weth = self.markets.weth();
        let mut amount = order.quantity;
        if order.taxed {
            amount = apply_transfer_tax(amount, order.tax_in)?;
        }

        let mut first_hop = None;
        if order.token_in != weth {
            let index = select_best(token_in_market, order.side)
                .ok_or(SimulationError::NoPool(order.token_in))?;
            let outcome =
                simulate_pool_swap(&*self.client, &token_in_market[index], weth, amount, true).await?;
            amount = outcome.amount_out;
            first_hop = Some((index, outcome));
        }

        let mut second_hop = None;
        if order.token_out != weth {
            let index = select_best(token_out_market, order.side)
                .ok_or(SimulationError::NoPool(order.token_out))?;
            let outcome =
                simulate_pool_swap(&*self.client, &token_out_market[index], weth, amount, false)
                    .await?;
            amount = outcome.amount_out;
            second_hop = Some((index, outcome));
        }

        if amount < order.amount_out_min {
            return Ok(SimulationOutcome::Rejected { amount_out: amount });
        }

        if let Some((index, outcome)) = first_hop {
            commit_swap(&mut token_in_market[index], &outcome, true);
        }
        if let Some((index, outcome)) = second_hop {
            commit_swap(&mut token_out_market[index], &outcome, false);
        }
        Ok(SimulationOutcome::Filled { amount_out: amount })
    }

    async fn validate(&self, batch: &[OrderId]) -> bool {
        match self.client.simulate_execution(&[batch.to_vec()]).await {
            Ok(true) => true,
            Ok(false) => {
                info!("Batch of {} orders rejected by on-chain dry run", batch.len());
                false
            }
            Err(e) => {
                warn!("On-chain batch validation failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{order, MockChain};
    use crate::types::VenueKind;
    use alloy::primitives::B256;
    use std::sync::atomic::Ordering;

    const WETH: Address = Address::repeat_byte(0xEE);
    const X: Address = Address::repeat_byte(0x01);
    const Y: Address = Address::repeat_byte(0x02);
    const ONE: u64 = 1_000_000_000_000_000_000;

    fn tokens(whole: u64) -> U256 {
        U256::from(whole) * U256::from(ONE)
    }

    fn pool(address: u8, token: Address, token_whole: u64, weth_whole: u64) -> PoolState {
        PoolState::from_raw(
            Address::repeat_byte(address),
            VenueKind::ConstantProduct,
            0,
            token,
            18,
            18,
            true,
            tokens(token_whole),
            tokens(weth_whole),
        )
    }

    struct Fixture {
        chain: Arc<MockChain>,
        book: OrderBook,
        markets: MarketCache,
        pending: PendingExecution,
        engine: BatchEngine<MockChain>,
    }

    fn fixture(validate_on_chain: bool) -> Fixture {
        let chain = Arc::new(MockChain::new());
        let book = OrderBook::new(WETH);
        let markets = MarketCache::new(WETH);
        let pending = PendingExecution::new();
        // 900 X / 100 WETH -> 9 X per WETH
        markets.insert_pools(X, vec![pool(0xA1, X, 900, 100)]);
        let engine = BatchEngine::new(
            Arc::clone(&chain),
            book.clone(),
            markets.clone(),
            ReferencePool::new(),
            pending.clone(),
            EngineSettings {
                weth_decimals: 18,
                validate_on_chain,
            },
        );
        Fixture {
            chain,
            book,
            markets,
            pending,
            engine,
        }
    }

    fn buy_x_for_weth(id: u8, quantity: u64, min_out_weth: u64) -> LimitOrder {
        let mut o = order(id, Side::Buy, X, WETH, 0);
        o.quantity = tokens(quantity);
        o.amount_out_min = tokens(min_out_weth);
        o.price = 10.0;
        o
    }

    #[tokio::test]
    async fn test_smaller_order_fills_and_larger_fails_after_impact() {
        let f = fixture(false);
        // A alone against 900/100 would get exactly 10 WETH
        let a = buy_x_for_weth(0xA, 100, 10);
        // B gets ~5.26 WETH, leaving A ~9.02
        let b = buy_x_for_weth(0xB, 50, 5);
        f.book.upsert(a.clone());
        f.book.upsert(b.clone());

        let batches = f.engine.build_batches(&[a.id, b.id]).await;
        assert_eq!(batches, vec![vec![b.id]]);

        // The live cache is untouched by the simulation
        let live = f.markets.best_pool(X, Side::Buy).unwrap();
        assert_eq!(live.token_reserves, tokens(900));
    }

    #[tokio::test]
    async fn test_first_failure_ends_group() {
        let f = fixture(false);
        // Sorted: 10 (fails, min too high), 20 (would pass alone), 30
        let small_greedy = buy_x_for_weth(1, 10, 50);
        let mid = buy_x_for_weth(2, 20, 1);
        let large = buy_x_for_weth(3, 30, 1);
        for o in [&large, &small_greedy, &mid] {
            f.book.upsert(o.clone());
        }

        let batches = f
            .engine
            .build_batches(&[large.id, small_greedy.id, mid.id])
            .await;
        assert!(batches.is_empty());
    }

    #[tokio::test]
    async fn test_two_hop_route_and_price_filter() {
        let f = fixture(false);
        // 300 Y / 100 WETH -> 3 Y per WETH; X->Y current price = 9 / 3 = 3
        f.markets.insert_pools(Y, vec![pool(0xB1, Y, 300, 100)]);

        let mut fills = order(1, Side::Buy, X, Y, 0);
        fills.quantity = tokens(9);
        fills.amount_out_min = tokens(2);
        fills.price = 3.0;
        let mut priced_out = fills.clone();
        priced_out.id = B256::repeat_byte(2);
        priced_out.price = 2.9;
        f.book.upsert(fills.clone());
        f.book.upsert(priced_out.clone());

        let batches = f.engine.build_batches(&[fills.id, priced_out.id]).await;
        assert_eq!(batches, vec![vec![fills.id]]);
    }

    #[tokio::test]
    async fn test_pending_and_expired_orders_are_skipped() {
        let f = fixture(false);
        let pending_order = buy_x_for_weth(1, 10, 0);
        let mut expired = buy_x_for_weth(2, 10, 0);
        expired.expiration = 1;
        f.book.upsert(pending_order.clone());
        f.book.upsert(expired.clone());
        let _marks = f.pending.mark(&[pending_order.id]);

        let batches = f.engine.build_batches(&[pending_order.id, expired.id]).await;
        assert!(batches.is_empty());
    }

    #[tokio::test]
    async fn test_on_chain_validation_filters_batches() {
        let f = fixture(true);
        let o = buy_x_for_weth(1, 10, 0);
        f.book.upsert(o.clone());

        assert_eq!(f.engine.build_batches(&[o.id]).await, vec![vec![o.id]]);
        f.chain.reject_execution.store(true, Ordering::SeqCst);
        assert!(f.engine.build_batches(&[o.id]).await.is_empty());
        assert_eq!(f.chain.execution_checks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_weth_leg_matches_single_hop() {
        let f = fixture(false);
        let o = buy_x_for_weth(1, 50, 0);
        let market = f.markets.clone_market(X);
        let single = simulate_pool_swap(&*f.chain, &market[0], WETH, o.quantity, true)
            .await
            .unwrap();

        let mut tin = f.markets.clone_market(X);
        let mut tout: Vec<PoolState> = Vec::new();
        let outcome = f.engine.simulate_order(&o, &mut tin, &mut tout).await.unwrap();
        assert_eq!(
            outcome,
            SimulationOutcome::Filled {
                amount_out: single.amount_out
            }
        );
        assert_eq!(tin[0].weth_reserves, single.new_reserve_out);
        assert_eq!(tin[0].token_reserves, single.new_reserve_in);
    }
}
