//! Per-block Synchronizer
//!
//! Drives the header loop. For every header the block range since the last
//! reconciled block is scanned in `max_blocks_per_query` chunks:
//!
//! 1. router logs are applied sequentially, in log order
//! 2. venue logs are applied concurrently, one task per log, behind a
//!    join barrier
//! 3. orders indexed under every token whose price moved are handed to
//!    the batching engine
//!
//! A chunk that fails is not committed to the cursor, so the next header
//! re-scans it. Tokens affected by chunks that did commit are carried over.
//!
//! Created: 2026-10-18

use super::events::{classify, log_position, router_topics, venue_topics, ChainEvent};
use super::Stores;
use crate::batching::BatchEngine;
use crate::error::RpcError;
use crate::execution::{ExecutionDispatcher, TransactionSender};
use crate::pool::simulator::concentrated_liquidity_reserves;
use crate::pool::{MarketCache, PoolDiscovery, ReferencePool};
use crate::rpc::{ChainClient, LogQuery};
use crate::types::{LogPosition, OrderId};
use alloy::primitives::Address;
use alloy::rpc::types::Log;
use dashmap::DashSet;
use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub router: Address,
    pub enable_taxed_tokens: bool,
    pub max_blocks_per_query: u64,
}

pub struct Synchronizer<C: ?Sized> {
    client: Arc<C>,
    settings: SyncSettings,
    stores: Stores,
    discovery: Arc<PoolDiscovery<C>>,
    engine: Arc<BatchEngine<C>>,
    /// Last block fully reconciled
    cursor: Option<u64>,
    /// Tokens affected by committed chunks not yet handed to the engine
    carried_tokens: HashSet<Address>,
}

impl<C: ChainClient + ?Sized> Synchronizer<C> {
    pub fn new(
        client: Arc<C>,
        settings: SyncSettings,
        stores: Stores,
        discovery: Arc<PoolDiscovery<C>>,
        engine: Arc<BatchEngine<C>>,
    ) -> Self {
        Self {
            client,
            settings,
            stores,
            discovery,
            engine,
            cursor: None,
            carried_tokens: HashSet::new(),
        }
    }

    /// Resume after `block` (typically the backfill end).
    pub fn with_cursor(mut self, block: u64) -> Self {
        self.cursor = Some(block);
        self
    }

    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// Consume headers in delivery order until the stream ends, dispatching
    /// batches on detached tasks.
    pub async fn run<H, S>(mut self, mut headers: H, dispatcher: Arc<ExecutionDispatcher<S>>)
    where
        H: Stream<Item = u64> + Unpin,
        S: TransactionSender + ?Sized,
    {
        while let Some(head) = headers.next().await {
            match self.process_block(head).await {
                Ok(batches) if batches.is_empty() => {}
                Ok(batches) => {
                    let dispatcher = Arc::clone(&dispatcher);
                    tokio::spawn(async move {
                        if let Err(e) = dispatcher.dispatch(batches).await {
                            error!("Dispatch failed: {}", e);
                        }
                    });
                }
                Err(e) => {
                    warn!(
                        "Block {} reconciliation failed, re-scanning from {:?} on next header: {}",
                        head,
                        self.cursor.map(|c| c + 1),
                        e
                    );
                }
            }
        }
        info!("Header stream ended at cursor {:?}", self.cursor);
    }

    /// Reconcile every block up to `head` and return the resulting batches.
    pub async fn process_block(&mut self, head: u64) -> Result<Vec<Vec<OrderId>>, RpcError> {
        let from = match self.cursor {
            Some(cursor) if cursor >= head => {
                debug!("Header {} already reconciled (cursor {})", head, cursor);
                return Ok(Vec::new());
            }
            Some(cursor) => cursor + 1,
            None => head,
        };

        let step = self.settings.max_blocks_per_query.max(1);
        let mut start = from;
        while start <= head {
            let end = head.min(start.saturating_add(step - 1));
            let affected = self.reconcile_range(start, end).await?;
            self.carried_tokens.extend(affected);
            self.cursor = Some(end);
            start = end + 1;
        }

        let tokens = std::mem::take(&mut self.carried_tokens);
        let mut seen = HashSet::new();
        let candidates: Vec<OrderId> = tokens
            .iter()
            .flat_map(|token| self.stores.book.orders_affected_by(token))
            .filter(|id| seen.insert(*id))
            .collect();
        debug!(
            "Blocks {}..={}: {} tokens moved, {} candidate orders",
            from,
            head,
            tokens.len(),
            candidates.len()
        );
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.engine.build_batches(&candidates).await)
    }

    /// Apply all logs in `[from_block, to_block]`. Returns the tokens whose price moved.
    async fn reconcile_range(&self, from_block: u64, to_block: u64) -> Result<HashSet<Address>, RpcError> {
        let router_query = LogQuery {
            from_block,
            to_block,
            address: Some(self.settings.router),
            topics: router_topics(),
        };
        let venue_query = LogQuery {
            from_block,
            to_block,
            address: None,
            topics: venue_topics(),
        };
        let (mut router_logs, mut venue_logs) = tokio::try_join!(
            self.client.logs(&router_query),
            self.client.logs(&venue_query)
        )?;
        router_logs.sort_by_key(|log| log_position(log).unwrap_or((u64::MAX, u64::MAX)));
        venue_logs.sort_by_key(|log| log_position(log).unwrap_or((u64::MAX, u64::MAX)));

        for log in &router_logs {
            let Some(event) = decode(log) else { continue };
            self.apply_router_event(event).await?;
        }

        let affected: Arc<DashSet<Address>> = Arc::new(DashSet::new());
        let mut tasks = JoinSet::new();
        for log in &venue_logs {
            let Some(event) = decode(log) else { continue };
            let at = log_position(log);
            let markets = self.stores.markets.clone();
            let reference = self.stores.reference.clone();
            let affected = Arc::clone(&affected);
            tasks.spawn(async move {
                if let Some(token) = apply_venue_event(&markets, &reference, event, at) {
                    affected.insert(token);
                }
            });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Venue log task failed: {}", e);
            }
        }

        if !router_logs.is_empty() || !venue_logs.is_empty() {
            debug!(
                "Reconciled {}..={}: {} router logs, {} venue logs",
                from_block,
                to_block,
                router_logs.len(),
                venue_logs.len()
            );
        }
        Ok(affected.iter().map(|t| *t).collect())
    }

    async fn apply_router_event(&self, event: ChainEvent) -> Result<(), RpcError> {
        match event {
            ChainEvent::OrderPlaced(ids)
            | ChainEvent::OrderUpdated(ids)
            | ChainEvent::OrderRefreshed(ids) => {
                for id in ids {
                    self.refresh_order(id).await?;
                }
            }
            ChainEvent::OrderCancelled(ids) => {
                for id in ids {
                    if self.stores.book.remove(&id).is_some() {
                        debug!("Order {} cancelled", id);
                    }
                }
            }
            ChainEvent::GasCredit { owner, balance } => self.stores.ledger.set(owner, balance),
            ChainEvent::ReserveSyncV2 { pool, .. } | ChainEvent::ReserveSyncV3 { pool, .. } => {
                warn!("Reserve event from router address {:?} ignored", pool);
            }
        }
        Ok(())
    }

    /// Fetch the order record and upsert it, discovering its markets first.
    async fn refresh_order(&self, id: OrderId) -> Result<(), RpcError> {
        let order = match self.client.order_by_id(id).await {
            Ok(order) => order,
            Err(RpcError::OrderNotFound(_)) => {
                debug!("Order {} no longer on router, dropping", id);
                self.stores.book.remove(&id);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if order.taxed && !self.settings.enable_taxed_tokens {
            debug!("Order {} trades a taxed token, skipping", id);
            self.stores.book.remove(&id);
            return Ok(());
        }

        self.stores
            .markets
            .ensure_market(&self.discovery, order.token_in, order.fee_in)
            .await?;
        self.stores
            .markets
            .ensure_market(&self.discovery, order.token_out, order.fee_out)
            .await?;
        self.stores.book.upsert(order);
        Ok(())
    }
}

fn decode(log: &Log) -> Option<ChainEvent> {
    match classify(log) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(
                "Dropping log from {:?} at block {:?} index {:?}: {}",
                log.address(),
                log.block_number,
                log.log_index,
                e
            );
            None
        }
    }
}

/// Apply a reserve event to the reference pool and the market cache.
/// Returns the tracked token whose price moved.
pub fn apply_venue_event(
    markets: &MarketCache,
    reference: &ReferencePool,
    event: ChainEvent,
    at: Option<LogPosition>,
) -> Option<Address> {
    let (pool, reserve0, reserve1) = match event {
        ChainEvent::ReserveSyncV2 {
            pool,
            reserve0,
            reserve1,
        } => (pool, reserve0, reserve1),
        ChainEvent::ReserveSyncV3 {
            pool,
            sqrt_price_x96,
            liquidity,
        } => match concentrated_liquidity_reserves(sqrt_price_x96, liquidity) {
            Ok((reserve0, reserve1)) => (pool, reserve0, reserve1),
            Err(e) => {
                debug!("Swap on {:?} not applied: {}", pool, e);
                return None;
            }
        },
        ChainEvent::OrderPlaced(_)
        | ChainEvent::OrderCancelled(_)
        | ChainEvent::OrderUpdated(_)
        | ChainEvent::OrderRefreshed(_)
        | ChainEvent::GasCredit { .. } => return None,
    };

    reference.apply_reserve_event(pool, reserve0, reserve1, at);
    markets.apply_reserve_event(pool, reserve0, reserve1, at)
}
