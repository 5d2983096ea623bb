//! Historical backfill
//!
//! Replays router logs from the router's creation block to the current
//! head in fixed-size chunks. Membership is resolved first (placed adds,
//! cancelled removes, gas credits are set in order), then every surviving
//! order is fetched once and inserted with its markets discovered.
//!
//! Any chunk failure is fatal: the bot must not start with a partial book.
//!
//! Created: 2026-10-18

use super::events::{classify, log_position, router_topics, ChainEvent};
use super::Stores;
use crate::error::{RpcError, StartupError};
use crate::pool::PoolDiscovery;
use crate::rpc::{ChainClient, LogQuery};
use crate::types::OrderId;
use alloy::primitives::Address;
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct BackfillRange {
    pub router: Address,
    pub from_block: u64,
    pub to_block: u64,
    pub chunk_size: u64,
    pub enable_taxed_tokens: bool,
}

/// Backfill the book and ledger. Returns the last block covered, which
/// becomes the synchronizer's cursor.
pub async fn backfill<C: ChainClient + ?Sized>(
    client: &C,
    discovery: &PoolDiscovery<C>,
    stores: &Stores,
    range: BackfillRange,
) -> Result<u64, StartupError> {
    let step = range.chunk_size.max(1);
    // First-placement order of every id seen, and the ids still live
    let mut listed: Vec<OrderId> = Vec::new();
    let mut seen: HashSet<OrderId> = HashSet::new();
    let mut live_set: HashSet<OrderId> = HashSet::new();
    let mut total_logs = 0usize;

    let mut start = range.from_block;
    while start <= range.to_block {
        let end = range.to_block.min(start.saturating_add(step - 1));
        let query = LogQuery {
            from_block: start,
            to_block: end,
            address: Some(range.router),
            topics: router_topics(),
        };
        let mut logs = client.logs(&query).await.map_err(StartupError::Backfill)?;
        logs.sort_by_key(|log| log_position(log).unwrap_or((u64::MAX, u64::MAX)));
        total_logs += logs.len();

        for log in &logs {
            let event = match classify(log) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Backfill: dropping log at block {:?}: {}", log.block_number, e);
                    continue;
                }
            };
            match event {
                ChainEvent::OrderPlaced(ids) => {
                    for id in ids {
                        live_set.insert(id);
                        if seen.insert(id) {
                            listed.push(id);
                        }
                    }
                }
                ChainEvent::OrderCancelled(ids) => {
                    for id in ids {
                        live_set.remove(&id);
                    }
                }
                // Current state is read once at the end
                ChainEvent::OrderUpdated(_) | ChainEvent::OrderRefreshed(_) => {}
                ChainEvent::GasCredit { owner, balance } => stores.ledger.set(owner, balance),
                ChainEvent::ReserveSyncV2 { .. } | ChainEvent::ReserveSyncV3 { .. } => {}
            }
        }

        debug!("Backfill {}..={}: {} logs", start, end, logs.len());
        start = end + 1;
    }

    let mut loaded = 0usize;
    for id in listed.into_iter().filter(|id| live_set.contains(id)) {
        let order = match client.order_by_id(id).await {
            Ok(order) => order,
            Err(RpcError::OrderNotFound(_)) => {
                debug!("Backfill: order {} no longer on router", id);
                continue;
            }
            Err(e) => return Err(StartupError::Backfill(e)),
        };
        if order.taxed && !range.enable_taxed_tokens {
            continue;
        }
        stores
            .markets
            .ensure_market(discovery, order.token_in, order.fee_in)
            .await
            .map_err(StartupError::Backfill)?;
        stores
            .markets
            .ensure_market(discovery, order.token_out, order.fee_out)
            .await
            .map_err(StartupError::Backfill)?;
        stores.book.upsert(order);
        loaded += 1;
    }

    let (tokens, pools) = stores.markets.stats();
    info!(
        "Backfill complete: blocks {}..={}, {} router logs, {} active orders, {} tokens / {} pools tracked",
        range.from_block, range.to_block, total_logs, loaded, tokens, pools
    );
    Ok(range.to_block)
}
