//! Order Book
//!
//! `order id -> LimitOrder` plus a reverse index from each non-WETH token
//! to the orders that trade it. Only the synchronizer and the execution
//! watcher mutate it; the batching engine reads cloned snapshots.
//!
//! Created: 2026-10-18

use crate::types::{LimitOrder, OrderId};
use alloy::primitives::Address;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OrderBook {
    weth: Address,
    orders: Arc<DashMap<OrderId, LimitOrder>>,
    by_token: Arc<DashMap<Address, HashSet<OrderId>>>,
}

impl OrderBook {
    pub fn new(weth: Address) -> Self {
        Self {
            weth,
            orders: Arc::new(DashMap::new()),
            by_token: Arc::new(DashMap::new()),
        }
    }

    /// Insert or overwrite an order, keeping the token index in step.
    pub fn upsert(&self, order: LimitOrder) {
        let id = order.id;
        if let Some(previous) = self.orders.insert(id, order.clone()) {
            if previous.token_in != order.token_in || previous.token_out != order.token_out {
                self.unindex(&previous);
            }
        }
        for token in self.indexed_tokens(&order) {
            self.by_token.entry(token).or_default().insert(id);
        }
        debug!("Order {} upserted ({} on book)", id, self.orders.len());
    }

    pub fn remove(&self, id: &OrderId) -> Option<LimitOrder> {
        let (_, order) = self.orders.remove(id)?;
        self.unindex(&order);
        debug!("Order {} removed ({} on book)", id, self.orders.len());
        Some(order)
    }

    pub fn get(&self, id: &OrderId) -> Option<LimitOrder> {
        self.orders.get(id).map(|o| o.clone())
    }

    pub fn contains(&self, id: &OrderId) -> bool {
        self.orders.contains_key(id)
    }

    /// Ids of orders whose input or output token is `token`.
    pub fn orders_affected_by(&self, token: &Address) -> Vec<OrderId> {
        self.by_token
            .get(token)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn ids(&self) -> Vec<OrderId> {
        self.orders.iter().map(|e| *e.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn indexed_tokens(&self, order: &LimitOrder) -> impl Iterator<Item = Address> {
        let weth = self.weth;
        [order.token_in, order.token_out]
            .into_iter()
            .filter(move |t| *t != weth)
    }

    fn unindex(&self, order: &LimitOrder) {
        for token in self.indexed_tokens(order) {
            let now_empty = match self.by_token.get_mut(&token) {
                Some(mut ids) => {
                    ids.remove(&order.id);
                    ids.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.by_token.remove_if(&token, |_, ids| ids.is_empty());
            }
        }
    }
}
