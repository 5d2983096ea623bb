//! Route grouping and execution-price filter
//!
//! Orders are grouped by `(tokenIn, tokenOut, feeIn)`. Within a route, an
//! order is executable when its limit price is on the right side of the
//! current price:
//!
//! - buy:  `limit >= current`
//! - sell: `limit <= current`
//!
//! where `current = bestPrice(tokenIn, side) / bestPrice(tokenOut, side)`
//! and both prices are token-per-WETH. Survivors are split by
//! `(route, side, taxed)` so each batch is homogeneous.
//!
//! Created: 2026-10-18

use crate::types::{LimitOrder, RouteKey, Side};
use alloy::primitives::Address;
use std::collections::HashMap;

/// All candidate orders for one route, in first-seen order
#[derive(Debug, Clone)]
pub struct RouteGroup {
    pub route: RouteKey,
    pub orders: Vec<LimitOrder>,
}

/// Key of a homogeneous batch candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub route: RouteKey,
    pub side: Side,
    pub taxed: bool,
}

#[derive(Debug, Clone)]
pub struct OrderGroup {
    pub key: GroupKey,
    pub orders: Vec<LimitOrder>,
}

/// Group orders sharing `(tokenIn, tokenOut, feeIn)`. Groups keep the order
/// in which their first member appeared.
pub fn group_by_route(orders: Vec<LimitOrder>) -> Vec<RouteGroup> {
    let mut index: HashMap<RouteKey, usize> = HashMap::new();
    let mut groups: Vec<RouteGroup> = Vec::new();
    for order in orders {
        let route = order.route();
        match index.get(&route) {
            Some(&i) => groups[i].orders.push(order),
            None => {
                index.insert(route, groups.len());
                groups.push(RouteGroup {
                    route,
                    orders: vec![order],
                });
            }
        }
    }
    groups
}

/// `bestPrice(tokenIn) / bestPrice(tokenOut)` for the order's side.
pub fn current_price<F>(order: &LimitOrder, price_of: &F) -> Option<f64>
where
    F: Fn(Address, Side) -> Option<f64>,
{
    let price_in = price_of(order.token_in, order.side)?;
    let price_out = price_of(order.token_out, order.side)?;
    if !(price_in.is_finite() && price_out.is_finite()) || price_in <= 0.0 || price_out <= 0.0 {
        return None;
    }
    Some(price_in / price_out)
}

/// Boundary equality passes on both sides.
pub fn passes_price_filter(side: Side, limit_price: f64, current: f64) -> bool {
    match side {
        Side::Buy => limit_price >= current,
        Side::Sell => limit_price <= current,
    }
}

/// Orders in `group` executable at the current price. Unpriceable orders drop out.
pub fn filter_executable<F>(group: RouteGroup, price_of: &F) -> Vec<LimitOrder>
where
    F: Fn(Address, Side) -> Option<f64>,
{
    group
        .orders
        .into_iter()
        .filter(|order| {
            current_price(order, price_of)
                .map(|current| passes_price_filter(order.side, order.price, current))
                .unwrap_or(false)
        })
        .collect()
}

/// Split one route's executable orders by `(side, taxed)`.
pub fn split_by_side_and_tax(route: RouteKey, orders: Vec<LimitOrder>) -> Vec<OrderGroup> {
    let mut groups: Vec<OrderGroup> = Vec::new();
    for order in orders {
        let key = GroupKey {
            route,
            side: order.side,
            taxed: order.taxed,
        };
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.orders.push(order),
            None => groups.push(OrderGroup {
                key,
                orders: vec![order],
            }),
        }
    }
    groups
}
