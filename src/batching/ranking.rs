//! USD notional ranking
//!
//! Each group's value is the sum of its orders' quantities in whole input
//! tokens, converted to WETH through the token's best pool price and then
//! to USD through the reference pool. Groups are attempted smallest first.
//!
//! Created: 2026-10-18

use super::routing::OrderGroup;
use crate::pool::simulator::u256_to_f64;
use crate::types::Side;
use alloy::primitives::Address;

/// USD value of every order in `group`, `None` when a price or decimals are unknown.
pub fn group_notional_usd<D, P>(
    group: &OrderGroup,
    decimals_of: &D,
    price_of: &P,
    usd_per_weth: f64,
) -> Option<f64>
where
    D: Fn(Address) -> Option<u8>,
    P: Fn(Address, Side) -> Option<f64>,
{
    let token_in = group.key.route.token_in;
    let decimals = decimals_of(token_in)?;
    let token_per_weth = price_of(token_in, group.key.side)?;
    if token_per_weth <= 0.0 || !token_per_weth.is_finite() {
        return None;
    }
    let unit = 10f64.powi(i32::from(decimals));
    let whole_tokens: f64 = group
        .orders
        .iter()
        .map(|o| u256_to_f64(o.quantity) / unit)
        .sum();
    Some(whole_tokens / token_per_weth * usd_per_weth)
}

/// Stable ascending sort by notional. Groups that cannot be valued go last.
pub fn rank_by_notional<F>(groups: Vec<OrderGroup>, notional: F) -> Vec<OrderGroup>
where
    F: Fn(&OrderGroup) -> Option<f64>,
{
    let mut valued: Vec<(f64, OrderGroup)> = groups
        .into_iter()
        .map(|g| (notional(&g).unwrap_or(f64::INFINITY), g))
        .collect();
    valued.sort_by(|a, b| a.0.total_cmp(&b.0));
    valued.into_iter().map(|(_, g)| g).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batching::routing::GroupKey;
    use crate::testing::order;
    use crate::types::RouteKey;

    const WETH: Address = Address::repeat_byte(0xEE);
    const X: Address = Address::repeat_byte(0x01);
    const Y: Address = Address::repeat_byte(0x02);

    fn group(token_in: Address, quantities: &[u64], first_id: u8) -> OrderGroup {
        let orders = quantities
            .iter()
            .enumerate()
            .map(|(i, q)| order(first_id + i as u8, Side::Buy, token_in, WETH, *q))
            .collect();
        OrderGroup {
            key: GroupKey {
                route: RouteKey {
                    token_in,
                    token_out: WETH,
                    fee_in: 3000,
                },
                side: Side::Buy,
                taxed: false,
            },
            orders,
        }
    }

    #[test]
    fn test_notional_converts_through_weth() {
        // 2 + 3 whole X (6 decimals) at 10 X per WETH, 2000 USD per WETH = 1000 USD
        let g = group(X, &[2_000_000, 3_000_000], 1);
        let value = group_notional_usd(&g, &|_| Some(6), &|_, _| Some(10.0), 2000.0).unwrap();
        assert!((value - 1000.0).abs() < 1e-9);

        assert_eq!(group_notional_usd(&g, &|_| None, &|_, _| Some(10.0), 2000.0), None);
    }

    #[test]
    fn test_rank_is_ascending_and_stable() {
        let groups = vec![
            group(X, &[30], 1),
            group(Y, &[10], 10),
            group(X, &[20], 20),
            group(Y, &[20], 30),
            group(Address::repeat_byte(0x77), &[1], 40),
        ];
        let ranked = rank_by_notional(groups, |g| {
            if g.key.route.token_in == Address::repeat_byte(0x77) {
                None
            } else {
                Some(g.orders.iter().map(|o| u256_to_f64(o.quantity)).sum())
            }
        });
        let first_ids: Vec<u8> = ranked.iter().map(|g| g.orders[0].id[0]).collect();
        // 10, then the two 20s in input order, then 30, unvalued last
        assert_eq!(first_ids, vec![10, 20, 30, 1, 40]);
    }
}
