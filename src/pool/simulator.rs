//! Local AMM Simulator
//!
//! Predicts swap outcomes without a network round trip.
//!
//! - Constant-product swaps use the whole-token formula
//!   `reserveOut - k / (reserveIn + amountIn)`. The ratio is unit-free, so it
//!   is evaluated exactly on raw units in 512-bit integers and floored to the
//!   smallest unit once, at the end. Any pair of 256-bit reserves works.
//! - Concentrated-liquidity swaps depend on the live tick distribution and
//!   are delegated to the on-chain quoter; only the reserve bookkeeping is
//!   done locally.
//! - No LP fee is modelled here. The on-chain validation call is the
//!   backstop for batches that look good locally.
//!
//! Created: 2026-10-18

use crate::error::SimulationError;
use crate::rpc::ChainClient;
use crate::types::{PoolState, VenueKind};
use alloy::primitives::{Address, U256, U512};

/// Denominator of the transfer tax multiplier.
pub const TAX_DENOMINATOR: u32 = 100_000;

/// Result of one simulated hop, all in raw units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutcome {
    pub amount_out: U256,
    pub new_reserve_in: U256,
    pub new_reserve_out: U256,
}

/// Lossy U256 -> f64, exact up to 2^53.
pub fn u256_to_f64(value: U256) -> f64 {
    value
        .as_limbs()
        .iter()
        .rev()
        .fold(0.0f64, |acc, limb| acc * 18_446_744_073_709_551_616.0 + *limb as f64)
}

fn pow10(exp: u8) -> Result<U256, SimulationError> {
    U256::from(10u64)
        .checked_pow(U256::from(exp))
        .ok_or(SimulationError::Overflow("pow10"))
}

/// Scale the lower-decimal reserve up so both share one fractional unit.
pub fn normalize_decimals(
    reserve_a: U256,
    decimals_a: u8,
    reserve_b: U256,
    decimals_b: u8,
) -> Result<(U256, U256), SimulationError> {
    if decimals_a > decimals_b {
        let scaled = reserve_b
            .checked_mul(pow10(decimals_a - decimals_b)?)
            .ok_or(SimulationError::Overflow("normalize_decimals"))?;
        Ok((reserve_a, scaled))
    } else if decimals_b > decimals_a {
        let scaled = reserve_a
            .checked_mul(pow10(decimals_b - decimals_a)?)
            .ok_or(SimulationError::Overflow("normalize_decimals"))?;
        Ok((scaled, reserve_b))
    } else {
        Ok((reserve_a, reserve_b))
    }
}

/// Price of the token in WETH terms (tokens per one WETH), 0.0 when a side is empty.
pub fn token_per_weth(
    token_reserves: U256,
    token_decimals: u8,
    weth_reserves: U256,
    weth_decimals: u8,
) -> f64 {
    if token_reserves.is_zero() || weth_reserves.is_zero() {
        return 0.0;
    }
    match normalize_decimals(token_reserves, token_decimals, weth_reserves, weth_decimals) {
        Ok((token, weth)) => u256_to_f64(token) / u256_to_f64(weth),
        Err(_) => {
            // Scaling overflowed U256; compare in floating point instead.
            let token = u256_to_f64(token_reserves) / 10f64.powi(token_decimals as i32);
            let weth = u256_to_f64(weth_reserves) / 10f64.powi(weth_decimals as i32);
            token / weth
        }
    }
}

/// Input leg of a taxed token: `amount * taxIn / 100000`, where `taxIn` is
/// the share of the transfer that reaches the pool.
pub fn apply_transfer_tax(amount: U256, tax_in: u32) -> Result<U256, SimulationError> {
    if tax_in > TAX_DENOMINATOR {
        return Err(SimulationError::InvalidTaxRate(tax_in));
    }
    let scaled = U512::from(amount) * U512::from(tax_in) / U512::from(TAX_DENOMINATOR);
    // tax_in <= denominator, so the result never exceeds `amount`
    U256::checked_from_limbs_slice(scaled.as_limbs())
        .ok_or(SimulationError::Overflow("apply_transfer_tax"))
}

/// x*y=k output: `reserveOut - k / (reserveIn + amountIn)`, which is
/// `reserveOut * amountIn / (reserveIn + amountIn)`, rounded down.
pub fn constant_product_amount_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
) -> Result<U256, SimulationError> {
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(SimulationError::ZeroReserves);
    }
    if amount_in.is_zero() {
        return Err(SimulationError::ZeroInput);
    }
    let numerator = U512::from(reserve_out) * U512::from(amount_in);
    let denominator = U512::from(reserve_in) + U512::from(amount_in);
    let amount_out = numerator / denominator;
    U256::checked_from_limbs_slice(amount_out.as_limbs())
        .ok_or(SimulationError::Overflow("constant product amount out"))
}

/// Simulate a constant-product swap of `amount_in` raw units of the input token.
pub fn simulate_constant_product_swap(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
) -> Result<SwapOutcome, SimulationError> {
    let amount_out = constant_product_amount_out(amount_in, reserve_in, reserve_out)?;
    Ok(SwapOutcome {
        amount_out,
        new_reserve_in: reserve_in
            .checked_add(amount_in)
            .ok_or(SimulationError::Overflow("reserve in"))?,
        new_reserve_out: reserve_out - amount_out,
    })
}

/// Virtual reserves of a concentrated-liquidity pool:
/// `reserve0 = L / sqrtP`, `reserve1 = L^2 / reserve0`, with `sqrtP = sqrtPriceX96 / 2^96`.
pub fn concentrated_liquidity_reserves(
    sqrt_price_x96: U256,
    liquidity: u128,
) -> Result<(U256, U256), SimulationError> {
    if sqrt_price_x96.is_zero() {
        return Err(SimulationError::ZeroReserves);
    }
    let liquidity = U256::from(liquidity);
    let reserve0: U256 = (liquidity << 96usize) / sqrt_price_x96;
    if reserve0.is_zero() {
        return Ok((U256::ZERO, U256::ZERO));
    }
    let reserve1 = match liquidity.checked_mul(liquidity) {
        Some(l_squared) => l_squared / reserve0,
        // L^2 above 2^256: same value through L * sqrtP
        None => liquidity
            .checked_mul(sqrt_price_x96)
            .map(|v| v >> 96usize)
            .ok_or(SimulationError::Overflow("concentrated liquidity reserves"))?,
    };
    Ok((reserve0, reserve1))
}

/// Quote a concentrated-liquidity swap on chain and book optimistic linear deltas.
#[allow(clippy::too_many_arguments)]
pub async fn simulate_concentrated_liquidity_swap<C: ChainClient + ?Sized>(
    client: &C,
    token_in: Address,
    token_out: Address,
    fee_tier: u32,
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
) -> Result<SwapOutcome, SimulationError> {
    if amount_in.is_zero() {
        return Err(SimulationError::ZeroInput);
    }
    let amount_out = client
        .quote_exact_input(token_in, token_out, fee_tier, amount_in)
        .await?;
    Ok(SwapOutcome {
        amount_out,
        new_reserve_in: reserve_in.saturating_add(amount_in),
        new_reserve_out: reserve_out.saturating_sub(amount_out),
    })
}

/// Simulate one hop through `pool`, token->WETH when `token_to_weth`, else WETH->token.
pub async fn simulate_pool_swap<C: ChainClient + ?Sized>(
    client: &C,
    pool: &PoolState,
    weth: Address,
    amount_in: U256,
    token_to_weth: bool,
) -> Result<SwapOutcome, SimulationError> {
    let token_side = pool.token_reserves;
    let weth_side = pool.weth_reserves;
    let (reserve_in, reserve_out, token_in, token_out) = if token_to_weth {
        (token_side, weth_side, pool.token, weth)
    } else {
        (weth_side, token_side, weth, pool.token)
    };

    match pool.kind {
        VenueKind::ConstantProduct => {
            simulate_constant_product_swap(amount_in, reserve_in, reserve_out)
        }
        VenueKind::ConcentratedLiquidity => {
            simulate_concentrated_liquidity_swap(
                client,
                token_in,
                token_out,
                pool.fee_tier,
                amount_in,
                reserve_in,
                reserve_out,
            )
            .await
        }
    }
}

/// Write a simulated hop back into a (cloned) pool.
pub fn commit_swap(pool: &mut PoolState, outcome: &SwapOutcome, token_to_weth: bool) {
    if token_to_weth {
        pool.set_reserves(outcome.new_reserve_in, outcome.new_reserve_out);
    } else {
        pool.set_reserves(outcome.new_reserve_out, outcome.new_reserve_in);
    }
}
