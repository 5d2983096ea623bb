//! Chain access boundary
//!
//! Every remote read the pipeline needs goes through [`ChainClient`], which
//! returns strongly typed values or an [`RpcError`]. Nothing downstream ever
//! inspects raw ABI output.
//!
//! [`AlloyChainClient`] is the production implementation over any alloy
//! `Provider`.
//!
//! Created: 2026-10-18

use crate::contracts::{
    fee_to_u24, ILimitOrderRouter, IQuoter, ISwapRouter, IUniswapV2Factory, IUniswapV2Pair,
    UniswapV3Factory, UniswapV3Pool, IERC20,
};
use crate::error::RpcError;
use crate::pool::simulator::concentrated_liquidity_reserves;
use crate::types::{Dex, LimitOrder, OrderId, Side, VenueKind};
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, B256, U160, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// 2^64, the scale of the router's 64.64 fixed-point prices.
const Q64: f64 = 18_446_744_073_709_551_616.0;

/// Block range and topic filter for one `eth_getLogs` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub from_block: u64,
    pub to_block: u64,
    /// Restrict to one emitter, or any address when `None`
    pub address: Option<Address>,
    /// Accepted first topics (event signatures)
    pub topics: Vec<B256>,
}

/// Typed remote reads and calls consumed by the pipeline.
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    async fn block_number(&self) -> Result<u64, RpcError>;

    async fn logs(&self, query: &LogQuery) -> Result<Vec<Log>, RpcError>;

    /// Full order record from the router's order accessor.
    async fn order_by_id(&self, id: OrderId) -> Result<LimitOrder, RpcError>;

    /// Venue registered at `index` on the swap router.
    async fn dex(&self, index: u64) -> Result<Dex, RpcError>;

    /// Pool for (token, weth) on `dex`, `None` when the venue has no such pool.
    async fn pool_address(
        &self,
        dex: &Dex,
        token: Address,
        weth: Address,
        fee_tier: u32,
    ) -> Result<Option<Address>, RpcError>;

    async fn pool_token0(&self, pool: Address) -> Result<Address, RpcError>;

    /// Raw (reserve0, reserve1). Concentrated-liquidity pools report virtual reserves.
    async fn pool_reserves(&self, pool: Address, kind: VenueKind) -> Result<(U256, U256), RpcError>;

    async fn token_decimals(&self, token: Address) -> Result<u8, RpcError>;

    /// Quoter estimate for an exact-input single-pool swap.
    async fn quote_exact_input(
        &self,
        token_in: Address,
        token_out: Address,
        fee_tier: u32,
        amount_in: U256,
    ) -> Result<U256, RpcError>;

    /// Dry-run `executeOrderGroups` from the bot's wallet. `Ok(false)` when it would revert.
    async fn simulate_execution(&self, groups: &[Vec<OrderId>]) -> Result<bool, RpcError>;
}

/// Router addresses the client needs for its calls
#[derive(Debug, Clone, Copy)]
pub struct ContractAddresses {
    pub limit_order_router: Address,
    pub swap_router: Address,
    pub quoter: Address,
    pub wallet: Address,
}

/// [`ChainClient`] backed by an alloy provider
pub struct AlloyChainClient<P> {
    provider: Arc<P>,
    addresses: ContractAddresses,
}

impl<P: Provider + 'static> AlloyChainClient<P> {
    pub fn new(provider: Arc<P>, addresses: ContractAddresses) -> Self {
        Self {
            provider,
            addresses,
        }
    }
}

/// Convert the router's order struct into the in-memory record.
pub fn decode_order(raw: ILimitOrderRouter::LimitOrder) -> LimitOrder {
    LimitOrder {
        id: raw.orderId,
        owner: raw.owner,
        side: if raw.buy { Side::Buy } else { Side::Sell },
        taxed: raw.taxed,
        tax_in: u32::from(raw.taxIn),
        last_refresh: u64::from(raw.lastRefreshTimestamp),
        expiration: u64::from(raw.expirationTimestamp),
        price: raw.price as f64 / Q64,
        amount_out_min: U256::from(raw.amountOutMin),
        quantity: U256::from(raw.quantity),
        token_in: raw.tokenIn,
        token_out: raw.tokenOut,
        fee_in: raw.feeIn,
        fee_out: raw.feeOut,
    }
}

#[async_trait]
impl<P: Provider + 'static> ChainClient for AlloyChainClient<P> {
    async fn block_number(&self) -> Result<u64, RpcError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| RpcError::transport("eth_blockNumber", e))
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<Log>, RpcError> {
        let mut filter = Filter::new()
            .from_block(query.from_block)
            .to_block(query.to_block)
            .event_signature(query.topics.clone());
        if let Some(address) = query.address {
            filter = filter.address(address);
        }
        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| RpcError::transport("eth_getLogs", e))?;
        debug!(
            "Fetched {} logs for blocks {}-{}",
            logs.len(),
            query.from_block,
            query.to_block
        );
        Ok(logs)
    }

    async fn order_by_id(&self, id: OrderId) -> Result<LimitOrder, RpcError> {
        let router = self.addresses.limit_order_router;
        let contract = ILimitOrderRouter::new(router, Arc::clone(&self.provider));
        let raw = contract
            .getOrderById(id)
            .call()
            .await
            .map_err(|e| RpcError::call("getOrderById", router, e))?;
        // A missing order comes back as a zeroed struct
        if raw.orderId.is_zero() && raw.owner.is_zero() {
            return Err(RpcError::OrderNotFound(id));
        }
        Ok(decode_order(raw))
    }

    async fn dex(&self, index: u64) -> Result<Dex, RpcError> {
        let swap_router = self.addresses.swap_router;
        let contract = ISwapRouter::new(swap_router, Arc::clone(&self.provider));
        let entry = contract
            .dexes(U256::from(index))
            .call()
            .await
            .map_err(|e| RpcError::call("dexes", swap_router, e))?;
        Ok(Dex {
            factory: entry.factoryAddress,
            kind: if entry.isUniV2 {
                VenueKind::ConstantProduct
            } else {
                VenueKind::ConcentratedLiquidity
            },
        })
    }

    async fn pool_address(
        &self,
        dex: &Dex,
        token: Address,
        weth: Address,
        fee_tier: u32,
    ) -> Result<Option<Address>, RpcError> {
        let pool = match dex.kind {
            VenueKind::ConstantProduct => {
                let factory = IUniswapV2Factory::new(dex.factory, Arc::clone(&self.provider));
                factory
                    .getPair(token, weth)
                    .call()
                    .await
                    .map_err(|e| RpcError::call("getPair", dex.factory, e))?
            }
            VenueKind::ConcentratedLiquidity => {
                let factory = UniswapV3Factory::new(dex.factory, Arc::clone(&self.provider));
                factory
                    .getPool(token, weth, fee_to_u24(fee_tier))
                    .call()
                    .await
                    .map_err(|e| RpcError::call("getPool", dex.factory, e))?
            }
        };
        Ok((!pool.is_zero()).then_some(pool))
    }

    async fn pool_token0(&self, pool: Address) -> Result<Address, RpcError> {
        // token0() has the same selector on V2 pairs and V3 pools
        IUniswapV2Pair::new(pool, Arc::clone(&self.provider))
            .token0()
            .call()
            .await
            .map_err(|e| RpcError::call("token0", pool, e))
    }

    async fn pool_reserves(&self, pool: Address, kind: VenueKind) -> Result<(U256, U256), RpcError> {
        match kind {
            VenueKind::ConstantProduct => {
                let reserves = IUniswapV2Pair::new(pool, Arc::clone(&self.provider))
                    .getReserves()
                    .call()
                    .await
                    .map_err(|e| RpcError::call("getReserves", pool, e))?;
                Ok((U256::from(reserves.reserve0), U256::from(reserves.reserve1)))
            }
            VenueKind::ConcentratedLiquidity => {
                let contract = UniswapV3Pool::new(pool, Arc::clone(&self.provider));
                let slot0_call = contract.slot0();
                let liquidity_call = contract.liquidity();
                let (slot0, liquidity) = tokio::join!(slot0_call.call(), liquidity_call.call());
                let slot0 = slot0.map_err(|e| RpcError::call("slot0", pool, e))?;
                let liquidity = liquidity.map_err(|e| RpcError::call("liquidity", pool, e))?;
                let sqrt_price_x96 = U256::from(slot0.sqrtPriceX96);
                if sqrt_price_x96.is_zero() {
                    // Uninitialised pool
                    return Ok((U256::ZERO, U256::ZERO));
                }
                concentrated_liquidity_reserves(sqrt_price_x96, liquidity)
                    .map_err(|e| RpcError::call("slot0", pool, e))
            }
        }
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, RpcError> {
        IERC20::new(token, Arc::clone(&self.provider))
            .decimals()
            .call()
            .await
            .map_err(|e| RpcError::call("decimals", token, e))
    }

    async fn quote_exact_input(
        &self,
        token_in: Address,
        token_out: Address,
        fee_tier: u32,
        amount_in: U256,
    ) -> Result<U256, RpcError> {
        let quoter = self.addresses.quoter;
        IQuoter::new(quoter, Arc::clone(&self.provider))
            .quoteExactInputSingle(token_in, token_out, fee_to_u24(fee_tier), amount_in, U160::ZERO)
            .call()
            .await
            .map_err(|e| RpcError::call("quoteExactInputSingle", quoter, e))
    }

    async fn simulate_execution(&self, groups: &[Vec<OrderId>]) -> Result<bool, RpcError> {
        let router = self.addresses.limit_order_router;
        let calldata = ILimitOrderRouter::executeOrderGroupsCall {
            orderGroups: groups.to_vec(),
        }
        .abi_encode();
        let tx = TransactionRequest::default()
            .with_from(self.addresses.wallet)
            .with_to(router)
            .with_input(calldata);
        match self.provider.call(tx).await {
            Ok(_) => Ok(true),
            Err(e) => {
                let message = e.to_string();
                // Reverts are a verdict, anything else is transport trouble
                if message.contains("revert") {
                    debug!("executeOrderGroups dry run reverted: {}", message);
                    Ok(false)
                } else {
                    Err(RpcError::call("executeOrderGroups", router, message))
                }
            }
        }
    }
}
