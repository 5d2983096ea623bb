//! In-memory chain and sender used by unit tests.

use crate::error::{ExecutionError, RpcError};
use crate::execution::signer::TransactionSender;
use crate::rpc::{ChainClient, LogQuery};
use crate::types::{Dex, LimitOrder, OrderId, Side, VenueKind};
use alloy::primitives::{Address, Bytes, LogData, TxHash, B256, U256};
use alloy::rpc::types::Log;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn order(id: u8, side: Side, token_in: Address, token_out: Address, quantity: u64) -> LimitOrder {
    LimitOrder {
        id: B256::repeat_byte(id),
        owner: Address::repeat_byte(0xD0),
        side,
        taxed: false,
        tax_in: 0,
        last_refresh: 0,
        expiration: 0,
        price: 1.0,
        amount_out_min: U256::ZERO,
        quantity: U256::from(quantity),
        token_in,
        token_out,
        fee_in: 3000,
        fee_out: 3000,
    }
}

pub fn log_at(address: Address, data: LogData, block: u64, index: u64) -> Log {
    Log {
        inner: alloy::primitives::Log { address, data },
        block_number: Some(block),
        log_index: Some(index),
        ..Default::default()
    }
}

/// Scriptable [`ChainClient`]
#[derive(Default)]
pub struct MockChain {
    pub head: AtomicU64,
    pub logs: Mutex<Vec<Log>>,
    pub fail_logs: AtomicBool,
    pub orders: DashMap<OrderId, LimitOrder>,
    pub order_fetches: DashMap<OrderId, usize>,
    pub dexes: Mutex<Vec<Dex>>,
    /// (factory, token, fee tier) -> pool
    pub pools: DashMap<(Address, Address, u32), Address>,
    pub token0: DashMap<Address, Address>,
    pub reserves: DashMap<Address, (U256, U256)>,
    pub decimals: DashMap<Address, u8>,
    pub quotes: DashMap<(Address, Address, u32), U256>,
    pub reject_execution: AtomicBool,
    pub execution_checks: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_quote(&self, token_in: Address, token_out: Address, fee: u32, amount_out: U256) {
        self.quotes.insert((token_in, token_out, fee), amount_out);
    }

    pub fn add_dex(&self, factory: Address, kind: VenueKind) -> Dex {
        let dex = Dex { factory, kind };
        self.dexes.lock().unwrap().push(dex);
        dex
    }

    /// Register a pool so discovery can find it.
    #[allow(clippy::too_many_arguments)]
    pub fn add_pool(
        &self,
        dex: &Dex,
        pool: Address,
        token: Address,
        weth: Address,
        fee: u32,
        reserve0: U256,
        reserve1: U256,
    ) {
        let fee_key = match dex.kind {
            VenueKind::ConstantProduct => 0,
            VenueKind::ConcentratedLiquidity => fee,
        };
        self.pools.insert((dex.factory, token, fee_key), pool);
        self.token0.insert(pool, token.min(weth));
        self.reserves.insert(pool, (reserve0, reserve1));
    }

    pub fn push_log(&self, log: Log) {
        self.logs.lock().unwrap().push(log);
    }

    pub fn fetches_of(&self, id: OrderId) -> usize {
        self.order_fetches.get(&id).map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn block_number(&self) -> Result<u64, RpcError> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<Log>, RpcError> {
        if self.fail_logs.load(Ordering::SeqCst) {
            return Err(RpcError::transport("eth_getLogs", "connection reset"));
        }
        let logs = self.logs.lock().unwrap();
        Ok(logs
            .iter()
            .filter(|log| {
                let block = log.block_number.unwrap_or_default();
                block >= query.from_block
                    && block <= query.to_block
                    && query.address.map_or(true, |a| a == log.address())
                    && log
                        .topics()
                        .first()
                        .map_or(false, |t| query.topics.contains(t))
            })
            .cloned()
            .collect())
    }

    async fn order_by_id(&self, id: OrderId) -> Result<LimitOrder, RpcError> {
        *self.order_fetches.entry(id).or_insert(0) += 1;
        self.orders
            .get(&id)
            .map(|o| o.clone())
            .ok_or(RpcError::OrderNotFound(id))
    }

    async fn dex(&self, index: u64) -> Result<Dex, RpcError> {
        self.dexes
            .lock()
            .unwrap()
            .get(index as usize)
            .copied()
            .ok_or_else(|| RpcError::call("dexes", Address::ZERO, "index out of range"))
    }

    async fn pool_address(
        &self,
        dex: &Dex,
        token: Address,
        _weth: Address,
        fee_tier: u32,
    ) -> Result<Option<Address>, RpcError> {
        let fee_key = match dex.kind {
            VenueKind::ConstantProduct => 0,
            VenueKind::ConcentratedLiquidity => fee_tier,
        };
        Ok(self.pools.get(&(dex.factory, token, fee_key)).map(|p| *p))
    }

    async fn pool_token0(&self, pool: Address) -> Result<Address, RpcError> {
        self.token0
            .get(&pool)
            .map(|t| *t)
            .ok_or_else(|| RpcError::call("token0", pool, "unknown pool"))
    }

    async fn pool_reserves(&self, pool: Address, _kind: VenueKind) -> Result<(U256, U256), RpcError> {
        self.reserves
            .get(&pool)
            .map(|r| *r)
            .ok_or_else(|| RpcError::call("getReserves", pool, "unknown pool"))
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, RpcError> {
        Ok(self.decimals.get(&token).map(|d| *d).unwrap_or(18))
    }

    async fn quote_exact_input(
        &self,
        token_in: Address,
        token_out: Address,
        fee_tier: u32,
        _amount_in: U256,
    ) -> Result<U256, RpcError> {
        self.quotes
            .get(&(token_in, token_out, fee_tier))
            .map(|q| *q)
            .ok_or_else(|| RpcError::call("quoteExactInputSingle", Address::ZERO, "no quote"))
    }

    async fn simulate_execution(&self, _groups: &[Vec<OrderId>]) -> Result<bool, RpcError> {
        self.execution_checks.fetch_add(1, Ordering::SeqCst);
        Ok(!self.reject_execution.load(Ordering::SeqCst))
    }
}

/// Scriptable [`TransactionSender`]
#[derive(Default)]
pub struct MockSender {
    /// Number of leading send attempts that fail
    pub failures_before_success: AtomicUsize,
    pub send_attempts: AtomicUsize,
    pub sent: Mutex<Vec<(Address, Bytes)>>,
    pub revert_on_chain: AtomicBool,
}

impl MockSender {
    pub fn failing(times: usize) -> Self {
        let sender = Self::default();
        sender.failures_before_success.store(times, Ordering::SeqCst);
        sender
    }
}

#[async_trait]
impl TransactionSender for MockSender {
    async fn send(&self, to: Address, data: Bytes) -> Result<TxHash, ExecutionError> {
        let attempt = self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures_before_success.load(Ordering::SeqCst) {
            return Err(ExecutionError::Submission("nonce too low".to_string()));
        }
        self.sent.lock().unwrap().push((to, data));
        Ok(TxHash::repeat_byte(0x77))
    }

    async fn wait_for_transaction(
        &self,
        _hash: TxHash,
        _poll_interval: Duration,
        _timeout: Duration,
    ) -> Result<bool, ExecutionError> {
        Ok(!self.revert_on_chain.load(Ordering::SeqCst))
    }
}
