//! Nonce-managed transaction signer
//!
//! Signs and submits router calls from the bot wallet. The next nonce is
//! cached behind an async mutex and advanced before submission; a failed
//! submission clears the cache so the next send re-reads the pending count
//! from the node.
//!
//! Created: 2026-10-18

use crate::error::{ExecutionError, RpcError};
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Resubmissions allowed when the node reports the gas price as too low.
const MAX_GAS_BUMPS: u32 = 3;

/// Gas limit and underpriced bumps are scaled by 150%.
const GAS_BUFFER_PERCENT: u128 = 150;

/// Signing and submission as seen by the dispatcher.
#[async_trait]
pub trait TransactionSender: Send + Sync + 'static {
    /// Sign and submit a call to `to`. Returns the transaction hash.
    async fn send(&self, to: Address, data: Bytes) -> Result<TxHash, ExecutionError>;

    /// Poll for the receipt every `poll_interval` until `timeout`.
    /// `Ok(true)` for a successful receipt, `Ok(false)` for a revert.
    async fn wait_for_transaction(
        &self,
        hash: TxHash,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<bool, ExecutionError>;
}

pub struct NonceManagedSigner<P> {
    provider: Arc<P>,
    wallet: EthereumWallet,
    address: Address,
    chain_id: u64,
    nonce: Mutex<Option<u64>>,
}

impl<P: Provider + 'static> NonceManagedSigner<P> {
    pub fn new(provider: Arc<P>, signer: PrivateKeySigner, chain_id: u64) -> Self {
        let address = signer.address();
        Self {
            provider,
            wallet: EthereumWallet::from(signer),
            address,
            chain_id,
            nonce: Mutex::new(None),
        }
    }

    async fn pending_nonce(&self) -> Result<u64, ExecutionError> {
        let nonce = self
            .provider
            .get_transaction_count(self.address)
            .pending()
            .await
            .map_err(|e| RpcError::transport("eth_getTransactionCount", e))?;
        debug!("Nonce synced from node: {}", nonce);
        Ok(nonce)
    }

    /// Sign and broadcast, bumping the gas price while the node rejects it as underpriced.
    async fn submit(&self, mut tx: TransactionRequest, mut gas_price: u128) -> Result<TxHash, ExecutionError> {
        let mut bumps = 0;
        loop {
            let envelope = tx
                .clone()
                .build(&self.wallet)
                .await
                .map_err(|e| ExecutionError::Signing(e.to_string()))?;
            match self.provider.send_tx_envelope(envelope).await {
                Ok(pending) => return Ok(*pending.tx_hash()),
                Err(e) if is_underpriced(&e.to_string()) && bumps < MAX_GAS_BUMPS => {
                    bumps += 1;
                    gas_price = bump_gas_price(gas_price);
                    debug!("Transaction underpriced, bump {} to {} wei", bumps, gas_price);
                    tx.set_gas_price(gas_price);
                }
                Err(e) => return Err(ExecutionError::Submission(e.to_string())),
            }
        }
    }
}

#[async_trait]
impl<P: Provider + 'static> TransactionSender for NonceManagedSigner<P> {
    async fn send(&self, to: Address, data: Bytes) -> Result<TxHash, ExecutionError> {
        let mut slot = self.nonce.lock().await;
        let nonce = match *slot {
            Some(nonce) => nonce,
            None => self.pending_nonce().await?,
        };

        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| RpcError::transport("eth_gasPrice", e))?;
        let mut tx = TransactionRequest::default()
            .with_from(self.address)
            .with_to(to)
            .with_input(data)
            .with_nonce(nonce)
            .with_chain_id(self.chain_id)
            .with_gas_price(gas_price);
        let gas = self
            .provider
            .estimate_gas(tx.clone())
            .await
            .map_err(|e| ExecutionError::GasEstimation(e.to_string()))?;
        tx.set_gas_limit(buffered_gas_limit(gas));

        *slot = Some(nonce + 1);
        match self.submit(tx, gas_price).await {
            Ok(hash) => {
                info!("Submitted {} with nonce {}", hash, nonce);
                Ok(hash)
            }
            Err(e) => {
                *slot = None;
                Err(e)
            }
        }
    }

    async fn wait_for_transaction(
        &self,
        hash: TxHash,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<bool, ExecutionError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.provider.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => return Ok(receipt.status()),
                Ok(None) => {}
                Err(e) => warn!("Receipt poll for {} failed: {}", hash, e),
            }
            if Instant::now() + poll_interval > deadline {
                return Err(ExecutionError::Timeout(hash));
            }
            sleep(poll_interval).await;
        }
    }
}

fn is_underpriced(message: &str) -> bool {
    message.contains("underpriced")
}

fn bump_gas_price(gas_price: u128) -> u128 {
    gas_price.saturating_mul(GAS_BUFFER_PERCENT) / 100
}

fn buffered_gas_limit(estimate: u64) -> u64 {
    estimate.saturating_mul(GAS_BUFFER_PERCENT as u64) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_underpriced_detection() {
        assert!(is_underpriced("replacement transaction underpriced"));
        assert!(is_underpriced("transaction underpriced"));
        assert!(!is_underpriced("insufficient funds for gas * price + value"));
    }

    #[test]
    fn test_gas_scaling() {
        assert_eq!(bump_gas_price(30_000_000_000), 45_000_000_000);
        assert_eq!(buffered_gas_limit(200_000), 300_000);
        assert_eq!(bump_gas_price(u128::MAX), u128::MAX / 100);
    }
}
