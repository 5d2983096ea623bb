//! Configuration
//!
//! Settings come from a TOML file. Secrets and endpoints may also be given
//! in `.env` or the environment (`PRIVATE_KEY`, `HTTP_ENDPOINT`,
//! `WS_ENDPOINT`), which override the file. `chain_name` selects a chain
//! preset supplying the chain id and wrapped native token; on chains with
//! a known deployment the router, swap router and USD token default to it.
//!
//! ```toml
//! chain_name = "goerli"
//! http_endpoint = "https://..."
//! ws_endpoint = "wss://..."
//! wallet_address = "0x..."
//! number_of_dexes = 2
//!
//! [tuning]
//! max_blocks_per_query = 500
//! ```
//!
//! Created: 2026-10-18

use crate::error::StartupError;
use alloy::primitives::{address, Address};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Uniswap V3 Quoter, deployed at the same address on every supported EVM chain.
const CANONICAL_QUOTER: Address = address!("b27308f9F90D607463bb33eA1BeBb41C27CE5AB6");

/// Contracts of a known protocol deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub limit_order_router: Address,
    pub creation_block: u64,
    pub swap_router: Address,
    pub usd_pegged_token: Address,
    pub usd_weth_pool_fee: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainPreset {
    pub name: &'static str,
    pub chain_id: u64,
    pub native_token: &'static str,
    pub weth: Address,
    pub weth_decimals: u8,
    pub quoter: Option<Address>,
    pub deployment: Option<Deployment>,
}

const GOERLI_DEPLOYMENT: Deployment = Deployment {
    limit_order_router: address!("30A16E3ECA716874E50EE4D035bCFDCE32b99796"),
    creation_block: 7_579_403,
    swap_router: address!("cFb3cFccb4Ea7c2a58c856d6c27d35e54B9A70d0"),
    usd_pegged_token: address!("2f3A40A3db8a7e3D09B0adfEfbCe4f6F81927557"),
    usd_weth_pool_fee: 300,
};

pub const CHAIN_PRESETS: [ChainPreset; 7] = [
    ChainPreset {
        name: "ethereum",
        chain_id: 1,
        native_token: "ETH",
        weth: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
        weth_decimals: 18,
        quoter: Some(CANONICAL_QUOTER),
        deployment: None,
    },
    ChainPreset {
        name: "polygon",
        chain_id: 137,
        native_token: "MATIC",
        weth: address!("0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270"),
        weth_decimals: 18,
        quoter: Some(CANONICAL_QUOTER),
        deployment: None,
    },
    ChainPreset {
        name: "optimism",
        chain_id: 10,
        native_token: "ETH",
        weth: address!("4200000000000000000000000000000000000006"),
        weth_decimals: 18,
        quoter: Some(CANONICAL_QUOTER),
        deployment: None,
    },
    ChainPreset {
        name: "arbitrum",
        chain_id: 42161,
        native_token: "ETH",
        weth: address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1"),
        weth_decimals: 18,
        quoter: Some(CANONICAL_QUOTER),
        deployment: None,
    },
    ChainPreset {
        name: "bsc",
        chain_id: 56,
        native_token: "BNB",
        weth: address!("bb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c"),
        weth_decimals: 18,
        quoter: None,
        deployment: None,
    },
    ChainPreset {
        name: "cronos",
        chain_id: 25,
        native_token: "CRO",
        weth: address!("5C7F8A570d578ED84E63fdFA7b1eE72dEae1AE23"),
        weth_decimals: 18,
        quoter: None,
        deployment: None,
    },
    ChainPreset {
        name: "goerli",
        chain_id: 5,
        native_token: "ETH",
        weth: address!("B4FBF271143F4FBf7B91A5ded31805e42b2208d6"),
        weth_decimals: 18,
        quoter: Some(CANONICAL_QUOTER),
        deployment: Some(GOERLI_DEPLOYMENT),
    },
];

pub fn chain_preset(name: &str) -> Option<ChainPreset> {
    let name = name.to_lowercase();
    CHAIN_PRESETS.iter().copied().find(|p| p.name == name)
}

/// Raw TOML file contents
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    pub chain_name: String,
    #[serde(default)]
    pub http_endpoint: String,
    #[serde(default)]
    pub ws_endpoint: String,
    pub wallet_address: Option<Address>,
    #[serde(default)]
    pub private_key: String,
    pub limit_order_router: Option<Address>,
    pub limit_order_router_creation_block: Option<u64>,
    pub swap_router: Option<Address>,
    pub number_of_dexes: u64,
    pub quoter: Option<Address>,
    pub usd_pegged_token: Option<Address>,
    pub usd_weth_pool_fee: Option<u32>,
    #[serde(default)]
    pub enable_taxed_tokens: bool,
    #[serde(default)]
    pub tuning: Tuning,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tuning {
    #[serde(default = "default_backfill_block_range")]
    pub backfill_block_range: u64,
    #[serde(default = "default_max_blocks_per_query")]
    pub max_blocks_per_query: u64,
    #[serde(default = "default_true")]
    pub validate_batches_on_chain: bool,
    #[serde(default = "default_true")]
    pub require_gas_credit: bool,
    #[serde(default = "default_dispatch_max_retries")]
    pub dispatch_max_retries: u32,
    #[serde(default = "default_dispatch_retry_delay_ms")]
    pub dispatch_retry_delay_ms: u64,
    #[serde(default = "default_tx_poll_interval_ms")]
    pub tx_poll_interval_ms: u64,
    #[serde(default = "default_tx_confirmation_timeout_secs")]
    pub tx_confirmation_timeout_secs: u64,
}

fn default_backfill_block_range() -> u64 { 100_000 }
fn default_max_blocks_per_query() -> u64 { 1_000 }
fn default_true() -> bool { true }
fn default_dispatch_max_retries() -> u32 { 3 }
fn default_dispatch_retry_delay_ms() -> u64 { 500 }
fn default_tx_poll_interval_ms() -> u64 { 1_000 }
fn default_tx_confirmation_timeout_secs() -> u64 { 120 }

impl Default for Tuning {
    fn default() -> Self {
        Self {
            backfill_block_range: default_backfill_block_range(),
            max_blocks_per_query: default_max_blocks_per_query(),
            validate_batches_on_chain: true,
            require_gas_credit: true,
            dispatch_max_retries: default_dispatch_max_retries(),
            dispatch_retry_delay_ms: default_dispatch_retry_delay_ms(),
            tx_poll_interval_ms: default_tx_poll_interval_ms(),
            tx_confirmation_timeout_secs: default_tx_confirmation_timeout_secs(),
        }
    }
}

impl Tuning {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.dispatch_retry_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.tx_poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.tx_confirmation_timeout_secs)
    }
}

/// Validated configuration with chain defaults applied
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub chain: ChainPreset,
    pub http_endpoint: String,
    pub ws_endpoint: String,
    pub wallet_address: Address,
    pub private_key: String,
    pub limit_order_router: Address,
    pub router_creation_block: u64,
    pub swap_router: Address,
    pub number_of_dexes: u64,
    pub quoter: Address,
    pub usd_pegged_token: Address,
    pub usd_weth_pool_fee: u32,
    pub enable_taxed_tokens: bool,
    pub tuning: Tuning,
}

impl BotConfig {
    /// Load `path`, apply `.env` / environment overrides and an optional chain override.
    pub fn load<P: AsRef<Path>>(path: P, chain_override: Option<&str>) -> Result<Self, StartupError> {
        dotenv::dotenv().ok();
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            StartupError::Config(format!("failed to read {}: {}", path.as_ref().display(), e))
        })?;
        let mut file = FileConfig::parse(&content)?;
        file.apply_overrides(|key| std::env::var(key).ok());
        if let Some(chain) = chain_override {
            file.chain_name = chain.to_string();
        }
        file.resolve()
    }
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self, StartupError> {
        toml::from_str(content).map_err(|e| StartupError::Config(format!("failed to parse TOML: {}", e)))
    }

    /// Overwrite secrets and endpoints with non-empty values from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |slot: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = value;
            }
        };
        set(&mut self.private_key, "PRIVATE_KEY");
        set(&mut self.http_endpoint, "HTTP_ENDPOINT");
        set(&mut self.ws_endpoint, "WS_ENDPOINT");
    }

    pub fn resolve(self) -> Result<BotConfig, StartupError> {
        let chain = chain_preset(&self.chain_name)
            .ok_or_else(|| StartupError::Config(format!("unrecognized chain_name {:?}", self.chain_name)))?;
        let deployment = chain.deployment;

        let missing = |field: &str| {
            StartupError::Config(format!("{} is required on {}", field, chain.name))
        };
        let non_empty = |value: String, field: &str| {
            if value.trim().is_empty() {
                Err(StartupError::Config(format!("{} must not be empty", field)))
            } else {
                Ok(value)
            }
        };

        let limit_order_router = self
            .limit_order_router
            .or(deployment.map(|d| d.limit_order_router))
            .ok_or_else(|| missing("limit_order_router"))?;
        let router_creation_block = self
            .limit_order_router_creation_block
            .or(deployment.map(|d| d.creation_block))
            .ok_or_else(|| missing("limit_order_router_creation_block"))?;
        let swap_router = self
            .swap_router
            .or(deployment.map(|d| d.swap_router))
            .ok_or_else(|| missing("swap_router"))?;
        let usd_pegged_token = self
            .usd_pegged_token
            .or(deployment.map(|d| d.usd_pegged_token))
            .ok_or_else(|| missing("usd_pegged_token"))?;
        let usd_weth_pool_fee = self
            .usd_weth_pool_fee
            .or(deployment.map(|d| d.usd_weth_pool_fee))
            .ok_or_else(|| missing("usd_weth_pool_fee"))?;
        let quoter = self.quoter.or(chain.quoter).ok_or_else(|| missing("quoter"))?;
        let wallet_address = self.wallet_address.ok_or_else(|| missing("wallet_address"))?;

        if self.number_of_dexes == 0 {
            return Err(StartupError::Config("number_of_dexes must be at least 1".to_string()));
        }
        if self.tuning.max_blocks_per_query == 0 || self.tuning.backfill_block_range == 0 {
            return Err(StartupError::Config("block ranges must be positive".to_string()));
        }

        Ok(BotConfig {
            chain,
            http_endpoint: non_empty(self.http_endpoint, "http_endpoint")?,
            ws_endpoint: non_empty(self.ws_endpoint, "ws_endpoint")?,
            wallet_address,
            private_key: non_empty(self.private_key, "private_key (PRIVATE_KEY)")?,
            limit_order_router,
            router_creation_block,
            swap_router,
            number_of_dexes: self.number_of_dexes,
            quoter,
            usd_pegged_token,
            usd_weth_pool_fee,
            enable_taxed_tokens: self.enable_taxed_tokens,
            tuning: self.tuning,
        })
    }
}
