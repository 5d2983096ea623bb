//! Limit Order Execution Bot
//!
//! Main entry point. Startup sequence:
//! 1. load config (TOML + .env), init logging
//! 2. connect HTTP provider, verify the node is reachable
//! 3. read the venue registry from the swap router
//! 4. backfill orders and gas credits from the router's creation block
//! 5. resolve the USD/WETH reference pool (most liquid venue)
//! 6. run the whole book through the batching engine once
//! 7. subscribe to new headers over WebSocket and run the synchronizer
//!    until the subscription ends or SIGINT/SIGTERM arrives
//!
//! Failures in steps 1-5 are fatal.
//!
//! Created: 2026-10-18

use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use limit_order_bot::batching::{BatchEngine, EngineSettings};
use limit_order_bot::config::BotConfig;
use limit_order_bot::error::StartupError;
use limit_order_bot::execution::{DispatchSettings, ExecutionDispatcher, NonceManagedSigner};
use limit_order_bot::orders::{GasCreditLedger, OrderBook, PendingExecution};
use limit_order_bot::pool::{MarketCache, PoolDiscovery, ReferencePool};
use limit_order_bot::rpc::{AlloyChainClient, ChainClient, ContractAddresses};
use limit_order_bot::sync::{backfill, BackfillRange, Stores, SyncSettings, Synchronizer};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Limit-order execution bot
#[derive(Parser)]
#[command(name = "limit-order-bot")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Override `chain_name` from the config file
    #[arg(long, env = "CHAIN")]
    chain: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs);

    let config = BotConfig::load(&args.config, args.chain.as_deref())
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    info!(
        "Limit Order Bot starting on {} (chain id {}, native {})",
        config.chain.name, config.chain.chain_id, config.chain.native_token
    );
    info!("Router: {:?} | Swap router: {:?}", config.limit_order_router, config.swap_router);
    info!("Taxed tokens: {}", if config.enable_taxed_tokens { "enabled" } else { "disabled" });

    let signer: PrivateKeySigner = config.private_key.parse().context("Invalid PRIVATE_KEY")?;
    if signer.address() != config.wallet_address {
        anyhow::bail!(
            "PRIVATE_KEY controls {:?}, config wallet_address is {:?}",
            signer.address(),
            config.wallet_address
        );
    }

    // Provider 1: HTTP for calls, log queries and submission
    let http = Arc::new(
        ProviderBuilder::new().connect_http(config.http_endpoint.parse().context("Invalid http_endpoint")?),
    );
    let client = Arc::new(AlloyChainClient::new(
        Arc::clone(&http),
        ContractAddresses {
            limit_order_router: config.limit_order_router,
            swap_router: config.swap_router,
            quoter: config.quoter,
            wallet: config.wallet_address,
        },
    ));
    let head = client
        .block_number()
        .await
        .map_err(StartupError::NodeUnreachable)?;
    info!("Connected! Current block: {}", head);

    let dexes = PoolDiscovery::load_dexes(&*client, config.number_of_dexes)
        .await
        .map_err(StartupError::from)?;
    info!("{} venues registered on swap router", dexes.len());
    let discovery = Arc::new(PoolDiscovery::new(
        Arc::clone(&client),
        dexes,
        config.chain.weth,
        config.chain.weth_decimals,
    ));

    let stores = Stores {
        book: OrderBook::new(config.chain.weth),
        markets: MarketCache::new(config.chain.weth),
        reference: ReferencePool::new(),
        ledger: GasCreditLedger::new(),
    };
    let pending = PendingExecution::new();

    info!("Backfilling router history from block {}...", config.router_creation_block);
    let cursor = backfill(
        &*client,
        &discovery,
        &stores,
        BackfillRange {
            router: config.limit_order_router,
            from_block: config.router_creation_block,
            to_block: head,
            chunk_size: config.tuning.backfill_block_range,
            enable_taxed_tokens: config.enable_taxed_tokens,
        },
    )
    .await?;

    let reference_pool = discovery
        .most_liquid(config.usd_pegged_token, config.usd_weth_pool_fee)
        .await
        .map_err(StartupError::from)?
        .ok_or(StartupError::ReferencePoolMissing {
            usd_token: config.usd_pegged_token,
        })?;
    info!(
        "USD/WETH reference pool {:?} ({}): {:.4} USD per WETH",
        reference_pool.address, reference_pool.kind, reference_pool.token_per_weth
    );
    stores.reference.set(reference_pool);

    let engine = Arc::new(BatchEngine::new(
        Arc::clone(&client),
        stores.book.clone(),
        stores.markets.clone(),
        stores.reference.clone(),
        pending.clone(),
        EngineSettings {
            weth_decimals: config.chain.weth_decimals,
            validate_on_chain: config.tuning.validate_batches_on_chain,
        },
    ));
    let sender = Arc::new(NonceManagedSigner::new(Arc::clone(&http), signer, config.chain.chain_id));
    let dispatcher = Arc::new(ExecutionDispatcher::new(
        sender,
        stores.book.clone(),
        stores.ledger.clone(),
        pending.clone(),
        DispatchSettings {
            router: config.limit_order_router,
            require_gas_credit: config.tuning.require_gas_credit,
            max_retries: config.tuning.dispatch_max_retries,
            retry_delay: config.tuning.retry_delay(),
            poll_interval: config.tuning.poll_interval(),
            confirmation_timeout: config.tuning.confirmation_timeout(),
        },
    ));

    // Startup pass over the whole book
    let initial = engine.build_batches(&stores.book.ids()).await;
    if !initial.is_empty() {
        match dispatcher.dispatch(initial).await {
            Ok(Some(submitted)) => info!("Startup batches submitted in {}", submitted.hash),
            Ok(None) => info!("Startup batches had no eligible orders"),
            Err(e) => error!("Startup dispatch failed: {}", e),
        }
    }

    let synchronizer = Synchronizer::new(
        Arc::clone(&client),
        SyncSettings {
            router: config.limit_order_router,
            enable_taxed_tokens: config.enable_taxed_tokens,
            max_blocks_per_query: config.tuning.max_blocks_per_query,
        },
        stores.clone(),
        Arc::clone(&discovery),
        engine,
    )
    .with_cursor(cursor);

    // Provider 2: block subscription only
    info!("Subscribing to new blocks via WebSocket...");
    let ws = ProviderBuilder::new()
        .connect_ws(WsConnect::new(&config.ws_endpoint))
        .await
        .context("WebSocket connection failed")?;
    let subscription = ws.subscribe_blocks().await.context("newHeads subscription failed")?;
    let headers = Box::pin(subscription.into_stream().map(|header| header.number));
    info!("Header subscription active, resuming after block {}", cursor);

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let signals_handle = signals.handle();

    tokio::select! {
        _ = synchronizer.run(headers, dispatcher) => {
            warn!("Header subscription closed, exiting");
        }
        Some(signal) = signals.next() => {
            info!("Received signal {}, shutting down", signal);
        }
    }

    signals_handle.close();
    let (tokens, pools) = stores.markets.stats();
    info!(
        "Stopped with {} active orders, {} pending, {} tokens / {} pools tracked",
        stores.book.len(),
        pending.len(),
        tokens,
        pools
    );
    Ok(())
}
