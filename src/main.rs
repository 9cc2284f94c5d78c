use anyhow::{Context, Result};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::signature::{read_keypair_file, Keypair};
use solana_sdk::signer::Signer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use raydium_trigger_bot::chain::{
    BundleSender, BundleTradeExecutor, EngineConfig, PriceFeed, StrategyEngine, SwapBuilder,
    WalletInspector, WSOL_MINT,
};
use raydium_trigger_bot::config::{Config, WalletConfig};
use raydium_trigger_bot::dex::PoolResolver;
use raydium_trigger_bot::error::BotError;
use raydium_trigger_bot::utils::RetryPolicy;

#[tokio::main]
async fn main() -> Result<()> {
    // ========================================================================
    // Step 1: Initialize tracing subscriber with EnvFilter
    // ========================================================================
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("Failed to create EnvFilter");

    let file_appender = tracing_appender::rolling::daily("./logs", "trigger-bot.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer()
            .with_target(false)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
        )
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    info!("🚀 Starting Raydium Trigger Bot...");
    info!("📅 Session start: {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));

    // ========================================================================
    // Step 2: Load configuration using Config::load()
    // ========================================================================
    let config = Config::load().context("Failed to load configuration")?;
    info!("✅ Configuration loaded successfully");
    debug!("Execution config: max_slippage={} bps, cu_limit={}, cu_price={}",
        config.execution.max_slippage_bps,
        config.execution.compute_unit_limit,
        config.execution.compute_unit_price);
    debug!("Relay config: {} endpoints, tip={} lamports",
        config.relay.endpoints.len(), config.relay.tip_lamports);

    // ========================================================================
    // Step 3: Initialize Keypair and derive wallet address
    // ========================================================================
    let payer = load_keypair(&config.wallet)?;
    let wallet_address = payer.pubkey();
    let payer = Arc::new(payer);
    info!("✅ Wallet loaded: {}", wallet_address);
    info!("   Keypair type: {}", if config.wallet.keypair_path.is_some() { "File" } else { "Environment" });

    // ========================================================================
    // Step 4: Initialize RpcClient and run the fee preflight
    // ========================================================================
    let rpc_client = Arc::new(RpcClient::new_with_timeout_and_commitment(
        config.rpc.url.clone(),
        config.rpc.timeout(),
        config.rpc.commitment(),
    ));
    info!("✅ RPC client initialized");
    info!("   RPC endpoint: {}", config.rpc.url);
    info!("   Commitment: {}", config.rpc.commitment_level);

    let wallet = WalletInspector::new(Arc::clone(&rpc_client));

    // A session that cannot even pay the tip and fees would burn every cycle
    // on doomed builds, so this one check is fatal. A transport failure here
    // is not: the RPC node may simply not be up yet.
    let fee_floor = config.relay.tip_lamports + config.execution.fee_headroom_lamports;
    match wallet.ensure_fee_balance(&wallet_address, fee_floor).await {
        Ok(balance) => {
            let balance_sol = balance as f64 / 1e9;
            info!("💰 Wallet balance: {:.4} SOL ({} lamports)", balance_sol, balance);

            if balance_sol < config.wallet.min_balance_sol {
                warn!("⚠️  Low wallet balance! Current: {:.4} SOL, Minimum: {:.2} SOL",
                    balance_sol, config.wallet.min_balance_sol);
                warn!("   Consider adding more SOL for tips and transaction fees");
            }
        }
        Err(BotError::InsufficientFunds { required, available }) => {
            error!("❌ Wallet cannot cover the relay tip plus fee headroom");
            error!("   Required: {} lamports, available: {} lamports", required, available);
            anyhow::bail!(
                "insufficient fee balance: {} lamports required, {} available",
                required,
                available
            );
        }
        Err(e) => {
            error!("❌ Failed to check wallet balance: {}", e);
            warn!("   Continuing anyway, but bundle submission may fail");
        }
    }

    // ========================================================================
    // Step 5: Initialize core components
    // ========================================================================
    let resolver = PoolResolver::with_retry(
        Arc::clone(&rpc_client),
        RetryPolicy::new(
            config.resolver.max_retries,
            Duration::from_millis(config.resolver.initial_backoff_ms),
        ),
    );
    info!("✅ Pool resolver initialized");
    info!("   Max retries: {}, initial backoff: {}ms",
        config.resolver.max_retries, config.resolver.initial_backoff_ms);

    let builder = SwapBuilder::new(Arc::clone(&rpc_client), &config.execution);
    info!("✅ Swap builder initialized");
    info!("   Max slippage: {} bps ({:.2}%)",
        config.execution.max_slippage_bps,
        config.execution.max_slippage_bps as f64 / 100.0);
    info!("   Compute units: limit {}, price {} micro-lamports",
        config.execution.compute_unit_limit, config.execution.compute_unit_price);

    let sender = BundleSender::new(Arc::clone(&rpc_client), &config.relay);
    info!("✅ Bundle sender initialized");

    let feed = PriceFeed::new(
        config.feed.endpoint.clone(),
        Duration::from_millis(config.feed.timeout_ms),
    );
    info!("✅ Price feed initialized");
    info!("   Endpoint: {}", config.feed.endpoint);

    // ========================================================================
    // Step 6: Build the watch list
    // ========================================================================
    let mut token_ids: Vec<String> = config
        .trading
        .watch_mints
        .iter()
        .map(|mint| mint.to_string())
        .collect();

    if token_ids.is_empty() {
        info!("📊 WATCH_MINTS not set, deriving watch list from wallet token accounts...");
        match wallet.token_holdings(&wallet_address).await {
            Ok(holdings) => {
                token_ids = holdings
                    .iter()
                    .filter(|h| h.amount > 0 && h.mint != WSOL_MINT)
                    .map(|h| h.mint.to_string())
                    .collect();
                info!("   Found {} token accounts with a balance", token_ids.len());
            }
            Err(e) => {
                warn!("   Failed to enumerate wallet token accounts: {}", e);
            }
        }
    }

    if token_ids.is_empty() {
        warn!("⚠️  No tokens to watch!");
        warn!("📝 Set WATCH_MINTS or fund the wallet with the tokens to manage");
        info!("💡 Example configuration:");
        info!("   WATCH_MINTS=MINT_ADDRESS_1,MINT_ADDRESS_2");
        info!("   TAKE_PROFIT_THRESHOLD_PCT=10");
        info!("   STOP_LOSS_THRESHOLD_PCT=5");

        // Keep the bot running in demo mode
        info!("🛑 Running in demo mode (no tokens watched)");
        tokio::signal::ctrl_c().await?;
        info!("👋 Shutting down...");
        return Ok(());
    }

    // ========================================================================
    // Step 7: Wire up the trade executor and strategy engine
    // ========================================================================
    let executor = Arc::new(BundleTradeExecutor::new(
        resolver,
        builder,
        sender,
        wallet,
        Arc::clone(&payer),
    ));
    info!("✅ Trade executor initialized");

    let engine = Arc::new(StrategyEngine::new(
        Arc::new(feed),
        executor,
        EngineConfig {
            poll_interval: config.trading.poll_interval(),
            strategies: config.strategy.strategy_set(),
            dip_buy: config.strategy.dip_strategy(),
            manual_mode: config.trading.manual_mode,
            token_ids: token_ids.clone(),
        },
    ));

    info!("🎯 Bot initialization complete!");
    info!("");
    info!("⚙️  Active Configuration Summary:");
    info!("   ├─ Take profit: {}% (sell {}%)",
        config.strategy.take_profit_threshold_pct, config.strategy.take_profit_sell_pct);
    info!("   ├─ Stop loss: {}% (sell {}%)",
        config.strategy.stop_loss_threshold_pct, config.strategy.stop_loss_sell_pct);
    info!("   ├─ Time exit: {} minutes (sell {}%)",
        config.strategy.time_exit_minutes, config.strategy.time_exit_sell_pct);
    info!("   ├─ Dip buy: {}% (spend {} lamports)",
        config.strategy.dip_buy_pct, config.strategy.dip_buy_spend_lamports);
    info!("   ├─ Manual mode: {}", config.trading.manual_mode);
    info!("   ├─ Poll interval: {}ms", config.trading.poll_interval_ms);
    info!("   ├─ Relay endpoints: {}", config.relay.endpoints.len());
    info!("   ├─ Tip: {} lamports", config.relay.tip_lamports);
    info!("   └─ Watching {} tokens", token_ids.len());
    info!("");

    // ========================================================================
    // Step 8: Run until Ctrl+C
    // ========================================================================
    engine
        .start()
        .await
        .context("Failed to start strategy engine")?;

    info!("🔄 Trigger loop running... Press Ctrl+C to stop");
    info!("");

    tokio::signal::ctrl_c().await?;
    info!("");
    engine.stop().await;
    info!("👋 Shutting down...");

    Ok(())
}

/// Load wallet keypair from file or environment variable
fn load_keypair(wallet_config: &WalletConfig) -> Result<Keypair> {
    if let Some(ref keypair_path) = wallet_config.keypair_path {
        info!("Loading keypair from file: {}", keypair_path);
        read_keypair_file(keypair_path)
            .map_err(|e| anyhow::anyhow!("Failed to read keypair file: {}", e))
    } else if let Some(ref private_key) = wallet_config.private_key {
        info!("Loading keypair from environment variable");
        let decoded = bs58::decode(private_key)
            .into_vec()
            .context("Failed to decode base58 private key")?;
        Keypair::from_bytes(&decoded).context("Failed to create keypair from bytes")
    } else {
        Err(anyhow::anyhow!(
            "No wallet configuration found. Set WALLET_KEYPAIR_PATH or WALLET_PRIVATE_KEY"
        ))
    }
}
