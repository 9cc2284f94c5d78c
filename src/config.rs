use anyhow::{bail, Context, Result};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;

use crate::chain::constants::DEFAULT_RELAY_ENDPOINTS;
use crate::chain::evaluator::{DipBuyStrategy, SellStrategy, StrategySet};

/// Main configuration struct containing all bot settings
#[derive(Debug, Clone)]
pub struct Config {
    pub rpc: RpcConfig,
    pub wallet: WalletConfig,
    pub feed: PriceFeedConfig,
    pub relay: RelayConfig,
    pub trading: TradingConfig,
    pub strategy: StrategyConfig,
    pub execution: ExecutionConfig,
    pub resolver: ResolverConfig,
}

/// RPC endpoint configuration
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    pub commitment_level: String,
    pub timeout_seconds: u64,
}

/// Wallet configuration
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub keypair_path: Option<String>,
    pub private_key: Option<String>,
    pub min_balance_sol: f64,
}

/// Price API configuration
#[derive(Debug, Clone)]
pub struct PriceFeedConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
}

/// Bundle relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub endpoints: Vec<String>,
    pub tip_lamports: u64,
    pub confirm_timeout_ms: u64,
}

/// Polling loop configuration
#[derive(Debug, Clone)]
pub struct TradingConfig {
    pub poll_interval_ms: u64,
    pub manual_mode: bool,
    /// Mints to watch. Empty means "derive from wallet token accounts".
    pub watch_mints: Vec<Pubkey>,
}

/// Exit / entry strategy thresholds. A strategy with a zero threshold or a
/// zero sell percentage is inactive.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub take_profit_threshold_pct: f64,
    pub take_profit_sell_pct: f64,
    pub stop_loss_threshold_pct: f64,
    pub stop_loss_sell_pct: f64,
    pub time_exit_minutes: f64,
    pub time_exit_sell_pct: f64,
    pub dip_buy_pct: f64,
    pub dip_buy_spend_lamports: u64,
}

/// Swap construction configuration
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub max_slippage_bps: u64,
    pub compute_unit_limit: u32,
    pub compute_unit_price: u64,
    /// Lamports kept aside for the tip, transaction fee and rent when
    /// checking whether a trade is affordable.
    pub fee_headroom_lamports: u64,
}

/// Bounded retry settings for on-chain account resolution
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file
        dotenvy::dotenv().ok();

        let rpc = RpcConfig {
            url: std::env::var("RPC_URL").context("RPC_URL not set")?,
            commitment_level: get_env_or_default("COMMITMENT_LEVEL", "confirmed"),
            timeout_seconds: get_u64_env("RPC_TIMEOUT_SECONDS", 30)?,
        };

        let wallet = WalletConfig {
            keypair_path: std::env::var("WALLET_KEYPAIR_PATH").ok(),
            private_key: std::env::var("WALLET_PRIVATE_KEY").ok(),
            min_balance_sol: get_f64_env("MIN_BALANCE_SOL", 0.1)?,
        };

        let feed = PriceFeedConfig {
            endpoint: get_env_or_default("PRICE_API_URL", "https://api.jup.ag/price/v2"),
            timeout_ms: get_u64_env("PRICE_API_TIMEOUT_MS", 5_000)?,
        };

        let relay_endpoints = parse_string_list(&get_env_or_default("RELAY_ENDPOINTS", ""));
        let relay = RelayConfig {
            endpoints: if relay_endpoints.is_empty() {
                DEFAULT_RELAY_ENDPOINTS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            } else {
                relay_endpoints
            },
            tip_lamports: get_u64_env("TIP_LAMPORTS", 1_000_000)?,
            confirm_timeout_ms: get_u64_env("CONFIRM_TIMEOUT_MS", 30_000)?,
        };

        let trading = TradingConfig {
            poll_interval_ms: get_u64_env("POLL_INTERVAL_MS", 500)?,
            manual_mode: get_bool_env("MANUAL_MODE", false),
            watch_mints: parse_pubkey_list(&get_env_or_default("WATCH_MINTS", ""))?,
        };

        let strategy = StrategyConfig {
            take_profit_threshold_pct: get_f64_env("TAKE_PROFIT_THRESHOLD_PCT", 0.0)?,
            take_profit_sell_pct: get_f64_env("TAKE_PROFIT_SELL_PCT", 100.0)?,
            stop_loss_threshold_pct: get_f64_env("STOP_LOSS_THRESHOLD_PCT", 0.0)?,
            stop_loss_sell_pct: get_f64_env("STOP_LOSS_SELL_PCT", 100.0)?,
            time_exit_minutes: get_f64_env("TIME_EXIT_MINUTES", 0.0)?,
            time_exit_sell_pct: get_f64_env("TIME_EXIT_SELL_PCT", 100.0)?,
            dip_buy_pct: get_f64_env("DIP_BUY_PCT", 0.0)?,
            dip_buy_spend_lamports: get_u64_env("DIP_BUY_SPEND_LAMPORTS", 0)?,
        };
        strategy.validate()?;

        let execution = ExecutionConfig {
            max_slippage_bps: get_u64_env("MAX_SLIPPAGE_BPS", 100)?,
            compute_unit_limit: get_u32_env("COMPUTE_UNIT_LIMIT", 200_000)?,
            compute_unit_price: get_u64_env("COMPUTE_UNIT_PRICE", 25_000)?,
            fee_headroom_lamports: get_u64_env("FEE_HEADROOM_LAMPORTS", 5_000_000)?,
        };
        if execution.max_slippage_bps >= 10_000 {
            bail!("MAX_SLIPPAGE_BPS must be below 10000");
        }

        let resolver = ResolverConfig {
            max_retries: get_u32_env("RESOLVER_MAX_RETRIES", 5)?,
            initial_backoff_ms: get_u64_env("RESOLVER_BACKOFF_MS", 200)?,
        };

        Ok(Config {
            rpc,
            wallet,
            feed,
            relay,
            trading,
            strategy,
            execution,
            resolver,
        })
    }
}

impl RpcConfig {
    /// Parsed commitment level, falling back to confirmed on bad input.
    pub fn commitment(&self) -> CommitmentConfig {
        CommitmentConfig::from_str(&self.commitment_level)
            .unwrap_or_else(|_| CommitmentConfig::confirmed())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl RelayConfig {
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }
}

impl TradingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl StrategyConfig {
    fn validate(&self) -> Result<()> {
        for (name, pct) in [
            ("TAKE_PROFIT_SELL_PCT", self.take_profit_sell_pct),
            ("STOP_LOSS_SELL_PCT", self.stop_loss_sell_pct),
            ("TIME_EXIT_SELL_PCT", self.time_exit_sell_pct),
        ] {
            if !(0.0..=100.0).contains(&pct) {
                bail!("{} must be within 0..=100, got {}", name, pct);
            }
        }
        for (name, threshold) in [
            ("TAKE_PROFIT_THRESHOLD_PCT", self.take_profit_threshold_pct),
            ("STOP_LOSS_THRESHOLD_PCT", self.stop_loss_threshold_pct),
            ("TIME_EXIT_MINUTES", self.time_exit_minutes),
            ("DIP_BUY_PCT", self.dip_buy_pct),
        ] {
            if threshold < 0.0 || !threshold.is_finite() {
                bail!("{} must be a non-negative number, got {}", name, threshold);
            }
        }
        Ok(())
    }

    /// Exit strategies in engine form (sell percentages become fractions)
    pub fn strategy_set(&self) -> StrategySet {
        StrategySet {
            take_profit: SellStrategy {
                threshold_percent: self.take_profit_threshold_pct,
                sell_fraction: self.take_profit_sell_pct / 100.0,
            },
            stop_loss: SellStrategy {
                threshold_percent: self.stop_loss_threshold_pct,
                sell_fraction: self.stop_loss_sell_pct / 100.0,
            },
            time_exit: SellStrategy {
                threshold_percent: self.time_exit_minutes,
                sell_fraction: self.time_exit_sell_pct / 100.0,
            },
        }
    }

    pub fn dip_strategy(&self) -> DipBuyStrategy {
        DipBuyStrategy {
            dip_percent: self.dip_buy_pct,
            spend_lamports: self.dip_buy_spend_lamports,
        }
    }
}

// ============================================================================
// Helper Functions for Environment Variable Parsing
// ============================================================================

/// Get environment variable or return default value
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get boolean environment variable with default
fn get_bool_env(key: &str, default: bool) -> bool {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default)
}

/// Get u32 environment variable with default
fn get_u32_env(key: &str, default: u32) -> Result<u32> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .context(format!("Failed to parse {} as u32", key))
}

/// Get u64 environment variable with default
fn get_u64_env(key: &str, default: u64) -> Result<u64> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .context(format!("Failed to parse {} as u64", key))
}

/// Get f64 environment variable with default
fn get_f64_env(key: &str, default: f64) -> Result<f64> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .context(format!("Failed to parse {} as f64", key))
}

/// Parse comma-separated string list
fn parse_string_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse comma-separated list of pubkeys
fn parse_pubkey_list(input: &str) -> Result<Vec<Pubkey>> {
    parse_string_list(input)
        .iter()
        .map(|s| Pubkey::from_str(s).context(format!("Failed to parse '{}' as Pubkey", s)))
        .collect()
}
