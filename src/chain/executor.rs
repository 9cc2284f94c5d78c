// Per-token trade execution: pool lookup, swap build, bundle submission.
//
// One call handles one token end to end. Every failure is logged and
// reported as `false` so a single token can never take the polling loop
// down with it.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chain::bundle_sender::BundleSender;
use crate::chain::constants::WSOL_MINT;
use crate::chain::evaluator::StrategyKind;
use crate::chain::swap_builder::{SwapBuilder, TradeDirection};
use crate::chain::wallet::WalletInspector;
use crate::dex::{PoolKeys, PoolResolver};
use crate::error::BotResult;

/// Executes one trade for one token. The engine drives this concurrently
/// across tokens, so implementations must be shareable.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    /// Sell `sell_fraction` of the wallet's position in `token_id`.
    /// Returns whether the bundle confirmed on-chain.
    async fn execute_sell(
        &self,
        token_id: &str,
        sell_fraction: f64,
        strategy: StrategyKind,
        sequence: u64,
    ) -> bool;

    /// Spend `spend_lamports` of native SOL buying `token_id`.
    async fn execute_buy(&self, token_id: &str, spend_lamports: u64, sequence: u64) -> bool;
}

pub struct BundleTradeExecutor {
    resolver: PoolResolver,
    builder: SwapBuilder,
    sender: BundleSender,
    wallet: WalletInspector,
    payer: Arc<Keypair>,
}

impl BundleTradeExecutor {
    pub fn new(
        resolver: PoolResolver,
        builder: SwapBuilder,
        sender: BundleSender,
        wallet: WalletInspector,
        payer: Arc<Keypair>,
    ) -> Self {
        Self {
            resolver,
            builder,
            sender,
            wallet,
            payer,
        }
    }

    /// Find the token's WSOL pool. The market scan filters are offset
    /// sensitive, so both mint orderings are tried.
    async fn resolve_pool(&self, mint: &Pubkey) -> BotResult<Option<PoolKeys>> {
        if let Some(keys) = self.resolver.resolve_by_mints(mint, &WSOL_MINT).await? {
            return Ok(Some(keys));
        }
        self.resolver.resolve_by_mints(&WSOL_MINT, mint).await
    }
}

#[async_trait]
impl TradeExecutor for BundleTradeExecutor {
    async fn execute_sell(
        &self,
        token_id: &str,
        sell_fraction: f64,
        strategy: StrategyKind,
        sequence: u64,
    ) -> bool {
        let mint = match Pubkey::from_str(token_id) {
            Ok(mint) => mint,
            Err(e) => {
                warn!("Sell skipped: {} is not a valid mint: {}", token_id, e);
                return false;
            }
        };

        let keys = match self.resolve_pool(&mint).await {
            Ok(Some(keys)) => keys,
            Ok(None) => {
                warn!("Sell skipped: no pool found for {}", token_id);
                return false;
            }
            Err(e) => {
                warn!("Sell skipped: pool resolution for {} failed: {}", token_id, e);
                return false;
            }
        };

        let balance = match self.wallet.token_balance(&self.payer.pubkey(), &mint).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!("Sell skipped: balance lookup for {} failed: {}", token_id, e);
                return false;
            }
        };
        let fraction = sell_fraction.clamp(0.0, 1.0);
        let amount = (balance as f64 * fraction) as u64;
        if amount == 0 {
            debug!("Sell skipped: nothing to sell for {}", token_id);
            return false;
        }

        info!(
            "💰 Selling {:.0}% of {} ({} trigger, amount={})",
            fraction * 100.0,
            token_id,
            strategy.as_str(),
            amount
        );

        let transaction = match self
            .builder
            .build_swap(TradeDirection::Sell, &keys, &self.payer, amount)
            .await
        {
            Ok(tx) => tx,
            Err(e) => {
                warn!("Sell build for {} failed: {}", token_id, e);
                return false;
            }
        };

        let outcome = self
            .sender
            .submit(&[transaction], &self.payer, sequence)
            .await;
        outcome.confirmed
    }

    async fn execute_buy(&self, token_id: &str, spend_lamports: u64, sequence: u64) -> bool {
        let mint = match Pubkey::from_str(token_id) {
            Ok(mint) => mint,
            Err(e) => {
                warn!("Buy skipped: {} is not a valid mint: {}", token_id, e);
                return false;
            }
        };

        let keys = match self.resolve_pool(&mint).await {
            Ok(Some(keys)) => keys,
            Ok(None) => {
                warn!("Buy skipped: no pool found for {}", token_id);
                return false;
            }
            Err(e) => {
                warn!("Buy skipped: pool resolution for {} failed: {}", token_id, e);
                return false;
            }
        };

        info!("🛒 Buying {} with {} lamports", token_id, spend_lamports);

        let transaction = match self
            .builder
            .build_swap(TradeDirection::Buy, &keys, &self.payer, spend_lamports)
            .await
        {
            Ok(tx) => tx,
            Err(e) => {
                warn!("Buy build for {} failed: {}", token_id, e);
                return false;
            }
        };

        let outcome = self
            .sender
            .submit(&[transaction], &self.payer, sequence)
            .await;
        outcome.confirmed
    }
}
