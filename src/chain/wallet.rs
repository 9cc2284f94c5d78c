// Wallet inspection: SPL token holdings, balances and the fee preflight that
// gates a trading session before the loop starts.

use moka::future::Cache;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;
use spl_token::state::{Account as TokenAccount, Mint};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::{BotError, BotResult};

/// SPL token account byte length
const TOKEN_ACCOUNT_SPAN: usize = 165;
/// Offset of the owner field inside an SPL token account
const TOKEN_ACCOUNT_OWNER_OFFSET: usize = 32;

/// One SPL token position held by the wallet
#[derive(Debug, Clone)]
pub struct TokenHolding {
    pub mint: Pubkey,
    pub address: Pubkey,
    pub amount: u64,
    pub decimals: u8,
}

pub struct WalletInspector {
    rpc_client: Arc<RpcClient>,
    // mint decimals are immutable, so a long TTL is safe
    decimals_cache: Cache<Pubkey, u8>,
}

impl WalletInspector {
    pub fn new(rpc_client: Arc<RpcClient>) -> Self {
        let decimals_cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(3600))
            .build();
        Self {
            rpc_client,
            decimals_cache,
        }
    }

    /// All SPL token accounts owned by the wallet, found with a data-size
    /// plus owner-offset filter scan of the token program.
    pub async fn token_holdings(&self, owner: &Pubkey) -> BotResult<Vec<TokenHolding>> {
        let filters = vec![
            RpcFilterType::DataSize(TOKEN_ACCOUNT_SPAN as u64),
            RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
                TOKEN_ACCOUNT_OWNER_OFFSET,
                &owner.to_bytes(),
            )),
        ];
        let scan_config = RpcProgramAccountsConfig {
            filters: Some(filters),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.rpc_client.commitment()),
                ..Default::default()
            },
            ..Default::default()
        };

        let accounts = self
            .rpc_client
            .get_program_accounts_with_config(&spl_token::id(), scan_config)
            .await
            .map_err(|e| BotError::Transport(format!("token account scan failed: {}", e)))?;

        let decoded: Vec<(Pubkey, TokenAccount)> = accounts
            .into_iter()
            .filter_map(|(address, account)| match TokenAccount::unpack(&account.data) {
                Ok(parsed) => Some((address, parsed)),
                Err(e) => {
                    warn!("skipping undecodable token account {}: {}", address, e);
                    None
                }
            })
            .collect();

        // decimals lookups fan out concurrently; the cache absorbs repeats
        let lookups = decoded.iter().map(|(address, token_account)| async move {
            (*address, token_account, self.mint_decimals(&token_account.mint).await)
        });

        let mut holdings = Vec::with_capacity(decoded.len());
        for (address, token_account, decimals) in futures::future::join_all(lookups).await {
            match decimals {
                Ok(decimals) => holdings.push(TokenHolding {
                    mint: token_account.mint,
                    address,
                    amount: token_account.amount,
                    decimals,
                }),
                Err(e) => warn!("skipping holding {}: {}", token_account.mint, e),
            }
        }
        Ok(holdings)
    }

    /// Decimals for a mint, cached after the first fetch.
    pub async fn mint_decimals(&self, mint: &Pubkey) -> BotResult<u8> {
        if let Some(decimals) = self.decimals_cache.get(mint).await {
            return Ok(decimals);
        }
        let account = self
            .rpc_client
            .get_account(mint)
            .await
            .map_err(|_| BotError::AccountNotFound(*mint))?;
        let parsed = Mint::unpack(&account.data)
            .map_err(|e| BotError::Decode(format!("{} is not an SPL mint: {}", mint, e)))?;
        self.decimals_cache.insert(*mint, parsed.decimals).await;
        Ok(parsed.decimals)
    }

    /// Balance of the wallet's associated token account for `mint`.
    /// A missing account reads as zero; transport failures stay errors.
    pub async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> BotResult<u64> {
        let ata = get_associated_token_address(owner, mint);
        let accounts = self
            .rpc_client
            .get_multiple_accounts(&[ata])
            .await
            .map_err(|e| BotError::Transport(format!("token balance query failed: {}", e)))?;
        match accounts.into_iter().flatten().next() {
            Some(account) => {
                let parsed = TokenAccount::unpack(&account.data).map_err(|e| {
                    BotError::Decode(format!("{} is not an SPL token account: {}", ata, e))
                })?;
                Ok(parsed.amount)
            }
            None => Ok(0),
        }
    }

    /// Reject a session whose wallet cannot cover the tip plus fee headroom.
    /// Returns the current balance so callers can log it.
    pub async fn ensure_fee_balance(&self, owner: &Pubkey, required_lamports: u64) -> BotResult<u64> {
        let balance = self
            .rpc_client
            .get_balance(owner)
            .await
            .map_err(|e| BotError::Transport(format!("balance query failed: {}", e)))?;
        if balance < required_lamports {
            return Err(BotError::InsufficientFunds {
                required: required_lamports,
                available: balance,
            });
        }
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_inspector() -> WalletInspector {
        WalletInspector::new(Arc::new(RpcClient::new("http://127.0.0.1:9".to_string())))
    }

    #[tokio::test]
    async fn test_holdings_scan_maps_transport_errors() {
        let inspector = unreachable_inspector();
        let result = inspector.token_holdings(&Pubkey::new_unique()).await;
        assert!(matches!(result, Err(BotError::Transport(_))));
    }

    #[tokio::test]
    async fn test_token_balance_maps_transport_errors() {
        let inspector = unreachable_inspector();
        let result = inspector
            .token_balance(&Pubkey::new_unique(), &Pubkey::new_unique())
            .await;
        assert!(matches!(result, Err(BotError::Transport(_))));
    }
}
