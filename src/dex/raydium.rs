// Raydium AMM V4 pool resolution.
//
// A V4 pool account is a fixed 752-byte record; the OpenBook market it
// references is a fixed 388-byte record. Both are decoded with hard offsets
// (the program ABI fixes them), never with a generated IDL. Resolution pulls
// three accounts (pool, market, lp mint) and assembles the full key set a
// swap instruction needs.

use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::account::Account;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use spl_token::state::Mint;
use std::sync::Arc;
use tracing::debug;

use crate::chain::constants::{
    AMM_ASSOCIATED_SEED, AMM_AUTHORITY_SEED, AMM_POOL_SPAN, MARKET_STATE_SPAN,
    OPENBOOK_MARKET_PROGRAM, RAYDIUM_AMM_PROGRAM,
};
use crate::error::{BotError, BotResult};
use crate::utils::retry::RetryPolicy;

// Pool account field offsets (LIQUIDITY_STATE_LAYOUT_V4)
const POOL_BASE_DECIMAL: usize = 32;
const POOL_QUOTE_DECIMAL: usize = 40;
const POOL_BASE_VAULT: usize = 336;
const POOL_QUOTE_VAULT: usize = 368;
const POOL_BASE_MINT: usize = 400;
const POOL_QUOTE_MINT: usize = 432;
const POOL_LP_MINT: usize = 464;
const POOL_OPEN_ORDERS: usize = 496;
const POOL_MARKET_ID: usize = 528;
const POOL_MARKET_PROGRAM: usize = 560;
const POOL_TARGET_ORDERS: usize = 592;

// Market account field offsets (MARKET_STATE_LAYOUT_V3)
const MARKET_OWN_ADDRESS: usize = 13;
const MARKET_VAULT_SIGNER_NONCE: usize = 45;
const MARKET_BASE_MINT: usize = 53;
const MARKET_QUOTE_MINT: usize = 85;
const MARKET_BASE_VAULT: usize = 117;
const MARKET_QUOTE_VAULT: usize = 165;
const MARKET_EVENT_QUEUE: usize = 253;
const MARKET_BIDS: usize = 285;
const MARKET_ASKS: usize = 317;

/// Complete key set for one Raydium V4 pool and its market. Immutable once
/// resolved; callers re-resolve rather than mutate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolKeys {
    pub id: Pubkey,
    pub program_id: Pubkey,
    pub authority: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub lp_decimals: u8,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub open_orders: Pubkey,
    pub target_orders: Pubkey,
    pub market_program_id: Pubkey,
    pub market_id: Pubkey,
    pub market_authority: Pubkey,
    pub market_base_vault: Pubkey,
    pub market_quote_vault: Pubkey,
    pub market_bids: Pubkey,
    pub market_asks: Pubkey,
    pub market_event_queue: Pubkey,
}

/// Fields read out of a raw V4 pool account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmmPoolState {
    pub base_decimal: u64,
    pub quote_decimal: u64,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub open_orders: Pubkey,
    pub market_id: Pubkey,
    pub market_program_id: Pubkey,
    pub target_orders: Pubkey,
}

impl AmmPoolState {
    pub fn decode(data: &[u8]) -> BotResult<Self> {
        if data.len() < AMM_POOL_SPAN {
            return Err(BotError::Decode(format!(
                "pool account is {} bytes, expected {}",
                data.len(),
                AMM_POOL_SPAN
            )));
        }
        Ok(Self {
            base_decimal: read_u64(data, POOL_BASE_DECIMAL)?,
            quote_decimal: read_u64(data, POOL_QUOTE_DECIMAL)?,
            base_vault: read_pubkey(data, POOL_BASE_VAULT)?,
            quote_vault: read_pubkey(data, POOL_QUOTE_VAULT)?,
            base_mint: read_pubkey(data, POOL_BASE_MINT)?,
            quote_mint: read_pubkey(data, POOL_QUOTE_MINT)?,
            lp_mint: read_pubkey(data, POOL_LP_MINT)?,
            open_orders: read_pubkey(data, POOL_OPEN_ORDERS)?,
            market_id: read_pubkey(data, POOL_MARKET_ID)?,
            market_program_id: read_pubkey(data, POOL_MARKET_PROGRAM)?,
            target_orders: read_pubkey(data, POOL_TARGET_ORDERS)?,
        })
    }
}

/// Fields read out of a raw V3 market account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketState {
    pub own_address: Pubkey,
    pub vault_signer_nonce: u64,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub event_queue: Pubkey,
    pub bids: Pubkey,
    pub asks: Pubkey,
}

impl MarketState {
    pub fn decode(data: &[u8]) -> BotResult<Self> {
        if data.len() < MARKET_STATE_SPAN {
            return Err(BotError::Decode(format!(
                "market account is {} bytes, expected {}",
                data.len(),
                MARKET_STATE_SPAN
            )));
        }
        Ok(Self {
            own_address: read_pubkey(data, MARKET_OWN_ADDRESS)?,
            vault_signer_nonce: read_u64(data, MARKET_VAULT_SIGNER_NONCE)?,
            base_mint: read_pubkey(data, MARKET_BASE_MINT)?,
            quote_mint: read_pubkey(data, MARKET_QUOTE_MINT)?,
            base_vault: read_pubkey(data, MARKET_BASE_VAULT)?,
            quote_vault: read_pubkey(data, MARKET_QUOTE_VAULT)?,
            event_queue: read_pubkey(data, MARKET_EVENT_QUEUE)?,
            bids: read_pubkey(data, MARKET_BIDS)?,
            asks: read_pubkey(data, MARKET_ASKS)?,
        })
    }
}

fn read_pubkey(data: &[u8], offset: usize) -> BotResult<Pubkey> {
    let bytes: [u8; 32] = data[offset..offset + 32]
        .try_into()
        .map_err(|_| BotError::Decode(format!("pubkey field out of range at offset {}", offset)))?;
    Ok(Pubkey::new_from_array(bytes))
}

fn read_u64(data: &[u8], offset: usize) -> BotResult<u64> {
    let bytes: [u8; 8] = data[offset..offset + 8]
        .try_into()
        .map_err(|_| BotError::Decode(format!("u64 field out of range at offset {}", offset)))?;
    Ok(u64::from_le_bytes(bytes))
}

/// Shared authority PDA every Raydium V4 pool uses to sign vault transfers
pub fn amm_authority(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[AMM_AUTHORITY_SEED], program_id).0
}

/// Deterministic pool id for a market, per the AMM program's seed scheme
pub fn derive_pool_id(program_id: &Pubkey, market_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[program_id.as_ref(), market_id.as_ref(), AMM_ASSOCIATED_SEED],
        program_id,
    )
    .0
}

/// Market vault-signer address from the nonce stored in the market account
pub fn market_vault_signer(
    market_program: &Pubkey,
    market_id: &Pubkey,
    nonce: u64,
) -> BotResult<Pubkey> {
    Pubkey::create_program_address(&[market_id.as_ref(), &nonce.to_le_bytes()], market_program)
        .map_err(|e| {
            BotError::Decode(format!(
                "invalid vault signer nonce {} for market {}: {}",
                nonce, market_id, e
            ))
        })
}

/// Own-address of the first market in a program-account scan result.
/// An empty scan is the expected no-market-for-pair outcome.
fn first_market_address(accounts: &[(Pubkey, Account)]) -> BotResult<Option<Pubkey>> {
    match accounts.first() {
        Some((_, account)) => {
            let market = MarketState::decode(&account.data)?;
            Ok(Some(market.own_address))
        }
        None => Ok(None),
    }
}

/// Resolves pool key sets from on-chain accounts, with bounded retry for
/// accounts that may lag the RPC node's view right after creation.
pub struct PoolResolver {
    rpc_client: Arc<RpcClient>,
    retry: RetryPolicy,
}

impl PoolResolver {
    pub fn new(rpc_client: Arc<RpcClient>) -> Self {
        Self {
            rpc_client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(rpc_client: Arc<RpcClient>, retry: RetryPolicy) -> Self {
        Self { rpc_client, retry }
    }

    async fn fetch_account(&self, address: &Pubkey) -> BotResult<Account> {
        let rpc = &self.rpc_client;
        self.retry
            .retry_async(|| async move { rpc.get_account(address).await })
            .await
            .map_err(|_| BotError::AccountNotFound(*address))
    }

    /// Resolve the complete key set for a pool account address.
    pub async fn resolve(&self, pool_address: &Pubkey) -> BotResult<PoolKeys> {
        let pool_account = self.fetch_account(pool_address).await?;
        let state = AmmPoolState::decode(&pool_account.data)?;
        let program_id = pool_account.owner;

        let market_account = self.fetch_account(&state.market_id).await?;
        let market = MarketState::decode(&market_account.data)?;

        let lp_mint_account = self.fetch_account(&state.lp_mint).await?;
        let lp_mint = Mint::unpack(&lp_mint_account.data).map_err(|e| {
            BotError::Decode(format!("lp mint {} is not a valid SPL mint: {}", state.lp_mint, e))
        })?;

        let market_authority = market_vault_signer(
            &state.market_program_id,
            &state.market_id,
            market.vault_signer_nonce,
        )?;

        debug!(
            "resolved pool {} (base {} / quote {})",
            pool_address, state.base_mint, state.quote_mint
        );

        Ok(PoolKeys {
            id: *pool_address,
            program_id,
            authority: amm_authority(&program_id),
            base_mint: state.base_mint,
            quote_mint: state.quote_mint,
            lp_mint: state.lp_mint,
            base_decimals: state.base_decimal as u8,
            quote_decimals: state.quote_decimal as u8,
            lp_decimals: lp_mint.decimals,
            base_vault: state.base_vault,
            quote_vault: state.quote_vault,
            open_orders: state.open_orders,
            target_orders: state.target_orders,
            market_program_id: state.market_program_id,
            market_id: state.market_id,
            market_authority,
            market_base_vault: market.base_vault,
            market_quote_vault: market.quote_vault,
            market_bids: market.bids,
            market_asks: market.asks,
            market_event_queue: market.event_queue,
        })
    }

    /// Discover the pool for a mint pair by scanning market accounts, then
    /// deriving the pool id from the market. `Ok(None)` means the pair has no
    /// market or no pool, which is an expected outcome rather than a failure.
    pub async fn resolve_by_mints(
        &self,
        base_mint: &Pubkey,
        quote_mint: &Pubkey,
    ) -> BotResult<Option<PoolKeys>> {
        let filters = vec![
            RpcFilterType::DataSize(MARKET_STATE_SPAN as u64),
            RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
                MARKET_BASE_MINT,
                &base_mint.to_bytes(),
            )),
            RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
                MARKET_QUOTE_MINT,
                &quote_mint.to_bytes(),
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
            .get_program_accounts_with_config(&OPENBOOK_MARKET_PROGRAM, scan_config)
            .await
            .map_err(|e| BotError::Transport(format!("market scan failed: {}", e)))?;

        let Some(market_id) = first_market_address(&accounts)? else {
            debug!("no market for pair {} / {}", base_mint, quote_mint);
            return Ok(None);
        };

        let pool_id = derive_pool_id(&RAYDIUM_AMM_PROGRAM, &market_id);
        match self.resolve(&pool_id).await {
            Ok(keys) => Ok(Some(keys)),
            // the pair has a market but its pool was never created
            Err(BotError::AccountNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
