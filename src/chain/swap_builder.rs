// Swap transaction builder for Raydium AMM V4 pools.
//
// Builds a fully signed transaction for one buy or sell:
// 1. Compute budget instructions with a priority fee
// 2. Associated token account creation (idempotent)
// 3. Native SOL wrap (transfer + sync) when the input side is WSOL
// 4. The Raydium swap_base_in instruction with all 18 accounts
// 5. WSOL account close to unwrap proceeds back to native SOL
//
// Reserves are fetched fresh on every build and the minimum output is
// derived from the caller-configured slippage tolerance.

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use spl_token::state::Account as TokenAccount;
use std::sync::Arc;
use tracing::debug;

use crate::chain::constants::{
    RAYDIUM_SWAP_BASE_IN_IX, RAYDIUM_TRADE_FEE_DENOMINATOR, RAYDIUM_TRADE_FEE_NUMERATOR, WSOL_MINT,
};
use crate::config::ExecutionConfig;
use crate::dex::PoolKeys;
use crate::error::{BotError, BotResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeDirection {
    /// Spend the currency side (WSOL on WSOL pools) to acquire the asset.
    Buy,
    /// Spend the asset to receive the currency side.
    Sell,
}

impl TradeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDirection::Buy => "buy",
            TradeDirection::Sell => "sell",
        }
    }
}

/// Currency/asset orientation of a pool. The WSOL side is the currency when
/// present; otherwise the quote side is treated as the currency.
fn trade_pair(keys: &PoolKeys) -> (Pubkey, Pubkey) {
    if keys.base_mint == WSOL_MINT {
        (keys.base_mint, keys.quote_mint)
    } else {
        (keys.quote_mint, keys.base_mint)
    }
}

/// Constant-product quote with the Raydium trade fee taken from the input.
fn expected_out(amount_in: u64, reserve_in: u64, reserve_out: u64) -> u64 {
    if amount_in == 0 || reserve_in == 0 || reserve_out == 0 {
        return 0;
    }
    let amount_in_after_fee = amount_in as u128
        * (RAYDIUM_TRADE_FEE_DENOMINATOR - RAYDIUM_TRADE_FEE_NUMERATOR) as u128
        / RAYDIUM_TRADE_FEE_DENOMINATOR as u128;
    let numerator = reserve_out as u128 * amount_in_after_fee;
    let denominator = reserve_in as u128 + amount_in_after_fee;
    (numerator / denominator) as u64
}

/// Minimum acceptable output after applying the slippage tolerance.
fn minimum_out(expected: u64, slippage_bps: u64) -> u64 {
    let keep = 10_000u128.saturating_sub(slippage_bps as u128);
    (expected as u128 * keep / 10_000) as u64
}

fn swap_base_in_instruction(
    keys: &PoolKeys,
    user_source: &Pubkey,
    user_destination: &Pubkey,
    owner: &Pubkey,
    amount_in: u64,
    minimum_out: u64,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new(keys.id, false),
        AccountMeta::new_readonly(keys.authority, false),
        AccountMeta::new(keys.open_orders, false),
        AccountMeta::new(keys.target_orders, false),
        AccountMeta::new(keys.base_vault, false),
        AccountMeta::new(keys.quote_vault, false),
        AccountMeta::new_readonly(keys.market_program_id, false),
        AccountMeta::new(keys.market_id, false),
        AccountMeta::new(keys.market_bids, false),
        AccountMeta::new(keys.market_asks, false),
        AccountMeta::new(keys.market_event_queue, false),
        AccountMeta::new(keys.market_base_vault, false),
        AccountMeta::new(keys.market_quote_vault, false),
        AccountMeta::new_readonly(keys.market_authority, false),
        AccountMeta::new(*user_source, false),
        AccountMeta::new(*user_destination, false),
        AccountMeta::new_readonly(*owner, true),
    ];

    let mut data = vec![RAYDIUM_SWAP_BASE_IN_IX];
    data.extend_from_slice(&amount_in.to_le_bytes());
    data.extend_from_slice(&minimum_out.to_le_bytes());

    Instruction {
        program_id: keys.program_id,
        accounts,
        data,
    }
}

pub struct SwapBuilder {
    rpc_client: Arc<RpcClient>,
    slippage_bps: u64,
    compute_unit_limit: u32,
    compute_unit_price: u64,
    fee_headroom_lamports: u64,
}

impl SwapBuilder {
    pub fn new(rpc_client: Arc<RpcClient>, config: &ExecutionConfig) -> Self {
        Self {
            rpc_client,
            slippage_bps: config.max_slippage_bps,
            compute_unit_limit: config.compute_unit_limit,
            compute_unit_price: config.compute_unit_price,
            fee_headroom_lamports: config.fee_headroom_lamports,
        }
    }

    /// Build and sign one swap transaction. The keypair is borrowed only for
    /// the duration of this call and nothing derived from it is retained.
    pub async fn build_swap(
        &self,
        direction: TradeDirection,
        keys: &PoolKeys,
        wallet: &Keypair,
        amount_in: u64,
    ) -> BotResult<VersionedTransaction> {
        if amount_in == 0 {
            return Err(BotError::InvalidConfiguration(
                "swap amount must be non-zero".to_string(),
            ));
        }
        let owner = wallet.pubkey();
        let (currency_mint, asset_mint) = trade_pair(keys);
        let (input_mint, output_mint) = match direction {
            TradeDirection::Buy => (currency_mint, asset_mint),
            TradeDirection::Sell => (asset_mint, currency_mint),
        };

        self.check_balance(&owner, &input_mint, amount_in).await?;

        // reserves are read fresh per build so the quote is never priced
        // against a stale pool state
        let (base_reserve, quote_reserve) = self.fetch_reserves(keys).await?;
        let (reserve_in, reserve_out) = if input_mint == keys.base_mint {
            (base_reserve, quote_reserve)
        } else {
            (quote_reserve, base_reserve)
        };
        let expected = expected_out(amount_in, reserve_in, reserve_out);
        if expected == 0 {
            return Err(BotError::PoolUnavailable(keys.id));
        }
        let min_out = minimum_out(expected, self.slippage_bps);
        debug!(
            "{} swap on pool {}: amount_in={}, expected_out={}, minimum_out={}",
            direction.as_str(),
            keys.id,
            amount_in,
            expected,
            min_out
        );

        let instructions =
            self.swap_instructions(keys, &owner, &input_mint, &output_mint, amount_in, min_out)?;

        let blockhash = self
            .rpc_client
            .get_latest_blockhash()
            .await
            .map_err(|e| BotError::Transport(format!("blockhash fetch failed: {}", e)))?;
        let message = Message::new_with_blockhash(&instructions, Some(&owner), &blockhash);
        VersionedTransaction::try_new(VersionedMessage::Legacy(message), &[wallet])
            .map_err(|e| BotError::InvalidConfiguration(format!("signing failed: {}", e)))
    }

    fn swap_instructions(
        &self,
        keys: &PoolKeys,
        owner: &Pubkey,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount_in: u64,
        minimum_out: u64,
    ) -> BotResult<Vec<Instruction>> {
        let user_source = get_associated_token_address(owner, input_mint);
        let user_destination = get_associated_token_address(owner, output_mint);

        let mut instructions = Vec::new();
        instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(
            self.compute_unit_limit,
        ));
        instructions.push(ComputeBudgetInstruction::set_compute_unit_price(
            self.compute_unit_price,
        ));

        // the swap writes to the destination account, so it must exist
        instructions.push(create_associated_token_account_idempotent(
            owner,
            owner,
            output_mint,
            &spl_token::id(),
        ));

        if *input_mint == WSOL_MINT {
            instructions.push(create_associated_token_account_idempotent(
                owner,
                owner,
                &WSOL_MINT,
                &spl_token::id(),
            ));
            instructions.push(system_instruction::transfer(owner, &user_source, amount_in));
            instructions.push(
                spl_token::instruction::sync_native(&spl_token::id(), &user_source).map_err(
                    |e| BotError::InvalidConfiguration(format!("sync_native instruction: {}", e)),
                )?,
            );
        }

        instructions.push(swap_base_in_instruction(
            keys,
            &user_source,
            &user_destination,
            owner,
            amount_in,
            minimum_out,
        ));

        // closing the WSOL account unwraps whatever it holds back to native
        if *input_mint == WSOL_MINT || *output_mint == WSOL_MINT {
            let wsol_account = get_associated_token_address(owner, &WSOL_MINT);
            instructions.push(
                spl_token::instruction::close_account(
                    &spl_token::id(),
                    &wsol_account,
                    owner,
                    owner,
                    &[],
                )
                .map_err(|e| {
                    BotError::InvalidConfiguration(format!("close_account instruction: {}", e))
                })?,
            );
        }

        Ok(instructions)
    }

    async fn check_balance(
        &self,
        owner: &Pubkey,
        input_mint: &Pubkey,
        amount_in: u64,
    ) -> BotResult<()> {
        let native = self
            .rpc_client
            .get_balance(owner)
            .await
            .map_err(|e| BotError::Transport(format!("balance query failed: {}", e)))?;

        if *input_mint == WSOL_MINT {
            let required = amount_in.saturating_add(self.fee_headroom_lamports);
            if native < required {
                return Err(BotError::InsufficientFunds {
                    required,
                    available: native,
                });
            }
            return Ok(());
        }

        if native < self.fee_headroom_lamports {
            return Err(BotError::InsufficientFunds {
                required: self.fee_headroom_lamports,
                available: native,
            });
        }
        let token = self.token_balance(owner, input_mint).await?;
        if token < amount_in {
            return Err(BotError::InsufficientFunds {
                required: amount_in,
                available: token,
            });
        }
        Ok(())
    }

    async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> BotResult<u64> {
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

    async fn fetch_reserves(&self, keys: &PoolKeys) -> BotResult<(u64, u64)> {
        let accounts = self
            .rpc_client
            .get_multiple_accounts(&[keys.base_vault, keys.quote_vault])
            .await
            .map_err(|_| BotError::PoolUnavailable(keys.id))?;
        let mut amounts = [0u64; 2];
        for (slot, account) in accounts.into_iter().enumerate() {
            let account = account.ok_or(BotError::PoolUnavailable(keys.id))?;
            let parsed = TokenAccount::unpack(&account.data)
                .map_err(|_| BotError::PoolUnavailable(keys.id))?;
            amounts[slot] = parsed.amount;
        }
        Ok((amounts[0], amounts[1]))
    }
}
