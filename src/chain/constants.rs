// Well-known program ids, seeds and relay endpoints used by the trading core.
//
// DECISION: Use compile-time constants (Chosen) vs reading from config.
// Chosen: these are immutable protocol-level addresses; the `pubkey!` macro
// validates them at compile time and avoids runtime parsing.

use solana_program::pubkey::Pubkey;

/// Raydium AMM V4 program (liquidity pools this bot trades against)
pub const RAYDIUM_AMM_PROGRAM: Pubkey =
    solana_program::pubkey!("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8");

/// OpenBook central-limit-order-book program (market accounts referenced by
/// every Raydium V4 pool)
pub const OPENBOOK_MARKET_PROGRAM: Pubkey =
    solana_program::pubkey!("srmqPvymJeFKQ4zGQed1GFppgkRHL9kaELCbyksJtPX");

/// Wrapped SOL token mint address (9 decimals)
pub const WSOL_MINT: Pubkey =
    solana_program::pubkey!("So11111111111111111111111111111111111111112");

/// USDC token mint address (6 decimals)
pub const USDC_MINT: Pubkey =
    solana_program::pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");

/// Seed for the shared Raydium AMM authority PDA
pub const AMM_AUTHORITY_SEED: &[u8] = b"amm authority";

/// Seed tail for deriving a pool id from its market id
pub const AMM_ASSOCIATED_SEED: &[u8] = b"amm_associated_seed";

/// Raydium AMM V4 `swap_base_in` instruction discriminator
pub const RAYDIUM_SWAP_BASE_IN_IX: u8 = 9;

/// Raydium V4 trade fee: 25 bps taken from the input amount
pub const RAYDIUM_TRADE_FEE_NUMERATOR: u64 = 25;
pub const RAYDIUM_TRADE_FEE_DENOMINATOR: u64 = 10_000;

/// Byte span of a Raydium AMM V4 pool account
pub const AMM_POOL_SPAN: usize = 752;

/// Byte span of an OpenBook V3 market state account
pub const MARKET_STATE_SPAN: usize = 388;

/// Jito tip-collection accounts. One is picked pseudo-randomly per bundle;
/// spreading tips across the pool avoids write-lock contention on a single
/// account when many bundles land in the same slot.
pub const JITO_TIP_ACCOUNTS: [Pubkey; 8] = [
    solana_program::pubkey!("96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5"),
    solana_program::pubkey!("HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe"),
    solana_program::pubkey!("Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY"),
    solana_program::pubkey!("ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49"),
    solana_program::pubkey!("DfXygSm4jCyNCybVYYK6DwvWqjKee8pbDmJGcLWNDXjh"),
    solana_program::pubkey!("ADuUkR4vqLUMWXxW9gh6D6L8pMSawimctcNZ5pGwDcEt"),
    solana_program::pubkey!("DttWaMuVvTiduZRnguLF7jNxTgiMBZ1hyAumKUiL2KRL"),
    solana_program::pubkey!("3AVi9Tg9Uo68tJfuvoKvqKNWKkC5wPdSSdeBnizKZ6jT"),
];

/// Default Jito block-engine bundle endpoints, overridable via RELAY_ENDPOINTS
pub const DEFAULT_RELAY_ENDPOINTS: [&str; 5] = [
    "https://mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://amsterdam.mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://frankfurt.mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://ny.mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://tokyo.mainnet.block-engine.jito.wtf/api/v1/bundles",
];
