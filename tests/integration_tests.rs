// Offline integration tests over the public crate surface.
//
// Nothing here needs a validator or the network: the strategy engine is
// driven by scripted feed/executor doubles, and the chain-facing pieces are
// exercised against fixture account data.
//
// Run with:
//   cargo test --test integration_tests

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use raydium_trigger_bot::chain::bundle_sender::{encode_bundle, endpoint_index};
use raydium_trigger_bot::chain::constants::{AMM_POOL_SPAN, MARKET_STATE_SPAN};
use raydium_trigger_bot::chain::{
    DipBuyStrategy, EngineConfig, ExecutionState, PriceSnapshot, PriceSource, SellStrategy,
    StrategyEngine, StrategyKind, StrategySet, TradeExecutor,
};
use raydium_trigger_bot::config::StrategyConfig;
use raydium_trigger_bot::dex::raydium::{amm_authority, derive_pool_id, AmmPoolState, MarketState};
use raydium_trigger_bot::error::BotError;

// ============================================================================
// SCRIPTED TEST DOUBLES
// ============================================================================

/// Serves a fixed sequence of snapshots, then empty maps (feed outage).
struct ScriptedFeed {
    snapshots: Mutex<VecDeque<PriceSnapshot>>,
}

impl ScriptedFeed {
    fn new(snapshots: Vec<PriceSnapshot>) -> Self {
        Self {
            snapshots: Mutex::new(snapshots.into()),
        }
    }
}

#[async_trait]
impl PriceSource for ScriptedFeed {
    async fn fetch_prices(&self, _token_ids: &[String]) -> PriceSnapshot {
        self.snapshots
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default()
    }
}

/// Records every trade the engine dispatches and reports success.
#[derive(Default)]
struct RecordingExecutor {
    sells: Mutex<Vec<(String, f64, StrategyKind)>>,
    buys: Mutex<Vec<(String, u64)>>,
}

#[async_trait]
impl TradeExecutor for RecordingExecutor {
    async fn execute_sell(
        &self,
        token_id: &str,
        sell_fraction: f64,
        strategy: StrategyKind,
        _sequence: u64,
    ) -> bool {
        self.sells
            .lock()
            .unwrap()
            .push((token_id.to_string(), sell_fraction, strategy));
        true
    }

    async fn execute_buy(&self, token_id: &str, spend_lamports: u64, _sequence: u64) -> bool {
        self.buys
            .lock()
            .unwrap()
            .push((token_id.to_string(), spend_lamports));
        true
    }
}

fn snapshot(entries: &[(&str, f64)]) -> PriceSnapshot {
    entries
        .iter()
        .map(|(id, price)| (id.to_string(), *price))
        .collect()
}

fn engine_with(
    snapshots: Vec<PriceSnapshot>,
    strategies: StrategySet,
    dip_buy: DipBuyStrategy,
) -> (Arc<StrategyEngine>, Arc<RecordingExecutor>) {
    let executor = Arc::new(RecordingExecutor::default());
    let engine = Arc::new(StrategyEngine::new(
        Arc::new(ScriptedFeed::new(snapshots)),
        Arc::clone(&executor) as Arc<dyn TradeExecutor>,
        EngineConfig {
            poll_interval: Duration::from_millis(20),
            strategies,
            dip_buy,
            manual_mode: false,
            token_ids: vec!["MINT_A".to_string()],
        },
    ));
    (engine, executor)
}

// ============================================================================
// STRATEGY ENGINE END TO END
// ============================================================================

#[tokio::test]
async fn test_take_profit_pipeline_sells_through_engine() {
    let strategies = StrategySet {
        take_profit: SellStrategy {
            threshold_percent: 10.0,
            sell_fraction: 1.0,
        },
        ..Default::default()
    };
    let (engine, executor) = engine_with(
        vec![
            snapshot(&[("MINT_A", 1.00)]),
            snapshot(&[("MINT_A", 1.12)]),
        ],
        strategies,
        DipBuyStrategy::default(),
    );

    engine.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    engine.stop().await;

    let sells = executor.sells.lock().unwrap();
    assert_eq!(sells.len(), 1, "the +12% move must trigger exactly one sell");
    assert_eq!(sells[0].0, "MINT_A");
    assert!((sells[0].1 - 1.0).abs() < f64::EPSILON);
    assert_eq!(sells[0].2, StrategyKind::TakeProfit);
    assert!(executor.buys.lock().unwrap().is_empty());
    assert_eq!(engine.state().await, ExecutionState::Idle);
}

#[tokio::test]
async fn test_dip_buy_pipeline_buys_through_engine() {
    let (engine, executor) = engine_with(
        vec![
            snapshot(&[("MINT_A", 1.00)]),
            snapshot(&[("MINT_A", 0.85)]),
        ],
        StrategySet::default(),
        DipBuyStrategy {
            dip_percent: 10.0,
            spend_lamports: 2_000_000,
        },
    );

    engine.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    engine.stop().await;

    let buys = executor.buys.lock().unwrap();
    assert_eq!(buys.len(), 1, "the -15% move must trigger exactly one buy");
    assert_eq!(buys[0], ("MINT_A".to_string(), 2_000_000));
    assert!(executor.sells.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_engine_rejects_inactive_configuration() {
    let (engine, executor) = engine_with(
        Vec::new(),
        StrategySet::default(),
        DipBuyStrategy::default(),
    );

    let result = engine.start().await;
    assert!(matches!(result, Err(BotError::InvalidConfiguration(_))));
    assert_eq!(engine.state().await, ExecutionState::Idle);
    assert!(executor.sells.lock().unwrap().is_empty());

    // stopping an engine that never started is a no-op, twice over
    engine.stop().await;
    engine.stop().await;
    assert_eq!(engine.state().await, ExecutionState::Idle);
}

// ============================================================================
// RELAY PLUMBING
// ============================================================================

#[test]
fn test_relay_rotation_covers_all_endpoints() {
    let count = 4;
    let mut seen = vec![0u32; count];
    for sequence in 0..8u64 {
        seen[endpoint_index(sequence, count)] += 1;
    }
    assert!(seen.iter().all(|&n| n == 2), "uneven rotation: {:?}", seen);
    // a missing endpoint list must not panic the index math
    assert_eq!(endpoint_index(7, 0), 0);
}

#[test]
fn test_bundle_encoding_keeps_submission_order() {
    let payer = Keypair::new();
    let transactions: Vec<VersionedTransaction> = (0..3)
        .map(|_| signed_transfer(&payer, &Pubkey::new_unique(), 1))
        .collect();

    let encoded = encode_bundle(&transactions).unwrap();
    assert_eq!(encoded.len(), 3);
    for (entry, tx) in encoded.iter().zip(&transactions) {
        let bytes = bs58::decode(entry).into_vec().unwrap();
        let decoded: VersionedTransaction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.signatures[0], tx.signatures[0]);
    }
}

fn signed_transfer(payer: &Keypair, to: &Pubkey, lamports: u64) -> VersionedTransaction {
    let instruction = system_instruction::transfer(&payer.pubkey(), to, lamports);
    let message =
        Message::new_with_blockhash(&[instruction], Some(&payer.pubkey()), &Hash::default());
    VersionedTransaction::try_new(VersionedMessage::Legacy(message), &[payer]).unwrap()
}

// ============================================================================
// POOL ACCOUNT LAYOUT
// ============================================================================

// LIQUIDITY_STATE_LAYOUT_V4 field offsets
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

// MARKET_STATE_LAYOUT_V3 field offsets
const MARKET_OWN_ADDRESS: usize = 13;
const MARKET_VAULT_SIGNER_NONCE: usize = 45;
const MARKET_BASE_MINT: usize = 53;
const MARKET_QUOTE_MINT: usize = 85;

fn write_pubkey(buf: &mut [u8], offset: usize, key: &Pubkey) {
    buf[offset..offset + 32].copy_from_slice(key.as_ref());
}

#[test]
fn test_pool_and_market_fixtures_cross_reference() {
    let base_mint = Pubkey::new_unique();
    let quote_mint = Pubkey::new_unique();
    let market_id = Pubkey::new_unique();
    let market_program = Pubkey::new_unique();

    let mut market_data = vec![0u8; MARKET_STATE_SPAN];
    write_pubkey(&mut market_data, MARKET_OWN_ADDRESS, &market_id);
    market_data[MARKET_VAULT_SIGNER_NONCE..MARKET_VAULT_SIGNER_NONCE + 8]
        .copy_from_slice(&1u64.to_le_bytes());
    write_pubkey(&mut market_data, MARKET_BASE_MINT, &base_mint);
    write_pubkey(&mut market_data, MARKET_QUOTE_MINT, &quote_mint);

    let mut pool_data = vec![0u8; AMM_POOL_SPAN];
    pool_data[POOL_BASE_DECIMAL..POOL_BASE_DECIMAL + 8].copy_from_slice(&9u64.to_le_bytes());
    pool_data[POOL_QUOTE_DECIMAL..POOL_QUOTE_DECIMAL + 8].copy_from_slice(&6u64.to_le_bytes());
    write_pubkey(&mut pool_data, POOL_BASE_VAULT, &Pubkey::new_unique());
    write_pubkey(&mut pool_data, POOL_QUOTE_VAULT, &Pubkey::new_unique());
    write_pubkey(&mut pool_data, POOL_BASE_MINT, &base_mint);
    write_pubkey(&mut pool_data, POOL_QUOTE_MINT, &quote_mint);
    write_pubkey(&mut pool_data, POOL_LP_MINT, &Pubkey::new_unique());
    write_pubkey(&mut pool_data, POOL_OPEN_ORDERS, &Pubkey::new_unique());
    write_pubkey(&mut pool_data, POOL_MARKET_ID, &market_id);
    write_pubkey(&mut pool_data, POOL_MARKET_PROGRAM, &market_program);

    let pool = AmmPoolState::decode(&pool_data).unwrap();
    let market = MarketState::decode(&market_data).unwrap();

    // the pool's market reference must decode to the market's own address,
    // and the mint pair must agree between the two accounts
    assert_eq!(pool.market_id, market.own_address);
    assert_eq!(pool.base_mint, market.base_mint);
    assert_eq!(pool.quote_mint, market.quote_mint);
    assert_eq!(pool.market_program_id, market_program);
    assert_eq!(pool.base_decimal, 9);
    assert_eq!(pool.quote_decimal, 6);
}

#[test]
fn test_derived_addresses_are_stable_per_program() {
    let program_a = Pubkey::new_unique();
    let program_b = Pubkey::new_unique();
    let market = Pubkey::new_unique();

    assert_eq!(amm_authority(&program_a), amm_authority(&program_a));
    assert_ne!(amm_authority(&program_a), amm_authority(&program_b));
    assert_eq!(
        derive_pool_id(&program_a, &market),
        derive_pool_id(&program_a, &market)
    );
    assert_ne!(
        derive_pool_id(&program_a, &market),
        derive_pool_id(&program_b, &market)
    );
}

// ============================================================================
// STRATEGY CONFIGURATION
// ============================================================================

#[test]
fn test_strategy_percentages_become_fractions() {
    let config = StrategyConfig {
        take_profit_threshold_pct: 12.0,
        take_profit_sell_pct: 50.0,
        stop_loss_threshold_pct: 8.0,
        stop_loss_sell_pct: 100.0,
        time_exit_minutes: 30.0,
        time_exit_sell_pct: 25.0,
        dip_buy_pct: 15.0,
        dip_buy_spend_lamports: 1_000_000,
    };

    let set = config.strategy_set();
    assert!(set.has_active());
    assert!((set.take_profit.threshold_percent - 12.0).abs() < f64::EPSILON);
    assert!((set.take_profit.sell_fraction - 0.5).abs() < f64::EPSILON);
    assert!((set.stop_loss.sell_fraction - 1.0).abs() < f64::EPSILON);
    assert!((set.time_exit.threshold_percent - 30.0).abs() < f64::EPSILON);
    assert!((set.time_exit.sell_fraction - 0.25).abs() < f64::EPSILON);

    let dip = config.dip_strategy();
    assert!(dip.is_active());
    assert!((dip.dip_percent - 15.0).abs() < f64::EPSILON);
    assert_eq!(dip.spend_lamports, 1_000_000);
}

#[test]
fn test_zeroed_strategy_config_is_inactive() {
    let config = StrategyConfig {
        take_profit_threshold_pct: 0.0,
        take_profit_sell_pct: 100.0,
        stop_loss_threshold_pct: 0.0,
        stop_loss_sell_pct: 100.0,
        time_exit_minutes: 0.0,
        time_exit_sell_pct: 100.0,
        dip_buy_pct: 0.0,
        dip_buy_spend_lamports: 0,
    };
    assert!(!config.strategy_set().has_active());
    assert!(!config.dip_strategy().is_active());
}
