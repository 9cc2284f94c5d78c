pub mod bundle_sender;
pub mod constants;
pub mod controller;
pub mod evaluator;
pub mod executor;
pub mod price_feed;
pub mod swap_builder;
pub mod wallet;

pub use bundle_sender::{BundleOutcome, BundleSender};
pub use constants::WSOL_MINT;
pub use controller::{EngineConfig, ExecutionState, StrategyEngine};
pub use evaluator::{DipBuyStrategy, SellStrategy, SellTrigger, StrategyKind, StrategySet};
pub use executor::{BundleTradeExecutor, TradeExecutor};
pub use price_feed::{PriceFeed, PriceSnapshot, PriceSource};
pub use swap_builder::{SwapBuilder, TradeDirection};
pub use wallet::{TokenHolding, WalletInspector};
