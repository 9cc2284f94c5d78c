// Raydium Trigger Bot Library
//
// Components for an automated take-profit / stop-loss trading bot on
// Raydium AMM pools:
// - Pool key resolution from raw on-chain account data
// - Batched price polling and percentage-change strategy evaluation
// - Swap construction against fresh reserves with a slippage bound
// - Tip-paying bundle submission with relay round-robin and independent
//   on-chain confirmation
// - The polling/trigger/submit engine with cooperative cancellation

pub mod chain;
pub mod config;
pub mod dex;
pub mod error;
pub mod utils;
