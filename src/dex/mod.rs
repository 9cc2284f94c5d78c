pub mod raydium;

pub use raydium::{PoolKeys, PoolResolver};
