use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use thiserror::Error;

/// Error taxonomy for the trading core.
///
/// Leaf components convert underlying RPC/HTTP/layout failures into one of
/// these categories at the boundary; the engine treats everything except
/// `InvalidConfiguration` as "skip this token or cycle" and keeps looping.
#[derive(Debug, Error)]
pub enum BotError {
    /// Network or API failure. Recoverable; the current cycle is skipped.
    #[error("transport error: {0}")]
    Transport(String),

    /// On-chain bytes did not match the expected layout. Fatal for the
    /// resolve call that hit it, not for the loop.
    #[error("decode error: {0}")]
    Decode(String),

    /// The account never showed up within the retry ceiling. For pair
    /// discovery this is the expected-absence case and is converted to
    /// `Ok(None)` by the caller.
    #[error("account not found: {0}")]
    AccountNotFound(Pubkey),

    /// Pool reserve data could not be read at build time. The swap must not
    /// be priced against stale reserves, so the build is abandoned.
    #[error("pool unavailable: {0}")]
    PoolUnavailable(Pubkey),

    /// Wallet balance (native or token) below what the operation needs.
    #[error("insufficient funds: required {required} lamports, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    /// Caller input error, reported immediately.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Bundle outcome unknown after the confirmation window closed.
    /// Reported as unconfirmed, never assumed successful.
    #[error("confirmation timed out for {0}")]
    ConfirmationTimeout(Signature),
}

pub type BotResult<T> = Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BotError::InsufficientFunds {
            required: 1_000_000,
            available: 250,
        };
        assert_eq!(
            err.to_string(),
            "insufficient funds: required 1000000 lamports, available 250"
        );
    }

    #[test]
    fn test_not_found_carries_address() {
        let addr = Pubkey::new_unique();
        let err = BotError::AccountNotFound(addr);
        assert!(err.to_string().contains(&addr.to_string()));
    }
}
