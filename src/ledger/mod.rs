//! External ledger integration
//!
//! The external ledger is the system of record for actual fund movements.
//! Two interchangeable REST providers sit behind the `LedgerService` trait;
//! callers only ever see the resilient decorator, which adds bounded retry
//! and a circuit breaker.

mod resilient;
mod rest;

pub use resilient::{ResilienceConfig, ResilientLedger};
pub use rest::{ProviderKind, RestLedgerClient};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{Amount, Wallet};

/// Result of one ledger call
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors raised by the external ledger boundary
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Retries exhausted or circuit breaker open: the provider is
    /// unreachable, not wrong.
    #[error("Ledger provider unavailable: {0}")]
    Unavailable(String),

    /// The provider processed the request and said no.
    #[error("Ledger provider rejected the operation: {reason}")]
    Rejected { reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response from ledger provider: {0}")]
    InvalidResponse(String),

    /// The wallet has no external ledger account yet.
    #[error("Wallet {0} has no external ledger id")]
    MissingExternalId(uuid::Uuid),
}

impl LedgerError {
    /// Transport-level failures are worth retrying; rejections and
    /// malformed requests are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Http(_))
    }
}

/// Contract against the external ledger system.
///
/// All movement operations return the provider's transaction reference id.
#[async_trait]
pub trait LedgerService: Send + Sync {
    async fn transfer_between_wallets(
        &self,
        source: &Wallet,
        target: &Wallet,
        amount: &Amount,
    ) -> LedgerResult<String>;

    async fn deposit_to_wallet(&self, wallet: &Wallet, amount: &Amount) -> LedgerResult<String>;

    async fn withdraw_from_wallet(&self, wallet: &Wallet, amount: &Amount)
        -> LedgerResult<String>;

    /// Best effort; callers fall back to the last known local balance.
    async fn get_wallet_balance(&self, wallet: &Wallet) -> LedgerResult<Decimal>;
}
