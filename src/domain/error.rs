//! Domain error types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

use super::transaction::TransactionStatus;
use super::wallet::WalletStatus;

/// Business rule violations and domain invariant failures.
///
/// These are independent of the web/infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Insufficient balance for a debit operation
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    /// The wallet is not in ACTIVE status
    #[error("Wallet is not active (status: {status})")]
    WalletNotActive { status: WalletStatus },

    /// Invalid wallet status transition
    #[error("Invalid wallet status transition: {from} -> {to}")]
    InvalidWalletTransition {
        from: WalletStatus,
        to: WalletStatus,
    },

    /// A wallet can only be closed once its balance is zero
    #[error("Wallet balance must be zero to close (balance: {balance})")]
    NonZeroBalanceOnClose { balance: rust_decimal::Decimal },

    /// Invalid transaction status transition
    #[error("Invalid transaction status transition: {from} -> {to}")]
    InvalidTransactionTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// Invalid amount (zero, negative, or exceeds limit)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Source and target wallet carry different currencies
    #[error("Currency mismatch: {expected} vs {found}")]
    CurrencyMismatch { expected: String, found: String },

    /// Transfer to the same wallet
    #[error("Cannot transfer to the same wallet")]
    SameWalletTransfer,
}

impl DomainError {
    /// Create an insufficient balance error
    pub fn insufficient_balance(
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    ) -> Self {
        Self::InsufficientBalance {
            required,
            available,
        }
    }

    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. }
                | Self::WalletNotActive { .. }
                | Self::InvalidWalletTransition { .. }
                | Self::NonZeroBalanceOnClose { .. }
                | Self::InvalidAmount(_)
                | Self::CurrencyMismatch { .. }
                | Self::SameWalletTransfer
        )
    }
}

impl From<super::amount::AmountError> for DomainError {
    fn from(err: super::amount::AmountError) -> Self {
        DomainError::InvalidAmount(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_insufficient_balance_error() {
        let err = DomainError::insufficient_balance(Decimal::new(100, 0), Decimal::new(50, 0));

        assert!(err.is_client_error());
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn test_transaction_transition_error_display() {
        let err = DomainError::InvalidTransactionTransition {
            from: TransactionStatus::Completed,
            to: TransactionStatus::Failed,
        };
        assert!(err.to_string().contains("COMPLETED"));
        assert!(err.to_string().contains("FAILED"));
    }
}
