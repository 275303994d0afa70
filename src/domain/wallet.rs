//! Wallet entity
//!
//! The core ledger account record. State can only change through the
//! operations below; fields are private and there are no external setters,
//! so every wallet in the system satisfies the balance and status
//! invariants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Amount, Balance, Currency, DomainError};

/// Wallet status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletStatus {
    Active,
    Frozen,
    Closed,
}

impl WalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Frozen => "FROZEN",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "FROZEN" => Ok(Self::Frozen),
            "CLOSED" => Ok(Self::Closed),
            other => Err(format!("unknown wallet status: {other}")),
        }
    }
}

/// Wallet entity
///
/// # Invariants
/// - balance >= 0 at all times
/// - credit/debit/freeze/close require ACTIVE status; unfreeze requires
///   FROZEN; close additionally requires a zero balance
/// - CLOSED is terminal
///
/// Mutators never persist anything; the caller persists explicitly through
/// a repository, which bumps `version` on every stored mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    id: Uuid,
    user_id: Uuid,
    /// Account id on the external ledger, assigned once the provider has
    /// created the account.
    external_id: Option<String>,
    wallet_type: String,
    account_type: String,
    balance: Balance,
    currency: Currency,
    status: WalletStatus,
    /// Optimistic concurrency version; checked and bumped by storage.
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a new ACTIVE wallet with a zero balance.
    ///
    /// No external side effects: the caller is responsible for the external
    /// ledger account existing (or being created separately).
    pub fn create(
        user_id: Uuid,
        external_id: Option<String>,
        wallet_type: String,
        account_type: String,
        currency: Currency,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            external_id,
            wallet_type,
            account_type,
            balance: Balance::zero(),
            currency,
            status: WalletStatus::Active,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a wallet from stored state. Used by storage adapters only;
    /// the values are trusted to have been produced by this type.
    #[allow(clippy::too_many_arguments)]
    pub fn from_stored(
        id: Uuid,
        user_id: Uuid,
        external_id: Option<String>,
        wallet_type: String,
        account_type: String,
        balance: Balance,
        currency: Currency,
        status: WalletStatus,
        version: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            external_id,
            wallet_type,
            account_type,
            balance,
            currency,
            status,
            version,
            created_at,
            updated_at,
        }
    }

    /// Fail unless the wallet is ACTIVE.
    pub fn ensure_active(&self) -> Result<(), DomainError> {
        if self.status != WalletStatus::Active {
            return Err(DomainError::WalletNotActive {
                status: self.status,
            });
        }
        Ok(())
    }

    /// Increase the balance. Requires ACTIVE status.
    pub fn credit(&mut self, amount: &Amount) -> Result<(), DomainError> {
        self.ensure_active()?;
        self.balance = self.balance.credit(amount)?;
        self.touch();
        Ok(())
    }

    /// Decrease the balance. Requires ACTIVE status and sufficient funds.
    pub fn debit(&mut self, amount: &Amount) -> Result<(), DomainError> {
        self.ensure_active()?;
        if !self.balance.is_sufficient_for(amount) {
            return Err(DomainError::insufficient_balance(
                amount.value(),
                self.balance.value(),
            ));
        }
        self.balance = self.balance.debit(amount)?;
        self.touch();
        Ok(())
    }

    /// Freeze an ACTIVE wallet.
    pub fn freeze(&mut self) -> Result<(), DomainError> {
        if self.status != WalletStatus::Active {
            return Err(DomainError::InvalidWalletTransition {
                from: self.status,
                to: WalletStatus::Frozen,
            });
        }
        self.status = WalletStatus::Frozen;
        self.touch();
        Ok(())
    }

    /// Unfreeze a FROZEN wallet back to ACTIVE.
    pub fn unfreeze(&mut self) -> Result<(), DomainError> {
        if self.status != WalletStatus::Frozen {
            return Err(DomainError::InvalidWalletTransition {
                from: self.status,
                to: WalletStatus::Active,
            });
        }
        self.status = WalletStatus::Active;
        self.touch();
        Ok(())
    }

    /// Close an ACTIVE wallet. The balance must be zero; CLOSED is terminal.
    pub fn close(&mut self) -> Result<(), DomainError> {
        if self.status != WalletStatus::Active {
            return Err(DomainError::InvalidWalletTransition {
                from: self.status,
                to: WalletStatus::Closed,
            });
        }
        if !self.balance.is_zero() {
            return Err(DomainError::NonZeroBalanceOnClose {
                balance: self.balance.value(),
            });
        }
        self.status = WalletStatus::Closed;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn wallet_type(&self) -> &str {
        &self.wallet_type
    }

    pub fn account_type(&self) -> &str {
        &self.account_type
    }

    pub fn balance(&self) -> &Balance {
        &self.balance
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn status(&self) -> WalletStatus {
        self.status
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn usd_wallet() -> Wallet {
        Wallet::create(
            Uuid::new_v4(),
            Some("ext-account-1".to_string()),
            "user_wallet".to_string(),
            "checking".to_string(),
            Currency::new("USD").unwrap(),
        )
    }

    fn amount(value: &str) -> Amount {
        value.parse().unwrap()
    }

    #[test]
    fn test_wallet_create() {
        let wallet = usd_wallet();

        assert_eq!(wallet.status(), WalletStatus::Active);
        assert_eq!(wallet.balance().value(), Decimal::ZERO);
        assert_eq!(wallet.version(), 0);
        assert_eq!(wallet.currency().code(), "USD");
        assert_eq!(wallet.external_id(), Some("ext-account-1"));
    }

    #[test]
    fn test_credit_then_debit_scenario() {
        // Credit 100.00 -> balance 100.00; debit 150.00 rejected;
        // debit 100.00 -> balance 0.00
        let mut wallet = usd_wallet();

        wallet.credit(&amount("100.00")).unwrap();
        assert_eq!(wallet.balance().value(), Decimal::new(10000, 2));
        assert_eq!(wallet.status(), WalletStatus::Active);

        let result = wallet.debit(&amount("150.00"));
        assert!(matches!(
            result,
            Err(DomainError::InsufficientBalance { .. })
        ));
        assert_eq!(wallet.balance().value(), Decimal::new(10000, 2));

        wallet.debit(&amount("100.00")).unwrap();
        assert_eq!(wallet.balance().value(), Decimal::new(0, 2));
    }

    #[test]
    fn test_frozen_wallet_rejects_mutation() {
        let mut wallet = usd_wallet();
        wallet.credit(&amount("10")).unwrap();
        wallet.freeze().unwrap();

        assert!(matches!(
            wallet.credit(&amount("10")),
            Err(DomainError::WalletNotActive { .. })
        ));
        assert!(matches!(
            wallet.debit(&amount("10")),
            Err(DomainError::WalletNotActive { .. })
        ));
        assert_eq!(wallet.balance().value(), Decimal::from(10));
    }

    #[test]
    fn test_unfreeze_requires_frozen() {
        let mut wallet = usd_wallet();
        assert!(matches!(
            wallet.unfreeze(),
            Err(DomainError::InvalidWalletTransition { .. })
        ));

        wallet.freeze().unwrap();
        wallet.unfreeze().unwrap();
        assert_eq!(wallet.status(), WalletStatus::Active);
    }

    #[test]
    fn test_close_requires_zero_balance() {
        let mut wallet = usd_wallet();
        wallet.credit(&amount("5")).unwrap();

        assert!(matches!(
            wallet.close(),
            Err(DomainError::NonZeroBalanceOnClose { .. })
        ));

        wallet.debit(&amount("5")).unwrap();
        wallet.close().unwrap();
        assert_eq!(wallet.status(), WalletStatus::Closed);
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut wallet = usd_wallet();
        wallet.close().unwrap();

        assert!(wallet.freeze().is_err());
        assert!(wallet.unfreeze().is_err());
        assert!(wallet.close().is_err());
        assert!(wallet.credit(&amount("1")).is_err());
        assert_eq!(wallet.status(), WalletStatus::Closed);
    }

    #[test]
    fn test_frozen_wallet_cannot_close() {
        let mut wallet = usd_wallet();
        wallet.freeze().unwrap();
        assert!(matches!(
            wallet.close(),
            Err(DomainError::InvalidWalletTransition { .. })
        ));
    }
}
