//! Transaction entity
//!
//! A record of one attempted fund movement and its outcome. Status follows
//! a one-way lattice: PENDING -> IN_PROGRESS -> {COMPLETED, FAILED}, with
//! the terminal states absorbing. A transaction that got stuck between a
//! successful external call and local persistence carries a reconciliation
//! flag instead of a (wrong) terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Amount, Currency, DomainError};

/// Kind of fund movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
    Payment,
    Refund,
    Fee,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "DEPOSIT",
            Self::Withdrawal => "WITHDRAWAL",
            Self::Transfer => "TRANSFER",
            Self::Payment => "PAYMENT",
            Self::Refund => "REFUND",
            Self::Fee => "FEE",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(Self::Deposit),
            "WITHDRAWAL" => Ok(Self::Withdrawal),
            "TRANSFER" => Ok(Self::Transfer),
            "PAYMENT" => Ok(Self::Payment),
            "REFUND" => Ok(Self::Refund),
            "FEE" => Ok(Self::Fee),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

/// Transaction lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown transaction status: {other}")),
        }
    }
}

/// Transaction entity.
///
/// `external_id` is populated if and only if the transaction COMPLETED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    id: Uuid,
    source_wallet_id: Option<Uuid>,
    target_wallet_id: Option<Uuid>,
    amount: Amount,
    currency: Currency,
    tx_type: TransactionType,
    status: TransactionStatus,
    external_id: Option<String>,
    description: Option<String>,
    failure_reason: Option<String>,
    /// Operator-visible flag: the external call succeeded but the local
    /// balance apply could not be persisted.
    needs_reconciliation: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Transaction {
    fn new(
        tx_type: TransactionType,
        source_wallet_id: Option<Uuid>,
        target_wallet_id: Option<Uuid>,
        amount: Amount,
        currency: Currency,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            source_wallet_id,
            target_wallet_id,
            amount,
            currency,
            tx_type,
            status: TransactionStatus::Pending,
            external_id: None,
            description,
            failure_reason: None,
            needs_reconciliation: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a PENDING deposit into `target_wallet_id`.
    pub fn deposit(
        target_wallet_id: Uuid,
        amount: Amount,
        currency: Currency,
        description: Option<String>,
    ) -> Self {
        Self::new(
            TransactionType::Deposit,
            None,
            Some(target_wallet_id),
            amount,
            currency,
            description,
        )
    }

    /// Create a PENDING withdrawal from `source_wallet_id`.
    pub fn withdrawal(
        source_wallet_id: Uuid,
        amount: Amount,
        currency: Currency,
        description: Option<String>,
    ) -> Self {
        Self::new(
            TransactionType::Withdrawal,
            Some(source_wallet_id),
            None,
            amount,
            currency,
            description,
        )
    }

    /// Create a PENDING transfer between two wallets.
    pub fn transfer(
        source_wallet_id: Uuid,
        target_wallet_id: Uuid,
        amount: Amount,
        currency: Currency,
        description: Option<String>,
    ) -> Self {
        Self::new(
            TransactionType::Transfer,
            Some(source_wallet_id),
            Some(target_wallet_id),
            amount,
            currency,
            description,
        )
    }

    /// Rebuild a transaction from stored state. Storage adapters only.
    #[allow(clippy::too_many_arguments)]
    pub fn from_stored(
        id: Uuid,
        source_wallet_id: Option<Uuid>,
        target_wallet_id: Option<Uuid>,
        amount: Amount,
        currency: Currency,
        tx_type: TransactionType,
        status: TransactionStatus,
        external_id: Option<String>,
        description: Option<String>,
        failure_reason: Option<String>,
        needs_reconciliation: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            source_wallet_id,
            target_wallet_id,
            amount,
            currency,
            tx_type,
            status,
            external_id,
            description,
            failure_reason,
            needs_reconciliation,
            created_at,
            updated_at,
        }
    }

    /// PENDING -> IN_PROGRESS, right before the external call is dispatched.
    pub fn mark_in_progress(&mut self) -> Result<(), DomainError> {
        self.transition(TransactionStatus::Pending, TransactionStatus::InProgress)
    }

    /// IN_PROGRESS -> COMPLETED, recording the external reference id.
    pub fn complete(&mut self, external_id: String) -> Result<(), DomainError> {
        self.transition(TransactionStatus::InProgress, TransactionStatus::Completed)?;
        self.external_id = Some(external_id);
        self.needs_reconciliation = false;
        Ok(())
    }

    /// IN_PROGRESS -> FAILED, recording the failure reason.
    pub fn fail(&mut self, reason: String) -> Result<(), DomainError> {
        self.transition(TransactionStatus::InProgress, TransactionStatus::Failed)?;
        self.failure_reason = Some(reason);
        Ok(())
    }

    /// Flag an IN_PROGRESS transaction for operator reconciliation.
    ///
    /// Used when the external call succeeded but the local balance apply
    /// could not be persisted; the status deliberately stays non-terminal.
    pub fn flag_for_reconciliation(&mut self, reason: String) -> Result<(), DomainError> {
        if self.status != TransactionStatus::InProgress {
            return Err(DomainError::InvalidTransactionTransition {
                from: self.status,
                to: TransactionStatus::InProgress,
            });
        }
        self.needs_reconciliation = true;
        self.failure_reason = Some(reason);
        self.updated_at = Utc::now();
        Ok(())
    }

    fn transition(
        &mut self,
        expected: TransactionStatus,
        next: TransactionStatus,
    ) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::InvalidTransactionTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source_wallet_id(&self) -> Option<Uuid> {
        self.source_wallet_id
    }

    pub fn target_wallet_id(&self) -> Option<Uuid> {
        self.target_wallet_id
    }

    pub fn amount(&self) -> &Amount {
        &self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn tx_type(&self) -> TransactionType {
        self.tx_type
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn needs_reconciliation(&self) -> bool {
        self.needs_reconciliation
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
