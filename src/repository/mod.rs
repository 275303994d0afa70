//! Repository ports
//!
//! Storage contracts consumed by the wallet service. Implementations own
//! durability; the version check on `update` is what turns a lost update
//! into a distinct, retryable `VersionConflict`.

mod postgres;

pub use postgres::{PostgresTransactionRepository, PostgresWalletRepository};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Transaction, Wallet};

/// Repository result type
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors raised by storage adapters
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(Uuid),

    /// Optimistic concurrency conflict: the stored version no longer
    /// matches the version the entity was loaded at.
    #[error("Version conflict for {id}: expected {expected}, found {found}")]
    VersionConflict {
        id: Uuid,
        expected: i64,
        found: i64,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable store for wallets.
///
/// `update` must compare the stored version against `wallet.version()`,
/// fail with `VersionConflict` on mismatch, and bump the stored version
/// on success. Concurrent writers fail rather than silently overwrite.
#[async_trait]
pub trait WalletRepository: Send + Sync {
    async fn insert(&self, wallet: &Wallet) -> RepositoryResult<()>;

    async fn find(&self, id: Uuid) -> RepositoryResult<Wallet>;

    async fn update(&self, wallet: &Wallet) -> RepositoryResult<()>;
}

/// Durable store for transactions.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<()>;

    async fn find(&self, id: Uuid) -> RepositoryResult<Transaction>;

    async fn update(&self, tx: &Transaction) -> RepositoryResult<()>;

    /// Transactions whose external call succeeded but whose local apply
    /// never persisted. These need an operator.
    async fn find_needing_reconciliation(&self) -> RepositoryResult<Vec<Transaction>>;
}
