//! Postgres storage adapters
//!
//! Row types are internal to this module; domain entities are rebuilt
//! through their `from_stored` constructors. Wallet updates carry the
//! optimistic version check in the WHERE clause, so a concurrent writer
//! surfaces as zero affected rows instead of a silent overwrite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    Amount, Balance, Currency, Transaction, TransactionStatus, TransactionType, Wallet,
    WalletStatus,
};

use super::{RepositoryError, RepositoryResult, TransactionRepository, WalletRepository};

/// Postgres-backed wallet repository.
#[derive(Debug, Clone)]
pub struct PostgresWalletRepository {
    pool: PgPool,
}

impl PostgresWalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletRepository for PostgresWalletRepository {
    async fn insert(&self, wallet: &Wallet) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallets (
                id, user_id, external_id, wallet_type, account_type,
                balance, currency, status, version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(wallet.id())
        .bind(wallet.user_id())
        .bind(wallet.external_id())
        .bind(wallet.wallet_type())
        .bind(wallet.account_type())
        .bind(wallet.balance().value())
        .bind(wallet.currency().code())
        .bind(wallet.status().as_str())
        .bind(wallet.version())
        .bind(wallet.created_at())
        .bind(wallet.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> RepositoryResult<Wallet> {
        let row = sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(WalletRow::into_domain)
            .transpose()?
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn update(&self, wallet: &Wallet) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE wallets
            SET external_id = $3, balance = $4, status = $5,
                version = version + 1, updated_at = $6
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(wallet.id())
        .bind(wallet.version())
        .bind(wallet.external_id())
        .bind(wallet.balance().value())
        .bind(wallet.status().as_str())
        .bind(wallet.updated_at())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing row from a stale version
            let found: Option<i64> = sqlx::query_scalar("SELECT version FROM wallets WHERE id = $1")
                .bind(wallet.id())
                .fetch_optional(&self.pool)
                .await?;

            return match found {
                Some(found) => Err(RepositoryError::VersionConflict {
                    id: wallet.id(),
                    expected: wallet.version(),
                    found,
                }),
                None => Err(RepositoryError::NotFound(wallet.id())),
            };
        }

        Ok(())
    }
}

/// Postgres-backed transaction repository.
#[derive(Debug, Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, source_wallet_id, target_wallet_id, amount, currency,
                tx_type, status, external_id, description, failure_reason,
                needs_reconciliation, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(tx.id())
        .bind(tx.source_wallet_id())
        .bind(tx.target_wallet_id())
        .bind(tx.amount().value())
        .bind(tx.currency().code())
        .bind(tx.tx_type().as_str())
        .bind(tx.status().as_str())
        .bind(tx.external_id())
        .bind(tx.description())
        .bind(tx.failure_reason())
        .bind(tx.needs_reconciliation())
        .bind(tx.created_at())
        .bind(tx.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TransactionRow::into_domain)
            .transpose()?
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn update(&self, tx: &Transaction) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $2, external_id = $3, failure_reason = $4,
                needs_reconciliation = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(tx.id())
        .bind(tx.status().as_str())
        .bind(tx.external_id())
        .bind(tx.failure_reason())
        .bind(tx.needs_reconciliation())
        .bind(tx.updated_at())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(tx.id()));
        }

        Ok(())
    }

    async fn find_needing_reconciliation(&self) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE needs_reconciliation ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct WalletRow {
    id: Uuid,
    user_id: Uuid,
    external_id: Option<String>,
    wallet_type: String,
    account_type: String,
    balance: Decimal,
    currency: String,
    status: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WalletRow {
    fn into_domain(self) -> RepositoryResult<Wallet> {
        let balance = Balance::new(self.balance).map_err(corrupt_row)?;
        let currency = Currency::new(&self.currency).map_err(corrupt_row)?;
        let status: WalletStatus = self.status.parse().map_err(corrupt_row)?;

        Ok(Wallet::from_stored(
            self.id,
            self.user_id,
            self.external_id,
            self.wallet_type,
            self.account_type,
            balance,
            currency,
            status,
            self.version,
            self.created_at,
            self.updated_at,
        ))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    source_wallet_id: Option<Uuid>,
    target_wallet_id: Option<Uuid>,
    amount: Decimal,
    currency: String,
    tx_type: String,
    status: String,
    external_id: Option<String>,
    description: Option<String>,
    failure_reason: Option<String>,
    needs_reconciliation: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let amount = Amount::new(self.amount).map_err(corrupt_row)?;
        let currency = Currency::new(&self.currency).map_err(corrupt_row)?;
        let tx_type: TransactionType = self.tx_type.parse().map_err(corrupt_row)?;
        let status: TransactionStatus = self.status.parse().map_err(corrupt_row)?;

        Ok(Transaction::from_stored(
            self.id,
            self.source_wallet_id,
            self.target_wallet_id,
            amount,
            currency,
            tx_type,
            status,
            self.external_id,
            self.description,
            self.failure_reason,
            self.needs_reconciliation,
            self.created_at,
            self.updated_at,
        ))
    }
}

/// A stored value that no longer passes domain validation means the row
/// was written by something other than this service.
fn corrupt_row<E: std::fmt::Display>(err: E) -> RepositoryError {
    RepositoryError::Database(sqlx::Error::Decode(err.to_string().into()))
}
