//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::DomainError;
use crate::ledger::LedgerError;
use crate::repository::RepositoryError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(Uuid),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(Uuid),

    #[error("Version conflict: concurrent modification detected")]
    VersionConflict,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The external ledger call failed after retries; the transaction was
    /// marked FAILED and no balances changed.
    #[error("Transaction {id} failed: {reason}")]
    TransactionFailed { id: Uuid, reason: String },

    /// Distinguishable "the provider is down" condition.
    #[error("Ledger provider unavailable: {0}")]
    LedgerUnavailable(String),

    // Server errors (5xx)
    #[error("Storage error: {0}")]
    Repository(RepositoryError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::VersionConflict { .. } => AppError::VersionConflict,
            other => AppError::Repository(other),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError::LedgerUnavailable(err.to_string())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }

            // 404 Not Found
            AppError::WalletNotFound(id) => (
                StatusCode::NOT_FOUND,
                "wallet_not_found",
                Some(id.to_string()),
            ),
            AppError::TransactionNotFound(id) => (
                StatusCode::NOT_FOUND,
                "transaction_not_found",
                Some(id.to_string()),
            ),

            // 409 Conflict
            AppError::VersionConflict => (StatusCode::CONFLICT, "version_conflict", None),

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(domain_err) => match domain_err {
                DomainError::InsufficientBalance { .. } => (
                    StatusCode::BAD_REQUEST,
                    "insufficient_balance",
                    Some(domain_err.to_string()),
                ),
                DomainError::WalletNotActive { .. } => (
                    StatusCode::BAD_REQUEST,
                    "wallet_not_active",
                    Some(domain_err.to_string()),
                ),
                DomainError::InvalidWalletTransition { .. }
                | DomainError::NonZeroBalanceOnClose { .. }
                | DomainError::InvalidTransactionTransition { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "invalid_state",
                    Some(domain_err.to_string()),
                ),
                DomainError::InvalidAmount(msg) => {
                    (StatusCode::BAD_REQUEST, "invalid_amount", Some(msg.clone()))
                }
                DomainError::CurrencyMismatch { .. } => (
                    StatusCode::BAD_REQUEST,
                    "currency_mismatch",
                    Some(domain_err.to_string()),
                ),
                DomainError::SameWalletTransfer => {
                    (StatusCode::BAD_REQUEST, "same_wallet_transfer", None)
                }
            },

            // 502 upstream failed, recorded on the transaction
            AppError::TransactionFailed { reason, .. } => (
                StatusCode::BAD_GATEWAY,
                "transaction_failed",
                Some(reason.clone()),
            ),

            // 503 Service Unavailable
            AppError::LedgerUnavailable(msg) => {
                tracing::warn!("Ledger unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "ledger_unavailable",
                    Some(msg.clone()),
                )
            }

            // 500 Internal Server Error
            AppError::Repository(e) => {
                tracing::error!("Storage error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
