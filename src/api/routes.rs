//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Amount, Currency, Transaction, Wallet};
use crate::error::AppError;
use crate::service::{TransactionResult, WalletService};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WalletService>,
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateWalletRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub external_id: Option<String>,
    pub wallet_type: String,
    pub account_type: String,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub external_id: Option<String>,
    pub wallet_type: String,
    pub account_type: String,
    pub balance: Decimal,
    pub currency: String,
    pub status: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Wallet> for WalletResponse {
    fn from(wallet: &Wallet) -> Self {
        Self {
            id: wallet.id(),
            user_id: wallet.user_id(),
            external_id: wallet.external_id().map(String::from),
            wallet_type: wallet.wallet_type().to_string(),
            account_type: wallet.account_type().to_string(),
            balance: wallet.balance().value(),
            currency: wallet.currency().code().to_string(),
            status: wallet.status().as_str().to_string(),
            version: wallet.version(),
            created_at: wallet.created_at(),
            updated_at: wallet.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub wallet_id: Uuid,
    pub balance: Decimal,
}

/// Deposit or withdrawal body.
#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub amount: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub source_wallet_id: Uuid,
    pub target_wallet_id: Uuid,
    pub amount: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub transaction_id: Uuid,
    pub status: String,
    pub external_id: Option<String>,
    pub failure_reason: Option<String>,
}

impl From<TransactionResult> for TransactionResponse {
    fn from(result: TransactionResult) -> Self {
        Self {
            transaction_id: result.id,
            status: result.status.as_str().to_string(),
            external_id: result.external_id,
            failure_reason: result.failure_reason,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionDetailResponse {
    pub id: Uuid,
    pub source_wallet_id: Option<Uuid>,
    pub target_wallet_id: Option<Uuid>,
    pub transaction_type: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub external_id: Option<String>,
    pub description: Option<String>,
    pub failure_reason: Option<String>,
    pub needs_reconciliation: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Transaction> for TransactionDetailResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id(),
            source_wallet_id: tx.source_wallet_id(),
            target_wallet_id: tx.target_wallet_id(),
            transaction_type: tx.tx_type().as_str().to_string(),
            amount: tx.amount().value(),
            currency: tx.currency().code().to_string(),
            status: tx.status().as_str().to_string(),
            external_id: tx.external_id().map(String::from),
            description: tx.description().map(String::from),
            failure_reason: tx.failure_reason().map(String::from),
            needs_reconciliation: tx.needs_reconciliation(),
            created_at: tx.created_at(),
            updated_at: tx.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReconciliationListResponse {
    pub transactions: Vec<TransactionDetailResponse>,
    pub total: usize,
}

fn parse_amount(raw: &str) -> Result<Amount, AppError> {
    raw.parse::<Amount>()
        .map_err(|e| AppError::InvalidRequest(e.to_string()))
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Wallet lifecycle
        .route("/wallets", post(create_wallet))
        .route("/wallets/:wallet_id", get(get_wallet))
        .route("/wallets/:wallet_id/balance", get(get_balance))
        .route("/wallets/:wallet_id/freeze", post(freeze_wallet))
        .route("/wallets/:wallet_id/unfreeze", post(unfreeze_wallet))
        .route("/wallets/:wallet_id/close", post(close_wallet))
        // Fund movements
        .route("/wallets/:wallet_id/deposit", post(deposit))
        .route("/wallets/:wallet_id/withdraw", post(withdraw))
        .route("/transfers", post(transfer))
        .route("/transactions/:transaction_id", get(get_transaction))
        // Admin
        .route("/admin/reconciliation", get(list_reconciliation))
        .route("/health", get(health))
}

// =========================================================================
// POST /wallets
// =========================================================================

/// Create a new wallet
async fn create_wallet(
    State(state): State<AppState>,
    Json(request): Json<CreateWalletRequest>,
) -> Result<(StatusCode, Json<WalletResponse>), AppError> {
    let currency = Currency::new(&request.currency)
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

    let wallet = state
        .service
        .create_wallet(
            request.user_id,
            request.external_id,
            request.wallet_type,
            request.account_type,
            currency,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(WalletResponse::from(&wallet))))
}

// =========================================================================
// GET /wallets/:wallet_id
// =========================================================================

/// Get wallet by ID
async fn get_wallet(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<WalletResponse>, AppError> {
    let wallet = state.service.get_wallet(wallet_id).await?;
    Ok(Json(WalletResponse::from(&wallet)))
}

// =========================================================================
// GET /wallets/:wallet_id/balance
// =========================================================================

/// Current balance, preferring the external ledger's view
async fn get_balance(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state.service.get_balance(wallet_id).await?;
    Ok(Json(BalanceResponse { wallet_id, balance }))
}

// =========================================================================
// Wallet status transitions
// =========================================================================

async fn freeze_wallet(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<WalletResponse>, AppError> {
    let wallet = state.service.freeze(wallet_id).await?;
    Ok(Json(WalletResponse::from(&wallet)))
}

async fn unfreeze_wallet(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<WalletResponse>, AppError> {
    let wallet = state.service.unfreeze(wallet_id).await?;
    Ok(Json(WalletResponse::from(&wallet)))
}

async fn close_wallet(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<WalletResponse>, AppError> {
    let wallet = state.service.close(wallet_id).await?;
    Ok(Json(WalletResponse::from(&wallet)))
}

// =========================================================================
// POST /wallets/:wallet_id/deposit
// =========================================================================

/// Deposit into a wallet
async fn deposit(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
    Json(request): Json<MovementRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    let amount = parse_amount(&request.amount)?;

    let result = state
        .service
        .deposit(wallet_id, amount, request.description)
        .await?;

    Ok((StatusCode::CREATED, Json(result.into())))
}

// =========================================================================
// POST /wallets/:wallet_id/withdraw
// =========================================================================

/// Withdraw from a wallet
async fn withdraw(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
    Json(request): Json<MovementRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    let amount = parse_amount(&request.amount)?;

    let result = state
        .service
        .withdraw(wallet_id, amount, request.description)
        .await?;

    Ok((StatusCode::CREATED, Json(result.into())))
}

// =========================================================================
// POST /transfers
// =========================================================================

/// Transfer between two wallets
async fn transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    let amount = parse_amount(&request.amount)?;

    let result = state
        .service
        .transfer(
            request.source_wallet_id,
            request.target_wallet_id,
            amount,
            request.description,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(result.into())))
}

// =========================================================================
// GET /transactions/:transaction_id
// =========================================================================

/// Get transaction by ID
async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionDetailResponse>, AppError> {
    let tx = state.service.get_transaction(transaction_id).await?;
    Ok(Json(TransactionDetailResponse::from(&tx)))
}

// =========================================================================
// GET /admin/reconciliation
// =========================================================================

/// List transactions awaiting operator reconciliation
async fn list_reconciliation(
    State(state): State<AppState>,
) -> Result<Json<ReconciliationListResponse>, AppError> {
    let transactions = state.service.transactions_needing_reconciliation().await?;
    let transactions: Vec<TransactionDetailResponse> =
        transactions.iter().map(Into::into).collect();

    Ok(Json(ReconciliationListResponse {
        total: transactions.len(),
        transactions,
    }))
}

// =========================================================================
// GET /health
// =========================================================================

async fn health() -> StatusCode {
    StatusCode::OK
}
