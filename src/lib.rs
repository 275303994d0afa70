//! Wallet Service Library
//!
//! Re-exports modules for integration testing and external use.

pub mod api;
pub mod domain;
pub mod jobs;
pub mod ledger;
pub mod repository;
pub mod service;

// Private modules (used only by main.rs binary)
pub mod config;
pub mod db;
pub mod error;

pub use config::Config;
pub use error::{AppError, AppResult};

pub use domain::{Amount, AmountError, Balance, Currency, DomainError};
pub use domain::{Transaction, TransactionStatus, TransactionType, Wallet, WalletStatus};
pub use service::{TransactionResult, WalletService};
