//! Domain module
//!
//! Core domain types and business logic.

pub mod amount;
pub mod currency;
pub mod error;
pub mod transaction;
pub mod wallet;

pub use amount::{Amount, AmountError, Balance};
pub use currency::{Currency, CurrencyError};
pub use error::DomainError;
pub use transaction::{Transaction, TransactionStatus, TransactionType};
pub use wallet::{Wallet, WalletStatus};
