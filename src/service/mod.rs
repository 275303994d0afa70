//! Service layer
//!
//! Business orchestration on top of the repositories and the external
//! ledger client.

pub mod locks;
pub mod wallet_service;

pub use locks::WalletLocks;
pub use wallet_service::{TransactionResult, WalletService};
