//! Concurrency tests
//!
//! Two tasks racing on the same wallet must never both spend the same
//! funds, and opposing transfers must not deadlock.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use wallet_service::domain::{DomainError, TransactionStatus};
use wallet_service::{AppError, WalletService};

mod common;
use common::{amount, funded_wallet, InMemoryTransactionRepository, InMemoryWalletRepository, MockLedger};

#[tokio::test]
async fn test_concurrent_withdrawals_cannot_overspend() {
    let wallet = funded_wallet("100.00");
    let wallet_id = wallet.id();

    let wallets = InMemoryWalletRepository::with_wallets(&[wallet]).await;
    let transactions = Arc::new(InMemoryTransactionRepository::new());
    let ledger = MockLedger::succeeding();
    let service = Arc::new(WalletService::new(
        wallets.clone(),
        transactions,
        ledger.clone(),
    ));

    // Two withdrawals of 70 against a balance of 100: only one may win.
    let s1 = Arc::clone(&service);
    let t1 = tokio::spawn(async move { s1.withdraw(wallet_id, amount("70.00"), None).await });
    let s2 = Arc::clone(&service);
    let t2 = tokio::spawn(async move { s2.withdraw(wallet_id, amount("70.00"), None).await });

    let r1 = t1.await.unwrap();
    let r2 = t2.await.unwrap();

    let completed = [&r1, &r2]
        .iter()
        .filter(|r| {
            matches!(r, Ok(result) if result.status == TransactionStatus::Completed)
        })
        .count();
    let insufficient = [&r1, &r2]
        .iter()
        .filter(|r| {
            matches!(
                r,
                Err(AppError::Domain(DomainError::InsufficientBalance { .. }))
            )
        })
        .count();

    assert_eq!(completed, 1);
    assert_eq!(insufficient, 1);
    assert_eq!(ledger.calls(), 1);
    assert_eq!(wallets.stored_balance(wallet_id), dec!(30.00));
}

#[tokio::test]
async fn test_opposing_transfers_complete_without_deadlock() {
    let a = funded_wallet("100.00");
    let b = funded_wallet("100.00");
    let (a_id, b_id) = (a.id(), b.id());

    let wallets = InMemoryWalletRepository::with_wallets(&[a, b]).await;
    let transactions = Arc::new(InMemoryTransactionRepository::new());
    let service = Arc::new(WalletService::new(
        wallets.clone(),
        transactions,
        MockLedger::succeeding(),
    ));

    let s1 = Arc::clone(&service);
    let t1 = tokio::spawn(async move {
        for _ in 0..10 {
            s1.transfer(a_id, b_id, amount("5.00"), None).await.unwrap();
        }
    });
    let s2 = Arc::clone(&service);
    let t2 = tokio::spawn(async move {
        for _ in 0..10 {
            s2.transfer(b_id, a_id, amount("5.00"), None).await.unwrap();
        }
    });

    tokio::time::timeout(Duration::from_secs(10), async {
        t1.await.unwrap();
        t2.await.unwrap();
    })
    .await
    .expect("opposing transfers must not deadlock");

    // Equal traffic both ways leaves both balances where they started
    assert_eq!(wallets.stored_balance(a_id), dec!(100.00));
    assert_eq!(wallets.stored_balance(b_id), dec!(100.00));
}
