//! Per-wallet lock registry
//!
//! Serializes all balance-affecting work on a single wallet: the guard is
//! acquired before the wallet is read and held until the mutation has been
//! persisted, so two concurrent debits can never both observe the same
//! stale balance. Pair acquisition sorts the ids, which keeps opposing
//! transfers between the same two wallets deadlock free.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Guard held for the read-validate-write span of one wallet.
pub type WalletGuard = OwnedMutexGuard<()>;

/// Keyed async mutex registry, one lock per wallet id.
#[derive(Debug, Default)]
pub struct WalletLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl WalletLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().expect("wallet lock registry poisoned");
        // Drop entries nobody holds or waits on anymore, so the registry
        // tracks contended wallets instead of every wallet ever touched.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(id).or_default())
    }

    /// Acquire the lock for a single wallet.
    pub async fn lock(&self, id: Uuid) -> WalletGuard {
        self.entry(id).lock_owned().await
    }

    /// Acquire locks for a pair of wallets in fixed id order.
    pub async fn lock_pair(&self, a: Uuid, b: Uuid) -> (WalletGuard, WalletGuard) {
        // Always lock the smaller id first so that A->B and B->A transfers
        // contend instead of deadlocking.
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let first_guard = self.entry(first).lock_owned().await;
        let second_guard = self.entry(second).lock_owned().await;
        (first_guard, second_guard)
    }
}
