//! Scheduled Jobs
//!
//! Background jobs for periodic maintenance tasks.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::error::AppError;
use crate::service::WalletService;

// =========================================================================
// Reconciliation Sweep
// =========================================================================

/// Periodically surfaces transactions stuck between the external ledger
/// and local storage. The sweep never resolves them: a human (or a future
/// automated resolver) has to compare both sides first.
pub struct ReconciliationSweeper {
    service: Arc<WalletService>,
    sweep_interval: Duration,
}

impl ReconciliationSweeper {
    pub fn new(service: Arc<WalletService>, sweep_interval: Duration) -> Self {
        Self {
            service,
            sweep_interval,
        }
    }

    /// Start the sweeper in the background
    /// Returns a handle that can be used to abort it
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!(
            interval_secs = self.sweep_interval.as_secs(),
            "Reconciliation sweeper started"
        );

        let mut ticker = interval(self.sweep_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                tracing::error!(error = %e, "Reconciliation sweep failed");
            }
        }
    }

    /// Run one sweep, logging every transaction that still needs attention.
    pub async fn run_once(&self) -> Result<u64, AppError> {
        let pending = self.service.transactions_needing_reconciliation().await?;

        for tx in &pending {
            tracing::error!(
                transaction_id = %tx.id(),
                external_id = ?tx.external_id(),
                reason = ?tx.failure_reason(),
                "Transaction requires manual reconciliation"
            );
        }

        if !pending.is_empty() {
            tracing::warn!(
                count = pending.len(),
                "Reconciliation sweep found unresolved transactions"
            );
        }

        Ok(pending.len() as u64)
    }
}
