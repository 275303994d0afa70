//! Retry + circuit breaker decorator
//!
//! Wraps any `LedgerService` with a bounded retry policy and a circuit
//! breaker. Once the breaker opens, calls fail fast with
//! `LedgerError::Unavailable` until the reset timeout elapses.

use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{Amount, Wallet};

use super::{LedgerError, LedgerResult, LedgerService};

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

/// Retry and breaker parameters. These are configuration, not contract.
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    /// Total attempts per operation, including the first.
    pub max_attempts: u32,
    /// Base delay between attempts; grows linearly per attempt.
    pub retry_backoff: Duration,
    /// Consecutive failures before the breaker opens.
    pub breaker_failure_threshold: u32,
    /// How long the breaker stays open before probing again.
    pub breaker_reset: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(200),
            breaker_failure_threshold: 5,
            breaker_reset: Duration::from_secs(60),
        }
    }
}

/// Decorator adding retry + circuit breaking to a ledger service.
pub struct ResilientLedger {
    inner: Arc<dyn LedgerService>,
    breaker: Breaker,
    config: ResilienceConfig,
}

impl ResilientLedger {
    pub fn new(inner: Arc<dyn LedgerService>, config: ResilienceConfig) -> Self {
        let backoff =
            backoff::equal_jittered(config.breaker_reset, config.breaker_reset * 2);
        let policy =
            failure_policy::consecutive_failures(config.breaker_failure_threshold, backoff);
        let breaker = Config::new().failure_policy(policy).build();

        Self {
            inner,
            breaker,
            config,
        }
    }

    /// Whether the breaker currently lets calls through.
    pub fn is_call_permitted(&self) -> bool {
        self.breaker.is_call_permitted()
    }

    async fn call_with_policy<T, F, Fut>(&self, op: &str, f: F) -> LedgerResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        for attempt in 1..=self.config.max_attempts {
            match self.breaker.call(f()).await {
                Ok(value) => return Ok(value),
                Err(FailsafeError::Rejected) => {
                    tracing::warn!(operation = op, "ledger circuit breaker open, failing fast");
                    return Err(LedgerError::Unavailable(format!(
                        "circuit breaker open for {op}"
                    )));
                }
                Err(FailsafeError::Inner(err)) => {
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    if attempt == self.config.max_attempts {
                        return Err(LedgerError::Unavailable(format!(
                            "{op} failed after {attempt} attempts: {err}"
                        )));
                    }
                    tracing::warn!(
                        operation = op,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        error = %err,
                        "ledger call failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                }
            }
        }

        Err(LedgerError::Unavailable(format!("{op} exhausted retries")))
    }
}

#[async_trait]
impl LedgerService for ResilientLedger {
    async fn transfer_between_wallets(
        &self,
        source: &Wallet,
        target: &Wallet,
        amount: &Amount,
    ) -> LedgerResult<String> {
        self.call_with_policy("transfer_between_wallets", || {
            self.inner.transfer_between_wallets(source, target, amount)
        })
        .await
    }

    async fn deposit_to_wallet(&self, wallet: &Wallet, amount: &Amount) -> LedgerResult<String> {
        self.call_with_policy("deposit_to_wallet", || {
            self.inner.deposit_to_wallet(wallet, amount)
        })
        .await
    }

    async fn withdraw_from_wallet(
        &self,
        wallet: &Wallet,
        amount: &Amount,
    ) -> LedgerResult<String> {
        self.call_with_policy("withdraw_from_wallet", || {
            self.inner.withdraw_from_wallet(wallet, amount)
        })
        .await
    }

    async fn get_wallet_balance(&self, wallet: &Wallet) -> LedgerResult<Decimal> {
        self.call_with_policy("get_wallet_balance", || {
            self.inner.get_wallet_balance(wallet)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Currency;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyLedger {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyLedger {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }

        fn attempt(&self) -> LedgerResult<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(LedgerError::Unavailable("connection refused".to_string()))
            } else {
                Ok(format!("ext-{call}"))
            }
        }
    }

    #[async_trait]
    impl LedgerService for FlakyLedger {
        async fn transfer_between_wallets(
            &self,
            _source: &Wallet,
            _target: &Wallet,
            _amount: &Amount,
        ) -> LedgerResult<String> {
            self.attempt()
        }

        async fn deposit_to_wallet(
            &self,
            _wallet: &Wallet,
            _amount: &Amount,
        ) -> LedgerResult<String> {
            self.attempt()
        }

        async fn withdraw_from_wallet(
            &self,
            _wallet: &Wallet,
            _amount: &Amount,
        ) -> LedgerResult<String> {
            self.attempt()
        }

        async fn get_wallet_balance(&self, _wallet: &Wallet) -> LedgerResult<Decimal> {
            Ok(Decimal::ZERO)
        }
    }

    /// Always rejects the operation (a business "no", not an outage).
    struct RejectingLedger {
        calls: AtomicU32,
    }

    #[async_trait]
    impl LedgerService for RejectingLedger {
        async fn transfer_between_wallets(
            &self,
            _source: &Wallet,
            _target: &Wallet,
            _amount: &Amount,
        ) -> LedgerResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::Rejected {
                reason: "compliance hold".to_string(),
            })
        }

        async fn deposit_to_wallet(
            &self,
            _wallet: &Wallet,
            _amount: &Amount,
        ) -> LedgerResult<String> {
            unimplemented!()
        }

        async fn withdraw_from_wallet(
            &self,
            _wallet: &Wallet,
            _amount: &Amount,
        ) -> LedgerResult<String> {
            unimplemented!()
        }

        async fn get_wallet_balance(&self, _wallet: &Wallet) -> LedgerResult<Decimal> {
            unimplemented!()
        }
    }

    fn wallet() -> Wallet {
        Wallet::create(
            Uuid::new_v4(),
            Some("acct".to_string()),
            "user_wallet".to_string(),
            "checking".to_string(),
            Currency::new("USD").unwrap(),
        )
    }

    fn fast_config(max_attempts: u32, breaker_threshold: u32) -> ResilienceConfig {
        ResilienceConfig {
            max_attempts,
            retry_backoff: Duration::ZERO,
            breaker_failure_threshold: breaker_threshold,
            breaker_reset: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let inner = Arc::new(FlakyLedger::new(2));
        let ledger = ResilientLedger::new(inner.clone(), fast_config(3, 10));
        let w = wallet();

        let id = ledger
            .deposit_to_wallet(&w, &"10".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(id, "ext-2");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unavailable_after_exhausted_retries() {
        let inner = Arc::new(FlakyLedger::new(10));
        let ledger = ResilientLedger::new(inner.clone(), fast_config(3, 10));
        let w = wallet();

        let result = ledger.deposit_to_wallet(&w, &"10".parse().unwrap()).await;
        assert!(matches!(result, Err(LedgerError::Unavailable(_))));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let inner = Arc::new(RejectingLedger {
            calls: AtomicU32::new(0),
        });
        let ledger = ResilientLedger::new(inner.clone(), fast_config(5, 10));
        let w1 = wallet();
        let w2 = wallet();

        let result = ledger
            .transfer_between_wallets(&w1, &w2, &"10".parse().unwrap())
            .await;
        assert!(matches!(result, Err(LedgerError::Rejected { .. })));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_breaker_opens_after_consecutive_failures() {
        let inner = Arc::new(FlakyLedger::new(u32::MAX));
        let ledger = ResilientLedger::new(inner.clone(), fast_config(3, 3));
        let w = wallet();

        // First operation burns through the breaker threshold.
        let _ = ledger.deposit_to_wallet(&w, &"10".parse().unwrap()).await;
        assert!(!ledger.is_call_permitted());

        // Next operation fails fast without touching the inner service.
        let before = inner.calls.load(Ordering::SeqCst);
        let result = ledger.deposit_to_wallet(&w, &"10".parse().unwrap()).await;
        assert!(matches!(result, Err(LedgerError::Unavailable(_))));
        assert_eq!(inner.calls.load(Ordering::SeqCst), before);
    }
}
