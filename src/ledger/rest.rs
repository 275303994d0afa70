//! REST clients for the ledger providers
//!
//! Both providers expose the same movement model over slightly different
//! paths, so a single client parameterized by `ProviderKind` covers them.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::domain::{Amount, Wallet};

use super::{LedgerError, LedgerResult, LedgerService};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which external ledger provider this client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Atlas,
    Meridian,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Atlas => "atlas",
            Self::Meridian => "meridian",
        }
    }

    /// Providers version their APIs differently.
    fn base_path(&self) -> &'static str {
        match self {
            Self::Atlas => "/api/v1",
            Self::Meridian => "/v2/ledger",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "atlas" => Ok(Self::Atlas),
            "meridian" => Ok(Self::Meridian),
            other => Err(format!("unknown ledger provider: {other}")),
        }
    }
}

/// HTTP client for one external ledger provider.
#[derive(Debug, Clone)]
pub struct RestLedgerClient {
    client: Client,
    base_url: String,
    provider: ProviderKind,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct MovementRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    source_account: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_account: Option<&'a str>,
    amount: String,
    currency: &'a str,
}

#[derive(Debug, Deserialize)]
struct MovementResponse {
    transaction_id: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: String,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl RestLedgerClient {
    pub fn new(provider: ProviderKind, base_url: String, api_key: String) -> LedgerResult<Self> {
        Self::with_timeout(
            provider,
            base_url,
            api_key,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Every request carries a bounded timeout; a client that cannot be
    /// built with one is a construction error, not a silent fallback.
    pub fn with_timeout(
        provider: ProviderKind,
        base_url: String,
        api_key: String,
        timeout: Duration,
    ) -> LedgerResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            provider,
            api_key,
        })
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url.trim_end_matches('/'),
            self.provider.base_path(),
            endpoint
        )
    }

    fn external_id<'a>(wallet: &'a Wallet) -> LedgerResult<&'a str> {
        wallet
            .external_id()
            .ok_or(LedgerError::MissingExternalId(wallet.id()))
    }

    async fn post_movement(
        &self,
        endpoint: &str,
        request: MovementRequest<'_>,
    ) -> LedgerResult<String> {
        let response = self
            .client
            .post(self.url(endpoint))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: MovementResponse = response
                .json()
                .await
                .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
            return Ok(body.transaction_id);
        }

        Err(self.error_from_status(status, response).await)
    }

    async fn error_from_status(
        &self,
        status: StatusCode,
        response: reqwest::Response,
    ) -> LedgerError {
        let message = response
            .json::<ProviderErrorBody>()
            .await
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| format!("{} returned {}", self.provider.as_str(), status));

        if status.is_server_error() {
            LedgerError::Unavailable(message)
        } else {
            LedgerError::Rejected { reason: message }
        }
    }
}

#[async_trait]
impl LedgerService for RestLedgerClient {
    async fn transfer_between_wallets(
        &self,
        source: &Wallet,
        target: &Wallet,
        amount: &Amount,
    ) -> LedgerResult<String> {
        let request = MovementRequest {
            source_account: Some(Self::external_id(source)?),
            target_account: Some(Self::external_id(target)?),
            amount: amount.value().to_string(),
            currency: source.currency().code(),
        };
        self.post_movement("transfers", request).await
    }

    async fn deposit_to_wallet(&self, wallet: &Wallet, amount: &Amount) -> LedgerResult<String> {
        let request = MovementRequest {
            source_account: None,
            target_account: Some(Self::external_id(wallet)?),
            amount: amount.value().to_string(),
            currency: wallet.currency().code(),
        };
        self.post_movement("deposits", request).await
    }

    async fn withdraw_from_wallet(
        &self,
        wallet: &Wallet,
        amount: &Amount,
    ) -> LedgerResult<String> {
        let request = MovementRequest {
            source_account: Some(Self::external_id(wallet)?),
            target_account: None,
            amount: amount.value().to_string(),
            currency: wallet.currency().code(),
        };
        self.post_movement("withdrawals", request).await
    }

    async fn get_wallet_balance(&self, wallet: &Wallet) -> LedgerResult<Decimal> {
        let account = Self::external_id(wallet)?;
        let response = self
            .client
            .get(self.url(&format!("accounts/{account}/balance")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.error_from_status(status, response).await);
        }

        let body: BalanceResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;

        Decimal::from_str(&body.balance)
            .map_err(|e| LedgerError::InvalidResponse(format!("bad balance value: {e}")))
    }
}
