mod demo;
mod flutterwave;
mod pawapay;
pub mod phone;

pub use demo::*;
pub use flutterwave::*;
pub use pawapay::*;
pub use phone::{Network, detect_network, format_phone_number};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::{Config, ProviderKind};
use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Provider-side state of a charge, normalized across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Pending,
    Successful,
    Failed,
}

impl ProviderStatus {
    /// Map a provider status string. Anything that is not clearly terminal
    /// (ACCEPTED, SUBMITTED, ENQUEUED, unknown values) stays pending.
    pub fn from_provider(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "COMPLETED" | "SUCCESSFUL" | "SUCCESS" => ProviderStatus::Successful,
            "FAILED" | "REJECTED" | "CANCELLED" => ProviderStatus::Failed,
            _ => ProviderStatus::Pending,
        }
    }
}

/// An amount as the provider reported it. Prices are whole shillings, so a
/// value with a non-zero fraction, or one that does not parse, is kept
/// verbatim and never matches a price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportedAmount {
    Whole(i64),
    Unparsed(String),
}

impl ReportedAmount {
    pub fn matches(&self, expected: i64) -> bool {
        matches!(self, ReportedAmount::Whole(amount) if *amount == expected)
    }
}

impl fmt::Display for ReportedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportedAmount::Whole(amount) => write!(f, "{}", amount),
            ReportedAmount::Unparsed(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// As typed by the customer; adapters format it themselves
    pub phone: String,
    pub amount: i64,
    pub currency: String,
    /// Our tx_ref, used as the provider's idempotency key
    pub reference: String,
    pub network: Network,
}

#[derive(Debug, Clone)]
pub struct InitiatedCharge {
    pub provider_ref: Option<String>,
    pub status: ProviderStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: ProviderStatus,
    pub provider_ref: Option<String>,
    pub amount: Option<ReportedAmount>,
}

impl StatusReport {
    /// Nothing settled on the provider side yet.
    pub fn pending() -> Self {
        Self {
            status: ProviderStatus::Pending,
            provider_ref: None,
            amount: None,
        }
    }
}

/// A webhook event reduced to what the activation pipeline needs.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub reference: String,
    pub status: ProviderStatus,
    pub amount: Option<ReportedAmount>,
    pub provider_ref: Option<String>,
}

/// Mobile-money provider adapter.
///
/// The activation pipeline is written once against this trait; the concrete
/// provider (or the simulated one) is chosen at startup.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start a charge. A provider-side rejection is reported through the
    /// returned status; `Err(AppError::Provider)` means transport failure.
    async fn initiate(&self, charge: &ChargeRequest) -> Result<InitiatedCharge>;

    /// Live status lookup by our reference. Transport failures and 5xx are
    /// `Err(AppError::Provider)` and must never be read as a failed payment.
    async fn query_status(&self, reference: &str) -> Result<StatusReport>;

    /// Check webhook authenticity. Returns true when no secret is configured.
    fn verify_signature(&self, headers: &HeaderMap, body: &[u8]) -> bool;

    /// Parse a raw webhook body. `Ok(None)` for event types we don't act on,
    /// `Err(BadRequest)` for malformed payloads.
    fn parse_webhook(&self, body: &[u8]) -> Result<Option<WebhookEvent>>;
}

/// Build the gateway selected by configuration.
pub fn build_gateway(config: &Config) -> Result<Arc<dyn PaymentGateway>> {
    let timeout = Duration::from_secs(config.provider_timeout_secs);
    let gateway: Arc<dyn PaymentGateway> = match config.provider {
        ProviderKind::Flutterwave => Arc::new(FlutterwaveClient::new(
            http_client(timeout)?,
            &config.flw_base_url,
            &config.flw_secret_key,
            config.flw_webhook_secret.clone(),
        )),
        ProviderKind::PawaPay => Arc::new(PawaPayClient::new(
            http_client(timeout)?,
            &config.pawapay_base_url,
            &config.pawapay_api_token,
            config.pawapay_webhook_secret.clone(),
        )),
        ProviderKind::Demo => Arc::new(DemoGateway::new(config.flw_webhook_secret.clone())),
    };

    if config.webhook_secret().is_none() && config.provider != ProviderKind::Demo {
        tracing::warn!(
            "No webhook secret configured for {}; webhooks will not be authenticated",
            gateway.name()
        );
    }

    Ok(gateway)
}

/// HTTP client with a hard per-request timeout so webhook and poll handlers
/// never hang on a slow provider.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))
}

pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Provider(format!("{} request timed out", provider))
    } else {
        AppError::Provider(format!("{} request failed: {}", provider, err))
    }
}

/// Compare a header against a shared secret in constant time.
/// No configured secret means the check is skipped.
pub fn shared_secret_matches(headers: &HeaderMap, header: &str, secret: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return true;
    };
    let Some(provided) = headers.get(header).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    provided.as_bytes().ct_eq(secret.as_bytes()).into()
}

/// Verify a hex HMAC-SHA256 of the raw body carried in `header`.
pub fn hmac_signature_matches(
    headers: &HeaderMap,
    header: &str,
    secret: Option<&str>,
    body: &[u8],
) -> bool {
    let Some(secret) = secret else {
        return true;
    };
    let Some(provided) = headers.get(header).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Ok(provided) = hex::decode(provided.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

/// Hex HMAC-SHA256 of `body`, as expected by `hmac_signature_matches`.
pub fn sign_body(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Parse a provider amount that may be a JSON number or a decimal string
/// ("1000.00"). `None` only when the provider sent no amount at all.
pub(crate) fn parse_amount(value: &serde_json::Value) -> Option<ReportedAmount> {
    let whole = match value {
        serde_json::Value::Null => return None,
        serde_json::Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        serde_json::Value::String(s) => parse_whole_decimal(s.trim()),
        _ => None,
    };
    Some(match whole {
        Some(amount) => ReportedAmount::Whole(amount),
        None => ReportedAmount::Unparsed(value.to_string()),
    })
}

/// "1000", "1000.00" -> 1000. Any non-zero fraction is rejected.
fn parse_whole_decimal(s: &str) -> Option<i64> {
    let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
    if !fraction.bytes().all(|b| b == b'0') {
        return None;
    }
    whole.parse().ok()
}
