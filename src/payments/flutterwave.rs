use async_trait::async_trait;
use axum::http::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::{
    ChargeRequest, InitiatedCharge, PaymentGateway, ProviderStatus, StatusReport, WebhookEvent,
    format_phone_number, parse_amount, shared_secret_matches, transport_error,
};

const PROVIDER: &str = "Flutterwave";
const SIGNATURE_HEADER: &str = "verif-hash";
const CHARGE_COMPLETED: &str = "charge.completed";

#[derive(Debug, Serialize)]
struct MobileMoneyChargeRequest<'a> {
    phone_number: String,
    network: &'a str,
    amount: i64,
    currency: &'a str,
    email: &'a str,
    tx_ref: &'a str,
}

#[derive(Debug, Deserialize)]
struct FlutterwaveEnvelope<T> {
    status: String,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ChargeData {
    #[serde(default)]
    flw_ref: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    status: String,
    #[serde(default)]
    flw_ref: Option<String>,
    #[serde(default)]
    amount: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct FlutterwaveWebhook {
    pub event: String,
    pub data: FlutterwaveWebhookData,
}

#[derive(Debug, Deserialize)]
pub struct FlutterwaveWebhookData {
    pub tx_ref: String,
    #[serde(default)]
    pub flw_ref: Option<String>,
    pub status: String,
    #[serde(default)]
    pub amount: serde_json::Value,
}

/// Flutterwave v3 mobile money (Uganda).
#[derive(Debug, Clone)]
pub struct FlutterwaveClient {
    client: Client,
    base_url: String,
    secret_key: String,
    webhook_secret: Option<String>,
}

impl FlutterwaveClient {
    pub fn new(client: Client, base_url: &str, secret_key: &str, webhook_secret: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            webhook_secret,
        }
    }
}

#[async_trait]
impl PaymentGateway for FlutterwaveClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn initiate(&self, charge: &ChargeRequest) -> Result<InitiatedCharge> {
        let phone_number = format_phone_number(&charge.phone);
        let email = format!("{}@customers.fastnet.ug", phone_number);
        let request = MobileMoneyChargeRequest {
            phone_number,
            network: charge.network.as_ref(),
            amount: charge.amount,
            currency: &charge.currency,
            email: &email,
            tx_ref: &charge.reference,
        };

        let response = self
            .client
            .post(format!("{}/v3/charges", self.base_url))
            .query(&[("type", "mobile_money_uganda")])
            .bearer_auth(&self.secret_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AppError::Provider(format!("{} returned {}", PROVIDER, status)));
        }

        let body: FlutterwaveEnvelope<ChargeData> = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to parse {} response: {}", PROVIDER, e)))?;

        if !status.is_success() || body.status != "success" {
            return Ok(InitiatedCharge {
                provider_ref: None,
                status: ProviderStatus::Failed,
                message: body.message,
            });
        }

        let data = body.data;
        Ok(InitiatedCharge {
            provider_ref: data.as_ref().and_then(|d| d.flw_ref.clone()),
            // The charge only becomes final once the customer approves it on the phone
            status: match data.as_ref().and_then(|d| d.status.as_deref()) {
                Some(s) if ProviderStatus::from_provider(s) == ProviderStatus::Failed => {
                    ProviderStatus::Failed
                }
                _ => ProviderStatus::Pending,
            },
            message: body.message,
        })
    }

    async fn query_status(&self, reference: &str) -> Result<StatusReport> {
        let response = self
            .client
            .get(format!("{}/v3/transactions/verify_by_reference", self.base_url))
            .query(&[("tx_ref", reference)])
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            // No transaction recorded yet for this tx_ref
            return Ok(StatusReport::pending());
        }
        if !status.is_success() {
            return Err(AppError::Provider(format!("{} returned {}", PROVIDER, status)));
        }

        let body: FlutterwaveEnvelope<TransactionData> = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to parse {} response: {}", PROVIDER, e)))?;

        match body.data {
            Some(data) if body.status == "success" => Ok(StatusReport {
                status: ProviderStatus::from_provider(&data.status),
                provider_ref: data.flw_ref,
                amount: parse_amount(&data.amount),
            }),
            _ => Ok(StatusReport::pending()),
        }
    }

    fn verify_signature(&self, headers: &HeaderMap, _body: &[u8]) -> bool {
        shared_secret_matches(headers, SIGNATURE_HEADER, self.webhook_secret.as_deref())
    }

    fn parse_webhook(&self, body: &[u8]) -> Result<Option<WebhookEvent>> {
        let event: FlutterwaveWebhook = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

        if event.event != CHARGE_COMPLETED {
            return Ok(None);
        }

        Ok(Some(WebhookEvent {
            reference: event.data.tx_ref,
            status: ProviderStatus::from_provider(&event.data.status),
            amount: parse_amount(&event.data.amount),
            provider_ref: event.data.flw_ref,
        }))
    }
}
