use async_trait::async_trait;
use axum::http::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::{
    ChargeRequest, InitiatedCharge, Network, PaymentGateway, ProviderStatus, StatusReport,
    WebhookEvent, format_phone_number, hmac_signature_matches, parse_amount, transport_error,
};

const PROVIDER: &str = "pawaPay";
const SIGNATURE_HEADER: &str = "x-signature";

fn provider_code(network: Network) -> &'static str {
    match network {
        Network::Mtn => "MTN_MOMO_UGA",
        Network::Airtel => "AIRTEL_UGA",
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DepositRequest<'a> {
    deposit_id: &'a str,
    amount: String,
    currency: &'a str,
    payer: Payer,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Payer {
    #[serde(rename = "type")]
    kind: &'static str,
    account_details: AccountDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountDetails {
    phone_number: String,
    provider: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepositResponse {
    status: String,
    #[serde(default)]
    failure_reason: Option<FailureReason>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FailureReason {
    #[serde(default)]
    failure_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DepositLookup {
    status: String,
    #[serde(default)]
    data: Option<DepositData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepositData {
    status: String,
    #[serde(default)]
    provider_transaction_id: Option<String>,
    #[serde(default)]
    amount: serde_json::Value,
}

/// Deposit callback body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PawaPayCallback {
    pub deposit_id: String,
    pub status: String,
    #[serde(default)]
    pub amount: serde_json::Value,
    #[serde(default)]
    pub provider_transaction_id: Option<String>,
}

/// pawaPay v2 deposits. Our tx_ref (a UUID) is used as the depositId.
#[derive(Debug, Clone)]
pub struct PawaPayClient {
    client: Client,
    base_url: String,
    api_token: String,
    webhook_secret: Option<String>,
}

impl PawaPayClient {
    pub fn new(client: Client, base_url: &str, api_token: &str, webhook_secret: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            webhook_secret,
        }
    }
}

#[async_trait]
impl PaymentGateway for PawaPayClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn initiate(&self, charge: &ChargeRequest) -> Result<InitiatedCharge> {
        let request = DepositRequest {
            deposit_id: &charge.reference,
            amount: charge.amount.to_string(),
            currency: &charge.currency,
            payer: Payer {
                kind: "MMO",
                account_details: AccountDetails {
                    phone_number: format_phone_number(&charge.phone),
                    provider: provider_code(charge.network),
                },
            },
        };

        let response = self
            .client
            .post(format!("{}/v2/deposits", self.base_url))
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AppError::Provider(format!("{} returned {}", PROVIDER, status)));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!("{} rejected deposit {}: {} {}", PROVIDER, charge.reference, status, text);
            return Ok(InitiatedCharge {
                provider_ref: None,
                status: ProviderStatus::Failed,
                message: Some("Payment request was rejected".to_string()),
            });
        }

        let body: DepositResponse = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to parse {} response: {}", PROVIDER, e)))?;

        match body.status.as_str() {
            "ACCEPTED" | "DUPLICATE_IGNORED" => Ok(InitiatedCharge {
                provider_ref: Some(charge.reference.clone()),
                status: ProviderStatus::Pending,
                message: None,
            }),
            _ => Ok(InitiatedCharge {
                provider_ref: None,
                status: ProviderStatus::Failed,
                message: body.failure_reason.and_then(|r| r.failure_message),
            }),
        }
    }

    async fn query_status(&self, reference: &str) -> Result<StatusReport> {
        let response = self
            .client
            .get(format!("{}/v2/deposits/{}", self.base_url, reference))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Provider(format!("{} returned {}", PROVIDER, status)));
        }

        let body: DepositLookup = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to parse {} response: {}", PROVIDER, e)))?;

        match (body.status.as_str(), body.data) {
            ("FOUND", Some(data)) => Ok(StatusReport {
                status: ProviderStatus::from_provider(&data.status),
                provider_ref: data.provider_transaction_id,
                amount: parse_amount(&data.amount),
            }),
            _ => Ok(StatusReport::pending()),
        }
    }

    fn verify_signature(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        hmac_signature_matches(headers, SIGNATURE_HEADER, self.webhook_secret.as_deref(), body)
    }

    fn parse_webhook(&self, body: &[u8]) -> Result<Option<WebhookEvent>> {
        let callback: PawaPayCallback = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

        Ok(Some(WebhookEvent {
            reference: callback.deposit_id,
            status: ProviderStatus::from_provider(&callback.status),
            amount: parse_amount(&callback.amount),
            provider_ref: callback.provider_transaction_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::ReportedAmount;

    #[test]
    fn parses_deposit_callback() {
        let client = PawaPayClient::new(Client::new(), "http://localhost", "token", None);
        let body = br#"{"depositId":"d-1","status":"COMPLETED","amount":"2500.00","providerTransactionId":"MP123"}"#;

        let event = client.parse_webhook(body).unwrap().unwrap();
        assert_eq!(event.reference, "d-1");
        assert_eq!(event.status, ProviderStatus::Successful);
        assert_eq!(event.amount, Some(ReportedAmount::Whole(2500)));
        assert_eq!(event.provider_ref.as_deref(), Some("MP123"));
    }

    #[test]
    fn provider_codes() {
        assert_eq!(provider_code(Network::Mtn), "MTN_MOMO_UGA");
        assert_eq!(provider_code(Network::Airtel), "AIRTEL_UGA");
    }
}
