use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::Deserialize;

use crate::error::{AppError, Result};

use super::{
    ChargeRequest, InitiatedCharge, PaymentGateway, ProviderStatus, StatusReport, WebhookEvent,
    parse_amount, shared_secret_matches,
};

const SIGNATURE_HEADER: &str = "verif-hash";

#[derive(Debug, Deserialize)]
struct DemoWebhook {
    #[serde(alias = "depositId")]
    tx_ref: String,
    status: String,
    #[serde(default)]
    amount: serde_json::Value,
}

/// Simulated provider: every charge is accepted and reports success as soon
/// as it is polled. Lets the whole flow run without real money.
#[derive(Debug, Clone, Default)]
pub struct DemoGateway {
    webhook_secret: Option<String>,
}

impl DemoGateway {
    pub fn new(webhook_secret: Option<String>) -> Self {
        Self { webhook_secret }
    }
}

#[async_trait]
impl PaymentGateway for DemoGateway {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn initiate(&self, charge: &ChargeRequest) -> Result<InitiatedCharge> {
        tracing::info!(
            "[demo] charge {} of {} {} to {}",
            charge.reference,
            charge.amount,
            charge.currency,
            charge.phone
        );
        Ok(InitiatedCharge {
            provider_ref: Some(format!("DEMO-{}", charge.reference)),
            status: ProviderStatus::Pending,
            message: Some("Demo mode: payment will be approved automatically".to_string()),
        })
    }

    async fn query_status(&self, reference: &str) -> Result<StatusReport> {
        Ok(StatusReport {
            status: ProviderStatus::Successful,
            provider_ref: Some(format!("DEMO-{}", reference)),
            amount: None,
        })
    }

    fn verify_signature(&self, headers: &HeaderMap, _body: &[u8]) -> bool {
        shared_secret_matches(headers, SIGNATURE_HEADER, self.webhook_secret.as_deref())
    }

    fn parse_webhook(&self, body: &[u8]) -> Result<Option<WebhookEvent>> {
        let event: DemoWebhook = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

        Ok(Some(WebhookEvent {
            reference: event.tx_ref,
            status: ProviderStatus::from_provider(&event.status),
            amount: parse_amount(&event.amount),
            provider_ref: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::Network;

    #[tokio::test]
    async fn demo_charges_settle_on_poll() {
        let gateway = DemoGateway::new(None);
        let charge = ChargeRequest {
            phone: "0770000000".into(),
            amount: 1000,
            currency: "UGX".into(),
            reference: "tx-1".into(),
            network: Network::Mtn,
        };

        let initiated = gateway.initiate(&charge).await.unwrap();
        assert_eq!(initiated.status, ProviderStatus::Pending);
        assert_eq!(initiated.provider_ref.as_deref(), Some("DEMO-tx-1"));

        let report = gateway.query_status("tx-1").await.unwrap();
        assert_eq!(report.status, ProviderStatus::Successful);
    }

    #[test]
    fn accepts_deposit_id_alias() {
        let gateway = DemoGateway::new(None);
        let event = gateway
            .parse_webhook(br#"{"depositId":"tx-9","status":"FAILED"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event.reference, "tx-9");
        assert_eq!(event.status, ProviderStatus::Failed);
    }
}
