use axum::http::HeaderMap;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::PaymentStatus;
use crate::payments::ProviderStatus;

use super::{amount_matches, settle_failed, settle_successful};

/// How a webhook delivery was handled. Every variant is acknowledged with
/// 200 so the provider stops retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Activated,
    AlreadyProcessed,
    MarkedFailed,
    /// Unknown tx_ref: a replay or a transaction that is not ours
    NotFound,
    /// Event type or status we don't act on
    Ignored,
    AmountMismatch,
}

impl WebhookOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            WebhookOutcome::Activated => "Payment processed",
            WebhookOutcome::AlreadyProcessed => "Already processed",
            WebhookOutcome::MarkedFailed => "Payment failed",
            WebhookOutcome::NotFound => "Payment not found",
            WebhookOutcome::Ignored => "Event ignored",
            WebhookOutcome::AmountMismatch => "Amount mismatch",
        }
    }
}

/// Authenticate and apply a provider webhook.
///
/// Signature failure is the only rejection (`Unauthorized`); malformed JSON
/// is `BadRequest`. Nothing is written before both checks pass.
pub async fn handle_webhook(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<WebhookOutcome> {
    if !state.gateway.verify_signature(headers, body) {
        tracing::warn!("Rejected {} webhook: invalid signature", state.gateway.name());
        return Err(AppError::Unauthorized("Invalid webhook signature".into()));
    }

    let Some(event) = state.gateway.parse_webhook(body)? else {
        return Ok(WebhookOutcome::Ignored);
    };

    let payment = {
        let conn = state.db.get()?;
        queries::get_payment_by_tx_ref(&conn, &event.reference)?
    };
    let Some(payment) = payment else {
        tracing::info!("Webhook for unknown tx_ref {}", event.reference);
        return Ok(WebhookOutcome::NotFound);
    };

    match (payment.status, event.status) {
        (PaymentStatus::Successful, _) => Ok(WebhookOutcome::AlreadyProcessed),
        (_, ProviderStatus::Pending) => Ok(WebhookOutcome::Ignored),
        (PaymentStatus::Failed, _) => Ok(WebhookOutcome::AlreadyProcessed),
        (PaymentStatus::Pending, ProviderStatus::Successful) => {
            if !amount_matches(&payment, event.amount.as_ref()) {
                return Ok(WebhookOutcome::AmountMismatch);
            }

            match settle_successful(state, &payment, event.provider_ref.as_deref()).await? {
                Some(credentials) => {
                    tracing::info!("Activated {} for {}", credentials.username, payment.tx_ref);
                    Ok(WebhookOutcome::Activated)
                }
                None => Ok(WebhookOutcome::AlreadyProcessed),
            }
        }
        (PaymentStatus::Pending, ProviderStatus::Failed) => {
            if settle_failed(state, &payment, event.provider_ref.as_deref())? {
                Ok(WebhookOutcome::MarkedFailed)
            } else {
                Ok(WebhookOutcome::AlreadyProcessed)
            }
        }
    }
}
