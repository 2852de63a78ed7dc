use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::{CreatePayment, PaymentStatus};
use crate::payments::{ChargeRequest, Network, ProviderStatus, detect_network, format_phone_number};

#[derive(Debug, Deserialize)]
pub struct InitiatePayment {
    #[serde(default)]
    pub phone: String,
    pub package_id: i64,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitiatedPayment {
    pub tx_ref: String,
    pub network: Network,
    pub amount: i64,
    pub package_name: String,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Validate the request, record a pending payment and ask the provider to
/// push a mobile-money prompt to the customer's phone.
pub async fn initiate_payment(state: &AppState, input: InitiatePayment) -> Result<InitiatedPayment> {
    let phone = input.phone.trim();
    if phone.is_empty() {
        return Err(AppError::BadRequest("Phone number is required".into()));
    }
    let network = detect_network(phone).ok_or_else(|| {
        AppError::BadRequest("Only MTN and Airtel Uganda numbers are supported".into())
    })?;

    let tx_ref = uuid::Uuid::new_v4().to_string();

    let (payment, package) = {
        let conn = state.db.get()?;
        let package = queries::get_package_by_id(&conn, input.package_id)?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::BadRequest("Invalid package selected".into()))?;

        let payment = queries::create_payment(
            &conn,
            &CreatePayment {
                tx_ref: tx_ref.clone(),
                phone: format_phone_number(phone),
                amount: package.price,
                package_id: package.id,
                mac_address: input.mac_address.filter(|m| !m.trim().is_empty()),
                ip_address: input.ip_address.filter(|ip| !ip.trim().is_empty()),
            },
        )?;
        (payment, package)
    };

    let charge = ChargeRequest {
        phone: phone.to_string(),
        amount: payment.amount,
        currency: state.currency.clone(),
        reference: tx_ref.clone(),
        network,
    };

    // A transport error leaves the payment pending; a later poll can still settle it
    let initiated = state.gateway.initiate(&charge).await?;

    let conn = state.db.get()?;
    if initiated.status == ProviderStatus::Failed {
        queries::try_mark_payment_failed(&conn, &tx_ref, initiated.provider_ref.as_deref())?;
        tracing::warn!("{} rejected charge {}", state.gateway.name(), tx_ref);
        return Err(AppError::BadRequest(
            initiated
                .message
                .unwrap_or_else(|| "Payment request was rejected".to_string()),
        ));
    }

    if let Some(provider_ref) = initiated.provider_ref.as_deref() {
        queries::set_payment_provider_ref(&conn, &tx_ref, provider_ref)?;
    }

    tracing::info!(
        "Initiated {} charge {} for {} ({} {})",
        state.gateway.name(),
        tx_ref,
        package.name,
        payment.amount,
        state.currency
    );

    Ok(InitiatedPayment {
        tx_ref,
        network,
        amount: payment.amount,
        package_name: package.name,
        status: PaymentStatus::Pending,
        message: initiated.message,
    })
}
