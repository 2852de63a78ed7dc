//! End-to-end tests for the payment/voucher to access pipeline.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::*;

use fastnet::activation::{self, WebhookOutcome};
use fastnet::db::queries;
use fastnet::error::AppError;
use fastnet::models::PaymentStatus;

fn completed_webhook(tx_ref: &str, amount: i64) -> String {
    json!({ "tx_ref": tx_ref, "status": "COMPLETED", "amount": amount }).to_string()
}

// ============ Webhooks ============

#[tokio::test]
async fn test_duplicate_webhook_creates_one_session() {
    let t = create_test_app();
    let payment = {
        let conn = t.conn();
        let package = create_test_package(&conn, "1 DAY", 24, 1000);
        create_test_payment(&conn, &package, "256770000000")
    };
    let body = completed_webhook(&payment.tx_ref, 1000);

    let first = t.app().oneshot(webhook_request(&body, Some(WEBHOOK_SECRET))).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(body_text(first).await, "Payment processed");

    let second = t.app().oneshot(webhook_request(&body, Some(WEBHOOK_SECRET))).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_text(second).await, "Already processed");

    let conn = t.conn();
    let stored = queries::get_payment_by_tx_ref(&conn, &payment.tx_ref).unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Successful);
    assert_eq!(queries::count_sessions_for_payment(&conn, payment.id).unwrap(), 1);
    assert_eq!(t.router.created_count(), 1);
}

#[tokio::test]
async fn test_webhook_with_wrong_signature_is_rejected_without_mutation() {
    let t = create_test_app();
    let payment = {
        let conn = t.conn();
        let package = create_test_package(&conn, "1 DAY", 24, 1000);
        create_test_payment(&conn, &package, "256770000000")
    };
    let body = completed_webhook(&payment.tx_ref, 1000);

    let wrong = t.app().oneshot(webhook_request(&body, Some("not-the-secret"))).await.unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let missing = t.app().oneshot(webhook_request(&body, None)).await.unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let conn = t.conn();
    let stored = queries::get_payment_by_tx_ref(&conn, &payment.tx_ref).unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert_eq!(stored.paid_at, None);
    assert_eq!(stored.expires_at, None);
    assert_eq!(queries::count_sessions_for_payment(&conn, payment.id).unwrap(), 0);
    assert_eq!(t.router.created_count(), 0);
}

#[tokio::test]
async fn test_webhook_for_unknown_tx_ref_is_acknowledged() {
    let t = create_test_app();
    let body = completed_webhook("not-one-of-ours", 1000);

    let response = t.app().oneshot(webhook_request(&body, Some(WEBHOOK_SECRET))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Payment not found");
}

#[tokio::test]
async fn test_malformed_webhook_is_bad_request() {
    let t = create_test_app();
    let response = t
        .app()
        .oneshot(webhook_request("{not json", Some(WEBHOOK_SECRET)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_webhook_marks_payment_failed_and_never_activates() {
    let t = create_test_app();
    let payment = {
        let conn = t.conn();
        let package = create_test_package(&conn, "1 DAY", 24, 1000);
        create_test_payment(&conn, &package, "256770000000")
    };

    let failed = json!({ "tx_ref": payment.tx_ref, "status": "FAILED" }).to_string();
    let outcome = activation::handle_webhook(&t.state, &signed_headers(), failed.as_bytes())
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::MarkedFailed);

    // A late success report cannot resurrect a failed payment
    let late = completed_webhook(&payment.tx_ref, 1000);
    let outcome = activation::handle_webhook(&t.state, &signed_headers(), late.as_bytes())
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::AlreadyProcessed);

    let conn = t.conn();
    let stored = queries::get_payment_by_tx_ref(&conn, &payment.tx_ref).unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Failed);
    assert_eq!(queries::count_sessions_for_payment(&conn, payment.id).unwrap(), 0);
}

#[tokio::test]
async fn test_webhook_amount_mismatch_is_not_activated() {
    let t = create_test_app();
    let payment = {
        let conn = t.conn();
        let package = create_test_package(&conn, "WEEKLY", 168, 6000);
        create_test_payment(&conn, &package, "256770000000")
    };

    let body = completed_webhook(&payment.tx_ref, 100);
    let outcome = activation::handle_webhook(&t.state, &signed_headers(), body.as_bytes())
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::AmountMismatch);

    let conn = t.conn();
    let stored = queries::get_payment_by_tx_ref(&conn, &payment.tx_ref).unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_activation_expiry_matches_package_duration_exactly() {
    let t = create_test_app();
    let payment = {
        let conn = t.conn();
        let package = create_test_package(&conn, "3 DAYS", 72, 2500);
        create_test_payment(&conn, &package, "256781234567")
    };

    let body = completed_webhook(&payment.tx_ref, 2500);
    activation::handle_webhook(&t.state, &signed_headers(), body.as_bytes())
        .await
        .unwrap();

    let conn = t.conn();
    let stored = queries::get_payment_by_tx_ref(&conn, &payment.tx_ref).unwrap().unwrap();
    let paid_at = stored.paid_at.unwrap();
    assert_eq!(stored.expires_at.unwrap() - paid_at, 72 * 3600);

    let session = queries::get_session_by_payment(&conn, payment.id).unwrap().unwrap();
    assert_eq!(session.started_at, paid_at);
    assert_eq!(session.expires_at, stored.expires_at.unwrap());
    assert!(session.provisioned);

    let created = t.router.created.lock().unwrap();
    assert_eq!(created[0].uptime_limit, "3d");
    assert_eq!(created[0].mac_address.as_deref(), Some("AA:BB:CC:DD:EE:01"));
}

fn signed_headers() -> axum::http::HeaderMap {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert("verif-hash", WEBHOOK_SECRET.parse().unwrap());
    headers
}

// ============ Status polling ============

#[tokio::test]
async fn test_poll_reports_pending_when_provider_is_unreachable() {
    let t = create_test_app();
    let payment = {
        let conn = t.conn();
        let package = create_test_package(&conn, "1 DAY", 24, 1000);
        create_test_payment(&conn, &package, "256770000000")
    };
    t.gateway.set_reply(StubReply::Unreachable);

    let response = t
        .app()
        .oneshot(
            axum::http::Request::builder()
                .uri(format!("/payments/status?tx_ref={}", payment.tx_ref))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "pending");
    assert!(body.get("session").is_none());

    let conn = t.conn();
    let stored = queries::get_payment_by_tx_ref(&conn, &payment.tx_ref).unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_poll_settles_payment_and_returns_cached_credentials() {
    let t = create_test_app();
    let payment = {
        let conn = t.conn();
        let package = create_test_package(&conn, "1 DAY", 24, 1000);
        create_test_payment(&conn, &package, "256770000000")
    };
    t.gateway.set_reply(StubReply::Successful);

    let first = activation::poll_status(&t.state, &payment.tx_ref).await.unwrap();
    assert_eq!(first.status, PaymentStatus::Successful);
    let credentials = first.session.unwrap();

    // Provider now unreachable: the settled answer comes from the ledger
    t.gateway.set_reply(StubReply::Unreachable);
    let second = activation::poll_status(&t.state, &payment.tx_ref).await.unwrap();
    assert_eq!(second.status, PaymentStatus::Successful);
    assert_eq!(second.session.unwrap(), credentials);
    assert_eq!(t.router.created_count(), 1);

    let conn = t.conn();
    let stored = queries::get_payment_by_tx_ref(&conn, &payment.tx_ref).unwrap().unwrap();
    assert_eq!(stored.provider_ref.as_deref(), Some("PROVIDER-TX-1"));
}

#[tokio::test]
async fn test_poll_marks_failed_payment() {
    let t = create_test_app();
    let payment = {
        let conn = t.conn();
        let package = create_test_package(&conn, "1 DAY", 24, 1000);
        create_test_payment(&conn, &package, "256770000000")
    };
    t.gateway.set_reply(StubReply::Failed);

    let outcome = activation::poll_status(&t.state, &payment.tx_ref).await.unwrap();
    assert_eq!(outcome.status, PaymentStatus::Failed);
    assert!(outcome.session.is_none());
}

#[tokio::test]
async fn test_poll_never_activates_underpaid_charge() {
    let t = create_test_app();
    let payment = {
        let conn = t.conn();
        let package = create_test_package(&conn, "WEEKLY", 168, 6000);
        create_test_payment(&conn, &package, "256770000000")
    };

    let body = completed_webhook(&payment.tx_ref, 100);
    let outcome = activation::handle_webhook(&t.state, &signed_headers(), body.as_bytes())
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::AmountMismatch);

    // The provider's own status lookup reports the same short amount
    t.gateway.set_reply(StubReply::Successful);
    t.gateway.set_reported_amount(Some(100));
    let outcome = activation::poll_status(&t.state, &payment.tx_ref).await.unwrap();
    assert_eq!(outcome.status, PaymentStatus::Pending);
    assert!(outcome.session.is_none());
    assert_eq!(t.router.created_count(), 0);

    let conn = t.conn();
    let stored = queries::get_payment_by_tx_ref(&conn, &payment.tx_ref).unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert_eq!(queries::count_sessions_for_payment(&conn, payment.id).unwrap(), 0);
}

#[tokio::test]
async fn test_poll_with_matching_amount_activates() {
    let t = create_test_app();
    let payment = {
        let conn = t.conn();
        let package = create_test_package(&conn, "WEEKLY", 168, 6000);
        create_test_payment(&conn, &package, "256770000000")
    };
    t.gateway.set_reply(StubReply::Successful);
    t.gateway.set_reported_amount(Some(6000));

    let outcome = activation::poll_status(&t.state, &payment.tx_ref).await.unwrap();
    assert_eq!(outcome.status, PaymentStatus::Successful);
    assert!(outcome.session.is_some());
}

#[tokio::test]
async fn test_poll_waits_for_session_of_paid_payment() {
    let t = create_test_app();
    let payment = {
        let conn = t.conn();
        let package = create_test_package(&conn, "1 DAY", 24, 1000);
        let payment = create_test_payment(&conn, &package, "256770000000");
        // A concurrent webhook has flipped the status but not written the session yet
        let now = queries::now();
        queries::try_mark_payment_successful(&conn, &payment.tx_ref, None, now, now + 86400).unwrap();
        payment
    };
    t.gateway.set_reply(StubReply::Successful);

    let response = t
        .app()
        .oneshot(
            axum::http::Request::builder()
                .uri(format!("/payments/status?tx_ref={}", payment.tx_ref))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "pending");
    assert!(body.get("session").is_none());
    assert_eq!(t.router.created_count(), 0);
}

#[tokio::test]
async fn test_poll_unknown_tx_ref_is_not_found() {
    let t = create_test_app();
    let err = activation::poll_status(&t.state, "missing").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_webhook_racing_poll_activates_once() {
    let t = create_test_app();
    let payment = {
        let conn = t.conn();
        let package = create_test_package(&conn, "1 DAY", 24, 1000);
        create_test_payment(&conn, &package, "256770000000")
    };
    t.gateway.set_reply(StubReply::Successful);

    let webhook_state = t.state.clone();
    let body = completed_webhook(&payment.tx_ref, 1000);
    let webhook = tokio::spawn(async move {
        activation::handle_webhook(&webhook_state, &signed_headers(), body.as_bytes()).await
    });
    let poll_state = t.state.clone();
    let tx_ref = payment.tx_ref.clone();
    let poll = tokio::spawn(async move { activation::poll_status(&poll_state, &tx_ref).await });

    webhook.await.unwrap().unwrap();
    poll.await.unwrap().unwrap();

    let conn = t.conn();
    assert_eq!(queries::count_sessions_for_payment(&conn, payment.id).unwrap(), 1);
    assert_eq!(t.router.created_count(), 1);
}

// ============ Full flow ============

#[tokio::test]
async fn test_initiate_webhook_then_poll_returns_credentials() {
    let t = create_test_app();
    let package = {
        let conn = t.conn();
        create_test_package(&conn, "1 DAY", 24, 1000)
    };

    let response = t
        .app()
        .oneshot(json_request(
            "POST",
            "/payments/initiate",
            json!({ "phone": "0770000000", "package_id": package.id, "mac_address": "AA:BB:CC:DD:EE:FF" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let initiated = body_json(response).await;
    assert_eq!(initiated["network"], "MTN");
    assert_eq!(initiated["amount"], 1000);
    assert_eq!(initiated["status"], "pending");
    let tx_ref = initiated["tx_ref"].as_str().unwrap().to_string();

    {
        let charges = t.gateway.charges.lock().unwrap();
        assert_eq!(charges.len(), 1);
        assert_eq!(charges[0].reference, tx_ref);
        assert_eq!(charges[0].currency, "UGX");
    }

    let webhook = t
        .app()
        .oneshot(webhook_request(&completed_webhook(&tx_ref, 1000), Some(WEBHOOK_SECRET)))
        .await
        .unwrap();
    assert_eq!(webhook.status(), StatusCode::OK);

    let response = t
        .app()
        .oneshot(
            axum::http::Request::builder()
                .uri(format!("/payments/status?tx_ref={}", tx_ref))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "successful");
    let username = body["session"]["username"].as_str().unwrap();
    assert!(username.starts_with("FASTNET-0000"), "got {}", username);
    assert_eq!(body["session"]["package_name"], "1 DAY");
    assert_eq!(body["session"]["password"].as_str().unwrap().len(), 8);

    let conn = t.conn();
    let payment = queries::get_payment_by_tx_ref(&conn, &tx_ref).unwrap().unwrap();
    assert_eq!(payment.phone, "256770000000");
    assert_eq!(
        body["session"]["expires_at"].as_i64().unwrap(),
        payment.paid_at.unwrap() + 24 * 3600
    );
}

#[tokio::test]
async fn test_initiate_rejects_unsupported_network() {
    let t = create_test_app();
    let package = {
        let conn = t.conn();
        create_test_package(&conn, "1 DAY", 24, 1000)
    };

    let response = t
        .app()
        .oneshot(json_request(
            "POST",
            "/payments/initiate",
            json!({ "phone": "0711000000", "package_id": package.id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(t.gateway.charges.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_initiate_rejects_inactive_package() {
    let t = create_test_app();
    let package = {
        let conn = t.conn();
        let package = create_test_package(&conn, "OLD", 24, 1000);
        queries::deactivate_package(&conn, package.id).unwrap();
        package
    };

    let response = t
        .app()
        .oneshot(json_request(
            "POST",
            "/payments/initiate",
            json!({ "phone": "0770000000", "package_id": package.id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid package selected");
}

#[tokio::test]
async fn test_initiate_provider_down_keeps_payment_pending() {
    let t = create_test_app();
    let package = {
        let conn = t.conn();
        create_test_package(&conn, "1 DAY", 24, 1000)
    };
    t.gateway.set_reply(StubReply::Unreachable);

    let response = t
        .app()
        .oneshot(json_request(
            "POST",
            "/payments/initiate",
            json!({ "phone": "0750000000", "package_id": package.id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let conn = t.conn();
    let payments = queries::list_payments(&conn, None, 10).unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].payment.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_initiate_rejected_charge_marks_payment_failed() {
    let t = create_test_app();
    let package = {
        let conn = t.conn();
        create_test_package(&conn, "1 DAY", 24, 1000)
    };
    t.gateway.set_reply(StubReply::Failed);

    let response = t
        .app()
        .oneshot(json_request(
            "POST",
            "/payments/initiate",
            json!({ "phone": "0700000000", "package_id": package.id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Insufficient balance");

    let conn = t.conn();
    let payments = queries::list_payments(&conn, Some(PaymentStatus::Failed), 10).unwrap();
    assert_eq!(payments.len(), 1);
}

// ============ Vouchers ============

#[tokio::test]
async fn test_voucher_redeem_is_case_insensitive_and_single_use() {
    let t = create_test_app();
    let voucher = {
        let conn = t.conn();
        let package = create_test_package(&conn, "WEEKLY", 168, 6000);
        create_test_voucher(&conn, "ABCD2345", &package)
    };

    let first = t
        .app()
        .oneshot(json_request(
            "POST",
            "/vouchers/redeem",
            json!({ "code": "abcd2345", "mac_address": "AA:BB:CC:DD:EE:02" }),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let body = body_json(first).await;
    assert_eq!(body["username"], format!("FASTNET-V2345-{}", voucher.id));
    assert_eq!(body["package_name"], "WEEKLY");

    let second = t
        .app()
        .oneshot(json_request(
            "POST",
            "/vouchers/redeem",
            json!({ "code": "ABCD2345", "mac_address": "AA:BB:CC:DD:EE:03" }),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let conn = t.conn();
    let voucher = queries::get_voucher_by_code(&conn, "ABCD2345").unwrap().unwrap();
    assert!(voucher.is_used);
    assert_eq!(voucher.used_by.as_deref(), Some("AA:BB:CC:DD:EE:02"));

    let session = queries::get_session_by_voucher(&conn, voucher.id).unwrap().unwrap();
    assert_eq!(session.expires_at - session.started_at, 168 * 3600);
    assert_eq!(t.router.created.lock().unwrap()[0].uptime_limit, "7d");
}

#[tokio::test]
async fn test_unknown_voucher_is_not_found() {
    let t = create_test_app();
    let response = t
        .app()
        .oneshot(json_request("POST", "/vouchers/redeem", json!({ "code": "ZZZZ9999" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_voucher_redemptions_have_one_winner() {
    let t = create_test_app();
    let voucher = {
        let conn = t.conn();
        let package = create_test_package(&conn, "1 DAY", 24, 1000);
        create_test_voucher(&conn, "RACE2345", &package)
    };

    let handles: Vec<_> = (0..2)
        .map(|i| {
            let state = t.state.clone();
            tokio::spawn(async move {
                let mac = format!("AA:BB:CC:DD:EE:1{}", i);
                activation::redeem_voucher(&state, "race2345", Some(mac.as_str()), None).await
            })
        })
        .collect();

    let mut wins = 0;
    let mut already_used = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(AppError::AlreadyUsed(_)) => already_used += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(already_used, 1);

    let conn = t.conn();
    assert!(queries::get_session_by_voucher(&conn, voucher.id).unwrap().is_some());
    assert_eq!(t.router.created_count(), 1);
}

#[tokio::test]
async fn test_router_failure_still_returns_credentials_and_consumes_voucher() {
    let t = create_test_app();
    let voucher = {
        let conn = t.conn();
        let package = create_test_package(&conn, "1 DAY", 24, 1000);
        create_test_voucher(&conn, "FAIL2345", &package)
    };
    t.router.set_offline(true);

    let credentials = activation::redeem_voucher(&t.state, "FAIL2345", Some("AA:BB:CC:DD:EE:04"), None)
        .await
        .unwrap();
    assert_eq!(credentials.username, format!("FASTNET-V2345-{}", voucher.id));
    assert_eq!(credentials.password.len(), 8);

    let conn = t.conn();
    let stored = queries::get_voucher_by_code(&conn, "FAIL2345").unwrap().unwrap();
    assert!(stored.is_used);

    let session = queries::get_session_by_voucher(&conn, voucher.id).unwrap().unwrap();
    assert!(!session.provisioned);

    let report = activation::reconciliation_report(&t.state).unwrap();
    assert_eq!(report.unprovisioned_sessions.len(), 1);
    assert_eq!(report.unprovisioned_sessions[0].id, session.id);
}

#[tokio::test]
async fn test_voucher_without_mac_is_not_bound_to_a_device() {
    let t = create_test_app();
    {
        let conn = t.conn();
        let package = create_test_package(&conn, "HALF DAY", 12, 500);
        create_test_voucher(&conn, "NOMAC234", &package);
    }

    activation::redeem_voucher(&t.state, " nomac234 ", None, None).await.unwrap();

    let created = t.router.created.lock().unwrap();
    assert_eq!(created[0].mac_address, None);
    assert_eq!(created[0].uptime_limit, "12h");
}
