//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, Response},
};
use rusqlite::Connection;
use tempfile::TempDir;

use fastnet::db::{AppState, create_pool, init_db, queries};
use fastnet::error::{AppError, Result};
use fastnet::hotspot::{AccessProvisioner, HotspotUser, RouterError};
use fastnet::models::{CreatePackage, CreatePayment, Package, Payment, Voucher};
use fastnet::payments::{
    ChargeRequest, DemoGateway, InitiatedCharge, PaymentGateway, ProviderStatus, ReportedAmount,
    StatusReport, WebhookEvent,
};

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const ADMIN_KEY: &str = "test-admin-key";

/// What the stub provider answers to initiate / status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubReply {
    Pending,
    Successful,
    Failed,
    /// Network failure / timeout
    Unreachable,
}

/// Scriptable payment provider. Webhooks use the demo format
/// (`{tx_ref, status, amount}`) signed with `verif-hash: WEBHOOK_SECRET`.
pub struct StubGateway {
    reply: Mutex<StubReply>,
    reported_amount: Mutex<Option<i64>>,
    webhooks: DemoGateway,
    pub charges: Mutex<Vec<ChargeRequest>>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self {
            reply: Mutex::new(StubReply::Pending),
            reported_amount: Mutex::new(None),
            webhooks: DemoGateway::new(Some(WEBHOOK_SECRET.to_string())),
            charges: Mutex::new(Vec::new()),
        }
    }

    pub fn set_reply(&self, reply: StubReply) {
        *self.reply.lock().unwrap() = reply;
    }

    /// Amount the status query reports alongside its status.
    pub fn set_reported_amount(&self, amount: Option<i64>) {
        *self.reported_amount.lock().unwrap() = amount;
    }

    fn reply(&self) -> StubReply {
        *self.reply.lock().unwrap()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn initiate(&self, charge: &ChargeRequest) -> Result<InitiatedCharge> {
        self.charges.lock().unwrap().push(charge.clone());
        match self.reply() {
            StubReply::Unreachable => Err(AppError::Provider("stub unreachable".into())),
            StubReply::Failed => Ok(InitiatedCharge {
                provider_ref: None,
                status: ProviderStatus::Failed,
                message: Some("Insufficient balance".into()),
            }),
            _ => Ok(InitiatedCharge {
                provider_ref: Some(format!("STUB-{}", charge.reference)),
                status: ProviderStatus::Pending,
                message: None,
            }),
        }
    }

    async fn query_status(&self, _reference: &str) -> Result<StatusReport> {
        let status = match self.reply() {
            StubReply::Unreachable => return Err(AppError::Provider("stub unreachable".into())),
            StubReply::Pending => ProviderStatus::Pending,
            StubReply::Successful => ProviderStatus::Successful,
            StubReply::Failed => ProviderStatus::Failed,
        };
        Ok(StatusReport {
            status,
            provider_ref: Some("PROVIDER-TX-1".into()),
            amount: self.reported_amount.lock().unwrap().map(ReportedAmount::Whole),
        })
    }

    fn verify_signature(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        self.webhooks.verify_signature(headers, body)
    }

    fn parse_webhook(&self, body: &[u8]) -> Result<Option<WebhookEvent>> {
        self.webhooks.parse_webhook(body)
    }
}

/// Router double that records every call and can be switched offline.
#[derive(Default)]
pub struct RecordingRouter {
    pub created: Mutex<Vec<HotspotUser>>,
    pub removed: Mutex<Vec<String>>,
    pub disconnected: Mutex<Vec<String>>,
    offline: Mutex<bool>,
}

impl RecordingRouter {
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    fn check(&self) -> std::result::Result<(), RouterError> {
        if *self.offline.lock().unwrap() {
            return Err(RouterError::Rejected {
                status: 503,
                body: "router offline".into(),
            });
        }
        Ok(())
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

#[async_trait]
impl AccessProvisioner for RecordingRouter {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn create_user(&self, user: &HotspotUser) -> std::result::Result<(), RouterError> {
        self.check()?;
        self.created.lock().unwrap().push(user.clone());
        Ok(())
    }

    async fn remove_user(&self, username: &str) -> std::result::Result<(), RouterError> {
        self.check()?;
        self.removed.lock().unwrap().push(username.to_string());
        Ok(())
    }

    async fn disconnect(&self, mac_address: &str) -> std::result::Result<(), RouterError> {
        self.check()?;
        self.disconnected.lock().unwrap().push(mac_address.to_string());
        Ok(())
    }
}

/// App state over a throwaway on-disk database. Keep the struct alive for
/// the whole test; dropping it deletes the database.
pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<StubGateway>,
    pub router: Arc<RecordingRouter>,
    _dir: TempDir,
}

impl TestApp {
    pub fn conn(&self) -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        self.state.db.get().unwrap()
    }

    pub fn app(&self) -> Router {
        fastnet::app(self.state.clone())
    }
}

pub fn create_test_app() -> TestApp {
    create_test_app_with_admin(Some(ADMIN_KEY))
}

pub fn create_test_app_with_admin(admin_key: Option<&str>) -> TestApp {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fastnet-test.db");
    let pool = create_pool(path.to_str().unwrap()).unwrap();
    init_db(&pool.get().unwrap()).unwrap();

    let gateway = Arc::new(StubGateway::new());
    let router = Arc::new(RecordingRouter::default());

    let state = AppState {
        db: pool,
        gateway: gateway.clone(),
        router: router.clone(),
        username_prefix: "FASTNET".to_string(),
        currency: "UGX".to_string(),
        admin_api_key: admin_key.map(str::to_string),
    };

    TestApp {
        state,
        gateway,
        router,
        _dir: dir,
    }
}

pub fn create_test_package(conn: &Connection, name: &str, duration_hours: i64, price: i64) -> Package {
    queries::create_package(
        conn,
        &CreatePackage {
            name: name.to_string(),
            description: None,
            duration_hours,
            price,
        },
    )
    .unwrap()
}

pub fn create_test_payment(conn: &Connection, package: &Package, phone: &str) -> Payment {
    queries::create_payment(
        conn,
        &CreatePayment {
            tx_ref: uuid::Uuid::new_v4().to_string(),
            phone: phone.to_string(),
            amount: package.price,
            package_id: package.id,
            mac_address: Some("AA:BB:CC:DD:EE:01".to_string()),
            ip_address: Some("10.5.50.10".to_string()),
        },
    )
    .unwrap()
}

pub fn create_test_voucher(conn: &Connection, code: &str, package: &Package) -> Voucher {
    queries::create_voucher(conn, code, package.id).unwrap()
}

pub fn webhook_request(body: &str, secret: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("verif-hash", secret);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn admin_request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", ADMIN_KEY));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
