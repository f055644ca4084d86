//! Shared harness for the integration suites: a temp-file SQLite service
//! with a logging notifier and helpers to seed users and wallets.

#![allow(dead_code)]

use axum::http::StatusCode;
use stakearena::auth::make_token;
use stakearena::config::Config;
use stakearena::db::init_db;
use stakearena::domain::{Decimal, LedgerRecord, LedgerType, Role, UserId};
use stakearena::engine::wallet;
use stakearena::notify::{LoggingNotifier, Notifier};
use stakearena::{api, Repository};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret";

/// Captures notifications so tests can assert on delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user: &UserId, title: &str, _body: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((user.as_str().to_string(), title.to_string()));
    }
}

impl RecordingNotifier {
    pub fn titles_for(&self, user: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == user)
            .map(|(_, title)| title.clone())
            .collect()
    }
}

pub struct TestApp {
    pub app: axum::Router,
    pub repo: Arc<Repository>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Config,
    pub _temp: TempDir,
}

pub async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let config = Config {
        port: 0,
        database_path: db_path,
        jwt_secret: JWT_SECRET.to_string(),
        notify_webhook_url: None,
        bonus_utc_offset_minutes: 330,
        pairing_rescan_secs: 3600,
    };

    let notifier: Arc<dyn Notifier> = Arc::new(LoggingNotifier);
    let state = api::AppState::new(repo.clone(), config.clone(), notifier.clone());
    let app = api::create_router(state);

    TestApp {
        app,
        repo,
        notifier,
        config,
        _temp: temp_dir,
    }
}

pub fn token(user: &str, role: Role) -> String {
    make_token(JWT_SECRET, &UserId::new(user), role, 3600).unwrap()
}

pub async fn create_user(repo: &Repository, id: &str, name: &str) -> UserId {
    let user = UserId::new(id);
    repo.create_user(&user, name, None, None).await.unwrap();
    user
}

/// Seed a wallet with a synthetic deposit.
pub async fn fund(repo: &Repository, user: &UserId, amount: i64) {
    let record = LedgerRecord::completed(
        format!("dep:seed:{}", user),
        user.clone(),
        LedgerType::Deposit,
        Decimal::from_int(amount),
        "Seed deposit",
    );
    let outcome = wallet::post_record(repo, &record).await.unwrap();
    assert!(outcome.is_posted(), "seed deposit must post");
}

pub async fn balance(repo: &Repository, user: &UserId) -> Decimal {
    repo.get_user(user).await.unwrap().unwrap().wallet_balance
}

pub async fn request(
    app: axum::Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", t));
    }
    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}
