//! Shared setup for the HTTP suites: an in-memory app with a bootstrapped admin.
#![allow(dead_code)]

use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestRequest, TestServer};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use cirplane::config::Config;
use cirplane::handlers::create_router;
use cirplane::repository::memory::MemoryStore;
use cirplane::repository::Repositories;
use cirplane::services::provisioning::CreateUserRequest;
use cirplane::services::AppState;

pub const ADMIN_EMAIL: &str = "admin@clinica.com";
pub const ADMIN_PASSWORD: &str = "admin-senha";
pub const FUNCTIONS_KEY: &str = "anon-key-for-tests";

pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<MemoryStore>,
    pub state: Arc<AppState>,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let mut config = Config::for_memory("integration-secret");
    configure(&mut config);

    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(Repositories::from_memory(store.clone()), config));
    let created = state
        .provisioning
        .ensure_admin(ADMIN_EMAIL, ADMIN_PASSWORD)
        .await
        .unwrap();
    assert!(created, "Bootstrap admin must be created on an empty store");

    let server = TestServer::new(create_router(state.clone())).unwrap();
    TestApp { server, store, state }
}

impl TestApp {
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": email, "password": password }))
            .await;
        assert_eq!(response.status_code(), 200, "Login failed for {}", email);
        let body: Value = response.json();
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Provisions a user directly through the service and returns its id.
    pub async fn provision(&self, email: &str, password: &str, role: &str) -> Uuid {
        let request = CreateUserRequest {
            email: email.to_string(),
            password: Some(password.to_string()),
            name: format!("Usuário {}", role),
            role: role.to_string(),
            crm: (role == "doctor").then(|| "CRM-SP 123456".to_string()),
            specialty: (role == "doctor").then(|| "Ortopedia".to_string()),
            doctor_id: None,
        };
        self.state.provisioning.create_user(request).await.unwrap().id
    }
}

pub fn with_token(request: TestRequest, token: &str) -> TestRequest {
    request.add_header(
        HeaderName::from_static("authorization"),
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    )
}

pub fn with_api_key(request: TestRequest, key: &str) -> TestRequest {
    request.add_header(
        HeaderName::from_static("apikey"),
        HeaderValue::from_str(key).unwrap(),
    )
}

/// Decimals travel as strings; accept plain numbers too.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).unwrap(),
        other => panic!("expected a decimal, got {}", other),
    }
}
