//! API integration tests
//!
//! Drive the full router over the in-memory store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use school_ledger_server::{
    api,
    config::AppConfig,
    repository::MemoryRepository,
    services::email::{Mailer, OutgoingEmail},
    AppResult, AppState,
};

const PASSWORD: &str = "Str0ng!pass";

/// Keeps every message instead of sending it
#[derive(Default)]
struct Outbox(Mutex<Vec<OutgoingEmail>>);

#[async_trait]
impl Mailer for Outbox {
    async fn send(&self, email: OutgoingEmail) -> AppResult<()> {
        self.0.lock().unwrap().push(email);
        Ok(())
    }
}

struct TestApp {
    router: Router,
    outbox: Arc<Outbox>,
}

impl TestApp {
    fn new() -> Self {
        let outbox = Arc::new(Outbox::default());
        let state = AppState::new(AppConfig::default(), Arc::new(MemoryRepository::new()), outbox.clone());
        Self {
            router: api::router(state),
            outbox,
        }
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(format!("/api/v1{}", uri));
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Create a user and log in as them
    async fn get_auth_token(&self) -> String {
        let (status, _) = self
            .call(
                Method::POST,
                "/users",
                None,
                Some(json!({
                    "name": "Maria Aparecida",
                    "email": "maria@school.example",
                    "password": PASSWORD
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .call(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "email": "maria@school.example", "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().expect("No token in response").to_string()
    }

    async fn create_student(&self, token: &str) -> i64 {
        let (status, body) = self
            .call(
                Method::POST,
                "/students",
                Some(token),
                Some(json!({
                    "name": "Joana Silva Souza",
                    "class_name": "7A",
                    "guardian": "Carlos Silva Souza",
                    "email": "joana@school.example"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    async fn create_book(&self, token: &str, copies: i32) -> i64 {
        let (status, body) = self
            .call(
                Method::POST,
                "/books",
                Some(token),
                Some(json!({
                    "title": "Dom Casmurro",
                    "author": "Machado de Assis",
                    "price": "15.00",
                    "available_copies": copies
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }
}

fn money(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.call(Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_writes_require_token() {
    let app = TestApp::new();

    let (status, body) = app
        .call(Method::POST, "/deposits", None, Some(json!({ "student_id": 1, "kind": "pix", "amount": "5.00" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthorized");

    let (status, _) = app.call(Method::GET, "/users", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Reads stay open
    let (status, body) = app.call(Method::GET, "/students", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_deposit_loan_and_balance_scenario() {
    let app = TestApp::new();
    let token = app.get_auth_token().await;
    let student_id = app.create_student(&token).await;
    let book_id = app.create_book(&token, 1).await;

    let (status, body) = app
        .call(
            Method::POST,
            "/deposits",
            Some(&token),
            Some(json!({ "student_id": student_id, "kind": "pix", "amount": "50.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(money(&body["student"]["balance"]), "50.00");

    let (status, body) = app
        .call(
            Method::POST,
            "/loans",
            Some(&token),
            Some(json!({ "student_id": student_id, "book_id": book_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["book"]["available_copies"], 0);
    assert_eq!(money(&body["loan"]["amount"]), "15.00");

    // No copies left
    let (status, body) = app
        .call(
            Method::POST,
            "/loans",
            Some(&token),
            Some(json!({ "student_id": student_id, "book_id": book_id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "NotAvailable");

    let (status, _) = app
        .call(
            Method::PATCH,
            &format!("/students/{}/deposit", student_id),
            Some(&token),
            Some(json!({ "amount": "20.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, student) = app.call(Method::GET, &format!("/students/{}", student_id), None, None).await;
    assert_eq!(money(&student["balance"]), "70.00");

    // The balance endpoint leaves a cash deposit behind
    let (_, deposits) = app
        .call(Method::GET, &format!("/deposits?student_id={}", student_id), None, None)
        .await;
    let kinds: Vec<&str> = deposits
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["pix", "cash"]);
}

#[tokio::test]
async fn test_return_restocks_book() {
    let app = TestApp::new();
    let token = app.get_auth_token().await;
    let student_id = app.create_student(&token).await;
    let book_id = app.create_book(&token, 1).await;

    app.call(
        Method::POST,
        "/loans",
        Some(&token),
        Some(json!({ "student_id": student_id, "book_id": book_id })),
    )
    .await;

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/loans/return/{}", student_id),
            Some(&token),
            Some(json!({ "book_id": book_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book"]["available_copies"], 1);

    let (status, _) = app
        .call(
            Method::PATCH,
            &format!("/loans/return/{}", student_id),
            Some(&token),
            Some(json!({ "book_id": book_id })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Book without loans can now go
    let (status, _) = app.call(Method::DELETE, &format!("/books/{}", book_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_student_with_history_cannot_be_deleted() {
    let app = TestApp::new();
    let token = app.get_auth_token().await;
    let student_id = app.create_student(&token).await;

    app.call(
        Method::POST,
        "/deposits",
        Some(&token),
        Some(json!({ "student_id": student_id, "kind": "card", "amount": "10.00" })),
    )
    .await;

    let (status, body) = app
        .call(Method::DELETE, &format!("/students/{}", student_id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Duplicate");
}

#[tokio::test]
async fn test_lockout_and_unlock() {
    let app = TestApp::new();
    let token = app.get_auth_token().await;

    // Second account that will get locked
    let (_, victim) = app
        .call(
            Method::POST,
            "/users",
            None,
            Some(json!({ "name": "Pedro Henrique Alves", "email": "pedro@school.example", "password": PASSWORD })),
        )
        .await;
    let victim_id = victim["id"].as_str().unwrap().to_string();
    assert!(victim.get("password_hash").is_none());

    let wrong = json!({ "email": "pedro@school.example", "password": "nope" });
    for _ in 0..2 {
        let (status, _) = app.call(Method::POST, "/auth/login", None, Some(wrong.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
    let (status, _) = app.call(Method::POST, "/auth/login", None, Some(wrong)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let right = json!({ "email": "pedro@school.example", "password": PASSWORD });
    let (status, body) = app.call(Method::POST, "/auth/login", None, Some(right.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "AccountLocked");

    let (status, body) = app
        .call(Method::PUT, &format!("/users/{}/unlock", victim_id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["locked"], false);

    let (status, _) = app.call(Method::POST, "/auth/login", None, Some(right)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_password_recovery_flow() {
    let app = TestApp::new();
    app.get_auth_token().await;

    let (status, known) = app
        .call(Method::POST, "/auth/recover", None, Some(json!({ "email": "maria@school.example" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, unknown) = app
        .call(Method::POST, "/auth/recover", None, Some(json!({ "email": "ghost@school.example" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(known, unknown);

    let code = {
        let outbox = app.outbox.0.lock().unwrap();
        assert_eq!(outbox.len(), 1);
        outbox[0]
            .text
            .lines()
            .find_map(|l| l.strip_prefix("Your password recovery code is: "))
            .unwrap()
            .to_string()
    };

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/reset",
            None,
            Some(json!({ "email": "maria@school.example", "code": "WRONG1", "new_password": "N3w!secret" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidCode");

    let reset = json!({ "email": "maria@school.example", "code": code, "new_password": "N3w!secret" });
    let (status, _) = app.call(Method::POST, "/auth/reset", None, Some(reset.clone())).await;
    assert_eq!(status, StatusCode::OK);

    // Single use
    let (status, _) = app.call(Method::POST, "/auth/reset", None, Some(reset)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "maria@school.example", "password": "N3w!secret" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_statement_is_emailed() {
    let app = TestApp::new();
    let token = app.get_auth_token().await;
    let student_id = app.create_student(&token).await;

    app.call(
        Method::POST,
        "/deposits",
        Some(&token),
        Some(json!({ "student_id": student_id, "kind": "transfer", "amount": "12.50" })),
    )
    .await;

    let (status, body) = app
        .call(Method::POST, &format!("/students/{}/statement", student_id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(money(&body["total_credits"]), "12.50");

    let outbox = app.outbox.0.lock().unwrap();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].to, "joana@school.example");
    assert!(outbox[0].html.contains("transfer"));
}
