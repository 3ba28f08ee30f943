//! End-to-end tests driving the full router

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use tradepost::api::{build_router, AppState};
use tradepost::config::Config;
use tradepost::db::{create_test_pool, migrations};
use tradepost::services::{Mailer, MemoryMailer};

struct TestApp {
    router: Router,
    _dir: TempDir,
}

async fn app_with_mailer(mailer: Option<Arc<dyn Mailer>>) -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.upload.path = dir.path().join("public");
    config.upload.private_path = dir.path().join("private");
    let pool = create_test_pool().await.unwrap();
    migrations::run_migrations(&pool).await.unwrap();
    let state = AppState::new(pool, &config, mailer);
    TestApp {
        router: build_router(state, &config),
        _dir: dir,
    }
}

async fn app() -> TestApp {
    app_with_mailer(None).await
}

impl TestApp {
    async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// Register a user and return its session token
    async fn register(&self, name: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({
                    "name": name,
                    "email": format!("{}@example.com", name.to_lowercase()),
                    "password": "secret-password",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_admin_gate() {
    let app = app().await;
    let admin = app.register("Ada").await;
    let customer = app.register("Bob").await;

    let (status, body) = app.call("GET", "/api/admin/products", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthenticated.");

    let (status, _) = app.call("GET", "/api/admin/products", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.call("GET", "/api/admin/products", Some(&customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "This action is unauthorized.");

    let (status, body) = app.call("GET", "/api/admin/products", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 0);
    assert_eq!(body["meta"]["last_page"], 1);
}

#[tokio::test]
async fn test_create_and_validate_product() {
    let app = app().await;
    let admin = app.register("Ada").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/admin/products",
            Some(&admin),
            Some(json!({"name": "Rust Handbook", "price_cents": 1999, "status": "published"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["slug"], "rust-handbook");
    assert_eq!(body["data"]["has_file"], false);

    let (status, body) = app.call("GET", "/api/products/rust-handbook", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["price_cents"], 1999);

    let (status, body) = app
        .call(
            "POST",
            "/api/admin/products",
            Some(&admin),
            Some(json!({"name": "", "price_cents": -1})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["errors"]["name"].is_array());
    assert!(body["errors"]["price_cents"].is_array());

    let (status, body) = app.call("GET", "/api/admin/products/999", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Product not found");
}

#[tokio::test]
async fn test_payment_approval_flow() {
    let app = app().await;
    let admin = app.register("Ada").await;
    let customer = app.register("Bob").await;

    let (_, body) = app
        .call(
            "POST",
            "/api/admin/products",
            Some(&admin),
            Some(json!({"name": "Course", "price_cents": 5000, "status": "published"})),
        )
        .await;
    let product_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .call(
            "POST",
            "/api/payments",
            Some(&customer),
            Some(json!({"product_id": product_id, "payment_reference": "BANK-42"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "PENDING_APPROVAL");
    assert_eq!(body["data"]["amount_cents"], 5000);
    let payment_id = body["data"]["id"].as_i64().unwrap();

    let uri = format!("/api/admin/payments/{}/approve", payment_id);
    let (status, body) = app.call("POST", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Payment approved");
    assert_eq!(body["data"]["status"], "APPROVED");

    let (status, body) = app.call("POST", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_STATE");

    let uri = format!("/api/admin/payments/{}/reject", payment_id);
    let (status, _) = app.call("POST", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = app.call("GET", "/api/library", Some(&customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["product_id"], product_id);

    // Owned products cannot be bought again.
    let (status, body) = app
        .call(
            "POST",
            "/api/payments",
            Some(&customer),
            Some(json!({"product_id": product_id, "payment_reference": "BANK-43"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["product_id"].is_array());
}

#[tokio::test]
async fn test_newsletter_send() {
    let mailer = Arc::new(MemoryMailer::new());
    let app = app_with_mailer(Some(mailer.clone())).await;
    let admin = app.register("Ada").await;

    for email in ["one@example.com", "two@example.com"] {
        let (status, _) = app
            .call("POST", "/api/newsletter/subscribe", None, Some(json!({"email": email})))
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = app
        .call("POST", "/api/newsletter/unsubscribe", None, Some(json!({"email": "two@example.com"})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(
            "POST",
            "/api/admin/newsletters",
            Some(&admin),
            Some(json!({"subject": "Launch", "content": "We are **live**."})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let uri = format!("/api/admin/newsletters/{}/send", body["data"]["id"]);

    let (status, body) = app.call("POST", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["delivered"], 1);
    assert_eq!(body["data"]["newsletter"]["status"], "sent");
    assert_eq!(mailer.sent().len(), 1);
    assert_eq!(mailer.sent()[0].to, "one@example.com");

    let (status, _) = app.call("POST", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_live_ads_rejects_unknown_placement() {
    let app = app().await;

    let (status, body) = app.call("GET", "/api/ads/sidebar", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));

    let (status, body) = app.call("GET", "/api/ads/popup", None, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["placement"].is_array());
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = app().await;
    let token = app.register("Ada").await;

    let (status, body) = app.call("GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ada@example.com");
    assert!(body["data"].get("password_hash").is_none());

    let (status, _) = app.call("POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call("GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_suspended_user_cannot_login() {
    let app = app().await;
    let admin = app.register("Ada").await;
    let customer = app.register("Bob").await;
    let (_, body) = app.call("GET", "/api/auth/me", Some(&customer), None).await;
    let uri = format!("/api/admin/users/{}", body["data"]["id"]);

    let (status, body) = app
        .call("PATCH", &uri, Some(&admin), Some(json!({"status": "suspended"})))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, _) = app.call("GET", "/api/auth/me", Some(&customer), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "bob@example.com", "password": "secret-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Your account is suspended.");
}

#[tokio::test]
async fn test_login_keeps_password_whitespace() {
    let app = app().await;
    let (status, _) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"name": "Ada", "email": "ada@example.com", "password": " padded secret "})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let login = |password: &'static str| json!({"email": "ada@example.com", "password": password});
    let (status, _) = app.call("POST", "/api/auth/login", None, Some(login("padded secret"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = app.call("POST", "/api/auth/login", None, Some(login(" padded secret "))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
async fn test_paid_product_cannot_be_deleted() {
    let app = app().await;
    let admin = app.register("Ada").await;
    let customer = app.register("Bob").await;
    let (_, body) = app
        .call(
            "POST",
            "/api/admin/products",
            Some(&admin),
            Some(json!({"name": "Course", "price_cents": 5000, "status": "published"})),
        )
        .await;
    let product_id = body["data"]["id"].as_i64().unwrap();
    let (status, _) = app
        .call(
            "POST",
            "/api/payments",
            Some(&customer),
            Some(json!({"product_id": product_id, "payment_reference": "BANK-42"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!("/api/admin/products/{}", product_id);
    let (status, body) = app.call("DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_STATE");

    let (status, body) = app.call("GET", "/api/admin/payments", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 1);
}
