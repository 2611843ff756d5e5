//! Shared harness for router-level tests.
#![allow(dead_code)]

use authkit::{
    auth::{AuthConfigBuilder, CookieOptions, Environment, TokenPayload},
    AppState, AuthConfig, AuthService, LookupContext, Strategy,
};
use axum::{body::Body, Router};
use http::{header, HeaderMap, Request, StatusCode};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "correct horse";

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub phone: String,
    pub role: Option<String>,
    pub org: Value,
}

pub fn users() -> Vec<TestUser> {
    vec![
        TestUser {
            id: "user-1".to_string(),
            email: "ada@example.com".to_string(),
            phone: "+15550100".to_string(),
            role: Some("admin".to_string()),
            org: json!({ "id": "acme" }),
        },
        TestUser {
            id: "user-2".to_string(),
            email: "bob@example.com".to_string(),
            phone: "+15550101".to_string(),
            role: None,
            org: Value::Null,
        },
    ]
}

fn find(users: &[TestUser], identifier: &str, strategy: Strategy) -> Option<TestUser> {
    users
        .iter()
        .find(|user| match strategy {
            Strategy::EmailPassword | Strategy::OAuth => user.email == identifier,
            Strategy::PhoneOtp => user.phone == identifier,
            Strategy::Token => user.id == identifier,
        })
        .cloned()
}

/// Codes handed to the delivery callback, keyed by phone.
pub type SentCodes = Arc<Mutex<HashMap<String, String>>>;

/// Builder with payload and serializer set, no optional callbacks.
pub fn base_builder() -> AuthConfigBuilder<TestUser> {
    AuthConfig::builder(SECRET)
        .generate_token_payload(|user: &TestUser| {
            let mut payload = TokenPayload::new();
            payload.insert("id".into(), json!(user.id));
            payload.insert("role".into(), json!(user.role));
            payload.insert("org".into(), user.org.clone());
            payload
        })
        .serialize_user(|user: &TestUser| {
            json!({
                "id": user.id,
                "email": user.email,
                "role": user.role,
                "org": user.org,
            })
        })
        .environment(Environment::Development)
        // No zeros, so "000000" is never a valid code.
        .otp(6, "123456789")
}

/// Builder with every callback wired to an in-memory store.
pub fn full_builder(sent: SentCodes) -> AuthConfigBuilder<TestUser> {
    let send_codes = sent.clone();
    let verify_codes = sent;

    base_builder()
        .find_user(|identifier: String, context: LookupContext| async move {
            Ok(find(&users(), &identifier, context.strategy))
        })
        .verify_password(|_email: String, password: String| async move {
            Ok(password == PASSWORD)
        })
        .on_otp_request(move |phone: String, otp: String| {
            let codes = send_codes.clone();
            async move {
                codes.lock().unwrap().insert(phone, otp);
                Ok(())
            }
        })
        .verify_otp(move |phone: String, otp: String| {
            let codes = verify_codes.clone();
            async move { Ok(codes.lock().unwrap().get(&phone) == Some(&otp)) }
        })
        .oauth_callback_handler(|profile: Value, _provider: String| async move {
            Ok(profile
                .get("email")
                .and_then(Value::as_str)
                .and_then(|email| find(&users(), email, Strategy::OAuth)))
        })
}

pub fn cookie_options() -> CookieOptions {
    CookieOptions {
        secure: false,
        ..CookieOptions::default()
    }
}

pub fn app(auth: Arc<AuthService<TestUser>>) -> Router {
    let chain = authkit::build_chain_from_names(auth.clone(), &["user", "role", "org"]);
    authkit::create_router(AppState::new(auth, chain))
}

pub fn service(config: AuthConfig<TestUser>) -> Arc<AuthService<TestUser>> {
    Arc::new(AuthService::with_config(config))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_with(uri: &str, name: header::HeaderName, value: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(name, value)
        .body(Body::empty())
        .unwrap()
}
