//! Context-attaching middleware steps.
//!
//! Each step takes the request headers and the context built so far, and
//! either returns the updated context or halts the request with an error.
//! Only [`AttachUser`] ever halts.

use crate::{
    auth::{token, AuthService, LookupContext, Strategy, TOKEN_COOKIE_NAME},
    utils::{ApiError, ApiResult},
};
use anyhow::Context;
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use cookie::Cookie;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Per-request authentication context.
///
/// Starts empty. Fields are only filled by the steps included in the chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Serialized user, or the raw token payload when no lookup is configured
    pub user: Option<Value>,
    pub role: Option<String>,
    pub org: Option<Value>,
}

/// Outcome of one middleware step.
#[derive(Debug)]
pub enum Flow {
    Continue(RequestContext),
    Halt(ApiError),
}

#[async_trait]
pub trait ContextMiddleware: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, headers: &HeaderMap, ctx: RequestContext) -> Flow;
}

/// Extract the token from `Authorization: Bearer <token>`, falling back to the
/// `token` cookie when cookie mode is enabled.
pub fn extract_token(headers: &HeaderMap, cookie_enabled: bool) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|auth_header| auth_header.strip_prefix("Bearer "));

    if let Some(token) = bearer {
        let token = token.trim();
        return (!token.is_empty()).then(|| token.to_string());
    }

    if cookie_enabled {
        return extract_cookie_token(headers);
    }

    None
}

fn extract_cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == TOKEN_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Verifies the request token and attaches the user it belongs to.
pub struct AttachUser<U> {
    auth: Arc<AuthService<U>>,
}

impl<U> AttachUser<U> {
    pub fn new(auth: Arc<AuthService<U>>) -> Self {
        Self { auth }
    }
}

impl<U: Send + Sync + 'static> AttachUser<U> {
    async fn resolve_user(&self, headers: &HeaderMap) -> ApiResult<Value> {
        let config = self.auth.config()?;

        let token = extract_token(headers, config.jwt.cookie_enabled())
            .ok_or_else(|| ApiError::authentication_error("No token provided"))?;

        let payload = token::verify_token(&config, &token)?;

        let Some(find_user) = config.find_user.as_ref() else {
            // Reduced trust: nothing to check the payload against.
            return Ok(Value::Object(payload));
        };

        let subject = token::token_subject(&payload).ok_or_else(|| {
            debug!("Token payload carries no subject");
            ApiError::authentication_error("Invalid user")
        })?;

        let user = find_user(subject, LookupContext::new(Strategy::Token))
            .await
            .context("User lookup for token subject failed")?
            .ok_or_else(|| {
                debug!("Token subject no longer resolves to a user");
                ApiError::authentication_error("Invalid user")
            })?;

        Ok((config.serialize_user)(&user))
    }
}

#[async_trait]
impl<U: Send + Sync + 'static> ContextMiddleware for AttachUser<U> {
    fn name(&self) -> &'static str {
        "user"
    }

    async fn handle(&self, headers: &HeaderMap, mut ctx: RequestContext) -> Flow {
        match self.resolve_user(headers).await {
            Ok(user) => {
                ctx.user = Some(user);
                Flow::Continue(ctx)
            }
            Err(err) => Flow::Halt(err),
        }
    }
}

/// Copies `user.role` into the context. Never halts.
///
/// Only a non-empty string counts as a role. Any other value, such as an
/// array of roles, leaves `role` empty; hosts with richer role data should
/// read it from `user` directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachRole;

#[async_trait]
impl ContextMiddleware for AttachRole {
    fn name(&self) -> &'static str {
        "role"
    }

    async fn handle(&self, _headers: &HeaderMap, mut ctx: RequestContext) -> Flow {
        let raw = ctx.user.as_ref().and_then(|user| user.get("role"));
        if let Some(value) = raw.filter(|value| !value.is_null() && !value.is_string()) {
            debug!("Ignoring non-string role: {}", value);
        }

        ctx.role = raw
            .and_then(Value::as_str)
            .filter(|role| !role.is_empty())
            .map(str::to_string);
        Flow::Continue(ctx)
    }
}

/// Copies `user.org` into the context. Never halts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachOrg;

#[async_trait]
impl ContextMiddleware for AttachOrg {
    fn name(&self) -> &'static str {
        "org"
    }

    async fn handle(&self, _headers: &HeaderMap, mut ctx: RequestContext) -> Flow {
        ctx.org = ctx
            .user
            .as_ref()
            .and_then(|user| user.get("org"))
            .filter(|org| is_truthy(org))
            .cloned();
        Flow::Continue(ctx)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{AuthConfig, AuthConfigBuilder, CookieOptions, TokenPayload},
        utils::ErrorKind,
    };
    use axum::http::HeaderValue;
    use serde_json::json;

    #[derive(Debug, Clone)]
    struct User {
        id: String,
        role: Option<String>,
        org: Option<String>,
    }

    fn base() -> AuthConfigBuilder<User> {
        AuthConfig::builder("identity-secret")
            .generate_token_payload(|user: &User| {
                let mut payload = TokenPayload::new();
                payload.insert("id".into(), json!(user.id));
                payload.insert("role".into(), json!(user.role));
                payload
            })
            .serialize_user(|user: &User| {
                json!({ "id": user.id, "role": user.role, "org": user.org })
            })
    }

    fn alice() -> User {
        User {
            id: "alice".into(),
            role: Some("admin".into()),
            org: Some("acme".into()),
        }
    }

    fn with_lookup() -> Arc<AuthService<User>> {
        let config = base()
            .find_user(|id, ctx| async move {
                assert_eq!(ctx.strategy, Strategy::Token);
                Ok((id == "alice").then(alice))
            })
            .build()
            .unwrap();
        Arc::new(AuthService::with_config(config))
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    fn halted(flow: Flow) -> ApiError {
        match flow {
            Flow::Halt(err) => err,
            Flow::Continue(ctx) => panic!("expected halt, got {:?}", ctx),
        }
    }

    fn continued(flow: Flow) -> RequestContext {
        match flow {
            Flow::Continue(ctx) => ctx,
            Flow::Halt(err) => panic!("expected continue, got {}", err),
        }
    }

    #[test]
    fn test_extract_token_sources() {
        assert_eq!(extract_token(&bearer("abc"), false).as_deref(), Some("abc"));
        assert_eq!(extract_token(&HeaderMap::new(), true), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=xyz"));
        assert_eq!(extract_token(&headers, false), None);
        assert_eq!(extract_token(&headers, true).as_deref(), Some("xyz"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert_eq!(extract_token(&headers, false), None);

        assert_eq!(extract_token(&bearer(""), true), None);
    }

    #[test]
    fn test_bearer_takes_precedence_over_cookie() {
        let mut headers = bearer("from-header");
        headers.insert(header::COOKIE, HeaderValue::from_static("token=from-cookie"));
        assert_eq!(extract_token(&headers, true).as_deref(), Some("from-header"));
    }

    #[tokio::test]
    async fn test_no_token_halts() {
        let step = AttachUser::new(with_lookup());
        let err = halted(step.handle(&HeaderMap::new(), RequestContext::default()).await);
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert_eq!(err.message, "No token provided");
    }

    #[tokio::test]
    async fn test_invalid_token_halts() {
        let step = AttachUser::new(with_lookup());
        let err = halted(step.handle(&bearer("not-a-jwt"), RequestContext::default()).await);
        assert_eq!(err.message, "Invalid or expired token");
    }

    #[tokio::test]
    async fn test_valid_token_attaches_serialized_user() {
        let auth = with_lookup();
        let token = auth.issue_token(&alice()).unwrap().token;

        let ctx = continued(
            AttachUser::new(auth)
                .handle(&bearer(&token), RequestContext::default())
                .await,
        );
        assert_eq!(
            ctx.user,
            Some(json!({ "id": "alice", "role": "admin", "org": "acme" }))
        );
        assert_eq!(ctx.role, None);
    }

    #[tokio::test]
    async fn test_deleted_user_halts() {
        let auth = with_lookup();
        let ghost = User {
            id: "bob".into(),
            role: None,
            org: None,
        };
        let token = auth.issue_token(&ghost).unwrap().token;

        let err = halted(
            AttachUser::new(auth)
                .handle(&bearer(&token), RequestContext::default())
                .await,
        );
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert_eq!(err.message, "Invalid user");
    }

    #[tokio::test]
    async fn test_lookup_failure_is_internal() {
        let config = base()
            .find_user(|_, _| async { Err(anyhow::anyhow!("replica lag")) })
            .build()
            .unwrap();
        let auth = Arc::new(AuthService::with_config(config));
        let token = auth.issue_token(&alice()).unwrap().token;

        let err = halted(
            AttachUser::new(auth)
                .handle(&bearer(&token), RequestContext::default())
                .await,
        );
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_reduced_trust_attaches_payload() {
        let auth = Arc::new(AuthService::with_config(base().build().unwrap()));
        let token = auth.issue_token(&alice()).unwrap().token;

        let ctx = continued(
            AttachUser::new(auth)
                .handle(&bearer(&token), RequestContext::default())
                .await,
        );
        assert_eq!(ctx.user, Some(json!({ "id": "alice", "role": "admin" })));
    }

    #[tokio::test]
    async fn test_cookie_token_accepted_only_in_cookie_mode() {
        let auth = Arc::new(AuthService::with_config(
            base()
                .cookie(true, Some(CookieOptions::default()))
                .build()
                .unwrap(),
        ));
        let token = auth.issue_token(&alice()).unwrap().token;
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("token={}", token)).unwrap(),
        );

        let ctx = continued(
            AttachUser::new(auth.clone())
                .handle(&headers, RequestContext::default())
                .await,
        );
        assert!(ctx.user.is_some());

        auth.initialize(base().build().unwrap());
        let err = halted(
            AttachUser::new(auth)
                .handle(&headers, RequestContext::default())
                .await,
        );
        assert_eq!(err.message, "No token provided");
    }

    #[tokio::test]
    async fn test_uninitialized_halts_with_server_error() {
        let auth = Arc::new(AuthService::<User>::new());
        let err = halted(
            AttachUser::new(auth)
                .handle(&bearer("x"), RequestContext::default())
                .await,
        );
        assert_eq!(err.kind, ErrorKind::Uninitialized);
    }

    #[tokio::test]
    async fn test_role_and_org_from_user() {
        let ctx = RequestContext {
            user: Some(json!({ "id": "alice", "role": "admin", "org": { "id": 3 } })),
            ..RequestContext::default()
        };
        let ctx = continued(AttachRole.handle(&HeaderMap::new(), ctx).await);
        let ctx = continued(AttachOrg.handle(&HeaderMap::new(), ctx).await);
        assert_eq!(ctx.role.as_deref(), Some("admin"));
        assert_eq!(ctx.org, Some(json!({ "id": 3 })));
    }

    #[tokio::test]
    async fn test_role_and_org_absent_without_user() {
        let ctx = continued(
            AttachRole
                .handle(&HeaderMap::new(), RequestContext::default())
                .await,
        );
        let ctx = continued(AttachOrg.handle(&HeaderMap::new(), ctx).await);
        assert_eq!(ctx, RequestContext::default());
    }

    #[tokio::test]
    async fn test_falsy_role_and_org_are_absent() {
        let ctx = RequestContext {
            user: Some(json!({ "role": "", "org": null })),
            role: Some("stale".into()),
            org: Some(json!("stale")),
        };
        let ctx = continued(AttachRole.handle(&HeaderMap::new(), ctx).await);
        let ctx = continued(AttachOrg.handle(&HeaderMap::new(), ctx).await);
        assert_eq!(ctx.role, None);
        assert_eq!(ctx.org, None);
    }

    #[tokio::test]
    async fn test_non_string_role_is_absent() {
        let ctx = RequestContext {
            user: Some(json!({ "role": ["admin", "editor"], "org": "acme" })),
            role: Some("stale".into()),
            ..RequestContext::default()
        };
        let ctx = continued(AttachRole.handle(&HeaderMap::new(), ctx).await);
        assert_eq!(ctx.role, None);
        assert_eq!(ctx.user.as_ref().unwrap()["role"], json!(["admin", "editor"]));
    }

    #[tokio::test]
    async fn test_role_and_org_idempotent() {
        let start = RequestContext {
            user: Some(json!({ "role": "editor", "org": "acme" })),
            ..RequestContext::default()
        };
        let once = continued(AttachRole.handle(&HeaderMap::new(), start).await);
        let once = continued(AttachOrg.handle(&HeaderMap::new(), once).await);
        let twice = continued(AttachRole.handle(&HeaderMap::new(), once.clone()).await);
        let twice = continued(AttachOrg.handle(&HeaderMap::new(), twice).await);
        assert_eq!(once, twice);
    }
}
