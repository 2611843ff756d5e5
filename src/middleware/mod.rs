pub mod chain;
pub mod identity;

pub use chain::{auth_layer, build_chain, build_chain_from_names, MiddlewareChain, MiddlewareKind};
pub use identity::{
    extract_token, AttachOrg, AttachRole, AttachUser, ContextMiddleware, Flow, RequestContext,
};

use crate::utils::Config;
use axum::{http::HeaderValue, Json};
use serde_json::{json, Value};

/// CORS middleware configuration
pub fn cors_layer(config: &Config) -> tower_http::cors::CorsLayer {
    use tower_http::cors::CorsLayer;

    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins
        .iter()
        // A wildcard cannot be combined with credentials.
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .allow_origin(origins)
        .allow_credentials(true)
}

/// Request ID middleware
pub fn request_id_layer() -> tower_http::request_id::SetRequestIdLayer<tower_http::request_id::MakeRequestUuid> {
    tower_http::request_id::SetRequestIdLayer::x_request_id(tower_http::request_id::MakeRequestUuid)
}

/// Tracing middleware
pub fn trace_layer() -> tower_http::trace::TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
> {
    tower_http::trace::TraceLayer::new_for_http()
        .make_span_with(tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
        .on_response(tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO))
}

/// Health check handler
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
