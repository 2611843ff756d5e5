use crate::{
    middleware::RequestContext,
    models::{
        ContextResponse, EmailPasswordRequest, OAuthLoginRequest, OtpSentResponse,
        SendOtpRequest, VerifyOtpRequest,
    },
    state::AppState,
    strategies::LoginOutcome,
    utils::ApiResult,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Extension, Json,
};

/// Handle email/password login
pub async fn email_password_login<U: Send + Sync + 'static>(
    State(state): State<AppState<U>>,
    payload: Result<Json<EmailPasswordRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;

    let outcome = state
        .auth_service
        .login_with_email_password(request)
        .await?;

    Ok(login_response(outcome))
}

/// Generate and dispatch a one-time code
pub async fn send_otp<U: Send + Sync + 'static>(
    State(state): State<AppState<U>>,
    payload: Result<Json<SendOtpRequest>, JsonRejection>,
) -> ApiResult<Json<OtpSentResponse>> {
    let Json(request) = payload?;

    let dispatch = state.auth_service.send_otp(request).await?;

    Ok(Json(dispatch.into_response_body()))
}

/// Exchange a phone number and code for a token
pub async fn verify_otp<U: Send + Sync + 'static>(
    State(state): State<AppState<U>>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;

    let outcome = state.auth_service.verify_otp(request).await?;

    Ok(login_response(outcome))
}

/// Log in with a provider profile the host already obtained
pub async fn oauth_callback<U: Send + Sync + 'static>(
    State(state): State<AppState<U>>,
    payload: Result<Json<OAuthLoginRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;

    let outcome = state.auth_service.login_with_oauth_profile(request).await?;

    Ok(login_response(outcome))
}

/// Context attached by the middleware chain
pub async fn me(Extension(ctx): Extension<RequestContext>) -> Json<ContextResponse> {
    Json(ContextResponse {
        success: true,
        user: ctx.user,
        role: ctx.role,
        org: ctx.org,
    })
}

fn login_response(outcome: LoginOutcome) -> Response {
    let cookie = outcome.issued.cookie.clone();
    let mut response = Json(outcome.into_response_body()).into_response();

    if let Some(cookie) = cookie {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("Could not encode auth cookie: {}", e),
        }
    }

    response
}
