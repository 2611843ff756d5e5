pub mod auth;

use crate::{middleware::{auth_layer, health_check}, state::AppState};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

/// Auth routes plus `/health`. `/auth/me` sits behind the state's middleware chain.
pub fn create_router<U: Send + Sync + 'static>(state: AppState<U>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(auth::email_password_login::<U>))
        .route("/auth/otp/send", post(auth::send_otp::<U>))
        .route("/auth/otp/verify", post(auth::verify_otp::<U>))
        .route("/auth/oauth/callback", post(auth::oauth_callback::<U>));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .layer(from_fn_with_state(state.chain.clone(), auth_layer));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
