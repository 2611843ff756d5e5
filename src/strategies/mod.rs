//! Credential strategies.
//!
//! Each strategy validates its request fields, checks the credential through a
//! host callback, resolves the user and issues a token. They share nothing but
//! the token codec and [`LoginOutcome`].

mod email_password;
mod oauth;
mod phone_otp;

pub use phone_otp::OtpDispatch;

use crate::{
    auth::{config::AuthConfig, token, IssuedToken, Strategy},
    models::LoginResponse,
    utils::ApiResult,
};
use serde_json::Value;

/// Token plus the client-safe view of the user it was issued for.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub issued: IssuedToken,
    pub user: Value,
}

impl LoginOutcome {
    pub fn token(&self) -> &str {
        &self.issued.token
    }

    pub fn into_response_body(self) -> LoginResponse {
        LoginResponse {
            success: true,
            token: self.issued.token,
            user: self.user,
        }
    }
}

fn complete_login<U>(config: &AuthConfig<U>, user: &U, strategy: Strategy) -> ApiResult<LoginOutcome> {
    let issued = token::issue_token(config, user)?;
    let user = (config.serialize_user)(user);
    tracing::info!(strategy = %strategy, "Issued token");

    Ok(LoginOutcome { issued, user })
}
