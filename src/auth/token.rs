//! Token issuance and verification.
//!
//! This is the only module that touches `jwt.secret`. Tokens are HS256 JWTs
//! whose claims are the host payload plus `iat` and `exp`.

use crate::{
    auth::config::{AuthConfig, TokenPayload},
    utils::{parse_duration, ApiError, ApiResult},
};
use chrono::{DateTime, Utc};
use cookie::Cookie;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

const RESERVED_CLAIMS: [&str; 2] = ["exp", "iat"];

/// Payload keys consulted, in order, for the lookup subject.
const SUBJECT_CLAIMS: [&str; 3] = ["id", "uid", "sub"];

#[derive(Debug, Serialize, Deserialize)]
struct SignedClaims {
    #[serde(flatten)]
    payload: TokenPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
    exp: i64,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Set when cookie mode is enabled and cookie options are configured
    pub cookie: Option<Cookie<'static>>,
}

/// Sign a token for `user` using the configured payload mapping and lifetime.
pub fn issue_token<U>(config: &AuthConfig<U>, user: &U) -> ApiResult<IssuedToken> {
    let mut payload = (config.jwt.generate_token_payload)(user);
    for claim in RESERVED_CLAIMS {
        if payload.remove(claim).is_some() {
            warn!("Token payload claim {:?} is reserved and was dropped", claim);
        }
    }

    let lifetime = parse_duration(config.jwt.expires_in()).map_err(|e| {
        error!("Invalid jwt.expires_in: {:#}", e);
        ApiError::configuration_error("Invalid token expiration configured")
    })?;

    let now = Utc::now();
    let expires_at = now.checked_add_signed(lifetime).ok_or_else(|| {
        error!("jwt.expires_in {:?} is out of range", config.jwt.expires_in());
        ApiError::configuration_error("Invalid token expiration configured")
    })?;
    let claims = SignedClaims {
        payload,
        iat: Some(now.timestamp()),
        exp: expires_at.timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt.secret.expose()),
    )
    .map_err(|e| {
        error!("Failed to sign token: {}", e);
        ApiError::internal_error("Failed to generate token")
    })?;

    let cookie = config
        .jwt
        .cookie_options()
        .map(|options| options.build_cookie(token.clone()));

    Ok(IssuedToken {
        token,
        expires_at,
        cookie,
    })
}

/// Verify signature and expiry, returning the host payload without `iat`/`exp`.
///
/// Every failure collapses into the same "Invalid or expired token" error.
pub fn verify_token<U>(config: &AuthConfig<U>, token: &str) -> ApiResult<TokenPayload> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp"]);

    let token_data = decode::<SignedClaims>(
        token,
        &DecodingKey::from_secret(config.jwt.secret.expose()),
        &validation,
    )
    .map_err(|e| {
        debug!("Token rejected: {}", e);
        ApiError::invalid_token()
    })?;

    Ok(token_data.claims.payload)
}

/// Identifier used to look the token's user back up.
pub fn token_subject(payload: &TokenPayload) -> Option<String> {
    SUBJECT_CLAIMS
        .iter()
        .filter_map(|claim| payload.get(*claim))
        .find_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}
