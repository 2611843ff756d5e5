pub mod config;
pub mod otp;
pub mod token;

pub use config::{
    AuthConfig, AuthConfigBuilder, CookieOptions, CookieSameSite, CookieSettings, Environment,
    LookupContext, OtpSettings, Strategy, TokenPayload, DEFAULT_EXPIRES_IN, TOKEN_COOKIE_NAME,
};
pub use otp::{generate_default_otp, generate_otp};
pub use token::{token_subject, IssuedToken};

use crate::utils::{ApiError, ApiResult};
use std::sync::{Arc, RwLock};

/// Authentication service
///
/// Holds the active [`AuthConfig`]. Create one at startup, call
/// [`initialize`](Self::initialize), and share it (usually behind an `Arc`)
/// with the handlers and middleware that need it. Every operation fails with
/// an "uninitialized" error until a config has been stored.
pub struct AuthService<U> {
    config: RwLock<Option<Arc<AuthConfig<U>>>>,
}

impl<U> Default for AuthService<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> AuthService<U> {
    /// Create a service with no configuration yet.
    pub fn new() -> Self {
        Self {
            config: RwLock::new(None),
        }
    }

    /// Create a service that is already initialized.
    pub fn with_config(config: AuthConfig<U>) -> Self {
        Self {
            config: RwLock::new(Some(Arc::new(config))),
        }
    }

    /// Store `config` as the active configuration, replacing any previous one.
    pub fn initialize(&self, config: AuthConfig<U>) {
        let mut slot = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(Arc::new(config));
        tracing::info!("Authentication configuration initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    /// The active configuration.
    pub fn config(&self) -> ApiResult<Arc<AuthConfig<U>>> {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or_else(|| {
                tracing::error!("Authentication used before initialize() was called");
                ApiError::uninitialized()
            })
    }

    /// Sign a token for `user` with the active configuration.
    pub fn issue_token(&self, user: &U) -> ApiResult<IssuedToken> {
        let config = self.config()?;
        token::issue_token(&config, user)
    }

    /// Verify `token` against the active configuration.
    pub fn verify_token(&self, token: &str) -> ApiResult<TokenPayload> {
        let config = self.config()?;
        token::verify_token(&config, token)
    }
}
