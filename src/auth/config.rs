//! Host-supplied authentication configuration.
//!
//! An [`AuthConfig`] bundles the signing settings with the callbacks the host
//! application provides: payload construction, user serialization, user lookup,
//! password and OTP checks, OTP delivery and OAuth profile mapping. It is built
//! once at startup and never mutated afterwards.

use crate::auth::otp::{DEFAULT_OTP_CHARSET, DEFAULT_OTP_LENGTH};
use anyhow::{anyhow, Result};
use cookie::{Cookie, SameSite};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, future::Future, str::FromStr, sync::Arc};

/// Claims produced by the host for a user. `exp` and `iat` are owned by the codec.
pub type TokenPayload = serde_json::Map<String, Value>;

/// Future returned by every async host callback.
pub type CallbackFuture<T> = BoxFuture<'static, Result<T>>;

pub type TokenPayloadFn<U> = Arc<dyn Fn(&U) -> TokenPayload + Send + Sync>;
pub type SerializeUserFn<U> = Arc<dyn Fn(&U) -> Value + Send + Sync>;
pub type FindUserFn<U> =
    Arc<dyn Fn(String, LookupContext) -> CallbackFuture<Option<U>> + Send + Sync>;
pub type CredentialCheckFn = Arc<dyn Fn(String, String) -> CallbackFuture<bool> + Send + Sync>;
pub type OtpRequestFn = Arc<dyn Fn(String, String) -> CallbackFuture<()> + Send + Sync>;
pub type OAuthCallbackFn<U> =
    Arc<dyn Fn(Value, String) -> CallbackFuture<Option<U>> + Send + Sync>;

/// Default token lifetime.
pub const DEFAULT_EXPIRES_IN: &str = "1d";

/// Name of the cookie carrying the token.
pub const TOKEN_COOKIE_NAME: &str = "token";

/// Login flow on whose behalf `find_user` is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    EmailPassword,
    PhoneOtp,
    OAuth,
    /// Resolving the subject of an already-issued token
    Token,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::EmailPassword => "emailPassword",
            Strategy::PhoneOtp => "phoneOtp",
            Strategy::OAuth => "oauth",
            Strategy::Token => "token",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context passed to `find_user` alongside the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupContext {
    pub strategy: Strategy,
}

impl LookupContext {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }
}

/// Execution mode of the host process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    /// Read `APP_ENV`; anything unset or unrecognised counts as production.
    pub fn from_env() -> Self {
        std::env::var("APP_ENV")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" | "test" | "local" => Ok(Environment::Development),
            other => Err(anyhow!("Unknown environment: {}", other)),
        }
    }
}

/// Signing key. Never printed.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Secret {
    fn from(secret: String) -> Self {
        Self(secret)
    }
}

impl From<&str> for Secret {
    fn from(secret: &str) -> Self {
        Self(secret.to_string())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CookieSameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl From<CookieSameSite> for SameSite {
    fn from(value: CookieSameSite) -> Self {
        match value {
            CookieSameSite::Strict => SameSite::Strict,
            CookieSameSite::Lax => SameSite::Lax,
            CookieSameSite::None => SameSite::None,
        }
    }
}

/// Attributes written on the token cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieOptions {
    pub path: String,
    pub domain: Option<String>,
    pub max_age_seconds: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: CookieSameSite,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            max_age_seconds: None,
            http_only: true,
            secure: true,
            same_site: CookieSameSite::Lax,
        }
    }
}

impl CookieOptions {
    /// Build the `token` cookie carrying `value`.
    pub fn build_cookie(&self, value: impl Into<String>) -> Cookie<'static> {
        let mut builder = Cookie::build((TOKEN_COOKIE_NAME, value.into()))
            .path(self.path.clone())
            .http_only(self.http_only)
            .secure(self.secure)
            .same_site(self.same_site.into());

        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(max_age) = self.max_age_seconds {
            builder = builder.max_age(cookie::time::Duration::seconds(max_age));
        }

        builder.build()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieSettings {
    pub enabled: bool,
    pub options: Option<CookieOptions>,
}

/// OTP shape used by the send-OTP strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpSettings {
    pub length: usize,
    pub charset: String,
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            length: DEFAULT_OTP_LENGTH,
            charset: DEFAULT_OTP_CHARSET.to_string(),
        }
    }
}

pub struct JwtSettings<U> {
    pub secret: Secret,
    pub expires_in: Option<String>,
    pub cookie: Option<CookieSettings>,
    pub generate_token_payload: TokenPayloadFn<U>,
}

impl<U> JwtSettings<U> {
    pub fn expires_in(&self) -> &str {
        self.expires_in.as_deref().unwrap_or(DEFAULT_EXPIRES_IN)
    }

    pub fn cookie_enabled(&self) -> bool {
        self.cookie.as_ref().is_some_and(|cookie| cookie.enabled)
    }

    /// Options to write the cookie with, present only when cookie mode is on.
    pub fn cookie_options(&self) -> Option<&CookieOptions> {
        self.cookie
            .as_ref()
            .filter(|cookie| cookie.enabled)
            .and_then(|cookie| cookie.options.as_ref())
    }
}

/// Active authentication configuration.
pub struct AuthConfig<U> {
    pub jwt: JwtSettings<U>,
    pub serialize_user: SerializeUserFn<U>,
    pub find_user: Option<FindUserFn<U>>,
    pub verify_password: Option<CredentialCheckFn>,
    pub on_otp_request: Option<OtpRequestFn>,
    pub verify_otp: Option<CredentialCheckFn>,
    pub oauth_callback_handler: Option<OAuthCallbackFn<U>>,
    pub otp: OtpSettings,
    pub environment: Environment,
}

impl<U> fmt::Debug for AuthConfig<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &self.jwt.secret)
            .field("expires_in", &self.jwt.expires_in())
            .field("cookie", &self.jwt.cookie)
            .field("find_user", &self.find_user.is_some())
            .field("verify_password", &self.verify_password.is_some())
            .field("on_otp_request", &self.on_otp_request.is_some())
            .field("verify_otp", &self.verify_otp.is_some())
            .field("oauth_callback_handler", &self.oauth_callback_handler.is_some())
            .field("otp", &self.otp)
            .field("environment", &self.environment)
            .finish()
    }
}

impl<U: Send + 'static> AuthConfig<U> {
    pub fn builder(secret: impl Into<Secret>) -> AuthConfigBuilder<U> {
        AuthConfigBuilder::new(secret)
    }
}

/// Builder for [`AuthConfig`]. Async callbacks are boxed on the way in.
pub struct AuthConfigBuilder<U> {
    secret: Secret,
    expires_in: Option<String>,
    cookie: Option<CookieSettings>,
    generate_token_payload: Option<TokenPayloadFn<U>>,
    serialize_user: Option<SerializeUserFn<U>>,
    find_user: Option<FindUserFn<U>>,
    verify_password: Option<CredentialCheckFn>,
    on_otp_request: Option<OtpRequestFn>,
    verify_otp: Option<CredentialCheckFn>,
    oauth_callback_handler: Option<OAuthCallbackFn<U>>,
    otp: OtpSettings,
    environment: Environment,
}

impl<U: Send + 'static> AuthConfigBuilder<U> {
    pub fn new(secret: impl Into<Secret>) -> Self {
        Self {
            secret: secret.into(),
            expires_in: None,
            cookie: None,
            generate_token_payload: None,
            serialize_user: None,
            find_user: None,
            verify_password: None,
            on_otp_request: None,
            verify_otp: None,
            oauth_callback_handler: None,
            otp: OtpSettings::default(),
            environment: Environment::default(),
        }
    }

    pub fn expires_in(mut self, expires_in: impl Into<String>) -> Self {
        self.expires_in = Some(expires_in.into());
        self
    }

    pub fn cookie(mut self, enabled: bool, options: Option<CookieOptions>) -> Self {
        self.cookie = Some(CookieSettings { enabled, options });
        self
    }

    pub fn generate_token_payload<F>(mut self, f: F) -> Self
    where
        F: Fn(&U) -> TokenPayload + Send + Sync + 'static,
    {
        self.generate_token_payload = Some(Arc::new(f));
        self
    }

    pub fn serialize_user<F>(mut self, f: F) -> Self
    where
        F: Fn(&U) -> Value + Send + Sync + 'static,
    {
        self.serialize_user = Some(Arc::new(f));
        self
    }

    pub fn find_user<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, LookupContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<U>>> + Send + 'static,
    {
        self.find_user = Some(Arc::new(
            move |identifier: String, context: LookupContext| -> CallbackFuture<Option<U>> {
                Box::pin(f(identifier, context))
            },
        ));
        self
    }

    pub fn verify_password<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        self.verify_password = Some(Arc::new(
            move |email: String, password: String| -> CallbackFuture<bool> {
                Box::pin(f(email, password))
            },
        ));
        self
    }

    pub fn on_otp_request<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_otp_request = Some(Arc::new(
            move |phone: String, otp: String| -> CallbackFuture<()> { Box::pin(f(phone, otp)) },
        ));
        self
    }

    pub fn verify_otp<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        self.verify_otp = Some(Arc::new(
            move |phone: String, otp: String| -> CallbackFuture<bool> { Box::pin(f(phone, otp)) },
        ));
        self
    }

    pub fn oauth_callback_handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<U>>> + Send + 'static,
    {
        self.oauth_callback_handler = Some(Arc::new(
            move |profile: Value, provider: String| -> CallbackFuture<Option<U>> {
                Box::pin(f(profile, provider))
            },
        ));
        self
    }

    pub fn otp(mut self, length: usize, charset: impl Into<String>) -> Self {
        self.otp = OtpSettings {
            length,
            charset: charset.into(),
        };
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn build(self) -> Result<AuthConfig<U>> {
        if self.secret.is_empty() {
            return Err(anyhow!("jwt.secret must not be empty"));
        }
        if self.otp.charset.is_empty() {
            return Err(anyhow!("OTP charset must not be empty"));
        }
        if self.otp.length == 0 {
            return Err(anyhow!("OTP length must be at least 1"));
        }

        let generate_token_payload = self
            .generate_token_payload
            .ok_or_else(|| anyhow!("jwt.generate_token_payload is required"))?;
        let serialize_user = self
            .serialize_user
            .ok_or_else(|| anyhow!("serialize_user is required"))?;

        Ok(AuthConfig {
            jwt: JwtSettings {
                secret: self.secret,
                expires_in: self.expires_in,
                cookie: self.cookie,
                generate_token_payload,
            },
            serialize_user,
            find_user: self.find_user,
            verify_password: self.verify_password,
            on_otp_request: self.on_otp_request,
            verify_otp: self.verify_otp,
            oauth_callback_handler: self.oauth_callback_handler,
            otp: self.otp,
            environment: self.environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct User {
        id: u32,
    }

    fn minimal() -> AuthConfigBuilder<User> {
        AuthConfig::builder("test-secret")
            .generate_token_payload(|user: &User| {
                let mut payload = TokenPayload::new();
                payload.insert("id".into(), json!(user.id));
                payload
            })
            .serialize_user(|user: &User| json!({ "id": user.id }))
    }

    #[test]
    fn test_builder_defaults() {
        let config = minimal().build().unwrap();
        assert_eq!(config.jwt.expires_in(), DEFAULT_EXPIRES_IN);
        assert!(!config.jwt.cookie_enabled());
        assert!(config.jwt.cookie_options().is_none());
        assert_eq!(config.otp, OtpSettings::default());
        assert_eq!(config.environment, Environment::Production);
        assert!(config.find_user.is_none());
        assert!(config.verify_password.is_none());
    }

    #[test]
    fn test_builder_requires_payload_and_serializer() {
        let err = AuthConfig::<User>::builder("secret")
            .serialize_user(|user: &User| json!({ "id": user.id }))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("generate_token_payload"));

        let err = AuthConfig::<User>::builder("secret")
            .generate_token_payload(|_: &User| TokenPayload::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("serialize_user"));
    }

    #[test]
    fn test_builder_rejects_empty_secret_and_charset() {
        assert!(AuthConfig::<User>::builder("")
            .generate_token_payload(|_: &User| TokenPayload::new())
            .serialize_user(|_: &User| json!({}))
            .build()
            .is_err());
        assert!(minimal().otp(6, "").build().is_err());
    }

    #[test]
    fn test_builder_rejects_zero_otp_length() {
        let err = minimal().otp(0, "0123456789").build().unwrap_err();
        assert!(err.to_string().contains("OTP length"));
        assert!(minimal().otp(1, "0123456789").build().is_ok());
    }

    #[test]
    fn test_cookie_options_only_when_enabled() {
        let config = minimal()
            .cookie(false, Some(CookieOptions::default()))
            .build()
            .unwrap();
        assert!(config.jwt.cookie_options().is_none());

        let config = minimal().cookie(true, None).build().unwrap();
        assert!(config.jwt.cookie_enabled());
        assert!(config.jwt.cookie_options().is_none());

        let config = minimal()
            .cookie(true, Some(CookieOptions::default()))
            .build()
            .unwrap();
        assert!(config.jwt.cookie_options().is_some());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = minimal().build().unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("test-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_build_cookie_attributes() {
        let options = CookieOptions {
            max_age_seconds: Some(3600),
            domain: Some("example.com".into()),
            ..CookieOptions::default()
        };
        let cookie = options.build_cookie("abc");
        assert_eq!(cookie.name(), TOKEN_COOKIE_NAME);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::seconds(3600)));
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert!("staging".parse::<Environment>().is_err());
        assert!(Environment::Production.is_production());
        assert_eq!(Strategy::PhoneOtp.as_str(), "phoneOtp");
    }
}
