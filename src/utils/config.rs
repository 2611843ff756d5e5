use crate::auth::{
    config::Secret, AuthConfigBuilder, CookieOptions, Environment, DEFAULT_EXPIRES_IN,
};
use crate::auth::otp::{DEFAULT_OTP_CHARSET, DEFAULT_OTP_LENGTH};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// JWT configuration
    pub jwt: JwtConfig,
    /// OTP configuration
    pub otp: OtpConfig,
    pub environment: Environment,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret,
    pub expires_in: String,
    pub cookie_enabled: bool,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub length: usize,
    pub charset: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let environment = Environment::from_env();

        let config = Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3001".to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid PORT value"))?,
                cors_origins: env::var("CORS_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:5173".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            jwt: JwtConfig {
                secret: jwt_secret(environment)?,
                expires_in: env::var("JWT_EXPIRES_IN")
                    .unwrap_or_else(|_| DEFAULT_EXPIRES_IN.to_string()),
                cookie_enabled: env_flag("AUTH_COOKIE_ENABLED", false),
                cookie_secure: env_flag("AUTH_COOKIE_SECURE", environment.is_production()),
            },
            otp: OtpConfig {
                length: env::var("OTP_LENGTH")
                    .ok()
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(DEFAULT_OTP_LENGTH),
                charset: env::var("OTP_CHARSET")
                    .ok()
                    .filter(|value| !value.is_empty())
                    .unwrap_or_else(|| DEFAULT_OTP_CHARSET.to_string()),
            },
            environment,
        };

        Ok(config)
    }

    /// Auth builder with the signing, cookie, OTP and environment settings
    /// filled in. The host still supplies its callbacks.
    pub fn auth_builder<U: Send + 'static>(&self) -> AuthConfigBuilder<U> {
        let cookie_options = CookieOptions {
            secure: self.jwt.cookie_secure,
            ..CookieOptions::default()
        };

        AuthConfigBuilder::new(self.jwt.secret.clone())
            .expires_in(self.jwt.expires_in.clone())
            .cookie(self.jwt.cookie_enabled, Some(cookie_options))
            .otp(self.otp.length, self.otp.charset.clone())
            .environment(self.environment)
    }
}

fn jwt_secret(environment: Environment) -> anyhow::Result<Secret> {
    match env::var("JWT_SECRET") {
        Ok(secret) if !secret.is_empty() => Ok(Secret::new(secret)),
        _ if environment.is_production() => {
            Err(anyhow::anyhow!("JWT_SECRET is required in production"))
        }
        _ => {
            // Generate a random secret if not provided (dev only)
            use rand::Rng;
            tracing::warn!("JWT_SECRET not set; using a random secret, tokens will not survive a restart");
            let mut rng = rand::thread_rng();
            let secret: String = (0..32)
                .map(|_| rng.gen::<u8>())
                .map(|b| format!("{:02x}", b))
                .collect();
            Ok(Secret::new(secret))
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}
