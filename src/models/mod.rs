use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Email/password login request
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct EmailPasswordRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Send-OTP request
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub phone: Option<String>,
}

/// Verify-OTP request
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub otp: Option<String>,
}

/// Profile handed over after the host completed an OAuth exchange
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct OAuthLoginRequest {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub profile: Value,
}

/// Successful login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: Value,
}

/// Send-OTP response. `debug_otp` is only ever set outside production.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpSentResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "debugOtp", default, skip_serializing_if = "Option::is_none")]
    pub debug_otp: Option<String>,
}

/// Request context as seen by a protected handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextResponse {
    pub success: bool,
    pub user: Option<Value>,
    pub role: Option<String>,
    pub org: Option<Value>,
}

/// Treat absent and empty strings alike.
pub(crate) fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}
