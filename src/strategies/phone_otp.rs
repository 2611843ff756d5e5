use super::{complete_login, LoginOutcome};
use crate::{
    auth::{generate_otp, AuthService, LookupContext, Strategy},
    models::{present, OtpSentResponse, SendOtpRequest, VerifyOtpRequest},
    utils::{ApiError, ApiResult},
};
use anyhow::Context;
use tracing::{debug, info};

/// Result of a successful send-OTP call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpDispatch {
    /// The generated code, echoed only outside production
    pub debug_otp: Option<String>,
}

impl OtpDispatch {
    pub fn into_response_body(self) -> OtpSentResponse {
        OtpSentResponse {
            success: true,
            message: "OTP sent".to_string(),
            debug_otp: self.debug_otp,
        }
    }
}

impl<U: Send + Sync + 'static> AuthService<U> {
    /// Generate an OTP for `phone` and hand it to the host for delivery.
    ///
    /// Delivery failures are not retried and surface as internal errors.
    pub async fn send_otp(&self, request: SendOtpRequest) -> ApiResult<OtpDispatch> {
        let Some(phone) = present(&request.phone) else {
            return Err(ApiError::validation_error("Phone is required"));
        };

        let config = self.config()?;

        let Some(on_otp_request) = config.on_otp_request.as_ref() else {
            tracing::error!("send_otp called without an on_otp_request callback");
            return Err(ApiError::configuration_error("OTP logic not implemented"));
        };

        let otp = generate_otp(config.otp.length, &config.otp.charset);
        on_otp_request(phone.to_string(), otp.clone())
            .await
            .context("OTP dispatch failed")?;
        info!("OTP dispatched");

        let debug_otp = (!config.environment.is_production()).then_some(otp);
        Ok(OtpDispatch { debug_otp })
    }

    /// Check an OTP for `phone` and log the matching user in.
    pub async fn verify_otp(&self, request: VerifyOtpRequest) -> ApiResult<LoginOutcome> {
        let (Some(phone), Some(otp)) = (present(&request.phone), present(&request.otp)) else {
            return Err(ApiError::validation_error("Phone and OTP are required"));
        };

        let config = self.config()?;

        let (Some(verify_otp), Some(find_user)) =
            (config.verify_otp.as_ref(), config.find_user.as_ref())
        else {
            tracing::error!("verify_otp called without verify_otp/find_user callbacks");
            return Err(ApiError::configuration_error(
                "OTP verification not configured",
            ));
        };

        let valid = verify_otp(phone.to_string(), otp.to_string())
            .await
            .context("OTP verification failed")?;
        if !valid {
            debug!("OTP rejected");
            return Err(ApiError::authentication_error("Invalid OTP"));
        }

        let user = find_user(phone.to_string(), LookupContext::new(Strategy::PhoneOtp))
            .await
            .context("User lookup after OTP verification failed")?
            .ok_or_else(|| ApiError::not_found_error("User not found"))?;

        complete_login(&config, &user, Strategy::PhoneOtp)
    }
}
