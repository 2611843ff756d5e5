use super::{complete_login, LoginOutcome};
use crate::{
    auth::{AuthService, LookupContext, Strategy},
    models::{present, EmailPasswordRequest},
    utils::{ApiError, ApiResult},
};
use anyhow::Context;
use tracing::debug;

impl<U: Send + Sync + 'static> AuthService<U> {
    /// Email/password login.
    ///
    /// The password is checked before the user is looked up, so a wrong
    /// password never reveals whether the email exists.
    pub async fn login_with_email_password(
        &self,
        request: EmailPasswordRequest,
    ) -> ApiResult<LoginOutcome> {
        let (Some(email), Some(password)) = (present(&request.email), present(&request.password))
        else {
            return Err(ApiError::validation_error("Email and password are required"));
        };

        let config = self.config()?;

        let (Some(verify_password), Some(find_user)) =
            (config.verify_password.as_ref(), config.find_user.as_ref())
        else {
            tracing::error!("Email/password login attempted without verify_password/find_user");
            return Err(ApiError::configuration_error(
                "Password verification not configured",
            ));
        };

        let valid = verify_password(email.to_string(), password.to_string())
            .await
            .context("Email/password login error: verify_password failed")?;
        if !valid {
            debug!("Password rejected");
            return Err(ApiError::authentication_error("Invalid email or password"));
        }

        let user = find_user(
            email.to_string(),
            LookupContext::new(Strategy::EmailPassword),
        )
        .await
        .context("Email/password login error: find_user failed")?
        .ok_or_else(|| ApiError::not_found_error("User not found"))?;

        complete_login(&config, &user, Strategy::EmailPassword)
    }
}
