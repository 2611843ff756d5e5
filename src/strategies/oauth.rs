use super::{complete_login, LoginOutcome};
use crate::{
    auth::{AuthService, Strategy},
    models::{present, OAuthLoginRequest},
    utils::{ApiError, ApiResult},
};
use anyhow::Context;

impl<U: Send + Sync + 'static> AuthService<U> {
    /// Log in with a profile the host obtained from an OAuth provider.
    ///
    /// The provider exchange itself happens outside this crate; the
    /// `oauth_callback_handler` maps the profile to a user (creating one if the
    /// host wants to) and a token is issued for it.
    pub async fn login_with_oauth_profile(
        &self,
        request: OAuthLoginRequest,
    ) -> ApiResult<LoginOutcome> {
        let Some(provider) = present(&request.provider) else {
            return Err(ApiError::validation_error("Provider is required"));
        };

        let config = self.config()?;

        let Some(handler) = config.oauth_callback_handler.as_ref() else {
            tracing::error!("OAuth login attempted without an oauth_callback_handler");
            return Err(ApiError::configuration_error("OAuth not configured"));
        };

        let user = handler(request.profile, provider.to_string())
            .await
            .with_context(|| format!("OAuth callback for provider {} failed", provider))?
            .ok_or_else(|| ApiError::not_found_error("User not found"))?;

        complete_login(&config, &user, Strategy::OAuth)
    }
}
