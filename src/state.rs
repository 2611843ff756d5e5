use crate::{auth::AuthService, middleware::MiddlewareChain};
use std::sync::Arc;

/// Shared router state: the auth service and the chain guarding protected routes.
pub struct AppState<U> {
    pub auth_service: Arc<AuthService<U>>,
    pub chain: Arc<MiddlewareChain>,
}

impl<U> AppState<U> {
    pub fn new(auth_service: Arc<AuthService<U>>, chain: MiddlewareChain) -> Self {
        Self {
            auth_service,
            chain: Arc::new(chain),
        }
    }
}

// Manual impl so `U` itself need not be `Clone`.
impl<U> Clone for AppState<U> {
    fn clone(&self) -> Self {
        Self {
            auth_service: self.auth_service.clone(),
            chain: self.chain.clone(),
        }
    }
}
