pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;
pub mod strategies;
pub mod utils;

pub use auth::{AuthConfig, AuthConfigBuilder, AuthService, LookupContext, Strategy, TokenPayload};
pub use handlers::create_router;
pub use middleware::{build_chain, build_chain_from_names, MiddlewareChain, MiddlewareKind, RequestContext};
pub use state::AppState;
pub use strategies::LoginOutcome;
pub use utils::{ApiError, ApiResult, Config};
