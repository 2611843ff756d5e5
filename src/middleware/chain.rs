//! Middleware composer.

use super::identity::{AttachOrg, AttachRole, AttachUser, ContextMiddleware, Flow, RequestContext};
use crate::{auth::AuthService, utils::ApiError};
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{fmt, str::FromStr, sync::Arc};

/// Names accepted by [`build_chain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MiddlewareKind {
    User,
    Role,
    Org,
}

impl MiddlewareKind {
    /// Execution order, independent of how the selection was written.
    pub const ORDER: [MiddlewareKind; 3] =
        [MiddlewareKind::User, MiddlewareKind::Role, MiddlewareKind::Org];

    pub fn as_str(&self) -> &'static str {
        match self {
            MiddlewareKind::User => "user",
            MiddlewareKind::Role => "role",
            MiddlewareKind::Org => "org",
        }
    }
}

impl FromStr for MiddlewareKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "user" => Ok(MiddlewareKind::User),
            "role" => Ok(MiddlewareKind::Role),
            "org" => Ok(MiddlewareKind::Org),
            other => Err(anyhow::anyhow!("Unknown auth middleware: {}", other)),
        }
    }
}

/// Ordered list of context steps.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    steps: Vec<Arc<dyn ContextMiddleware>>,
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("steps", &self.names())
            .finish()
    }
}

impl MiddlewareChain {
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order, stopping at the first halt.
    pub async fn run(&self, headers: &HeaderMap) -> Result<RequestContext, ApiError> {
        let mut ctx = RequestContext::default();
        for step in &self.steps {
            match step.handle(headers, ctx).await {
                Flow::Continue(next) => ctx = next,
                Flow::Halt(err) => {
                    tracing::debug!(step = step.name(), "Request halted: {}", err.message);
                    return Err(err);
                }
            }
        }
        Ok(ctx)
    }
}

/// Assemble the selected steps in the fixed order user, role, org.
///
/// Only membership in `selection` matters. Selecting role or org without user
/// is allowed; those steps then always see an empty user.
pub fn build_chain<U: Send + Sync + 'static>(
    auth: Arc<AuthService<U>>,
    selection: &[MiddlewareKind],
) -> MiddlewareChain {
    let steps = MiddlewareKind::ORDER
        .into_iter()
        .filter(|kind| selection.contains(kind))
        .map(|kind| -> Arc<dyn ContextMiddleware> {
            match kind {
                MiddlewareKind::User => Arc::new(AttachUser::new(auth.clone())),
                MiddlewareKind::Role => Arc::new(AttachRole),
                MiddlewareKind::Org => Arc::new(AttachOrg),
            }
        })
        .collect();

    MiddlewareChain { steps }
}

/// Like [`build_chain`], from names such as `["user", "role"]`. Unknown names
/// are skipped.
pub fn build_chain_from_names<U, S>(auth: Arc<AuthService<U>>, names: &[S]) -> MiddlewareChain
where
    U: Send + Sync + 'static,
    S: AsRef<str>,
{
    let selection: Vec<MiddlewareKind> = names
        .iter()
        .filter_map(|name| match name.as_ref().parse() {
            Ok(kind) => Some(kind),
            Err(err) => {
                tracing::warn!("{}", err);
                None
            }
        })
        .collect();

    build_chain(auth, &selection)
}

/// Axum middleware running the chain for each request.
///
/// Use with `axum::middleware::from_fn_with_state(Arc<MiddlewareChain>, auth_layer)`.
/// Handlers read the result through `Extension<RequestContext>`.
pub async fn auth_layer(
    State(chain): State<Arc<MiddlewareChain>>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = chain.run(request.headers()).await;
    match outcome {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}
