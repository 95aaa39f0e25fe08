/// API route handlers
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login and token refresh
/// - `accounts`: Read-only account directory
/// - `projects`, `memberships`, `issues`, `notes`: Resource CRUD
///
/// Resource handlers follow the same sequence: resolve the request context,
/// run the coarse policy check, load the object (404 if absent), run the
/// per-object check, then validate and persist.

pub mod accounts;
pub mod auth;
pub mod health;
pub mod issues;
pub mod memberships;
pub mod notes;
pub mod projects;

use serde::Deserialize;
use softdesk_shared::{
    auth::{
        authorization::{authorize, Action, Parent, Policy, RequestContext},
        middleware::AuthContext,
    },
    visibility::ParentFilter,
};

use crate::{app::AppState, error::ApiResult};

/// `?project_id=` list filter
///
/// Kept as a raw string so a malformed id narrows the list to nothing
/// instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectFilter {
    pub project_id: Option<String>,
}

impl ProjectFilter {
    pub fn parent(&self) -> ParentFilter {
        ParentFilter::parse(self.project_id.as_deref())
    }
}

/// Resolves the request context and runs the coarse check of `policies`
pub(crate) async fn check_request(
    state: &AppState,
    auth: &AuthContext,
    action: Action,
    parent: Parent,
    policies: &[Policy],
) -> ApiResult<RequestContext> {
    let ctx = RequestContext::resolve(&state.db, auth.account_id, action, parent).await?;
    authorize(policies, &ctx)?;
    Ok(ctx)
}
