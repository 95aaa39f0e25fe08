/// Authentication layer for resource routes
///
/// Validates the Bearer access token and stores the caller's
/// [`AuthContext`] in request extensions, where handlers pick it up with
/// `Extension<AuthContext>`.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use softdesk_shared::auth::middleware::{authenticate, AuthContext};

use crate::{app::AppState, error::ApiError};

pub async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth: AuthContext = authenticate(req.headers(), state.jwt_secret()).map_err(|e| {
        tracing::debug!(error = %e, path = %req.uri().path(), "Authentication failed");
        ApiError::from(e)
    })?;

    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}
