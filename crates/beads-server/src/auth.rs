//! Bearer-token authentication and tenant selection.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};

use beads_core::IssueStore;

use crate::{AppState, ApiError};

/// The store the request's token resolved to.
#[derive(Clone)]
pub struct Tenant(pub Arc<IssueStore>);

/// Token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Resolve the bearer token to a tenant store or reject with 401.
pub async fn require_tenant(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .ok_or(ApiError::Unauthorized)?;

    let store = state.registry.resolve(token).ok_or_else(|| {
        tracing::debug!(path = %request.uri().path(), "rejected unknown token");
        ApiError::Unauthorized
    })?;
    request.extensions_mut().insert(Tenant(store));
    Ok(next.run(request).await)
}
