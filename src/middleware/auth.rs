use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::error::{AppError, Result};
use crate::security::{TokenService, UserIdentity};
use crate::AppState;

/// Resolve the caller from an `Authorization: Bearer <token>` header.
///
/// A missing header, a non-Bearer scheme and a bad token all produce the same
/// `Unauthenticated` error.
pub fn authorize(headers: &HeaderMap, tokens: &TokenService) -> Result<UserIdentity> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthenticated)?;

    let token = header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty() && !t.contains(char::is_whitespace))
        .ok_or(AppError::Unauthenticated)?;

    tokens.validate(token)
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let identity = authorize(request.headers(), &state.tokens)?;

    tracing::debug!(user_id = %identity.user_id, "Request authenticated");
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
