use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use nearby_auth::token::fingerprint;

use crate::error::ApiError;
use crate::state::AppState;

/// The raw token of the request's session, for handlers that act on the
/// session itself (logout).
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

/// Resolve the session token in the Authorization header and attach the
/// caller's [`Identity`](nearby_types::models::Identity) to the request.
/// The header may hold the bare token or `Bearer <token>`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(req.headers()).ok_or(ApiError::Unauthenticated)?;

    let identity = state.authenticator.authenticate(&token).ok_or_else(|| {
        debug!("Rejected unknown or expired session {}", fingerprint(&token));
        ApiError::Unauthenticated
    })?;

    req.extensions_mut().insert(identity);
    req.extensions_mut().insert(SessionToken(token));
    Ok(next.run(req).await)
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim_start();
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then(|| token.to_string())
}
