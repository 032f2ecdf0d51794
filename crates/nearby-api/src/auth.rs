use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use nearby_types::api::{LoginRequest, LoginResponse, RegisterRequest};

use crate::blocking;
use crate::error::ApiError;
use crate::middleware::SessionToken;
use crate::state::AppState;

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    // Argon2 and the insert both block.
    blocking(move || {
        state
            .authenticator
            .register(&req.name, &req.email, &req.password)
    })
    .await?;

    Ok(StatusCode::CREATED)
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let token = blocking(move || state.authenticator.login(&req.email, &req.password)).await?;

    Ok(Json(LoginResponse { token }))
}

/// POST /logout: revokes the session used for this request.
pub async fn logout(
    State(state): State<AppState>,
    Extension(SessionToken(token)): Extension<SessionToken>,
) -> impl IntoResponse {
    state.authenticator.logout(&token);
    StatusCode::NO_CONTENT
}
