use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use nearby_types::api::{SendMessageRequest, SendMessageResponse};
use nearby_types::models::{Identity, Message};

use crate::blocking;
use crate::content::parse_post_id;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /posts/{id}/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let post_id = parse_post_id(&id)?;

    let messages = blocking(move || state.content.list_messages(post_id)).await?;
    Ok(Json(messages))
}

/// POST /posts/{id}/messages
pub async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = parse_post_id(&id)?;
    let Json(req) = payload?;

    let message_id =
        blocking(move || state.content.post_message(&identity, post_id, &req.body)).await?;

    Ok((StatusCode::CREATED, Json(SendMessageResponse { message_id })))
}
