use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};

use nearby_types::api::{CreatePostRequest, CreatePostResponse, LocationQuery};
use nearby_types::models::{Identity, PostWithAuthor};

use crate::blocking;
use crate::content::parse_post_id;
use crate::error::ApiError;
use crate::proximity::Coordinates;
use crate::state::AppState;

/// GET /suggestions?lat=&lon=: posts around the caller.
pub async fn suggestions(
    State(state): State<AppState>,
    query: Result<Query<LocationQuery>, QueryRejection>,
) -> Result<Json<Vec<PostWithAuthor>>, ApiError> {
    let Query(query) = query?;
    let at = Coordinates::from_query(&query)?;

    let posts = blocking(move || state.proximity.find_nearby_posts(at)).await?;
    Ok(Json(posts))
}

/// GET /posts/{id}
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PostWithAuthor>, ApiError> {
    let post_id = parse_post_id(&id)?;

    let post = blocking(move || state.content.get_post(post_id)).await?;
    Ok(Json(post))
}

/// POST /posts
pub async fn create_post(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let at = Coordinates::new(req.lat, req.lon)?;

    let post_id = blocking(move || {
        state
            .content
            .create_post(&identity, at, &req.subject, &req.description)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(CreatePostResponse { post_id })))
}
