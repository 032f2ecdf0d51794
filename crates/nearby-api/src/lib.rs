//! HTTP surface and domain services for Nearby.

pub mod auth;
pub mod authenticator;
pub mod content;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod posts;
pub mod proximity;
pub mod rooms;
pub mod state;

use axum::{
    Router,
    http::HeaderName,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::{ApiError, ERROR_CODE_HEADER};
use crate::middleware::require_auth;
use crate::state::AppState;

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/rooms", get(rooms::find_rooms))
        .route("/suggestions", get(posts::suggestions))
        .route("/posts/{id}", get(posts::get_post))
        .route("/posts/{id}/messages", get(messages::list_messages))
        .with_state(state.clone());

    // Layered per method router so an unsupported method is a 405, not a 401.
    let session = from_fn_with_state(state.clone(), require_auth);
    let protected_routes = Router::new()
        .route("/logout", post(auth::logout).route_layer(session.clone()))
        .route("/rooms", post(rooms::ensure_room).route_layer(session.clone()))
        .route("/posts", post(posts::create_post).route_layer(session.clone()))
        .route(
            "/posts/{id}/messages",
            post(messages::post_message).route_layer(session),
        )
        .with_state(state);

    // Browsers only let scripts read non-simple headers that are exposed.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(ERROR_CODE_HEADER)]);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

/// Run blocking store or hashing work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
    })?
}
