use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};

use nearby_types::api::{CreateRoomRequest, LocationQuery};
use nearby_types::models::Room;

use crate::blocking;
use crate::error::ApiError;
use crate::proximity::Coordinates;
use crate::state::AppState;

/// GET /rooms?lat=&lon=
pub async fn find_rooms(
    State(state): State<AppState>,
    query: Result<Query<LocationQuery>, QueryRejection>,
) -> Result<Json<Vec<Room>>, ApiError> {
    let Query(query) = query?;
    // Validate before touching the store.
    let at = Coordinates::from_query(&query)?;

    let rooms = blocking(move || state.proximity.find_rooms(at)).await?;
    Ok(Json(rooms))
}

/// POST /rooms: join the room at this spot, creating it if needed.
pub async fn ensure_room(
    State(state): State<AppState>,
    payload: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> Result<Json<Room>, ApiError> {
    let Json(req) = payload?;
    let at = Coordinates::new(req.lat, req.lon)?;

    let room = blocking(move || state.proximity.ensure_room(at)).await?;
    Ok(Json(room))
}
