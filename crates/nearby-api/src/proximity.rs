use std::sync::Arc;

use tracing::warn;

use nearby_db::Database;
use nearby_types::api::LocationQuery;
use nearby_types::models::{PostWithAuthor, Room};

use crate::error::ApiError;

/// Default room radius in metres.
pub const ROOM_RADIUS_M: f64 = 10.0;
/// Default suggestion radius in metres.
pub const SUGGESTION_RADIUS_M: f64 = 100_000.0;

/// A validated point. Holding one means the coordinates are finite and in
/// range, so nothing downstream needs to check again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    lat: f64,
    lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Result<Self, ApiError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ApiError::invalid("Latitude must be between -90 and 90"));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(ApiError::invalid("Longitude must be between -180 and 180"));
        }
        Ok(Self { lat, lon })
    }

    /// Parses `?lat=&lon=`. Missing or unparsable values are client errors.
    pub fn from_query(query: &LocationQuery) -> Result<Self, ApiError> {
        let lat = parse_coordinate("lat", query.lat.as_deref())?;
        let lon = parse_coordinate("lon", query.lon.as_deref())?;
        Self::new(lat, lon)
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

fn parse_coordinate(name: &str, raw: Option<&str>) -> Result<f64, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::invalid(format!("Missing {name} parameter")))?;
    raw.parse()
        .map_err(|_| ApiError::invalid(format!("Invalid {name} parameter")))
}

/// Search radii in metres. Distances are great-circle metres throughout.
#[derive(Debug, Clone, Copy)]
pub struct ProximityConfig {
    pub room_radius_m: f64,
    pub suggestion_radius_m: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            room_radius_m: ROOM_RADIUS_M,
            suggestion_radius_m: SUGGESTION_RADIUS_M,
        }
    }
}

pub struct ProximityMatcher {
    db: Arc<Database>,
    config: ProximityConfig,
}

impl ProximityMatcher {
    pub fn new(db: Arc<Database>, config: ProximityConfig) -> Self {
        Self { db, config }
    }

    /// Rooms strictly closer than the room radius.
    pub fn find_rooms(&self, at: Coordinates) -> Result<Vec<Room>, ApiError> {
        let rows = self.db.rooms_within(at.lat, at.lon, self.config.room_radius_m)?;
        Ok(rows.into_iter().map(Room::from).collect())
    }

    /// Posts strictly closer than the suggestion radius, with author names.
    pub fn find_nearby_posts(&self, at: Coordinates) -> Result<Vec<PostWithAuthor>, ApiError> {
        let rows = self.db.posts_within(at.lat, at.lon, self.config.suggestion_radius_m)?;

        let posts = rows
            .into_iter()
            .filter_map(|row| {
                let post_id = row.post_id;
                PostWithAuthor::try_from(row)
                    .map_err(|e| warn!("Skipping corrupt post {}: {:#}", post_id, e))
                    .ok()
            })
            .collect();
        Ok(posts)
    }

    /// The nearest room within the room radius, created if none exists.
    pub fn ensure_room(&self, at: Coordinates) -> Result<Room, ApiError> {
        let row = self.db.ensure_room(at.lat, at.lon, self.config.room_radius_m)?;
        Ok(row.into())
    }
}
