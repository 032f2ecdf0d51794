//! Great-circle distance, shared by Rust callers and the `distance()` SQL
//! function.

use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;

/// Mean Earth radius in metres (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Haversine distance in metres between two (lat, lon) points in degrees.
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Clamp guards against a > 1 from rounding on antipodal points.
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}

/// Registers `distance(lat1, lon1, lat2, lon2)` on a connection. Returns
/// metres, matching [`distance_m`].
pub fn register_distance_function(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "distance",
        4,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let lat1 = ctx.get::<f64>(0)?;
            let lon1 = ctx.get::<f64>(1)?;
            let lat2 = ctx.get::<f64>(2)?;
            let lon2 = ctx.get::<f64>(3)?;
            Ok(distance_m(lat1, lon1, lat2, lon2))
        },
    )
}
