use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Context, Result, bail};
use chrono::TimeDelta;
use tracing::info;

use nearby_api::proximity::{ROOM_RADIUS_M, SUGGESTION_RADIUS_M};

/// Server configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Metres.
    pub room_radius_m: f64,
    /// Metres.
    pub suggestion_radius_m: f64,
    /// `None` disables expiry.
    pub session_ttl: Option<TimeDelta>,
    pub session_sweep_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config = Self {
            host: try_load("NEARBY_HOST", "0.0.0.0".to_string())?,
            port: try_load("NEARBY_PORT", 5000)?,
            db_path: PathBuf::from(try_load("NEARBY_DB_PATH", "nearby.db".to_string())?),
            room_radius_m: positive(try_load("NEARBY_ROOM_RADIUS_M", ROOM_RADIUS_M)?, "NEARBY_ROOM_RADIUS_M")?,
            suggestion_radius_m: positive(
                try_load("NEARBY_SUGGESTION_RADIUS_M", SUGGESTION_RADIUS_M)?,
                "NEARBY_SUGGESTION_RADIUS_M",
            )?,
            session_ttl: session_ttl(try_load("NEARBY_SESSION_TTL_HOURS", 720)?)?,
            session_sweep_secs: try_load::<u64>("NEARBY_SESSION_SWEEP_SECS", 300)?.max(1),
        };

        Ok(config)
    }
}

fn try_load<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid {key} value '{raw}'")),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

/// `0` hours disables expiry.
fn session_ttl(hours: i64) -> Result<Option<TimeDelta>> {
    if hours < 0 {
        bail!("NEARBY_SESSION_TTL_HOURS must not be negative");
    }
    if hours == 0 {
        return Ok(None);
    }
    match TimeDelta::try_hours(hours) {
        Some(ttl) => Ok(Some(ttl)),
        None => bail!("NEARBY_SESSION_TTL_HOURS {hours} is out of range"),
    }
}

fn positive(value: f64, key: &str) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        bail!("{key} must be a positive number of metres");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_uses_default() {
        let port: u16 = try_load("NEARBY_TEST_UNSET_PORT", 5000).unwrap();
        assert_eq!(port, 5000);
    }

    #[test]
    fn radius_must_be_positive() {
        assert!(positive(10.0, "X").is_ok());
        assert!(positive(0.0, "X").is_err());
        assert!(positive(f64::NAN, "X").is_err());
    }

    #[test]
    fn session_ttl_bounds() {
        assert_eq!(session_ttl(0).unwrap(), None);
        assert_eq!(session_ttl(720).unwrap(), Some(TimeDelta::hours(720)));
        assert!(session_ttl(-1).is_err());
        assert!(session_ttl(i64::MAX).is_err());
        assert!(session_ttl(i64::MAX / 3600).is_err());
    }
}
