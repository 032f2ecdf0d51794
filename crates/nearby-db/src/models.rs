//! Database row types: these map directly to SQLite rows.
//! Distinct from nearby-types models to keep the DB layer independent.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};

use nearby_types::models::{Message, PostWithAuthor, Room};

pub struct UserRow {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password: String,
}

pub struct RoomRow {
    pub room_id: i64,
    pub lat: f64,
    pub lon: f64,
}

/// A post joined with `users.name`.
pub struct PostRow {
    pub post_id: i64,
    pub created_at: String,
    pub lat: f64,
    pub lon: f64,
    pub subject: String,
    pub description: String,
    pub author_name: String,
}

/// A message joined with `users.name`.
pub struct MessageRow {
    pub message_id: i64,
    pub author_name: String,
    pub body: String,
    pub created_at: String,
}

/// Outcome of inserting a user. A duplicate email is an expected result,
/// not an error.
#[derive(Debug, PartialEq, Eq)]
pub enum UserInsert {
    Created(i64),
    DuplicateEmail,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PostInsert {
    Created(i64),
    UnknownAuthor,
}

#[derive(Debug, PartialEq, Eq)]
pub enum MessageInsert {
    Created(i64),
    UnknownAuthor,
    UnknownPost,
}

/// Parses a stored timestamp. Accepts the RFC 3339 form the schema writes
/// and SQLite's plain `datetime('now')` form.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").map(|ndt| ndt.and_utc()))
        .map_err(|e| anyhow!("invalid timestamp '{}': {}", raw, e))
}

impl From<RoomRow> for Room {
    fn from(row: RoomRow) -> Self {
        Room {
            room_id: row.room_id,
            lat: row.lat,
            lon: row.lon,
        }
    }
}

impl TryFrom<PostRow> for PostWithAuthor {
    type Error = anyhow::Error;

    fn try_from(row: PostRow) -> Result<Self> {
        Ok(PostWithAuthor {
            post_id: row.post_id,
            created_at: parse_timestamp(&row.created_at)?,
            lat: row.lat,
            lon: row.lon,
            subject: row.subject,
            description: row.description,
            author_name: row.author_name,
        })
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(Message {
            sent_at: parse_timestamp(&row.created_at)?,
            author_name: row.author_name,
            body: row.body,
        })
    }
}
