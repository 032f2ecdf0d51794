use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated caller, keyed by email.
///
/// Identities come out of the session store and are re-resolved against the
/// users table on every write, so holding one is not proof the user still
/// exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn email(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: i64,
    pub lat: f64,
    pub lon: f64,
}

/// A post joined with its author's display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostWithAuthor {
    pub post_id: i64,
    pub created_at: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub subject: String,
    pub description: String,
    pub author_name: String,
}

/// A message as presented in a post's thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub author_name: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}
