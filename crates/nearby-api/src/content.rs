use std::sync::Arc;

use tracing::{info, warn};

use nearby_db::Database;
use nearby_db::models::{MessageInsert, PostInsert};
use nearby_types::models::{Identity, Message, PostWithAuthor};

use crate::error::ApiError;
use crate::proximity::Coordinates;

const SUBJECT_MAX: usize = 200;
const DESCRIPTION_MAX: usize = 5_000;
const BODY_MAX: usize = 4_000;

/// Posts and their message threads.
///
/// Writes take the caller's [`Identity`] and resolve it to a user inside the
/// insert transaction, so a session for a user that no longer exists is
/// treated as unauthenticated.
pub struct ContentService {
    db: Arc<Database>,
}

impl ContentService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn create_post(
        &self,
        identity: &Identity,
        at: Coordinates,
        subject: &str,
        description: &str,
    ) -> Result<i64, ApiError> {
        let subject = subject.trim();
        if subject.is_empty() || subject.chars().count() > SUBJECT_MAX {
            return Err(ApiError::invalid(format!("Subject must be 1-{SUBJECT_MAX} characters")));
        }
        let description = description.trim();
        if description.chars().count() > DESCRIPTION_MAX {
            return Err(ApiError::invalid(format!(
                "Description must be at most {DESCRIPTION_MAX} characters"
            )));
        }

        match self
            .db
            .insert_post(identity.email(), at.lat(), at.lon(), subject, description)?
        {
            PostInsert::Created(post_id) => {
                info!("Post {} created by {}", post_id, identity);
                Ok(post_id)
            }
            PostInsert::UnknownAuthor => {
                warn!("Post rejected: session identity {} has no user", identity);
                Err(ApiError::Unauthenticated)
            }
        }
    }

    pub fn get_post(&self, post_id: i64) -> Result<PostWithAuthor, ApiError> {
        let row = self.db.get_post(post_id)?.ok_or(ApiError::NotFound)?;
        Ok(PostWithAuthor::try_from(row)?)
    }

    pub fn post_message(&self, identity: &Identity, post_id: i64, body: &str) -> Result<i64, ApiError> {
        if body.trim().is_empty() || body.chars().count() > BODY_MAX {
            return Err(ApiError::invalid(format!("Message must be 1-{BODY_MAX} characters")));
        }

        match self.db.insert_message(identity.email(), post_id, body)? {
            MessageInsert::Created(message_id) => {
                info!("Message {} posted to post {} by {}", message_id, post_id, identity);
                Ok(message_id)
            }
            MessageInsert::UnknownAuthor => {
                warn!("Message rejected: session identity {} has no user", identity);
                Err(ApiError::Unauthenticated)
            }
            MessageInsert::UnknownPost => {
                warn!("Message rejected: post {} does not exist", post_id);
                Err(ApiError::PostNotFound)
            }
        }
    }

    /// Oldest first. Unknown posts give an empty thread.
    pub fn list_messages(&self, post_id: i64) -> Result<Vec<Message>, ApiError> {
        let rows = self.db.get_messages(post_id)?;

        let messages = rows
            .into_iter()
            .filter_map(|row| {
                let message_id = row.message_id;
                Message::try_from(row)
                    .map_err(|e| warn!("Skipping corrupt message {}: {:#}", message_id, e))
                    .ok()
            })
            .collect();
        Ok(messages)
    }
}

/// Parses a post id from a path segment. Any integer is well-formed;
/// whether the post exists is up to the store.
pub fn parse_post_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::invalid("Invalid post id"))
}
