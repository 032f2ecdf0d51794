use crate::Database;
use crate::models::{MessageInsert, MessageRow, PostInsert, PostRow, RoomRow, UserInsert, UserRow};
use anyhow::Result;
use rusqlite::{Connection, Row, ffi};
use tracing::warn;

impl Database {
    // -- Users --

    pub fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Result<UserInsert> {
        self.with_conn_mut(|conn| {
            let inserted = conn.query_row(
                "INSERT INTO users (name, email, password) VALUES (?1, ?2, ?3) RETURNING user_id",
                (name, email, password_hash),
                |row| row.get(0),
            );

            match inserted {
                Ok(user_id) => Ok(UserInsert::Created(user_id)),
                Err(e) if is_unique_violation(&e) => Ok(UserInsert::DuplicateEmail),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    // -- Rooms --

    /// Returns the nearest room strictly within `radius_m` of the point, or
    /// inserts one there. Lookup and insert share a transaction on the
    /// writer, so two concurrent calls for the same spot yield one room.
    pub fn ensure_room(&self, lat: f64, lon: f64, radius_m: f64) -> Result<RoomRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let existing = tx
                .query_row(
                    "SELECT room_id, lat, lon FROM rooms
                     WHERE distance(?1, ?2, lat, lon) < ?3
                     ORDER BY distance(?1, ?2, lat, lon) ASC, room_id ASC
                     LIMIT 1",
                    rusqlite::params![lat, lon, radius_m],
                    map_room,
                )
                .optional()?;

            let room = match existing {
                Some(room) => room,
                None => insert_room(&tx, lat, lon)?,
            };
            tx.commit()?;
            Ok(room)
        })
    }

    pub fn rooms_within(&self, lat: f64, lon: f64, radius_m: f64) -> Result<Vec<RoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT room_id, lat, lon FROM rooms
                 WHERE distance(?1, ?2, lat, lon) < ?3",
            )?;

            let rows: Vec<RoomRow> = stmt
                .query_map(rusqlite::params![lat, lon, radius_m], map_room)?
                .filter_map(|row| skip_bad_row("room", row))
                .collect();

            Ok(rows)
        })
    }

    // -- Posts --

    /// Inserts a post for the user with `author_email`. The author is
    /// resolved inside the insert transaction.
    pub fn insert_post(
        &self,
        author_email: &str,
        lat: f64,
        lon: f64,
        subject: &str,
        description: &str,
    ) -> Result<PostInsert> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let Some(author_id) = query_user_id(&tx, author_email)? else {
                return Ok(PostInsert::UnknownAuthor);
            };

            let post_id: i64 = tx.query_row(
                "INSERT INTO posts (author_id, lat, lon, subject, description)
                 VALUES (?1, ?2, ?3, ?4, ?5) RETURNING post_id",
                rusqlite::params![author_id, lat, lon, subject, description],
                |row| row.get(0),
            )?;
            tx.commit()?;

            Ok(PostInsert::Created(post_id))
        })
    }

    pub fn get_post(&self, post_id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT p.post_id, p.created_at, p.lat, p.lon, p.subject, p.description, u.name
                 FROM posts p
                 JOIN users u ON u.user_id = p.author_id
                 WHERE p.post_id = ?1",
                [post_id],
                map_post,
            )
            .optional()
        })
    }

    /// Posts strictly within `radius_m`, newest first.
    pub fn posts_within(&self, lat: f64, lon: f64, radius_m: f64) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.post_id, p.created_at, p.lat, p.lon, p.subject, p.description, u.name
                 FROM posts p
                 JOIN users u ON u.user_id = p.author_id
                 WHERE distance(?1, ?2, p.lat, p.lon) < ?3
                 ORDER BY p.created_at DESC, p.post_id DESC",
            )?;

            let rows: Vec<PostRow> = stmt
                .query_map(rusqlite::params![lat, lon, radius_m], map_post)?
                .filter_map(|row| skip_bad_row("post", row))
                .collect();

            Ok(rows)
        })
    }

    // -- Messages --

    /// Inserts a message after resolving both the author and the post in
    /// the same transaction. Foreign keys remain the final backstop.
    pub fn insert_message(&self, author_email: &str, post_id: i64, body: &str) -> Result<MessageInsert> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let Some(author_id) = query_user_id(&tx, author_email)? else {
                return Ok(MessageInsert::UnknownAuthor);
            };

            let post_exists = tx
                .query_row("SELECT 1 FROM posts WHERE post_id = ?1", [post_id], |_| Ok(()))
                .optional()?
                .is_some();
            if !post_exists {
                return Ok(MessageInsert::UnknownPost);
            }

            let message_id: i64 = tx.query_row(
                "INSERT INTO messages (post_id, author_id, body) VALUES (?1, ?2, ?3) RETURNING message_id",
                rusqlite::params![post_id, author_id, body],
                |row| row.get(0),
            )?;
            tx.commit()?;

            Ok(MessageInsert::Created(message_id))
        })
    }

    /// Messages of a post, oldest first. Unknown posts yield an empty list.
    pub fn get_messages(&self, post_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.message_id, u.name, m.body, m.created_at
                 FROM messages m
                 JOIN users u ON u.user_id = m.author_id
                 WHERE m.post_id = ?1
                 ORDER BY m.created_at ASC, m.message_id ASC",
            )?;

            let rows: Vec<MessageRow> = stmt
                .query_map([post_id], |row| {
                    Ok(MessageRow {
                        message_id: row.get(0)?,
                        author_name: row.get(1)?,
                        body: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .filter_map(|row| skip_bad_row("message", row))
                .collect();

            Ok(rows)
        })
    }
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT user_id, name, email, password FROM users WHERE email = ?1")?;

    let row = stmt
        .query_row([email], |row| {
            Ok(UserRow {
                user_id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_user_id(conn: &Connection, email: &str) -> Result<Option<i64>> {
    conn.query_row("SELECT user_id FROM users WHERE email = ?1", [email], |row| row.get(0))
        .optional()
}

fn insert_room(conn: &Connection, lat: f64, lon: f64) -> Result<RoomRow> {
    let room = conn.query_row(
        "INSERT INTO rooms (lat, lon) VALUES (?1, ?2) RETURNING room_id, lat, lon",
        rusqlite::params![lat, lon],
        map_room,
    )?;
    Ok(room)
}

fn map_room(row: &Row<'_>) -> rusqlite::Result<RoomRow> {
    Ok(RoomRow {
        room_id: row.get(0)?,
        lat: row.get(1)?,
        lon: row.get(2)?,
    })
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        post_id: row.get(0)?,
        created_at: row.get(1)?,
        lat: row.get(2)?,
        lon: row.get(3)?,
        subject: row.get(4)?,
        description: row.get(5)?,
        author_name: row.get(6)?,
    })
}

/// A row that fails to decode is logged and dropped so one bad record
/// cannot fail a whole listing.
fn skip_bad_row<T>(kind: &str, row: rusqlite::Result<T>) -> Option<T> {
    row.map_err(|e| warn!("Skipping unreadable {} row: {}", kind, e)).ok()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::distance_m;

    fn db_with_user(email: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("Alice", email, "hash").unwrap();
        db
    }

    fn message_count(db: &Database) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn duplicate_email_keeps_existing_row() {
        let db = db_with_user("a@x.com");

        let second = db.create_user("Mallory", "a@x.com", "other").unwrap();
        assert_eq!(second, UserInsert::DuplicateEmail);

        let user = db.get_user_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(user.name, "Alice");
        assert_eq!(user.password, "hash");
    }

    #[test]
    fn unknown_email_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_user_by_email("nobody@x.com").unwrap().is_none());
    }

    #[test]
    fn room_exactly_at_threshold_is_excluded() {
        let db = Database::open_in_memory().unwrap();
        let room = db.with_conn_mut(|conn| insert_room(conn, 10.0, 20.0)).unwrap();

        let (qlat, qlon) = (10.0005, 20.0005);
        let exact = distance_m(qlat, qlon, room.lat, room.lon);

        assert!(db.rooms_within(qlat, qlon, exact).unwrap().is_empty());

        let found = db.rooms_within(qlat, qlon, exact + 0.001).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].room_id, room.room_id);
    }

    #[test]
    fn ensure_room_reuses_nearby_room() {
        let db = Database::open_in_memory().unwrap();

        let first = db.ensure_room(1.0, 2.0, 10.0).unwrap();
        // ~1.1 m away.
        let again = db.ensure_room(1.00001, 2.0, 10.0).unwrap();
        assert_eq!(first.room_id, again.room_id);

        // ~111 m away.
        let other = db.ensure_room(1.001, 2.0, 10.0).unwrap();
        assert_ne!(first.room_id, other.room_id);
    }

    #[test]
    fn post_for_unknown_author_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let result = db.insert_post("ghost@x.com", 1.0, 2.0, "s", "d").unwrap();
        assert_eq!(result, PostInsert::UnknownAuthor);
    }

    #[test]
    fn post_round_trips_with_author_name() {
        let db = db_with_user("a@x.com");
        let PostInsert::Created(id) = db.insert_post("a@x.com", 1.0, 2.0, "Lost cat", "Near the park").unwrap()
        else {
            panic!("post not created");
        };

        let post = db.get_post(id).unwrap().unwrap();
        assert_eq!(post.author_name, "Alice");
        assert_eq!(post.subject, "Lost cat");
        assert!(db.get_post(id + 1).unwrap().is_none());
    }

    #[test]
    fn posts_within_respects_radius() {
        let db = db_with_user("a@x.com");
        db.insert_post("a@x.com", 0.0, 0.0, "here", "").unwrap();
        db.insert_post("a@x.com", 0.0, 1.0, "far", "").unwrap();

        let near = db.posts_within(0.0, 0.0, 100_000.0).unwrap();
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].subject, "here");

        assert_eq!(db.posts_within(0.0, 0.5, 100_000.0).unwrap().len(), 2);
    }

    #[test]
    fn message_to_missing_post_inserts_nothing() {
        let db = db_with_user("a@x.com");

        let result = db.insert_message("a@x.com", 42, "hello").unwrap();
        assert_eq!(result, MessageInsert::UnknownPost);
        assert_eq!(message_count(&db), 0);
    }

    #[test]
    fn message_from_unknown_author_inserts_nothing() {
        let db = db_with_user("a@x.com");
        let PostInsert::Created(post_id) = db.insert_post("a@x.com", 1.0, 2.0, "s", "d").unwrap() else {
            panic!("post not created");
        };

        let result = db.insert_message("ghost@x.com", post_id, "hello").unwrap();
        assert_eq!(result, MessageInsert::UnknownAuthor);
        assert_eq!(message_count(&db), 0);
    }

    #[test]
    fn messages_list_oldest_first() {
        let db = db_with_user("a@x.com");
        let PostInsert::Created(post_id) = db.insert_post("a@x.com", 1.0, 2.0, "s", "d").unwrap() else {
            panic!("post not created");
        };

        for body in ["one", "two", "three"] {
            db.insert_message("a@x.com", post_id, body).unwrap();
        }

        let bodies: Vec<String> = db.get_messages(post_id).unwrap().into_iter().map(|m| m.body).collect();
        assert_eq!(bodies, ["one", "two", "three"]);
        assert!(db.get_messages(post_id + 100).unwrap().is_empty());
    }
}
