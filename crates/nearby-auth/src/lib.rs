//! Nearby authentication primitives.
//!
//! - [`session`]: the process-wide session table mapping opaque tokens to
//!   identities, safe for concurrent use from every request task.
//! - [`password`]: Argon2id hashing and verification of user passwords.
//! - [`token`]: random session token generation and log-safe fingerprints.

pub mod password;
pub mod session;
pub mod token;

pub use password::Passwords;
pub use session::{Session, SessionConfig, SessionStore};
