//! The session table: tracks every issued session token.
//!
//! # Concurrency
//!
//! The table is shared by every request task, so the map sits behind an
//! `Arc<RwLock<..>>`. Lookups take the read lock and run in parallel;
//! creating, revoking and purging take the write lock. Token generation and
//! the collision check happen under the same write lock, so a live session
//! can never be overwritten.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use nearby_types::models::Identity;

use crate::token::{fingerprint, generate_token};

/// One issued session.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        ttl.is_some_and(|ttl| now - self.issued_at >= ttl)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    /// Lifetime measured from issue time. `None` keeps sessions until the
    /// process exits or they are revoked.
    pub ttl: Option<Duration>,
}

/// Process-wide map from opaque token to session. Cheap to clone; clones
/// share the same table.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Issues a fresh token for `identity`.
    pub fn create(&self, identity: Identity) -> String {
        let issued_at = Utc::now();
        let mut sessions = self.write();

        loop {
            match sessions.entry(generate_token()) {
                Entry::Vacant(slot) => {
                    let token = slot.key().clone();
                    debug!(session = %fingerprint(&token), %identity, "session created");
                    slot.insert(Session { identity, issued_at });
                    return token;
                }
                Entry::Occupied(_) => warn!("session token collision, regenerating"),
            }
        }
    }

    /// Resolves a token. Empty, unknown and expired tokens all give `None`.
    pub fn lookup(&self, token: &str) -> Option<Identity> {
        if token.is_empty() {
            return None;
        }

        let sessions = self.read();
        let session = sessions.get(token)?;
        if session.is_expired(self.config.ttl, Utc::now()) {
            return None;
        }
        Some(session.identity.clone())
    }

    /// Removes a session. Returns whether it existed.
    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.write().remove(token).is_some();
        if removed {
            debug!(session = %fingerprint(token), "session revoked");
        }
        removed
    }

    /// Drops expired sessions and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let Some(ttl) = self.config.ttl else {
            return 0;
        };

        let now = Utc::now();
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(Some(ttl), now));
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave the map half-updated:
    // every mutation is a single HashMap call.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    fn alice() -> Identity {
        Identity::new("a@x.com")
    }

    #[test]
    fn create_then_lookup() {
        let store = SessionStore::default();
        let token = store.create(alice());
        assert_eq!(store.lookup(&token), Some(alice()));
    }

    #[test]
    fn empty_and_unknown_tokens_are_absent() {
        let store = SessionStore::default();
        store.create(alice());

        assert_eq!(store.lookup(""), None);
        assert_eq!(store.lookup("not-a-token"), None);
    }

    #[test]
    fn one_identity_can_hold_many_sessions() {
        let store = SessionStore::default();
        let first = store.create(alice());
        let second = store.create(alice());

        assert_ne!(first, second);
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup(&first), Some(alice()));
        assert_eq!(store.lookup(&second), Some(alice()));
    }

    #[test]
    fn revoked_session_is_absent() {
        let store = SessionStore::default();
        let token = store.create(alice());

        assert!(store.revoke(&token));
        assert!(!store.revoke(&token));
        assert_eq!(store.lookup(&token), None);
    }

    #[test]
    fn expired_session_is_absent_and_purged() {
        let store = SessionStore::new(SessionConfig {
            ttl: Some(Duration::zero()),
        });
        let token = store.create(alice());

        assert_eq!(store.lookup(&token), None);
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn live_session_survives_purge() {
        let store = SessionStore::new(SessionConfig {
            ttl: Some(Duration::hours(1)),
        });
        let token = store.create(alice());

        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.lookup(&token), Some(alice()));
    }

    #[test]
    fn concurrent_creators_get_unique_resolvable_tokens() {
        const CREATORS: usize = 128;
        let store = SessionStore::default();

        let handles: Vec<_> = (0..CREATORS)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    let identity = Identity::new(format!("user{i}@x.com"));
                    let token = store.create(identity.clone());
                    // Interleave reads with other threads' writes.
                    assert_eq!(store.lookup(&token), Some(identity.clone()));
                    (identity, token)
                })
            })
            .collect();

        let issued: Vec<(Identity, String)> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let unique: HashSet<&String> = issued.iter().map(|(_, token)| token).collect();
        assert_eq!(unique.len(), CREATORS);
        assert_eq!(store.len(), CREATORS);
        for (identity, token) in &issued {
            assert_eq!(store.lookup(token).as_ref(), Some(identity));
        }
    }
}
