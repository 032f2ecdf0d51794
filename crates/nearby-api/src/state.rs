use std::sync::Arc;

use nearby_auth::{Passwords, SessionStore};
use nearby_db::Database;

use crate::authenticator::Authenticator;
use crate::content::ContentService;
use crate::proximity::{ProximityConfig, ProximityMatcher};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub authenticator: Authenticator,
    pub proximity: ProximityMatcher,
    pub content: ContentService,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        sessions: SessionStore,
        passwords: Passwords,
        proximity: ProximityConfig,
    ) -> AppState {
        Arc::new(Self {
            authenticator: Authenticator::new(db.clone(), sessions, passwords),
            proximity: ProximityMatcher::new(db.clone(), proximity),
            content: ContentService::new(db),
        })
    }
}
