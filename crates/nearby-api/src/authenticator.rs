use std::sync::Arc;

use tracing::{info, warn};

use nearby_auth::{Passwords, SessionStore, token::fingerprint};
use nearby_db::Database;
use nearby_db::models::UserInsert;
use nearby_types::models::Identity;

use crate::error::{ApiError, CredentialFailure};

const NAME_MAX: usize = 64;
const EMAIL_MAX: usize = 254;
const PASSWORD_MAX: usize = 1024;

/// Registers users, checks credentials and issues sessions.
///
/// `register` and `login` hit the database and run Argon2, so callers on
/// the async runtime should wrap them in `spawn_blocking`.
pub struct Authenticator {
    db: Arc<Database>,
    sessions: SessionStore,
    passwords: Passwords,
}

impl Authenticator {
    pub fn new(db: Arc<Database>, sessions: SessionStore, passwords: Passwords) -> Self {
        Self { db, sessions, passwords }
    }

    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<(), ApiError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > NAME_MAX {
            return Err(ApiError::invalid(format!("Name must be 1-{NAME_MAX} characters")));
        }
        let email = normalize_email(email).ok_or_else(|| ApiError::invalid("Invalid email address"))?;
        if password.is_empty() || password.len() > PASSWORD_MAX {
            return Err(ApiError::invalid(format!("Password must be 1-{PASSWORD_MAX} bytes")));
        }

        let password_hash = self.passwords.hash(password)?;

        match self.db.create_user(name, &email, &password_hash)? {
            UserInsert::Created(user_id) => {
                info!("Registered user {} <{}>", user_id, email);
                Ok(())
            }
            UserInsert::DuplicateEmail => {
                warn!("Registration rejected: {} already registered", email);
                Err(ApiError::DuplicateEmail)
            }
        }
    }

    /// Checks credentials and returns a new session token.
    ///
    /// Both failure kinds come back as `InvalidCredentials`; the inner
    /// [`CredentialFailure`] is for logs and tests only.
    pub fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let user = match normalize_email(email) {
            Some(email) => self.db.get_user_by_email(&email)?,
            None => None,
        };

        let Some(user) = user else {
            self.passwords.burn(password);
            return Err(self.reject(email, CredentialFailure::UnknownEmail));
        };

        if !self.passwords.verify(password, &user.password)? {
            return Err(self.reject(&user.email, CredentialFailure::WrongPassword));
        }

        let token = self.sessions.create(Identity::new(user.email.clone()));
        info!(
            "User {} {} <{}> logged in (session {})",
            user.user_id,
            user.name,
            user.email,
            fingerprint(&token)
        );
        Ok(token)
    }

    /// Resolves a session token. `None` means anonymous.
    pub fn authenticate(&self, token: &str) -> Option<Identity> {
        self.sessions.lookup(token)
    }

    pub fn logout(&self, token: &str) -> bool {
        self.sessions.revoke(token)
    }

    fn reject(&self, email: &str, failure: CredentialFailure) -> ApiError {
        warn!(code = failure.code(), "Login rejected for {}", email.trim());
        ApiError::InvalidCredentials(failure)
    }
}

/// Trims and lowercases an email, with a minimal shape check.
fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    let valid = !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && email.len() <= EMAIL_MAX
        && !email.chars().any(char::is_whitespace);
    valid.then_some(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nearby_auth::SessionConfig;
    use std::time::Instant;

    fn authenticator() -> Authenticator {
        let db = Arc::new(Database::open_in_memory().unwrap());
        Authenticator::new(
            db,
            SessionStore::new(SessionConfig::default()),
            Passwords::with_params(64, 1, 1).unwrap(),
        )
    }

    #[test]
    fn register_then_login_resolves_identity() {
        let auth = authenticator();
        auth.register("Alice", "a@x.com", "pw").unwrap();

        let token = auth.login("a@x.com", "pw").unwrap();
        assert_eq!(auth.authenticate(&token), Some(Identity::new("a@x.com")));
    }

    #[test]
    fn password_is_not_stored_in_plaintext() {
        let auth = authenticator();
        auth.register("Alice", "a@x.com", "pw").unwrap();

        let stored = auth.db.get_user_by_email("a@x.com").unwrap().unwrap().password;
        assert_ne!(stored, "pw");
        assert!(stored.starts_with("$argon2id$"));
    }

    #[test]
    fn email_is_normalized() {
        let auth = authenticator();
        auth.register("Alice", "  A@X.com ", "pw").unwrap();

        let token = auth.login("a@x.COM", "pw").unwrap();
        assert_eq!(auth.authenticate(&token), Some(Identity::new("a@x.com")));
    }

    #[test]
    fn duplicate_email_is_a_conflict() {
        let auth = authenticator();
        auth.register("Alice", "a@x.com", "pw").unwrap();

        let err = auth.register("Impostor", "a@x.com", "other").unwrap_err();
        assert!(matches!(err, ApiError::DuplicateEmail));

        // The original account is untouched.
        assert!(auth.login("a@x.com", "pw").is_ok());
        assert!(auth.login("a@x.com", "other").is_err());
    }

    #[test]
    fn login_failures_carry_internal_sub_codes() {
        let auth = authenticator();
        auth.register("Alice", "a@x.com", "pw").unwrap();

        let unknown = auth.login("b@x.com", "pw").unwrap_err();
        let wrong = auth.login("a@x.com", "nope").unwrap_err();

        assert!(matches!(unknown, ApiError::InvalidCredentials(CredentialFailure::UnknownEmail)));
        assert!(matches!(wrong, ApiError::InvalidCredentials(CredentialFailure::WrongPassword)));
        assert_eq!(unknown.code(), wrong.code());
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn unknown_email_costs_about_as_much_as_wrong_password() {
        let auth = Authenticator::new(
            Arc::new(Database::open_in_memory().unwrap()),
            SessionStore::new(SessionConfig::default()),
            Passwords::with_params(8192, 2, 1).unwrap(),
        );
        auth.register("Alice", "a@x.com", "pw").unwrap();

        // Best of several runs, so scheduler noise only ever shortens a sample.
        let fastest = |email: &str, password: &str| {
            (0..5)
                .map(|_| {
                    let started = Instant::now();
                    assert!(auth.login(email, password).is_err());
                    started.elapsed()
                })
                .min()
                .unwrap()
        };

        let unknown = fastest("nobody@x.com", "pw");
        let wrong = fastest("a@x.com", "nope");

        assert!(unknown * 2 >= wrong, "unknown {unknown:?} vs wrong {wrong:?}");
        assert!(wrong * 2 >= unknown, "unknown {unknown:?} vs wrong {wrong:?}");
    }

    #[test]
    fn rejects_bad_registration_input() {
        let auth = authenticator();
        assert!(matches!(auth.register("", "a@x.com", "pw"), Err(ApiError::InvalidInput(_))));
        assert!(matches!(auth.register("Alice", "not-an-email", "pw"), Err(ApiError::InvalidInput(_))));
        assert!(matches!(auth.register("Alice", "a@x.com", ""), Err(ApiError::InvalidInput(_))));
    }

    #[test]
    fn logout_revokes_session() {
        let auth = authenticator();
        auth.register("Alice", "a@x.com", "pw").unwrap();
        let token = auth.login("a@x.com", "pw").unwrap();

        assert!(auth.logout(&token));
        assert_eq!(auth.authenticate(&token), None);
    }

    #[test]
    fn normalize_email_shapes() {
        assert_eq!(normalize_email(" Bob@Example.org "), Some("bob@example.org".into()));
        assert_eq!(normalize_email("@x.com"), None);
        assert_eq!(normalize_email("bob@"), None);
        assert_eq!(normalize_email("a@b@c"), None);
        assert_eq!(normalize_email("a b@c.com"), None);
    }
}
