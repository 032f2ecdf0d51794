use anyhow::{Result, anyhow};
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{self, SaltString, rand_core::OsRng},
};

/// Argon2id password hashing.
///
/// Also keeps a hash of a random throwaway password so that a login for an
/// unknown account can burn the same verification cost as a real one.
pub struct Passwords {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl Passwords {
    /// Argon2id with the crate's default (OWASP-recommended) parameters.
    pub fn new() -> Result<Self> {
        Self::from_argon2(Argon2::default())
    }

    /// Argon2id with explicit memory (KiB), iteration and lane counts.
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| anyhow!("Invalid Argon2 parameters: {}", e))?;
        Self::from_argon2(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn from_argon2(argon2: Argon2<'static>) -> Result<Self> {
        let throwaway = crate::token::generate_token();
        let dummy_hash = hash_with(&argon2, &throwaway)?;
        Ok(Self { argon2, dummy_hash })
    }

    /// Hash a password into a PHC string with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String> {
        hash_with(&self.argon2, password)
    }

    /// Check a password against a stored PHC string.
    ///
    /// `Ok(false)` is a mismatch; `Err` means the stored hash itself is
    /// unusable.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool> {
        let parsed = PasswordHash::new(stored).map_err(|e| anyhow!("Stored password hash is malformed: {}", e))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(anyhow!("Password verification failed: {}", e)),
        }
    }

    /// Run one verification against the dummy hash and discard the result.
    pub fn burn(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}
