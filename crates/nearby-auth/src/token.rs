use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as BASE64};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Random bytes per session token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Generate a session token: 256 bits from the thread-local CSPRNG,
/// base64url encoded without padding (43 printable characters).
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

/// Short, non-reversible tag for a token, safe to put in logs.
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..6])
}
