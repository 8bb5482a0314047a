//! PKCE (RFC 7636) verifier/challenge pair and CSRF state generation
//!
//! Etsy requires S256 PKCE on every authorization request. The verifier is
//! kept server-side between `/auth` and `/callback`; only the challenge goes
//! out in the authorization URL.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

/// Random PKCE code verifier.
///
/// 64 random bytes encode to 86 URL-safe base64 characters, inside the
/// 43-128 range RFC 7636 allows.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Opaque CSRF state: 16 random bytes as lowercase hex.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
