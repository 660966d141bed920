//! Opaque credential generation and comparison
//!
//! Both credential kinds (registration tokens handed to operators and
//! per-device tokens presented on every configuration fetch) are opaque
//! random strings. Uniqueness is enforced by the database's UNIQUE
//! constraints, not by the generator.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a new opaque bearer token: 32 random bytes, hex-encoded.
pub fn new_opaque_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compare a presented credential against the stored one.
///
/// Comparing SHA-256 digests keeps the running time independent of the
/// position of the first differing byte.
pub fn tokens_match(presented: &str, stored: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(stored.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let token = new_opaque_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tokens_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(new_opaque_token()));
        }
    }

    #[test]
    fn test_tokens_match() {
        let token = new_opaque_token();
        assert!(tokens_match(&token, &token));
        assert!(!tokens_match(&token, "wrong"));
        assert!(!tokens_match("", &token));
    }
}
