//! Credential digests.
//!
//! Passwords are stored as a single unsalted SHA-256 pass encoded as
//! lowercase hex. Existing physician rows depend on this exact format, so the
//! digest must stay byte-compatible: same input, same 64 characters.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Hash a plaintext credential into its stored form.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Compare two strings in constant time.
///
/// Used when matching stored digests so the comparison does not exit on the
/// first differing byte.
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_fixed_length_hex() {
        let hashed = hash_password("test123");
        assert_eq!(hashed.len(), DIGEST_HEX_LEN);
        assert!(hashed.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(hashed, "test123");
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_password("password123"), hash_password("password123"));
        assert_ne!(hash_password("password123"), hash_password("password124"));
    }

    #[test]
    fn test_hash_known_vector() {
        assert_eq!(
            hash_password(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_constant_time_str_eq() {
        assert!(constant_time_str_eq("abc", "abc"));
        assert!(!constant_time_str_eq("abc", "abd"));
        assert!(!constant_time_str_eq("abc", "abcd"));
        assert!(constant_time_str_eq("", ""));
    }
}
