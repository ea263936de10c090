//! Salted digests for equality lookups on encrypted columns.
//!
//! The digest lets a caller find records by value without decrypting every
//! row. It is a plain salted SHA-1 and provides no confidentiality.

use crate::error::{Error, Result};
use sha1::{Digest, Sha1};

/// Length of a hex-encoded digest.
pub const DIGEST_HEX_LEN: usize = 40;

/// Computes `hex(SHA1(message || salt))`.
///
/// # Errors
///
/// Returns `Error::MissingDigestSalt` if `salt` is `None`. An empty salt is
/// valid and means no salt.
///
/// # Example
///
/// ```
/// use attr_keyring::digest::digest;
///
/// let value = digest("42", Some("a")).unwrap();
/// assert_eq!(value, "118c884d37dde5fb6816daba052d94e82f1dc41f");
/// ```
pub fn digest(message: &str, salt: Option<&str>) -> Result<String> {
    let salt = salt.ok_or(Error::MissingDigestSalt)?;
    Ok(salted_sha1(message, salt))
}

pub(crate) fn salted_sha1(message: &str, salt: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(message.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_without_salt() {
        let value = digest("42", Some("")).unwrap();
        assert_eq!(value, "92cfceb39d57d914ed8b14d0e37643de0797ae56");
        assert_eq!(value.len(), DIGEST_HEX_LEN);
    }

    #[test]
    fn test_digest_with_salt() {
        assert_eq!(digest("42", Some("a")).unwrap(), "118c884d37dde5fb6816daba052d94e82f1dc41f");
    }

    #[test]
    fn test_digest_is_concatenation() {
        assert_eq!(digest("4", Some("2a")).unwrap(), digest("42", Some("a")).unwrap());
    }

    #[test]
    fn test_digest_missing_salt() {
        assert!(matches!(digest("42", None), Err(Error::MissingDigestSalt)));
    }

    #[test]
    fn test_digest_deterministic() {
        let first = digest("alice@example.com", Some("pepper")).unwrap();
        let second = digest("alice@example.com", Some("pepper")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_digest_changes_with_input() {
        let base = digest("alice@example.com", Some("pepper")).unwrap();

        assert_ne!(base, digest("alice@example.con", Some("pepper")).unwrap());
        assert_ne!(base, digest("alice@example.com", Some("salt")).unwrap());
    }

    #[test]
    fn test_digest_is_lowercase_hex() {
        let value = digest("ünïcödé", Some("")).unwrap();
        assert_eq!(value.len(), DIGEST_HEX_LEN);
        assert!(value.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }
}
