//! Supported block cipher variants.

use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// AES-CBC variant used to encrypt field values.
///
/// The key size determines how long every keyring secret must be: a secret
/// carries a signing key and an encryption key, each `key_size()` bytes.
///
/// # Example
///
/// ```
/// use attr_keyring::algorithm::Algorithm;
///
/// let algorithm: Algorithm = "aes-256-cbc".parse().unwrap();
/// assert_eq!(algorithm.key_size(), 32);
/// assert_eq!(algorithm.secret_size(), 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    /// AES-128 in CBC mode (default).
    #[default]
    Aes128Cbc,
    /// AES-192 in CBC mode.
    Aes192Cbc,
    /// AES-256 in CBC mode.
    Aes256Cbc,
}

impl Algorithm {
    /// Every supported algorithm, in ascending key size.
    pub const ALL: [Self; 3] = [Self::Aes128Cbc, Self::Aes192Cbc, Self::Aes256Cbc];

    /// Returns the cipher key size in bytes.
    #[must_use]
    pub const fn key_size(self) -> usize {
        match self {
            Self::Aes128Cbc => 16,
            Self::Aes192Cbc => 24,
            Self::Aes256Cbc => 32,
        }
    }

    /// Returns the size a decoded keyring secret must have.
    #[must_use]
    pub const fn secret_size(self) -> usize {
        self.key_size() * 2
    }

    /// Returns the canonical algorithm name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aes128Cbc => "aes-128-cbc",
            Self::Aes192Cbc => "aes-192-cbc",
            Self::Aes256Cbc => "aes-256-cbc",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.as_str() == s)
            .ok_or_else(|| Error::InvalidAlgorithm(s.to_string()))
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_supported_names() {
        assert_eq!("aes-128-cbc".parse::<Algorithm>().unwrap(), Algorithm::Aes128Cbc);
        assert_eq!("aes-192-cbc".parse::<Algorithm>().unwrap(), Algorithm::Aes192Cbc);
        assert_eq!("aes-256-cbc".parse::<Algorithm>().unwrap(), Algorithm::Aes256Cbc);
    }

    #[test]
    fn test_parse_rejects_unknown_names() {
        for name in ["aes-256-gcm", "AES-128-CBC", "", "des"] {
            let result = name.parse::<Algorithm>();
            assert!(matches!(result, Err(Error::InvalidAlgorithm(n)) if n == name));
        }
    }

    #[test]
    fn test_sizes() {
        assert_eq!(Algorithm::Aes128Cbc.secret_size(), 32);
        assert_eq!(Algorithm::Aes192Cbc.secret_size(), 48);
        assert_eq!(Algorithm::Aes256Cbc.secret_size(), 64);
    }

    #[test]
    fn test_default_is_aes_128() {
        assert_eq!(Algorithm::default(), Algorithm::Aes128Cbc);
    }

    #[test]
    fn test_serde_uses_names() {
        let json = serde_json::to_string(&Algorithm::Aes192Cbc).unwrap();
        assert_eq!(json, "\"aes-192-cbc\"");

        let parsed: Algorithm = serde_json::from_str("\"aes-256-cbc\"").unwrap();
        assert_eq!(parsed, Algorithm::Aes256Cbc);

        assert!(serde_json::from_str::<Algorithm>("\"rot13\"").is_err());
    }
}
