//! Key store: keyring secrets split into signing and encryption keys.
//!
//! A keyring secret is a base64 string that decodes to exactly twice the
//! algorithm key size. The first half signs envelopes, the second half
//! encrypts them. Keys are identified by externally supplied non-negative
//! integers and the highest id is the one used for new encryptions.

use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::{ExposeSecret, SecretVec};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroizing;

/// A key id as it arrives from configuration or from a stored column.
///
/// Both `1` and `"1"` name the same key; coercion happens when a key set is
/// built and again on every lookup.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(untagged)]
pub enum RawKeyId {
    /// Unsigned integer id.
    Unsigned(u64),
    /// Signed integer id (only non-negative values are valid).
    Signed(i64),
    /// Textual id, valid if it consists of ASCII digits only (no sign).
    Text(String),
}

impl RawKeyId {
    /// Coerces the raw id to an integer key id.
    ///
    /// # Errors
    ///
    /// Returns `Error::NonIntegerKeyId` if the id is negative or is not a
    /// base-10 integer.
    pub fn to_id(&self) -> Result<u64> {
        match self {
            Self::Unsigned(id) => Ok(*id),
            Self::Signed(id) => u64::try_from(*id).map_err(|_| Error::NonIntegerKeyId(id.to_string())),
            Self::Text(text) if text.bytes().all(|b| b.is_ascii_digit()) => {
                text.parse::<u64>().map_err(|_| Error::NonIntegerKeyId(text.clone()))
            }
            Self::Text(text) => Err(Error::NonIntegerKeyId(text.clone())),
        }
    }
}

impl fmt::Display for RawKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned(id) => write!(f, "{id}"),
            Self::Signed(id) => write!(f, "{id}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<u64> for RawKeyId {
    fn from(id: u64) -> Self {
        Self::Unsigned(id)
    }
}

impl From<u32> for RawKeyId {
    fn from(id: u32) -> Self {
        Self::Unsigned(u64::from(id))
    }
}

impl From<i64> for RawKeyId {
    fn from(id: i64) -> Self {
        Self::Signed(id)
    }
}

impl From<i32> for RawKeyId {
    fn from(id: i32) -> Self {
        Self::Signed(i64::from(id))
    }
}

impl From<&str> for RawKeyId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<String> for RawKeyId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

impl From<&String> for RawKeyId {
    fn from(id: &String) -> Self {
        Self::Text(id.clone())
    }
}

impl From<&RawKeyId> for RawKeyId {
    fn from(id: &RawKeyId) -> Self {
        id.clone()
    }
}

/// A single keyring entry.
///
/// Both sub-keys are held in `SecretVec` so they are zeroized on drop and
/// never printed by `Debug`.
pub struct Key {
    id: u64,
    signing_key: SecretVec<u8>,
    encryption_key: SecretVec<u8>,
}

impl Key {
    /// Creates a key from a raw secret.
    ///
    /// # Arguments
    ///
    /// * `id` - Key id
    /// * `secret` - Decoded secret, `2 * algorithm.key_size()` bytes
    /// * `algorithm` - Algorithm the key will be used with
    ///
    /// # Errors
    ///
    /// Returns `Error::WrongKeyLength` if the secret has the wrong size.
    pub fn new(id: u64, secret: &[u8], algorithm: Algorithm) -> Result<Self> {
        let expected = algorithm.secret_size();
        if secret.len() != expected {
            return Err(Error::WrongKeyLength { id, expected, actual: secret.len() });
        }

        let (signing, encryption) = secret.split_at(algorithm.key_size());

        Ok(Self {
            id,
            signing_key: SecretVec::new(signing.to_vec()),
            encryption_key: SecretVec::new(encryption.to_vec()),
        })
    }

    /// Creates a key from a base64-encoded secret.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKeyEncoding` if the secret is not base64, or
    /// `Error::WrongKeyLength` if it decodes to the wrong size.
    pub fn from_base64(id: u64, encoded: &str, algorithm: Algorithm) -> Result<Self> {
        let secret = Zeroizing::new(
            STANDARD.decode(encoded.trim()).map_err(|_| Error::InvalidKeyEncoding { id })?,
        );
        Self::new(id, &secret, algorithm)
    }

    /// Returns the key id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn signing_key(&self) -> &[u8] {
        self.signing_key.expose_secret()
    }

    pub(crate) fn encryption_key(&self) -> &[u8] {
        self.encryption_key.expose_secret()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.id)
            .field("signing_key", &"[REDACTED]")
            .field("encryption_key", &"[REDACTED]")
            .finish()
    }
}

/// Immutable set of keys for one algorithm.
///
/// # Example
///
/// ```
/// use attr_keyring::algorithm::Algorithm;
/// use attr_keyring::key::KeySet;
///
/// let keys = KeySet::build(
///     [("1", "uDiMcWVNTuz//naQ88sOcN+E40CyBRGzGTT7OkoBS6M=")],
///     Algorithm::Aes128Cbc,
/// )
/// .unwrap();
///
/// assert_eq!(keys.current().id(), 1);
/// assert!(keys.find(1u64).is_ok());
/// ```
#[derive(Debug)]
pub struct KeySet {
    algorithm: Algorithm,
    keys: BTreeMap<u64, Key>,
    current_id: u64,
}

impl KeySet {
    /// Builds a key set from a raw id to base64 secret mapping.
    ///
    /// Validation runs in a fixed order: emptiness first, then for each
    /// entry the id, the base64 encoding, the secret length and finally
    /// uniqueness of the coerced id.
    ///
    /// # Errors
    ///
    /// - `Error::EmptyKeyring` if the mapping has no entries
    /// - `Error::NonIntegerKeyId` if an id is not a non-negative integer
    /// - `Error::InvalidKeyEncoding` if a secret is not base64
    /// - `Error::WrongKeyLength` if a secret has the wrong size
    /// - `Error::DuplicateKeyId` if two ids coerce to the same integer
    pub fn build<I, K, V>(raw_keys: I, algorithm: Algorithm) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<RawKeyId>,
        V: AsRef<str>,
    {
        let raw_keys: Vec<(RawKeyId, V)> =
            raw_keys.into_iter().map(|(id, secret)| (id.into(), secret)).collect();

        if raw_keys.is_empty() {
            return Err(Error::EmptyKeyring);
        }

        let mut keys = BTreeMap::new();
        for (raw_id, secret) in raw_keys {
            let id = raw_id.to_id()?;
            let key = Key::from_base64(id, secret.as_ref(), algorithm)?;
            if keys.insert(id, key).is_some() {
                return Err(Error::DuplicateKeyId(id));
            }
        }

        let current_id = keys.keys().next_back().copied().ok_or(Error::EmptyKeyring)?;

        tracing::debug!(keys = keys.len(), current_id, %algorithm, "key set built");

        Ok(Self { algorithm, keys, current_id })
    }

    /// Returns the key with the highest id.
    #[must_use]
    pub fn current(&self) -> &Key {
        &self.keys[&self.current_id]
    }

    /// Looks up a key by id.
    ///
    /// The id is coerced the same way ids are coerced when the set is
    /// built, so `1`, `1u64` and `"1"` all find the same key.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownKeyId` if no key has that id.
    pub fn find(&self, id: impl Into<RawKeyId>) -> Result<&Key> {
        let raw_id = id.into();
        raw_id
            .to_id()
            .ok()
            .and_then(|id| self.keys.get(&id))
            .ok_or_else(|| Error::UnknownKeyId(raw_id.to_string()))
    }

    /// Returns the algorithm the keys were validated for.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Returns every key id in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.keys.keys().copied()
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false: a built key set holds at least one key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
