//! Serializable keyring configuration.

use crate::algorithm::Algorithm;
use crate::error::Result;
use crate::key::RawKeyId;
use crate::keyring::{Keyring, KeyringOptions};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Keyring configuration as stored in a file or environment variable.
///
/// ```json
/// {
///   "keys": { "1": "uDiMcWVNTuz//naQ88sOcN+E40CyBRGzGTT7OkoBS6M=" },
///   "encryption": "aes-128-cbc",
///   "digest_salt": "salt"
/// }
/// ```
///
/// `encryption` falls back to the default algorithm; `digest_salt` has no
/// fallback and building a keyring without it fails. Both the algorithm name
/// and the keys are validated when the keyring is built, and a key id that
/// appears twice in `keys` is kept twice so the build rejects it.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyringConfig {
    /// Key id to base64 secret, in document order.
    #[serde(deserialize_with = "key_entries")]
    pub keys: Vec<(RawKeyId, String)>,
    /// Cipher name, defaults to `aes-128-cbc`.
    #[serde(default)]
    pub encryption: Option<String>,
    /// Digest salt, required.
    #[serde(default)]
    pub digest_salt: Option<String>,
}

impl KeyringConfig {
    /// Merges the configuration over the default options.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidAlgorithm` if `encryption` names an unsupported
    /// cipher.
    pub fn options(&self) -> Result<KeyringOptions> {
        let encryption = match &self.encryption {
            Some(name) => name.parse::<Algorithm>()?,
            None => KeyringOptions::DEFAULT.encryption,
        };

        Ok(KeyringOptions { encryption, digest_salt: self.digest_salt.clone() })
    }

    /// Builds a keyring from this configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidAlgorithm` for an unsupported cipher, or any
    /// validation error from [`Keyring::new`].
    pub fn build(&self) -> Result<Keyring> {
        let options = self.options()?;
        Keyring::new(self.keys.iter().map(|(id, secret)| (id, secret)), options)
    }
}

/// Deserializes a JSON object of key id to secret into a list of entries.
///
/// Repeated ids are kept rather than collapsed, so a document such as
/// `{"1": "a", "1": "b"}` fails with `Error::DuplicateKeyId` when built.
///
/// # Errors
///
/// Returns the deserializer's error if the input is not a map of ids to
/// strings.
pub fn key_entries<'de, D>(deserializer: D) -> std::result::Result<Vec<(RawKeyId, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct KeyEntries;

    impl<'de> Visitor<'de> for KeyEntries {
        type Value = Vec<(RawKeyId, String)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of key ids to base64 secrets")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<RawKeyId, String>()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(KeyEntries)
}

// Secrets stay out of logs.
impl fmt::Debug for KeyringConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyringConfig")
            .field("keys", &self.keys.iter().map(|(id, _)| id).collect::<Vec<_>>())
            .field("encryption", &self.encryption)
            .field("digest_salt", &self.digest_salt.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
