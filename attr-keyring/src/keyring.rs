//! Keyring facade tying the key store, envelopes and digests together.

use crate::algorithm::Algorithm;
use crate::digest::salted_sha1;
use crate::envelope;
use crate::error::{Error, Result};
use crate::key::{KeySet, RawKeyId};
use crate::record::EncryptedField;
use std::fmt;
use std::sync::Arc;

/// Options for building a [`Keyring`].
///
/// Start from [`KeyringOptions::DEFAULT`] (or `Default::default()`) and
/// override what you need. The defaults are never mutated; every keyring
/// gets its own merged copy.
///
/// # Example
///
/// ```
/// use attr_keyring::algorithm::Algorithm;
/// use attr_keyring::keyring::KeyringOptions;
///
/// let options = KeyringOptions::default()
///     .with_encryption(Algorithm::Aes256Cbc)
///     .with_digest_salt("pepper");
///
/// assert_eq!(options.encryption, Algorithm::Aes256Cbc);
/// assert_eq!(options.digest_salt.as_deref(), Some("pepper"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyringOptions {
    /// Cipher used for new and existing envelopes.
    pub encryption: Algorithm,
    /// Salt appended to every digested value. Required; use `""` to opt out.
    pub digest_salt: Option<String>,
}

impl KeyringOptions {
    /// AES-128-CBC and no digest salt.
    pub const DEFAULT: Self = Self { encryption: Algorithm::Aes128Cbc, digest_salt: None };

    /// Sets the encryption algorithm.
    #[must_use]
    pub fn with_encryption(mut self, encryption: Algorithm) -> Self {
        self.encryption = encryption;
        self
    }

    /// Sets the digest salt.
    #[must_use]
    pub fn with_digest_salt(mut self, digest_salt: impl Into<String>) -> Self {
        self.digest_salt = Some(digest_salt.into());
        self
    }
}

impl Default for KeyringOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

struct Inner {
    keys: KeySet,
    digest_salt: String,
}

/// Encrypts field values under the newest key and decrypts them under
/// whichever key they were written with.
///
/// A `Keyring` is immutable. Rotating keys means building a new keyring that
/// contains a key with a higher id; older keys stay in the mapping for as
/// long as data encrypted with them must stay readable. Cloning is cheap and
/// clones share the same key material.
///
/// # Example
///
/// ```
/// use attr_keyring::keyring::{Keyring, KeyringOptions};
///
/// # fn main() -> Result<(), attr_keyring::error::Error> {
/// let keyring = Keyring::new(
///     [("1", "uDiMcWVNTuz//naQ88sOcN+E40CyBRGzGTT7OkoBS6M=")],
///     KeyringOptions::default().with_digest_salt("salt"),
/// )?;
///
/// let field = keyring.encrypt("alice@example.com")?;
/// assert_eq!(field.keyring_id, 1);
///
/// let plaintext = keyring.decrypt(&field.encrypted, field.keyring_id)?;
/// assert_eq!(plaintext, "alice@example.com");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Keyring {
    inner: Arc<Inner>,
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyring")
            .field("algorithm", &self.algorithm())
            .field("key_ids", &self.key_ids())
            .field("current_key_id", &self.current_key_id())
            .finish_non_exhaustive()
    }
}

impl Keyring {
    /// Builds a keyring from a raw id to base64 secret mapping.
    ///
    /// Everything is validated eagerly, including the digest salt, so a
    /// misconfigured keyring fails here rather than on first use.
    ///
    /// # Arguments
    ///
    /// * `raw_keys` - Key id to base64 secret pairs
    /// * `options` - Algorithm and digest salt
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingDigestSalt` if no salt is configured, or any
    /// error from [`KeySet::build`].
    pub fn new<I, K, V>(raw_keys: I, options: KeyringOptions) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<RawKeyId>,
        V: AsRef<str>,
    {
        let digest_salt = options.digest_salt.ok_or(Error::MissingDigestSalt)?;
        let keys = KeySet::build(raw_keys, options.encryption)?;

        tracing::info!(
            keys = keys.len(),
            current_id = keys.current().id(),
            algorithm = %options.encryption,
            "keyring initialized"
        );

        Ok(Self { inner: Arc::new(Inner { keys, digest_salt }) })
    }

    /// Encrypts `message` with the current key.
    ///
    /// # Returns
    ///
    /// The envelope, the id of the key that produced it and the digest of
    /// `message`. All three are meant to be stored together.
    ///
    /// # Errors
    ///
    /// Returns `Error::EncryptionFailed` if the cipher cannot be initialized.
    pub fn encrypt(&self, message: &str) -> Result<EncryptedField> {
        let key = self.inner.keys.current();
        tracing::debug!(key_id = key.id(), "encrypting value");

        let encrypted = envelope::seal(key, self.algorithm(), message.as_bytes())?;

        Ok(EncryptedField { encrypted, keyring_id: key.id(), digest: self.digest(message) })
    }

    /// Decrypts an envelope with the key it was encrypted under.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownKeyId` if `key_id` is not in the keyring
    /// - `Error::MalformedEnvelope` if the envelope cannot be parsed
    /// - `Error::AuthenticationFailed` if the envelope was tampered with or
    ///   belongs to another key
    /// - `Error::DecryptionFailed` if the plaintext is not valid UTF-8 or
    ///   does not unpad
    pub fn decrypt(&self, envelope: &str, key_id: impl Into<RawKeyId>) -> Result<String> {
        let key = self.inner.keys.find(key_id)?;
        tracing::debug!(key_id = key.id(), "decrypting value");

        let plaintext = envelope::open(key, self.algorithm(), envelope)?;

        String::from_utf8(plaintext)
            .map_err(|_| Error::DecryptionFailed("plaintext is not valid UTF-8".to_string()))
    }

    /// Returns the id of the key used for new encryptions.
    #[must_use]
    pub fn current_key_id(&self) -> u64 {
        self.inner.keys.current().id()
    }

    /// Returns the salted digest of `message`.
    #[must_use]
    pub fn digest(&self, message: &str) -> String {
        salted_sha1(message, &self.inner.digest_salt)
    }

    /// Returns the configured algorithm.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.inner.keys.algorithm()
    }

    /// Returns every key id in ascending order.
    #[must_use]
    pub fn key_ids(&self) -> Vec<u64> {
        self.inner.keys.ids().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    const SECRET_128: &str = "uDiMcWVNTuz//naQ88sOcN+E40CyBRGzGTT7OkoBS6M=";

    fn secret(algorithm: Algorithm, byte: u8) -> String {
        STANDARD.encode(vec![byte; algorithm.secret_size()])
    }

    fn options(salt: &str) -> KeyringOptions {
        KeyringOptions::default().with_digest_salt(salt)
    }

    #[test]
    fn test_known_scenario_empty_salt() {
        let keyring = Keyring::new([("0", SECRET_128)], options("")).unwrap();

        let field = keyring.encrypt("42").unwrap();
        assert_eq!(field.keyring_id, 0);
        assert_eq!(field.digest, "92cfceb39d57d914ed8b14d0e37643de0797ae56");
        assert_eq!(keyring.decrypt(&field.encrypted, 0u64).unwrap(), "42");
    }

    #[test]
    fn test_known_scenario_with_salt() {
        let keyring = Keyring::new([("0", SECRET_128)], options("a")).unwrap();

        let field = keyring.encrypt("42").unwrap();
        assert_eq!(field.digest, "118c884d37dde5fb6816daba052d94e82f1dc41f");
        assert_eq!(keyring.decrypt(&field.encrypted, "0").unwrap(), "42");
    }

    #[test]
    fn test_missing_salt_fails_eagerly() {
        let result = Keyring::new([("0", SECRET_128)], KeyringOptions::default());
        assert!(matches!(result, Err(Error::MissingDigestSalt)));
    }

    #[test]
    fn test_missing_salt_checked_before_keys() {
        let raw: Vec<(String, String)> = Vec::new();
        let result = Keyring::new(raw, KeyringOptions::default());
        assert!(matches!(result, Err(Error::MissingDigestSalt)));
    }

    #[test]
    fn test_default_options_untouched() {
        let _ = KeyringOptions::default().with_digest_salt("x");
        assert_eq!(KeyringOptions::default(), KeyringOptions::DEFAULT);
        assert_eq!(KeyringOptions::DEFAULT.digest_salt, None);
    }

    #[test]
    fn test_round_trip_all_algorithms() {
        for algorithm in Algorithm::ALL {
            let keyring = Keyring::new(
                [("1", secret(algorithm, 1))],
                options("salt").with_encryption(algorithm),
            )
            .unwrap();
            assert_eq!(keyring.algorithm(), algorithm);

            for message in ["", "hello", "日本語のテキスト", "emoji 🔐 inside"] {
                let field = keyring.encrypt(message).unwrap();
                assert_eq!(keyring.decrypt(&field.encrypted, field.keyring_id).unwrap(), message);
            }
        }
    }

    #[test]
    fn test_rotation() {
        let old = Keyring::new([("1", secret(Algorithm::Aes128Cbc, 1))], options("")).unwrap();
        let legacy = old.encrypt("legacy").unwrap();
        assert_eq!(legacy.keyring_id, 1);

        let rotated = Keyring::new(
            [("1", secret(Algorithm::Aes128Cbc, 1)), ("2", secret(Algorithm::Aes128Cbc, 2))],
            options(""),
        )
        .unwrap();

        let fresh = rotated.encrypt("fresh").unwrap();
        assert_eq!(fresh.keyring_id, 2);
        assert_eq!(rotated.current_key_id(), 2);
        assert_eq!(rotated.decrypt(&legacy.encrypted, legacy.keyring_id).unwrap(), "legacy");
        assert_eq!(rotated.decrypt(&fresh.encrypted, fresh.keyring_id).unwrap(), "fresh");
    }

    #[test]
    fn test_decrypt_with_wrong_existing_key() {
        let keyring = Keyring::new(
            [("1", secret(Algorithm::Aes128Cbc, 1)), ("2", secret(Algorithm::Aes128Cbc, 2))],
            options(""),
        )
        .unwrap();

        let field = keyring.encrypt("value").unwrap();
        let result = keyring.decrypt(&field.encrypted, 1u64);
        assert!(matches!(result, Err(Error::AuthenticationFailed)));
    }

    #[test]
    fn test_decrypt_unknown_id() {
        let keyring = Keyring::new([("1", SECRET_128)], options("")).unwrap();
        let field = keyring.encrypt("value").unwrap();

        assert!(matches!(keyring.decrypt(&field.encrypted, 2u64), Err(Error::UnknownKeyId(_))));
        assert!(matches!(keyring.decrypt("garbage", 9u64), Err(Error::UnknownKeyId(_))));
    }

    #[test]
    fn test_decrypt_non_utf8_plaintext() {
        let keyring = Keyring::new([("1", SECRET_128)], options("")).unwrap();
        let key = keyring.inner.keys.current();
        let envelope = envelope::seal(key, Algorithm::Aes128Cbc, &[0xff, 0xfe, 0xfd]).unwrap();

        let result = keyring.decrypt(&envelope, 1u64);
        assert!(matches!(result, Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_digest_uses_configured_salt() {
        let keyring = Keyring::new([("1", SECRET_128)], options("a")).unwrap();
        assert_eq!(keyring.digest("42"), "118c884d37dde5fb6816daba052d94e82f1dc41f");
    }

    #[test]
    fn test_key_ids_sorted() {
        let keyring = Keyring::new(
            [("5", SECRET_128), ("0", SECRET_128), ("12", SECRET_128)],
            options(""),
        )
        .unwrap();

        assert_eq!(keyring.key_ids(), vec![0, 5, 12]);
        assert_eq!(keyring.current_key_id(), 12);
    }

    #[test]
    fn test_clone_shares_keys() {
        let keyring = Keyring::new([("1", SECRET_128)], options("")).unwrap();
        let clone = keyring.clone();

        let field = keyring.encrypt("shared").unwrap();
        assert_eq!(clone.decrypt(&field.encrypted, field.keyring_id).unwrap(), "shared");
    }

    #[test]
    fn test_debug_hides_salt() {
        let keyring = Keyring::new([("1", SECRET_128)], options("pepper")).unwrap();
        let debug = format!("{keyring:?}");

        assert!(debug.contains("current_key_id: 1"));
        assert!(!debug.contains("pepper"));
    }

    #[test]
    fn test_keyring_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Keyring>();
    }

    #[test]
    fn test_concurrent_encryption() {
        let keyring = Keyring::new([("1", SECRET_128)], options("")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let keyring = keyring.clone();
                std::thread::spawn(move || {
                    let message = format!("message {i}");
                    let field = keyring.encrypt(&message).unwrap();
                    (message, field)
                })
            })
            .collect();

        let mut envelopes = std::collections::HashSet::new();
        for handle in handles {
            let (message, field) = handle.join().unwrap();
            assert_eq!(keyring.decrypt(&field.encrypted, field.keyring_id).unwrap(), message);
            assert!(envelopes.insert(field.encrypted));
        }
    }
}
