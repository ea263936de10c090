//! Record-level contract for storage collaborators.
//!
//! A collaborator (an ORM hook, a repository, a migration job) stores three
//! columns per encrypted attribute: the envelope, the id of the key that
//! produced it and the digest used for lookups. [`EncryptedField`] carries
//! those three values; the helpers below read, write and rotate them.

use crate::error::{Error, Result};
use crate::keyring::Keyring;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The persisted form of one encrypted attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedField {
    /// Base64 envelope.
    pub encrypted: String,
    /// Id of the key the envelope was sealed with.
    pub keyring_id: u64,
    /// Salted digest of the plaintext.
    pub digest: String,
}

impl Keyring {
    /// Decrypts a stored field.
    ///
    /// # Errors
    ///
    /// Same as [`Keyring::decrypt`].
    pub fn decrypt_field(&self, field: &EncryptedField) -> Result<String> {
        self.decrypt(&field.encrypted, field.keyring_id)
    }

    /// Returns true if the field was written with a key other than the
    /// current one.
    #[must_use]
    pub fn needs_rotation(&self, field: &EncryptedField) -> bool {
        field.keyring_id != self.current_key_id()
    }

    /// Re-encrypts a stored field under the current key.
    ///
    /// Fields already on the current key are returned unchanged.
    ///
    /// # Errors
    ///
    /// Any error from decrypting the stored field or encrypting it again.
    pub fn rotate_field(&self, field: &EncryptedField) -> Result<EncryptedField> {
        if !self.needs_rotation(field) {
            return Ok(field.clone());
        }

        let plaintext = self.decrypt_field(field)?;
        let rotated = self.encrypt(&plaintext)?;

        tracing::debug!(from = field.keyring_id, to = rotated.keyring_id, "rotated field");

        Ok(rotated)
    }

    /// Encrypts an untyped value, as it arrives from JSON or a dynamic row.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInputType` if the value is not a string.
    pub fn encrypt_value(&self, value: &Value) -> Result<EncryptedField> {
        self.encrypt(expect_str(value)?)
    }

    /// Digests an untyped value.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInputType` if the value is not a string.
    pub fn digest_value(&self, value: &Value) -> Result<String> {
        Ok(self.digest(expect_str(value)?))
    }
}

fn expect_str(value: &Value) -> Result<&str> {
    match value {
        Value::String(s) => Ok(s),
        Value::Null => Err(Error::InvalidInputType("null")),
        Value::Bool(_) => Err(Error::InvalidInputType("boolean")),
        Value::Number(_) => Err(Error::InvalidInputType("number")),
        Value::Array(_) => Err(Error::InvalidInputType("array")),
        Value::Object(_) => Err(Error::InvalidInputType("object")),
    }
}
