//! # `attr-keyring`
//!
//! Field-level encryption at rest with transparent key rotation.
//!
//! ## Features
//!
//! - AES-CBC (128/192/256) encryption signed with HMAC-SHA256
//! - Every envelope is tagged with the id of the key that produced it
//! - New values always use the highest key id; older keys remain readable
//! - Salted SHA-1 digests for equality lookups on encrypted columns
//! - Immutable, thread-safe keyrings
//!
//! ## Example
//!
//! ```rust
//! use attr_keyring::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let keyring = Keyring::new(
//!     [("1", "uDiMcWVNTuz//naQ88sOcN+E40CyBRGzGTT7OkoBS6M=")],
//!     KeyringOptions::default().with_digest_salt("salt"),
//! )?;
//!
//! let field = keyring.encrypt("alice@example.com")?;
//! let plaintext = keyring.decrypt(&field.encrypted, field.keyring_id)?;
//! assert_eq!(plaintext, "alice@example.com");
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod algorithm;
pub mod config;
pub mod digest;
pub mod envelope;
pub mod error;
pub mod key;
pub mod keyring;
pub mod record;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::algorithm::Algorithm;
    pub use crate::config::KeyringConfig;
    pub use crate::error::{Error, Result};
    pub use crate::key::RawKeyId;
    pub use crate::keyring::{Keyring, KeyringOptions};
    pub use crate::record::EncryptedField;
}
