//! Error types for keyring operations.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for keyring operations.
///
/// Every variant is terminal for the call that produced it. None of them
/// describe transient faults, so retrying the same call with the same input
/// yields the same error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configured encryption algorithm is not supported
    #[error("invalid encryption algorithm: {0} (expected aes-128-cbc, aes-192-cbc or aes-256-cbc)")]
    InvalidAlgorithm(String),

    /// The keyring was built from an empty key mapping
    #[error("keyring must contain at least one key")]
    EmptyKeyring,

    /// A key id could not be coerced to a non-negative integer
    #[error("key id must be a non-negative integer, got {0:?}")]
    NonIntegerKeyId(String),

    /// Two raw key ids coerced to the same integer
    #[error("duplicate key id: {0}")]
    DuplicateKeyId(u64),

    /// A key secret is not valid base64
    #[error("key {id} is not valid base64")]
    InvalidKeyEncoding {
        /// Id of the offending key
        id: u64,
    },

    /// A decoded key secret has the wrong size for the algorithm
    #[error("key {id} must be {expected} bytes, got {actual}")]
    WrongKeyLength {
        /// Id of the offending key
        id: u64,
        /// Required size (twice the algorithm key size)
        expected: usize,
        /// Size of the decoded secret
        actual: usize,
    },

    /// No digest salt was configured
    #[error("digest salt is required (pass an empty string to opt out)")]
    MissingDigestSalt,

    /// The requested key id is not part of the keyring
    #[error("unknown key id: {0}")]
    UnknownKeyId(String),

    /// The envelope is not base64 or is shorter than tag and nonce
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Authentication tag verification failed (data may be corrupted or tampered)
    #[error("authentication failed: ciphertext may be corrupted or tampered")]
    AuthenticationFailed,

    /// Decryption failed after the envelope was authenticated
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Encryption operation failed
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// An untyped value that should have been a string was something else
    #[error("expected a string, got {0}")]
    InvalidInputType(&'static str),
}
