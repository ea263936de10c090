//! File and environment configuration for `attr-keyring`.
//!
//! Loads a [`KeyringConfig`] from a JSON file or from environment variables
//! and builds a [`Keyring`] from it. Suitable for applications that keep key
//! material in a secrets file or inject it through the environment.

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use attr_keyring::config::{key_entries, KeyringConfig};
use attr_keyring::keyring::Keyring;
use std::path::{Path, PathBuf};

/// Default environment variable prefix.
pub const DEFAULT_PREFIX: &str = "KEYRING";

/// Errors raised while loading keyring configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file does not exist
    #[error("keyring file does not exist: {0}")]
    NotFound(PathBuf),

    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is not valid JSON or has the wrong shape
    #[error("invalid keyring configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A required environment variable is not set
    #[error("environment variable {0} is not set")]
    MissingVariable(String),

    /// The configuration was read but the keyring rejected it
    #[error(transparent)]
    Keyring(#[from] attr_keyring::error::Error),
}

/// Keyring configuration stored in a JSON file.
///
/// ```text
/// {
///   "keys": { "1": "<base64>", "2": "<base64>" },
///   "encryption": "aes-128-cbc",
///   "digest_salt": "<salt>"
/// }
/// ```
///
/// The file holds key material and should be readable by its owner only
/// (`0600`). A warning is logged on Unix when it is not.
pub struct KeyringFile {
    path: PathBuf,
}

impl KeyringFile {
    /// Creates a loader for the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the file doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        if !path.is_file() {
            return Err(ConfigError::NotFound(path));
        }
        Ok(Self { path })
    }

    /// Returns the configuration file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and parses the configuration without building a keyring.
    ///
    /// # Errors
    ///
    /// Returns an I/O or JSON error.
    pub fn read_config(&self) -> Result<KeyringConfig, ConfigError> {
        warn_if_shared(&self.path);

        let contents = std::fs::read_to_string(&self.path)?;
        let config = parse_config(&contents)?;

        tracing::debug!(path = %self.path.display(), keys = config.keys.len(), "read keyring file");

        Ok(config)
    }

    /// Reads the configuration and builds a keyring.
    ///
    /// # Errors
    ///
    /// Returns an I/O, JSON or keyring validation error.
    pub fn load(&self) -> Result<Keyring, ConfigError> {
        Ok(self.read_config()?.build()?)
    }
}

/// Parses a JSON keyring configuration.
///
/// # Errors
///
/// Returns `ConfigError::Json` if the document is malformed.
pub fn parse_config(json: &str) -> Result<KeyringConfig, ConfigError> {
    Ok(serde_json::from_str(json)?)
}

/// Keyring configuration read from environment variables.
///
/// With the default prefix the variables are:
///
/// - `KEYRING_KEYS` - JSON object of key id to base64 secret (required)
/// - `KEYRING_ENCRYPTION` - algorithm name (optional)
/// - `KEYRING_DIGEST_SALT` - digest salt (required by the keyring)
pub struct KeyringEnv {
    prefix: String,
}

impl Default for KeyringEnv {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl KeyringEnv {
    /// Creates a loader for variables starting with `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    fn var_name(&self, suffix: &str) -> String {
        format!("{}_{suffix}", self.prefix)
    }

    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`KeyringEnv::read_config_with`].
    pub fn read_config(&self) -> Result<KeyringConfig, ConfigError> {
        self.read_config_with(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// - `ConfigError::MissingVariable` if the keys variable is not set
    /// - `ConfigError::Json` if the keys variable is not a JSON object
    pub fn read_config_with<F>(&self, lookup: F) -> Result<KeyringConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let keys_var = self.var_name("KEYS");
        let raw_keys = lookup(&keys_var).ok_or(ConfigError::MissingVariable(keys_var))?;

        let mut deserializer = serde_json::Deserializer::from_str(&raw_keys);
        let keys = key_entries(&mut deserializer)?;
        deserializer.end()?;

        let encryption = lookup(&self.var_name("ENCRYPTION"));
        let digest_salt = lookup(&self.var_name("DIGEST_SALT"));

        Ok(KeyringConfig { keys, encryption, digest_salt })
    }

    /// Reads the configuration from the process environment and builds a
    /// keyring.
    ///
    /// # Errors
    ///
    /// Any error from reading the configuration or validating the keyring.
    pub fn load(&self) -> Result<Keyring, ConfigError> {
        Ok(self.read_config()?.build()?)
    }
}

#[cfg(unix)]
fn warn_if_shared(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = std::fs::metadata(path) {
        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            tracing::warn!(
                path = %path.display(),
                mode = %format!("{:o}", mode & 0o777),
                "keyring file is accessible by group or others"
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_if_shared(_path: &Path) {}
