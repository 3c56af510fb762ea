//! S3 Credentials Module
//!
//! Holds the access key pair used to sign POST policies.
//!
//! # Example
//!
//! ```
//! use s3_direct_upload::s3::Credentials;
//!
//! let creds = Credentials::new("access-key", "secret-key").unwrap();
//! assert_eq!(creds.access_key_id(), "access-key");
//! assert_eq!(creds.secret_access_key(), "secret-key");
//! ```

use crate::config::StorageConfig;
use thiserror::Error;

/// Credential loading errors
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

/// Access key pair for the storage provider
///
/// The secret never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

impl Credentials {
    /// Create new credentials. Both halves must be non-empty.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let access_key_id = access_key_id.into();
        let secret_access_key = secret_access_key.into();

        if access_key_id.is_empty() {
            return Err(CredentialsError::MissingCredentials(
                "access_key_id is empty".into(),
            ));
        }
        if secret_access_key.is_empty() {
            return Err(CredentialsError::MissingCredentials(
                "secret_access_key is empty".into(),
            ));
        }

        Ok(Self {
            access_key_id,
            secret_access_key,
        })
    }

    /// Load credentials from the storage section of the configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self, CredentialsError> {
        let access_key = config.access_key_id().ok_or_else(|| {
            CredentialsError::MissingCredentials("access_key_id not set in config".into())
        })?;

        let secret_key = config
            .secret_access_key
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CredentialsError::MissingCredentials("secret_access_key not set in config".into())
            })?;

        Self::new(access_key, secret_key)
    }

    /// Get the access key ID
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Get the secret access key
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}
