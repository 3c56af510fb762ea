//! Configuration module for the upload signer
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation. The configuration is loaded
//! once at startup and shared read-only afterwards.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value (may be empty)
///
/// Variable names must start with a letter or underscore and contain only
/// uppercase letters, digits, and underscores.
///
/// # Examples
///
/// ```ignore
/// std::env::set_var("MY_VAR", "value");
/// let result = expand_env_vars("prefix-${MY_VAR}-suffix");
/// assert_eq!(result, "prefix-value-suffix");
///
/// let result = expand_env_vars("${MISSING:-default}");
/// assert_eq!(result, "default");
/// ```
pub(crate) fn expand_env_vars(s: &str) -> String {
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(:-([^}]*))?\}") {
        Ok(re) => re,
        Err(_) => return s.to_string(),
    };
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(3) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);

    result
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// An unexpanded `${VAR}` left behind by the loader
fn is_unresolved_placeholder(value: &str) -> bool {
    value.contains("${")
}

/// Path of the liveness endpoint served next to the sign route
pub const HEALTH_PATH: &str = "/health";

/// Longest policy lifetime accepted (one week)
const MAX_POLICY_LIFETIME_SECS: u64 = 7 * 24 * 3600;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Parse configuration from YAML text (after env expansion)
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        ConfigLoader::parse(content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server.sign_path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "Sign path '{}' must start with '/'",
                self.server.sign_path
            )));
        }

        if self.server.sign_path.trim_end_matches('/') == HEALTH_PATH {
            return Err(ConfigError::ValidationError(format!(
                "Sign path '{}' collides with the health check",
                self.server.sign_path
            )));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "max_body_bytes must be greater than zero".into(),
            ));
        }

        self.storage.validate()
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    /// Path of the signing endpoint. Default: "/sign"
    #[serde(default = "default_sign_path")]
    pub sign_path: String,
    /// Largest accepted request body for the signing endpoint. Default: 16 KiB
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_sign_path() -> String {
    "/sign".to_string()
}

fn default_max_body_bytes() -> usize {
    16 * 1024
}

/// Storage provider configuration
///
/// Everything needed to sign a browser POST upload against one bucket.
///
/// # Example
///
/// ```yaml
/// storage:
///   access_key_id: "${AWS_ACCESS_KEY_ID}"
///   secret_access_key: "${AWS_SECRET_ACCESS_KEY:-}"
///   bucket: "my-bucket"
///   upload_path: "tmp/uploads"
///   policy_lifetime_secs: 3600
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing)]
    pub secret_access_key: Option<String>,
    pub bucket: String,
    /// Prefix for every generated upload folder. Default: "uploads"
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
    /// Base URL browsers POST to. Default: `https://{bucket}.s3.amazonaws.com/`
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Lifetime of a signed policy in seconds. Default: 3600
    #[serde(default = "default_policy_lifetime_secs")]
    pub policy_lifetime_secs: u64,
}

impl StorageConfig {
    /// Validate the storage section
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Storage bucket cannot be empty".into(),
            ));
        }

        if self.policy_lifetime_secs == 0 || self.policy_lifetime_secs > MAX_POLICY_LIFETIME_SECS {
            return Err(ConfigError::ValidationError(format!(
                "policy_lifetime_secs must be between 1 and {}",
                MAX_POLICY_LIFETIME_SECS
            )));
        }

        if let Some(ref endpoint) = self.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(
                    "Invalid storage endpoint: must start with http:// or https://".into(),
                ));
            }
        }

        for (field, value) in [
            ("access_key_id", &self.access_key_id),
            ("secret_access_key", &self.secret_access_key),
        ] {
            if value.as_deref().is_some_and(is_unresolved_placeholder) {
                return Err(ConfigError::ValidationError(format!(
                    "{} references an unset environment variable",
                    field
                )));
            }
        }

        if self.has_secret() && self.access_key_id().is_none() {
            return Err(ConfigError::ValidationError(
                "secret_access_key is set but access_key_id is missing".into(),
            ));
        }

        Ok(())
    }

    /// Whether a usable secret is configured
    pub fn has_secret(&self) -> bool {
        self.secret_access_key
            .as_deref()
            .is_some_and(|s| !s.is_empty())
    }

    /// Access key id, treating an empty string as unset
    pub fn access_key_id(&self) -> Option<&str> {
        self.access_key_id.as_deref().filter(|s| !s.is_empty())
    }

    /// Lifetime of every signed policy
    pub fn policy_lifetime(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.policy_lifetime_secs.min(MAX_POLICY_LIFETIME_SECS) as i64)
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("bucket", &self.bucket)
            .field("upload_path", &self.upload_path)
            .field("endpoint", &self.endpoint)
            .field("policy_lifetime_secs", &self.policy_lifetime_secs)
            .finish()
    }
}

fn default_upload_path() -> String {
    "uploads".to_string()
}

fn default_policy_lifetime_secs() -> u64 {
    3600
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}
