//! S3 Module
//!
//! Storage-provider facts the signer needs: credentials and the URL browsers
//! POST their multipart form to. This crate never talks to the bucket itself.

mod credentials;

pub use credentials::{Credentials, CredentialsError};

use crate::config::StorageConfig;

/// URL the browser submits the signed multipart form to
///
/// Uses the configured endpoint when present, otherwise the virtual-hosted
/// style AWS URL for the bucket. Always ends with `/`.
pub fn form_action_url(config: &StorageConfig) -> String {
    let base = match config.endpoint.as_deref() {
        Some(endpoint) => endpoint.to_string(),
        None => format!("https://{}.s3.amazonaws.com", config.bucket),
    };

    if base.ends_with('/') {
        base
    } else {
        format!("{}/", base)
    }
}
