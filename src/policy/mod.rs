//! S3 POST policy documents
//!
//! A policy is a JSON document with an expiration instant and a list of
//! conditions the storage provider enforces when the browser submits its
//! multipart form. See
//! <https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-HTTPPOSTConstructPolicy.html>.
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, TimeZone, Utc};
//! use s3_direct_upload::policy::PolicyDocument;
//! use s3_direct_upload::upload::key::StorageKey;
//!
//! let key = StorageKey::derive("uploads", "a.png");
//! let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
//! let policy = PolicyDocument::build("media", &key, "image/png", now, Duration::hours(1));
//!
//! assert_eq!(policy.expiration(), "2024-01-01T13:00:00.000Z");
//! assert_eq!(policy.conditions().len(), 5);
//! ```

pub mod signer;

use crate::upload::key::StorageKey;
use chrono::{DateTime, Duration, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Canned ACL every upload is granted
pub const ACL_PUBLIC_READ: &str = "public-read";

/// Status the provider answers a successful POST with
pub const SUCCESS_ACTION_STATUS: &str = "201";

/// Expiration format; sub-second precision is not tracked
const EXPIRATION_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000Z";

/// Policy errors
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Signing secret is empty")]
    EmptySecret,

    #[error("Failed to encode policy: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// One constraint inside a policy document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `{"field": "value"}`
    Exact { field: String, value: String },
    /// `["starts-with", "$field", "prefix"]`
    StartsWith { field: String, prefix: String },
}

impl Condition {
    fn exact(field: &str, value: impl Into<String>) -> Self {
        Condition::Exact {
            field: field.to_string(),
            value: value.into(),
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Condition::Exact { field, value } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(field, value)?;
                map.end()
            }
            Condition::StartsWith { field, prefix } => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element("starts-with")?;
                seq.serialize_element(&format!("${}", field))?;
                seq.serialize_element(prefix)?;
                seq.end()
            }
        }
    }
}

/// Time-bounded upload authorization
#[derive(Debug, Clone, Serialize)]
pub struct PolicyDocument {
    expiration: String,
    conditions: Vec<Condition>,
}

impl PolicyDocument {
    /// Build the policy for one upload
    ///
    /// Conditions are emitted in a fixed order: bucket, acl, Content-Type,
    /// key prefix, success_action_status. The key condition only pins the
    /// folder, so any object name under that folder satisfies it.
    pub fn build(
        bucket: &str,
        key: &StorageKey,
        mime_type: &str,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        let expiration = (now + lifetime).format(EXPIRATION_FORMAT).to_string();

        let conditions = vec![
            Condition::exact("bucket", bucket),
            Condition::exact("acl", ACL_PUBLIC_READ),
            Condition::exact("Content-Type", mime_type),
            Condition::StartsWith {
                field: "key".into(),
                prefix: key.folder().to_string(),
            },
            Condition::exact("success_action_status", SUCCESS_ACTION_STATUS),
        ];

        Self {
            expiration,
            conditions,
        }
    }

    /// Expiration instant as sent on the wire
    pub fn expiration(&self) -> &str {
        &self.expiration
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Compact single-line JSON bytes, ready for base64
    pub fn to_bytes(&self) -> Result<Vec<u8>, PolicyError> {
        // serde_json's compact writer escapes control characters inside
        // strings, so the output never spans lines.
        Ok(serde_json::to_vec(self)?)
    }
}
