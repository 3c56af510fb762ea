//! Upload module
//!
//! Turns a validated `{name, type}` request into the credential bundle a
//! browser needs to POST the file straight to the bucket.
//!
//! # Example
//!
//! ```
//! use s3_direct_upload::config::StorageConfig;
//! use s3_direct_upload::upload::{SigningService, UploadRequest};
//!
//! let storage = StorageConfig {
//!     access_key_id: Some("AKIDEXAMPLE".into()),
//!     secret_access_key: Some("secret".into()),
//!     bucket: "media".into(),
//!     upload_path: "uploads".into(),
//!     endpoint: None,
//!     policy_lifetime_secs: 3600,
//! };
//! let service = SigningService::new(&storage).unwrap();
//!
//! let request = UploadRequest::new(Some("a.png".into()), Some("image/png".into())).unwrap();
//! let signed = service.sign(&request).unwrap();
//! assert!(signed.key.starts_with("uploads/"));
//! assert!(signed.key.ends_with("/a.png"));
//! ```

use crate::config::StorageConfig;
use crate::policy::{signer, PolicyDocument, PolicyError, ACL_PUBLIC_READ, SUCCESS_ACTION_STATUS};
use crate::s3::{form_action_url, Credentials, CredentialsError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod key;
pub mod request;

pub use key::StorageKey;
pub use request::{BodyFormat, UploadRequest};

/// Upload signing errors
#[derive(Error, Debug)]
pub enum UploadError {
    /// The client sent an unusable request
    #[error("{0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl UploadError {
    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::Validation(_) => "validation",
            UploadError::Configuration(_) => "configuration",
            UploadError::Encoding(_) => "encoding",
        }
    }

    /// Whether the client is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, UploadError::Validation(_))
    }
}

impl From<PolicyError> for UploadError {
    fn from(err: PolicyError) -> Self {
        match &err {
            PolicyError::EmptySecret => UploadError::Configuration(err.to_string()),
            PolicyError::Encoding(e) => UploadError::Encoding(e.to_string()),
        }
    }
}

impl From<CredentialsError> for UploadError {
    fn from(err: CredentialsError) -> Self {
        UploadError::Configuration(err.to_string())
    }
}

/// Everything the browser puts in its multipart POST to the bucket
///
/// Serialized field names are what the storage provider expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUpload {
    pub policy: String,
    pub signature: String,
    pub key: String,
    #[serde(rename = "AWSAccessKeyId")]
    pub access_key_id: String,
    pub form_action: String,
    pub success_action_status: String,
    pub acl: String,
    #[serde(rename = "Content-Type")]
    pub content_type: String,
}

/// Issues signed upload policies for one bucket
///
/// Holds only immutable state, so a single instance is shared by every
/// connection.
#[derive(Debug)]
pub struct SigningService {
    credentials: Credentials,
    bucket: String,
    upload_path: String,
    form_action: String,
    lifetime: Duration,
}

impl SigningService {
    /// Create a service from the storage configuration
    ///
    /// Fails when the access key pair is incomplete.
    pub fn new(config: &StorageConfig) -> Result<Self, UploadError> {
        Ok(Self {
            credentials: Credentials::from_config(config)?,
            bucket: config.bucket.clone(),
            upload_path: config.upload_path.clone(),
            form_action: form_action_url(config),
            lifetime: config.policy_lifetime(),
        })
    }

    /// Sign an upload that expires one policy lifetime from now
    pub fn sign(&self, request: &UploadRequest) -> Result<SignedUpload, UploadError> {
        self.sign_at(request, Utc::now())
    }

    /// Sign an upload as if the current time were `now`
    ///
    /// Each call derives a fresh key, so identical requests never share one.
    pub fn sign_at(
        &self,
        request: &UploadRequest,
        now: DateTime<Utc>,
    ) -> Result<SignedUpload, UploadError> {
        // The key has to exist before the policy can reference its folder.
        let key = StorageKey::derive(&self.upload_path, &request.file_name);
        let policy = PolicyDocument::build(
            &self.bucket,
            &key,
            &request.mime_type,
            now,
            self.lifetime,
        );
        let signed = signer::sign(self.credentials.secret_access_key(), &policy.to_bytes()?)?;

        debug!(
            file_name = %request.file_name,
            mime_type = %request.mime_type,
            key = %key,
            "Issued upload policy"
        );

        Ok(SignedUpload {
            policy: signed.policy,
            signature: signed.signature,
            key: key.full_path(),
            access_key_id: self.credentials.access_key_id().to_string(),
            form_action: self.form_action.clone(),
            success_action_status: SUCCESS_ACTION_STATUS.to_string(),
            acl: ACL_PUBLIC_READ.to_string(),
            content_type: request.mime_type.clone(),
        })
    }
}

/// How uploads reach storage, decided once at startup
///
/// With a secret configured the signing endpoint is served and browsers
/// upload directly. Without one the endpoint is absent and the application
/// keeps accepting files through its own forms.
#[derive(Debug)]
pub enum UploadMode {
    Direct(SigningService),
    Plain,
}

impl UploadMode {
    pub fn from_config(config: &StorageConfig) -> Result<Self, UploadError> {
        if config.has_secret() {
            Ok(UploadMode::Direct(SigningService::new(config)?))
        } else {
            Ok(UploadMode::Plain)
        }
    }

    /// The signing service, when direct uploads are enabled
    pub fn signing_service(&self) -> Option<&SigningService> {
        match self {
            UploadMode::Direct(service) => Some(service),
            UploadMode::Plain => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UploadMode::Direct(_) => "direct",
            UploadMode::Plain => "plain",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use chrono::TimeZone;

    fn storage() -> StorageConfig {
        StorageConfig {
            access_key_id: Some("AKIDEXAMPLE".into()),
            secret_access_key: Some("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".into()),
            bucket: "media".into(),
            upload_path: "uploads/tmp".into(),
            endpoint: Some("http://localhost:9000/media".into()),
            policy_lifetime_secs: 3600,
        }
    }

    fn request() -> UploadRequest {
        UploadRequest::new(Some("a.png".into()), Some("image/png".into())).unwrap()
    }

    #[test]
    fn test_signed_upload_fields() {
        let service = SigningService::new(&storage()).unwrap();
        let signed = service.sign(&request()).unwrap();

        assert!(signed.key.starts_with("uploads/tmp/"));
        assert!(signed.key.ends_with("/a.png"));
        assert_eq!(signed.access_key_id, "AKIDEXAMPLE");
        assert_eq!(signed.form_action, "http://localhost:9000/media/");
        assert_eq!(signed.success_action_status, "201");
        assert_eq!(signed.acl, "public-read");
        assert_eq!(signed.content_type, "image/png");
    }

    #[test]
    fn test_key_satisfies_policy_prefix() {
        let service = SigningService::new(&storage()).unwrap();
        let signed = service.sign(&request()).unwrap();

        let policy: serde_json::Value =
            serde_json::from_slice(&STANDARD.decode(&signed.policy).unwrap()).unwrap();
        let prefix = policy["conditions"][3][2].as_str().unwrap();

        assert!(signed.key.starts_with(prefix));
    }

    #[test]
    fn test_expiration_follows_clock() {
        let service = SigningService::new(&storage()).unwrap();
        let now = Utc.with_ymd_and_hms(2020, 2, 29, 23, 30, 0).unwrap();
        let signed = service.sign_at(&request(), now).unwrap();

        let policy: serde_json::Value =
            serde_json::from_slice(&STANDARD.decode(&signed.policy).unwrap()).unwrap();
        assert_eq!(policy["expiration"], "2020-03-01T00:30:00.000Z");
    }

    #[test]
    fn test_identical_requests_get_distinct_keys() {
        let service = SigningService::new(&storage()).unwrap();
        let a = service.sign(&request()).unwrap();
        let b = service.sign(&request()).unwrap();
        assert_ne!(a.key, b.key);
        assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn test_serialized_field_names() {
        let service = SigningService::new(&storage()).unwrap();
        let value = serde_json::to_value(service.sign(&request()).unwrap()).unwrap();
        let object = value.as_object().unwrap();

        for field in [
            "policy",
            "signature",
            "key",
            "AWSAccessKeyId",
            "form_action",
            "success_action_status",
            "acl",
            "Content-Type",
        ] {
            assert!(object.contains_key(field), "missing {}", field);
        }
        assert_eq!(object.len(), 8);
    }

    #[test]
    fn test_mode_selection() {
        let mode = UploadMode::from_config(&storage()).unwrap();
        assert_eq!(mode.name(), "direct");
        assert!(mode.signing_service().is_some());

        let mut plain = storage();
        plain.secret_access_key = None;
        let mode = UploadMode::from_config(&plain).unwrap();
        assert_eq!(mode.name(), "plain");
        assert!(mode.signing_service().is_none());
    }

    #[test]
    fn test_missing_access_key_is_configuration_error() {
        let mut config = storage();
        config.access_key_id = None;
        let err = SigningService::new(&config).unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_policy_error_mapping() {
        let err: UploadError = PolicyError::EmptySecret.into();
        assert_eq!(err.kind(), "configuration");
    }
}
