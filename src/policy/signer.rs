//! Policy signing (AWS signature version 2 for browser POST uploads)
//!
//! The provider verifies `base64(HMAC-SHA1(secret, policy_b64))`, i.e. the MAC
//! is taken over the base64 text of the policy, not over the raw JSON.

use super::PolicyError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Base64 policy and its signature, as placed in the upload form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPolicy {
    pub policy: String,
    pub signature: String,
}

/// Encode `policy_bytes` and sign the encoding with `secret_access_key`
///
/// Deterministic for identical inputs.
pub fn sign(secret_access_key: &str, policy_bytes: &[u8]) -> Result<SignedPolicy, PolicyError> {
    if secret_access_key.is_empty() {
        return Err(PolicyError::EmptySecret);
    }

    let policy = STANDARD.encode(policy_bytes);

    let mut mac = HmacSha1::new_from_slice(secret_access_key.as_bytes())
        .map_err(|_| PolicyError::EmptySecret)?;
    mac.update(policy.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Ok(SignedPolicy { policy, signature })
}
