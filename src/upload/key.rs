//! Storage key derivation
//!
//! Every signing request gets its own folder named by a fresh random v4 UUID
//! (122 random bits), so two uploads of `photo.jpg` issued at the same instant
//! still land on different keys. `uuid` draws straight from the operating
//! system's CSPRNG, so concurrent requests share no generator state.

use uuid::Uuid;

/// Folder plus object name under which an upload will be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey {
    folder: String,
    object_name: String,
}

impl StorageKey {
    /// Derive a new key under `upload_path` for `file_name`
    ///
    /// The folder is `upload_path` joined with a 32-character hex token. The
    /// file name is appended as-is; anything it contains stays below the
    /// folder because keys are plain strings, not filesystem paths.
    pub fn derive(upload_path: &str, file_name: &str) -> Self {
        let token = Uuid::new_v4().simple().to_string();
        let prefix = upload_path.trim_end_matches('/');

        let folder = if prefix.is_empty() {
            token
        } else {
            format!("{}/{}", prefix, token)
        };

        Self {
            folder,
            object_name: file_name.to_string(),
        }
    }

    /// Folder component, used as the policy's `starts-with` value
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Client supplied object name
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// Full object path
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.folder, self.object_name)
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.folder, self.object_name)
    }
}
