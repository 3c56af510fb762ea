//! S3 Direct Upload Library
//!
//! Signs S3 browser POST policies so clients can upload files straight to a
//! bucket without streaming the bytes through the application server.
//!
//! # Flow
//!
//! 1. The browser POSTs `name` and `type` to the signing endpoint
//! 2. A fresh random folder is derived for the file ([`upload::key`])
//! 3. A policy pinning bucket, ACL, content type and folder is built
//!    ([`policy`]) and signed with HMAC-SHA1 ([`policy::signer`])
//! 4. The browser submits the returned fields plus the file to `form_action`
//!
//! # Example
//!
//! ```no_run
//! use s3_direct_upload::{config::Config, server::Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let server = Server::new(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod metrics;
pub mod policy;
pub mod router;
pub mod s3;
pub mod server;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use server::Server;
pub use upload::{SignedUpload, SigningService, UploadRequest};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
