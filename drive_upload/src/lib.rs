//! drive_upload - A CLI tool for uploading files to Google Drive.
//!
//! This library provides functionality to:
//! - Authorize with an OAuth desktop client and cache the token on disk
//! - Upload files to My Drive or a specific folder
//! - List the folders the app can see
//!
//! # Example
//!
//! ```no_run
//! use drive_upload::{Authenticator, Config, DriveClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let credential = Authenticator::new(config.clone()).credential().await?;
//!     let client = DriveClient::new(&config, &credential);
//!
//!     let uploaded = client.upload_file("report.pdf", None).await?;
//!     println!("{} {:?}", uploaded.name, uploaded.web_view_link);
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod folder_ref;
pub mod models;
pub mod oauth;
pub mod token_store;

// Re-exports for convenience
pub use auth::Authenticator;
pub use client::DriveClient;
pub use config::Config;
pub use error::{DriveError, Result};
pub use models::{FolderEntry, UploadResult};
pub use token_store::{StoredToken, TokenStore};
