//! Error types for the drive_upload crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while authorizing against or talking to Google Drive.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("No OAuth client secret found (looked for: {})", display_paths(.candidates))]
    SetupRequired { candidates: Vec<PathBuf> },

    #[error("Invalid client secret file {path:?}: {message}")]
    InvalidClientSecret { path: PathBuf, message: String },

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("Stored token at {path:?} is corrupt: {source}")]
    TokenDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid folder URL or ID: {0}")]
    InvalidFolderId(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
