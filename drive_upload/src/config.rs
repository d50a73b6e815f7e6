//! Runtime configuration shared by the token store, authenticator and client.

use std::path::{Path, PathBuf};

/// Default location of the persisted OAuth token, relative to the working directory.
pub const DEFAULT_TOKEN_FILE: &str = "token.json";

/// Client secret filenames, in lookup order.
pub const CLIENT_SECRET_CANDIDATES: [&str; 2] = ["credentials.json", "client_secret.json"];

/// Access to files created or opened by this app only.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Base URL for Google Drive API v3.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload URL for Google Drive API.
pub const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

#[derive(Debug, Clone)]
pub struct Config {
    pub token_path: PathBuf,
    pub client_secret_candidates: Vec<PathBuf>,
    pub scopes: Vec<String>,
    pub api_base: String,
    pub upload_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from(DEFAULT_TOKEN_FILE),
            client_secret_candidates: CLIENT_SECRET_CANDIDATES
                .iter()
                .map(PathBuf::from)
                .collect(),
            scopes: vec![DRIVE_FILE_SCOPE.to_string()],
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: UPLOAD_API_BASE.to_string(),
        }
    }
}

impl Config {
    pub fn with_token_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.token_path = path.into();
        self
    }

    /// Use a single client secret file instead of the default candidates.
    pub fn with_client_secret<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.client_secret_candidates = vec![path.into()];
        self
    }

    /// Point the Drive client at different API hosts.
    pub fn with_endpoints(mut self, api_base: &str, upload_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.upload_base = upload_base.trim_end_matches('/').to_string();
        self
    }

    /// First client secret candidate that exists on disk.
    pub fn find_client_secret(&self) -> Option<&Path> {
        self.client_secret_candidates
            .iter()
            .map(PathBuf::as_path)
            .find(|p| p.is_file())
    }
}
