//! Persistence of the OAuth token between runs.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DriveError, Result};

/// Tokens this close to expiry are treated as expired.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// OAuth token as written to disk.
///
/// Carries the client credentials alongside the token so a later run can
/// refresh it without re-reading the client secret file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
}

impl StoredToken {
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// A token is valid if it has an access token that does not expire
    /// within the next minute. Tokens without an expiry never expire.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry > now + Duration::seconds(EXPIRY_BUFFER_SECS),
            None => true,
        }
    }

    pub fn is_refreshable(&self) -> bool {
        !self.is_valid() && self.refresh_token.is_some()
    }
}

/// Reads and writes a [`StoredToken`] at a fixed path.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted token, or `None` if nothing has been saved yet.
    pub fn load(&self) -> Result<Option<StoredToken>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read(&self.path)?;
        let token = serde_json::from_slice(&content).map_err(|source| DriveError::TokenDecode {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(token))
    }

    /// Overwrite the persisted token.
    pub fn save(&self, token: &StoredToken) -> Result<()> {
        let content = serde_json::to_string_pretty(token)?;
        fs::write(&self.path, content)?;
        tracing::debug!(path = %self.path.display(), "saved token");
        Ok(())
    }
}
