//! Obtains a usable OAuth credential for the Drive API.

use crate::config::Config;
use crate::error::{DriveError, Result};
use crate::oauth::{ClientSecret, OAuthClient};
use crate::token_store::{StoredToken, TokenStore};

/// Authenticator for Google APIs using an installed-app OAuth client.
#[derive(Clone)]
pub struct Authenticator {
    config: Config,
    store: TokenStore,
    oauth: OAuthClient,
}

impl Authenticator {
    pub fn new(config: Config) -> Self {
        Self {
            store: TokenStore::new(&config.token_path),
            oauth: OAuthClient::new(),
            config,
        }
    }

    /// Return a valid credential.
    ///
    /// A cached token is reused while valid and refreshed once expired. If
    /// neither works, the interactive consent flow runs using the first
    /// client secret file found. Newly issued or refreshed tokens are
    /// persisted before being returned.
    pub async fn credential(&self) -> Result<StoredToken> {
        if let Some(cached) = self.store.load()? {
            if cached.is_valid() {
                tracing::debug!("reusing cached token");
                return Ok(cached);
            }

            if cached.is_refreshable() {
                match self.oauth.refresh(&cached).await {
                    Ok(fresh) => {
                        self.store.save(&fresh)?;
                        tracing::info!("refreshed access token");
                        return Ok(fresh);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "token refresh failed, re-authorizing");
                    }
                }
            }
        }

        let secret_path =
            self.config
                .find_client_secret()
                .ok_or_else(|| DriveError::SetupRequired {
                    candidates: self.config.client_secret_candidates.clone(),
                })?;
        tracing::debug!(path = %secret_path.display(), "using client secret");

        let secret = ClientSecret::from_file(secret_path)?;
        let token = self.oauth.authorize(&secret, &self.config.scopes).await?;
        self.store.save(&token)?;
        tracing::info!("authorization complete");

        Ok(token)
    }
}
