//! OAuth 2.0 installed-application flow for Google APIs.
//!
//! The user is sent to Google's consent page and redirected back to a
//! short-lived HTTP server on the loopback interface, which receives the
//! authorization code. The code is then exchanged for a token.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::url::Url;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, CsrfToken, RedirectUrl, RefreshToken,
    RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use crate::error::{DriveError, Result};
use crate::token_store::StoredToken;

/// Google OAuth2 authorization endpoint.
const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google OAuth2 token endpoint.
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// How long the callback server may take to finish its last response.
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

const SUCCESS_PAGE: &str = "<html><body><h3>Authorization complete.</h3>\
    <p>You may close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "<html><body><h3>Authorization failed.</h3>\
    <p>Check the terminal for details.</p></body></html>";

fn default_auth_uri() -> String {
    AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    TOKEN_URI.to_string()
}

/// OAuth client credentials downloaded from Google Cloud Console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// The downloaded file nests the client under the application type.
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|message| DriveError::InvalidClientSecret {
            path: path.to_path_buf(),
            message,
        })
    }

    fn from_json(content: &str) -> std::result::Result<Self, String> {
        let file: ClientSecretFile = serde_json::from_str(content).map_err(|e| e.to_string())?;
        file.installed
            .or(file.web)
            .ok_or_else(|| "expected an \"installed\" or \"web\" client".to_string())
    }

    /// Token record for this client before anything has been issued.
    fn blank_token(&self, scopes: &[String]) -> StoredToken {
        StoredToken {
            access_token: String::new(),
            refresh_token: None,
            expiry: None,
            scopes: scopes.to_vec(),
            token_uri: self.token_uri.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }
}

/// Build a protocol client. Credentials go in the request body, which is
/// what Google's token endpoint expects from installed applications.
fn protocol_client(
    client_id: &str,
    client_secret: &str,
    auth_uri: &str,
    token_uri: &str,
    fail: fn(String) -> DriveError,
) -> Result<BasicClient> {
    let auth_url = AuthUrl::new(auth_uri.to_string())
        .map_err(|e| fail(format!("invalid auth_uri {}: {}", auth_uri, e)))?;
    let token_url = TokenUrl::new(token_uri.to_string())
        .map_err(|e| fail(format!("invalid token_uri {}: {}", token_uri, e)))?;

    Ok(BasicClient::new(
        ClientId::new(client_id.to_string()),
        Some(oauth2::ClientSecret::new(client_secret.to_string())),
        auth_url,
        Some(token_url),
    )
    .set_auth_type(AuthType::RequestBody))
}

/// Copy what the token endpoint issued onto `token`.
///
/// Fields the response omits (Google usually leaves out the refresh token
/// and the scope on refresh) keep their previous values.
fn apply_response(mut token: StoredToken, response: &BasicTokenResponse) -> StoredToken {
    token.access_token = response.access_token().secret().clone();
    if let Some(refresh_token) = response.refresh_token() {
        token.refresh_token = Some(refresh_token.secret().clone());
    }
    token.expiry = response
        .expires_in()
        .and_then(|lifetime| chrono::Duration::from_std(lifetime).ok())
        .map(|lifetime| Utc::now() + lifetime);
    if let Some(scopes) = response.scopes() {
        token.scopes = scopes.iter().map(|scope| scope.to_string()).collect();
    }
    token
}

fn describe<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> String
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => response.to_string(),
        other => other.to_string(),
    }
}

/// Talks to the OAuth endpoints to issue and refresh tokens.
#[derive(Debug, Clone, Default)]
pub struct OAuthClient;

impl OAuthClient {
    pub fn new() -> Self {
        Self
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, token: &StoredToken) -> Result<StoredToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| DriveError::TokenRefresh("no refresh token".to_string()))?;

        let client = protocol_client(
            &token.client_id,
            &token.client_secret,
            AUTH_URI,
            &token.token_uri,
            DriveError::TokenRefresh,
        )?;
        let response = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| DriveError::TokenRefresh(describe(e)))?;

        Ok(apply_response(token.clone(), &response))
    }

    /// Run the interactive consent flow and return a freshly issued token.
    ///
    /// Blocks until the browser redirects back to the loopback server.
    pub async fn authorize(&self, secret: &ClientSecret, scopes: &[String]) -> Result<StoredToken> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{}/", port);
        let state = CsrfToken::new_random();

        let url = authorization_url(secret, &redirect_uri, scopes, state.secret())?;
        println!("Open this URL in your browser to authorize access:");
        println!();
        println!("  {}", url);
        println!();
        tracing::info!(%redirect_uri, "waiting for authorization callback");

        let code = wait_for_code(listener, state.secret()).await?;
        self.exchange_code(secret, &code, &redirect_uri, scopes)
            .await
    }

    async fn exchange_code(
        &self,
        secret: &ClientSecret,
        code: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> Result<StoredToken> {
        let redirect_url = RedirectUrl::new(redirect_uri.to_string()).map_err(|e| {
            DriveError::Authorization(format!("invalid redirect URI {}: {}", redirect_uri, e))
        })?;
        let client = protocol_client(
            &secret.client_id,
            &secret.client_secret,
            &secret.auth_uri,
            &secret.token_uri,
            DriveError::Authorization,
        )?
        .set_redirect_uri(redirect_url);

        let response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| DriveError::Authorization(describe(e)))?;

        Ok(apply_response(secret.blank_token(scopes), &response))
    }
}

/// Build the consent page URL the user has to visit.
pub fn authorization_url(
    secret: &ClientSecret,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> Result<Url> {
    let redirect_url = RedirectUrl::new(redirect_uri.to_string()).map_err(|e| {
        DriveError::Authorization(format!("invalid redirect URI {}: {}", redirect_uri, e))
    })?;
    let client = protocol_client(
        &secret.client_id,
        &secret.client_secret,
        &secret.auth_uri,
        &secret.token_uri,
        DriveError::Authorization,
    )?
    .set_redirect_uri(redirect_url);

    let (url, _) = client
        .authorize_url(|| CsrfToken::new(state.to_string()))
        .add_scopes(scopes.iter().cloned().map(Scope::new))
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .url();
    Ok(url)
}

/// Query parameters Google appends to the redirect URI.
#[derive(Debug, Default, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Decide what a request to the redirect URI means.
///
/// `Ok(None)` is a request that is not the callback.
fn callback_outcome(params: &CallbackParams, expected_state: &str) -> Result<Option<String>> {
    if let Some(error) = &params.error {
        return Err(DriveError::Authorization(format!("access denied: {}", error)));
    }
    let Some(code) = &params.code else {
        return Ok(None);
    };
    if params.state.as_deref() != Some(expected_state) {
        return Err(DriveError::Authorization(
            "state mismatch in callback".to_string(),
        ));
    }
    Ok(Some(code.clone()))
}

struct CallbackState {
    expected_state: String,
    outcome: mpsc::UnboundedSender<Result<String>>,
}

async fn callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<&'static str>) {
    let outcome = match callback_outcome(&params, &state.expected_state) {
        Ok(None) => return (StatusCode::NOT_FOUND, Html("")),
        Ok(Some(code)) => Ok(code),
        Err(e) => Err(e),
    };
    let page = if outcome.is_ok() {
        (StatusCode::OK, Html(SUCCESS_PAGE))
    } else {
        (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE))
    };
    let _ = state.outcome.send(outcome);
    page
}

/// Serve the redirect URI on `listener` until the callback arrives.
///
/// Connections are handled concurrently, so a browser that opens a
/// connection and never uses it cannot hold up the real callback.
async fn wait_for_code(listener: TcpListener, expected_state: &str) -> Result<String> {
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
    let router = Router::new()
        .route("/", get(callback))
        .with_state(Arc::new(CallbackState {
            expected_state: expected_state.to_string(),
            outcome: outcome_tx,
        }));

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = outcome_rx.recv().await.unwrap_or_else(|| {
        Err(DriveError::Authorization(
            "callback server stopped before authorization completed".to_string(),
        ))
    });

    let _ = shutdown_tx.send(());
    if tokio::time::timeout(SHUTDOWN_GRACE, server).await.is_err() {
        tracing::debug!("callback server still draining connections, leaving it behind");
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mockito::{Matcher, Server};
    use std::collections::HashMap;
    use tokio::net::TcpStream;

    fn secret(token_uri: &str) -> ClientSecret {
        ClientSecret {
            client_id: "client-id.apps.googleusercontent.com".to_string(),
            client_secret: "shh".to_string(),
            auth_uri: AUTH_URI.to_string(),
            token_uri: token_uri.to_string(),
        }
    }

    fn params(code: Option<&str>, state: Option<&str>, error: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_client_secret_installed() {
        let json = r#"{"installed": {
            "client_id": "abc.apps.googleusercontent.com",
            "client_secret": "shh",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "redirect_uris": ["http://localhost"]
        }}"#;
        let secret = ClientSecret::from_json(json).unwrap();
        assert_eq!(secret.client_id, "abc.apps.googleusercontent.com");
        assert_eq!(secret.token_uri, TOKEN_URI);
    }

    #[test]
    fn test_client_secret_web_with_defaults() {
        let json = r#"{"web": {"client_id": "abc", "client_secret": "shh"}}"#;
        let secret = ClientSecret::from_json(json).unwrap();
        assert_eq!(secret.auth_uri, AUTH_URI);
        assert_eq!(secret.token_uri, TOKEN_URI);
    }

    #[test]
    fn test_client_secret_wrong_shape() {
        assert!(ClientSecret::from_json(r#"{"type": "service_account"}"#).is_err());
        assert!(ClientSecret::from_json("not json").is_err());
    }

    #[test]
    fn test_authorization_url() {
        let url = authorization_url(
            &secret(TOKEN_URI),
            "http://127.0.0.1:8080/",
            &["https://www.googleapis.com/auth/drive.file".to_string()],
            "xyz",
        )
        .unwrap();

        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "client-id.apps.googleusercontent.com");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:8080/");
        assert_eq!(params["scope"], "https://www.googleapis.com/auth/drive.file");
        assert_eq!(params["state"], "xyz");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["prompt"], "consent");
    }

    #[test]
    fn test_callback_outcome() {
        assert_eq!(
            callback_outcome(&params(Some("4/0Abc"), Some("s1"), None), "s1").unwrap(),
            Some("4/0Abc".to_string())
        );
        assert_eq!(callback_outcome(&CallbackParams::default(), "s1").unwrap(), None);
        assert!(callback_outcome(&params(Some("abc"), Some("other"), None), "s1").is_err());
        assert!(callback_outcome(&params(Some("abc"), None, None), "s1").is_err());
        assert!(callback_outcome(&params(None, Some("s1"), Some("access_denied")), "s1").is_err());
    }

    #[tokio::test]
    async fn test_wait_for_code_skips_unrelated_requests() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let waiter = tokio::spawn(async move { wait_for_code(listener, "st").await });

        let favicon = reqwest::get(format!("http://{}/favicon.ico", addr))
            .await
            .unwrap();
        let page = reqwest::get(format!("http://{}/?code=the-code&state=st", addr))
            .await
            .unwrap();

        assert_eq!(favicon.status(), reqwest::StatusCode::NOT_FOUND);
        assert_eq!(page.status(), reqwest::StatusCode::OK);
        assert!(page.text().await.unwrap().contains("Authorization complete"));
        assert_eq!(waiter.await.unwrap().unwrap(), "the-code");
    }

    #[tokio::test]
    async fn test_idle_connection_does_not_block_callback() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let waiter = tokio::spawn(async move { wait_for_code(listener, "st").await });

        // Browsers open speculative connections and may never send on them.
        let _idle = TcpStream::connect(addr).await.unwrap();
        let page = reqwest::get(format!("http://{}/?code=the-code&state=st", addr))
            .await
            .unwrap();
        assert_eq!(page.status(), reqwest::StatusCode::OK);

        let code = tokio::time::timeout(std::time::Duration::from_secs(10), waiter)
            .await
            .expect("callback was not handled while another connection sat idle")
            .unwrap()
            .unwrap();
        assert_eq!(code, "the-code");
    }

    #[tokio::test]
    async fn test_denied_consent_is_reported() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let waiter = tokio::spawn(async move { wait_for_code(listener, "st").await });

        let page = reqwest::get(format!("http://{}/?error=access_denied&state=st", addr))
            .await
            .unwrap();

        assert_eq!(page.status(), reqwest::StatusCode::BAD_REQUEST);
        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, DriveError::Authorization(ref m) if m.contains("access_denied")));
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "the-code".into()),
                Matcher::UrlEncoded("redirect_uri".into(), "http://127.0.0.1:9/".into()),
                Matcher::UrlEncoded(
                    "client_id".into(),
                    "client-id.apps.googleusercontent.com".into(),
                ),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token": "ya29.new", "expires_in": 3599, "refresh_token": "1//r",
                    "scope": "https://www.googleapis.com/auth/drive.file", "token_type": "Bearer"}"#,
            )
            .create_async()
            .await;

        let token_uri = format!("{}/token", server.url());
        let token = OAuthClient::new()
            .exchange_code(&secret(&token_uri), "the-code", "http://127.0.0.1:9/", &[])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(token.access_token, "ya29.new");
        assert_eq!(token.refresh_token.as_deref(), Some("1//r"));
        assert_eq!(token.token_uri, token_uri);
        assert_eq!(token.scopes, vec!["https://www.googleapis.com/auth/drive.file"]);
        assert!(token.is_valid());
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "invalid_grant"}"#)
            .create_async()
            .await;

        let err = OAuthClient::new()
            .exchange_code(
                &secret(&format!("{}/token", server.url())),
                "stale",
                "http://127.0.0.1:9/",
                &[],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DriveError::Authorization(ref m) if m.contains("invalid_grant")));
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded(
                "refresh_token".into(),
                "1//keep".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token": "ya29.refreshed", "expires_in": 3599, "token_type": "Bearer"}"#,
            )
            .create_async()
            .await;

        let stale = StoredToken {
            access_token: "ya29.old".to_string(),
            refresh_token: Some("1//keep".to_string()),
            expiry: Some(Utc::now() - Duration::hours(2)),
            scopes: vec!["scope-a".to_string()],
            token_uri: format!("{}/token", server.url()),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        };

        let fresh = OAuthClient::new().refresh(&stale).await.unwrap();
        assert_eq!(fresh.access_token, "ya29.refreshed");
        assert_eq!(fresh.refresh_token.as_deref(), Some("1//keep"));
        assert_eq!(fresh.scopes, vec!["scope-a"]);
        assert!(fresh.is_valid());
    }
}
