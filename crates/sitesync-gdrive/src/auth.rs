//! Google credentials and access token refresh
//!
//! A site points at a credentials JSON file per platform
//! (`credentials_url: {linux: ..., darwin: ..., windows: ...}`). Two shapes
//! are accepted:
//!
//! ```json
//! {"type": "authorized_user", "client_id": "...", "client_secret": "...", "refresh_token": "..."}
//! {"access_token": "ya29...."}
//! ```
//!
//! ## Components
//!
//! - [`Credentials`] - Parsed credentials file
//! - [`RefreshFlow`] - OAuth2 refresh token exchange using the `oauth2` crate
//! - [`TokenSource`] - Hands out a valid access token, refreshing when needed
//! - [`expand_env`] - `{VAR}` expansion of the configured path

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use oauth2::{
    basic::BasicClient, AuthUrl, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
    RefreshToken, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::GDriveError;

/// Default Google OAuth2 token endpoint
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google OAuth2 authorization endpoint, unused by the refresh flow but
/// required by the client type
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";

/// Tokens expiring within this margin are refreshed before use
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

// ============================================================================
// Credentials
// ============================================================================

/// Contents of a credentials file
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    /// Installed-app credentials with a long lived refresh token
    AuthorizedUser {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        #[serde(default = "default_token_uri")]
        token_uri: String,
    },
    /// A pre-issued access token, used as is
    AccessToken { access_token: String },
}

fn default_token_uri() -> String {
    TOKEN_URL.to_string()
}

impl Credentials {
    /// Reads and parses a credentials file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Unsupported credentials format in {}", path.display()))
    }
}

/// Replaces `{NAME}` with the value of environment variable `NAME`.
///
/// # Errors
/// Returns the names of all referenced variables that are not set.
pub fn expand_env(template: &str) -> std::result::Result<String, Vec<String>> {
    let mut out = String::with_capacity(template.len());
    let mut missing = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match std::env::var(name) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => missing.push(name.to_string()),
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    if missing.is_empty() {
        Ok(out)
    } else {
        Err(missing)
    }
}

// ============================================================================
// RefreshFlow
// ============================================================================

/// Access token with its expiry
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub secret: String,
    pub expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

/// OAuth2 refresh token exchange
pub struct RefreshFlow {
    client: BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>,
    refresh_token: String,
    http: reqwest::Client,
}

impl RefreshFlow {
    pub fn new(
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
        token_uri: &str,
    ) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(client_id.to_string()))
            .set_client_secret(ClientSecret::new(client_secret.to_string()))
            .set_auth_uri(AuthUrl::new(AUTH_URL.to_string()).context("Invalid authorization URL")?)
            .set_token_uri(TokenUrl::new(token_uri.to_string()).context("Invalid token URL")?);

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build token HTTP client")?;

        Ok(Self {
            client,
            refresh_token: refresh_token.to_string(),
            http,
        })
    }

    /// Exchanges the refresh token for a new access token
    pub async fn refresh(&self) -> Result<AccessToken> {
        debug!("Refreshing Google access token");

        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(self.refresh_token.clone()))
            .request_async(&self.http)
            .await
            .context("Failed to refresh token")?;

        let lifetime = token_result
            .expires_in()
            .unwrap_or_else(|| Duration::from_secs(3600));

        info!("Successfully refreshed Google access token");
        Ok(AccessToken {
            secret: token_result.access_token().secret().to_string(),
            expires_at: Instant::now() + lifetime,
        })
    }
}

// ============================================================================
// TokenSource
// ============================================================================

/// Provides the bearer token for every Drive request
pub enum TokenSource {
    Static(String),
    Refreshing {
        flow: RefreshFlow,
        cached: Mutex<Option<AccessToken>>,
    },
}

impl TokenSource {
    pub fn from_credentials(credentials: Credentials) -> Result<Self> {
        match credentials {
            Credentials::AccessToken { access_token } => Ok(TokenSource::Static(access_token)),
            Credentials::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
                token_uri,
            } => Ok(TokenSource::Refreshing {
                flow: RefreshFlow::new(&client_id, &client_secret, &refresh_token, &token_uri)?,
                cached: Mutex::new(None),
            }),
        }
    }

    /// Returns a token valid for at least [`EXPIRY_MARGIN`]
    pub async fn access_token(&self) -> std::result::Result<String, GDriveError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Refreshing { flow, cached } => {
                let mut cached = cached.lock().await;
                if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
                    return Ok(token.secret.clone());
                }
                let token = flow
                    .refresh()
                    .await
                    .map_err(|e| GDriveError::Auth(format!("{:#}", e)))?;
                let secret = token.secret.clone();
                *cached = Some(token);
                Ok(secret)
            }
        }
    }
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::Static(_) => f.write_str("TokenSource::Static(..)"),
            TokenSource::Refreshing { .. } => f.write_str("TokenSource::Refreshing(..)"),
        }
    }
}
