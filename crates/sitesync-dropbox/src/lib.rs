//! sitesync Dropbox - Dropbox Business provider
//!
//! A site acts as one team member inside one team folder. The member and the
//! team folder namespace are looked up once from the team token; every later
//! call selects them through the `Dropbox-API-Select-User` and
//! `Dropbox-API-Path-Root` headers.
//!
//! ## Modules
//!
//! - [`client`] - Dropbox API v2 client (RPC, content upload, content download)
//! - [`provider`] - [`IRemoteProvider`](sitesync_core::ports::IRemoteProvider) implementation

pub mod client;
pub mod provider;

use sitesync_core::domain::ProviderError;
use thiserror::Error;

pub use provider::{DropboxProvider, CODE};

/// Largest file sent in a single `files/upload`, and the session chunk size
pub const CHUNK_SIZE: usize = 50 * 1024 * 1024;

/// Errors that can occur when communicating with the Dropbox API
#[derive(Debug, Error)]
pub enum DropboxError {
    /// The API answered with an error status
    ///
    /// `summary` is the `error_summary` of route errors (409), e.g.
    /// `path/not_found/..`, otherwise the response body.
    #[error("HTTP {status}: {summary}")]
    Api { status: u16, summary: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The team has no member or team folder with the configured name
    #[error("{0}")]
    Lookup(String),

    /// Reading or writing the local file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The observer asked to stop between two chunks
    #[error("Paused during process, please redo")]
    Paused,
}

impl DropboxError {
    pub fn status(&self) -> Option<u16> {
        match self {
            DropboxError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Route error for a path that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, DropboxError::Api { status: 409, summary } if summary.contains("not_found"))
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }
}

impl From<DropboxError> for ProviderError {
    fn from(err: DropboxError) -> Self {
        if err.is_not_found() {
            return ProviderError::NotFound(err.to_string());
        }
        match err {
            DropboxError::Paused => ProviderError::Paused,
            DropboxError::Io(e) => ProviderError::Io(e),
            DropboxError::Api { status: 409, ref summary } if summary.contains("conflict") => {
                ProviderError::AlreadyExists(summary.clone())
            }
            DropboxError::Api { status: 401, .. } | DropboxError::Api { status: 403, .. } => {
                ProviderError::PermissionDenied(err.to_string())
            }
            DropboxError::Api { status, .. } if status == 429 || status >= 500 => {
                ProviderError::Unavailable(err.to_string())
            }
            DropboxError::Network(_) => ProviderError::Unavailable(err.to_string()),
            other => ProviderError::Backend(other.to_string()),
        }
    }
}
