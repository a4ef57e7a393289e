//! sitesync GDrive - Google Drive v3 provider
//!
//! Provides async client and provider for:
//! - OAuth2 token refresh from an `authorized_user` credentials file
//! - Root discovery for My Drive and shared drives
//! - The folder path tree (Drive has no native paths, only parent ids)
//! - Resumable chunked upload and ranged chunked download
//!
//! ## Modules
//!
//! - [`auth`] - Credentials file parsing and access token refresh
//! - [`client`] - Drive v3 REST client
//! - [`upload`] - Resumable upload session
//! - [`download`] - Ranged download
//! - [`provider`] - [`IRemoteProvider`](sitesync_core::ports::IRemoteProvider) implementation

pub mod auth;
pub mod client;
pub mod download;
pub mod provider;
pub mod upload;

use sitesync_core::domain::ProviderError;
use thiserror::Error;

pub use provider::{GDriveProvider, CODE, QUOTA_BACKOFF};

/// Bytes per upload/download chunk, must be a multiple of 256 KiB
pub const CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Errors that can occur when communicating with the Drive API
#[derive(Debug, Error)]
pub enum GDriveError {
    /// The API answered with an error status
    #[error("HTTP {status}: {message}")]
    Api {
        status: u16,
        /// First machine readable reason, e.g. `userRateLimitExceeded`
        reason: Option<String>,
        message: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// No usable access token could be obtained
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Reading or writing the local file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The observer asked to stop between two chunks
    #[error("Paused during process, please redo")]
    Paused,
}

impl GDriveError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GDriveError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 403 caused by missing sharing/consent rather than by quota
    pub fn is_permission_denied(&self) -> bool {
        match self {
            GDriveError::Api {
                status: 403,
                reason,
                message,
            } => {
                message.contains("has not granted")
                    || reason.as_deref().is_some_and(|r| r.contains("has not granted"))
            }
            _ => false,
        }
    }
}

impl From<GDriveError> for ProviderError {
    fn from(err: GDriveError) -> Self {
        if err.is_permission_denied() {
            return ProviderError::PermissionDenied(err.to_string());
        }
        match err {
            GDriveError::Paused => ProviderError::Paused,
            GDriveError::Io(e) => ProviderError::Io(e),
            GDriveError::Api { status: 404, message, .. } => ProviderError::NotFound(message),
            GDriveError::Api { status, .. } if status == 429 || status >= 500 => {
                ProviderError::Unavailable(err.to_string())
            }
            GDriveError::Network(_) => ProviderError::Unavailable(err.to_string()),
            other => ProviderError::Backend(other.to_string()),
        }
    }
}
