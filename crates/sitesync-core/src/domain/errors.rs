//! Provider error types
//!
//! Every provider operation either returns a meaningful value or one of
//! these errors. The orchestration loop decides about retries and reporting;
//! providers never swallow a backend failure and report success.

use thiserror::Error;

/// Errors raised at the provider port boundary
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Source file or folder is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Destination exists and overwrite was not requested
    #[error("Already exists: {0}, use 'overwrite' argument")]
    AlreadyExists(String),

    /// Target folder does not exist and could not be created
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// Folder still has children and `force` was not given
    #[error("Folder {0} is not empty, use 'force'")]
    NotEmpty(String),

    /// The backend refused access for the configured credentials
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The representation was paused while the transfer was running
    #[error("Paused during process, please redo")]
    Paused,

    /// Transient backend failure, the caller should try again next loop
    #[error("Backend unavailable, retry next loop: {0}")]
    Unavailable(String),

    /// Root placeholders could not be substituted
    #[error("Error in resolving root: {0}")]
    PathResolution(String),

    /// No provider is registered under the requested code
    #[error("Provider {0} not registered yet")]
    NotRegistered(String),

    /// Operation called on a provider without working credentials
    #[error("Provider for site {0} is not active")]
    Inactive(String),

    /// Site presets are malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Any other backend failure (HTTP status, malformed response, ssh exit code)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Returns true for failures that should be retried on the next sync loop
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Unavailable(_))
    }
}

impl From<anyhow::Error> for ProviderError {
    fn from(err: anyhow::Error) -> Self {
        ProviderError::Backend(format!("{:#}", err))
    }
}
