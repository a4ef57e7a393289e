//! sitesync SFTP - SSH file transfer provider
//!
//! Files are moved over the SFTP subsystem of an SSH connection, chunk by
//! chunk, which keeps progress reporting and pausing under our control.
//! Servers that only expose `internal-sftp` work the same as full shells.
//!
//! ## Modules
//!
//! - [`session`] - [`ISftpSession`](session::ISftpSession) with the russh and local filesystem implementations
//! - [`provider`] - [`IRemoteProvider`](sitesync_core::ports::IRemoteProvider) implementation

pub mod provider;
pub mod session;

use sitesync_core::domain::ProviderError;
use thiserror::Error;

pub use provider::{SftpProvider, CODE};

/// Bytes per transfer chunk
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Errors of the SSH connection and SFTP requests
#[derive(Debug, Error)]
pub enum SftpError {
    /// Connecting or talking to the SSH server failed
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// A private key could not be loaded
    #[error("SSH key error: {0}")]
    Key(#[from] russh::keys::Error),

    /// The server rejected every configured credential
    #[error("Authentication failed for {0}")]
    Auth(String),

    /// The remote path does not exist
    #[error("No such file: {0}")]
    NoSuchFile(String),

    /// The server refused the request
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Any other SFTP status or protocol failure
    #[error("SFTP error: {0}")]
    Protocol(String),

    /// Local file access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The observer asked to stop between two chunks
    #[error("Paused during process, please redo")]
    Paused,
}

impl From<SftpError> for ProviderError {
    fn from(err: SftpError) -> Self {
        match err {
            SftpError::Paused => ProviderError::Paused,
            SftpError::Io(e) => ProviderError::Io(e),
            SftpError::NoSuchFile(path) => ProviderError::NotFound(path),
            SftpError::Auth(_) | SftpError::PermissionDenied(_) => {
                ProviderError::PermissionDenied(err.to_string())
            }
            SftpError::Ssh(_) => ProviderError::Unavailable(err.to_string()),
            other => ProviderError::Backend(other.to_string()),
        }
    }
}
