//! SFTP session seam
//!
//! [`ISftpSession`] is the handful of SFTP requests the provider needs.
//! [`RusshSession`] speaks the SFTP subsystem over an SSH connection,
//! [`LocalSession`] serves the same requests from the local filesystem.

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use russh::keys::ssh_key::PublicKey;
use russh::keys::{load_secret_key, PrivateKey, PrivateKeyWithHashAlg};
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::StatusCode;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::SftpError;

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// Time allowed for connecting and authenticating
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle time after which the connection is dropped
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

pub type RemoteReader = Pin<Box<dyn AsyncRead + Send>>;
pub type RemoteWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// Attributes of an existing remote path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteStat {
    pub is_dir: bool,
    pub size: u64,
}

/// SFTP requests used by the provider
#[async_trait]
pub trait ISftpSession: Send + Sync {
    /// Attributes of `path`, `None` when it does not exist
    async fn stat(&self, path: &str) -> Result<Option<RemoteStat>, SftpError>;

    /// Creates a single folder; the parent must exist
    async fn create_dir(&self, path: &str) -> Result<(), SftpError>;

    async fn remove_file(&self, path: &str) -> Result<(), SftpError>;

    /// Removes an empty folder
    async fn remove_dir(&self, path: &str) -> Result<(), SftpError>;

    /// Names of the entries of `path`, without `.` and `..`
    async fn read_dir(&self, path: &str) -> Result<Vec<String>, SftpError>;

    async fn open_read(&self, path: &str) -> Result<RemoteReader, SftpError>;

    /// Creates or truncates `path` for writing
    async fn create(&self, path: &str) -> Result<RemoteWriter, SftpError>;

    /// Human readable target, e.g. `artist@sftp.example.com:22`
    fn describe(&self) -> String;
}

// ============================================================================
// SshTarget
// ============================================================================

/// Where and as whom to connect
///
/// With neither a key nor a password, the default keys of the current user
/// are tried.
#[derive(Clone)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub key: Option<PathBuf>,
    pub key_pass: Option<String>,
}

impl SshTarget {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            password: None,
            key: None,
            key_pass: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_key(mut self, key: Option<PathBuf>, key_pass: Option<String>) -> Self {
        self.key = key;
        self.key_pass = key_pass.filter(|p| !p.is_empty());
        self
    }

    pub fn describe(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

impl std::fmt::Debug for SshTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// `~/.ssh` keys tried when no credential is configured
fn default_keys() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    let ssh = home.join(".ssh");
    ["id_ed25519", "id_ecdsa", "id_rsa"]
        .iter()
        .map(|name| ssh.join(name))
        .filter(|path| path.is_file())
        .collect()
}

// ============================================================================
// RusshSession
// ============================================================================

/// Host key policy of `~/.ssh/known_hosts`: unknown hosts are learned,
/// changed keys are refused
struct KnownHosts {
    host: String,
    port: u16,
}

impl client::Handler for KnownHosts {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        match russh::keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => Ok(true),
            Ok(false) => {
                info!(host = %self.host, "Adding host key to known hosts");
                if let Err(e) = russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, server_public_key) {
                    warn!(host = %self.host, error = %e, "Could not record host key");
                }
                Ok(true)
            }
            Err(russh::keys::Error::KeyChanged { line }) => {
                warn!(
                    host = %self.host,
                    line,
                    "Host key differs from known_hosts, refusing connection"
                );
                Ok(false)
            }
            Err(e) => {
                warn!(host = %self.host, error = %e, "known_hosts unreadable, accepting host key");
                Ok(true)
            }
        }
    }
}

/// SFTP subsystem of an authenticated SSH connection
pub struct RusshSession {
    target: SshTarget,
    // keeps the connection open
    _handle: client::Handle<KnownHosts>,
    sftp: SftpSession,
}

impl RusshSession {
    /// Connects, authenticates and opens the `sftp` subsystem
    pub async fn connect(target: SshTarget) -> Result<Self, SftpError> {
        match tokio::time::timeout(CONNECT_TIMEOUT, Self::open(target.clone())).await {
            Ok(result) => result,
            Err(_) => Err(SftpError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connecting to {} timed out", target.describe()),
            ))),
        }
    }

    async fn open(target: SshTarget) -> Result<Self, SftpError> {
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(INACTIVITY_TIMEOUT),
            ..Default::default()
        });
        let handler = KnownHosts {
            host: target.host.clone(),
            port: target.port,
        };

        debug!(server = %target.describe(), "Connecting");
        let mut handle =
            client::connect(config, (target.host.as_str(), target.port), handler).await?;
        authenticate(&mut handle, &target).await?;

        let channel = handle.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| sftp_error("sftp subsystem", e))?;

        Ok(Self {
            target,
            _handle: handle,
            sftp,
        })
    }
}

async fn authenticate(
    handle: &mut client::Handle<KnownHosts>,
    target: &SshTarget,
) -> Result<(), SftpError> {
    if let Some(path) = &target.key {
        let key = load_secret_key(path, target.key_pass.as_deref())?;
        if authenticate_key(handle, &target.user, key).await? {
            return Ok(());
        }
    }

    if let Some(password) = &target.password {
        let result = handle
            .authenticate_password(target.user.clone(), password.clone())
            .await?;
        if result.success() {
            return Ok(());
        }
    }

    if target.key.is_none() && target.password.is_none() {
        for path in default_keys() {
            match load_secret_key(&path, None) {
                Ok(key) => {
                    if authenticate_key(handle, &target.user, key).await? {
                        return Ok(());
                    }
                }
                Err(e) => debug!(key = %path.display(), error = %e, "Skipping default key"),
            }
        }
    }

    Err(SftpError::Auth(target.describe()))
}

async fn authenticate_key(
    handle: &mut client::Handle<KnownHosts>,
    user: &str,
    key: PrivateKey,
) -> Result<bool, SftpError> {
    let hash = handle.best_supported_rsa_hash().await?.flatten();
    let result = handle
        .authenticate_publickey(user.to_string(), PrivateKeyWithHashAlg::new(Arc::new(key), hash))
        .await?;
    Ok(result.success())
}

fn sftp_error(path: &str, err: russh_sftp::client::error::Error) -> SftpError {
    use russh_sftp::client::error::Error;

    match err {
        Error::Status(status) => match status.status_code {
            StatusCode::NoSuchFile => SftpError::NoSuchFile(path.to_string()),
            StatusCode::PermissionDenied => {
                SftpError::PermissionDenied(format!("{}: {}", path, status.error_message))
            }
            _ => SftpError::Protocol(format!("{}: {}", path, status.error_message)),
        },
        other => SftpError::Protocol(format!("{}: {}", path, other)),
    }
}

#[async_trait]
impl ISftpSession for RusshSession {
    async fn stat(&self, path: &str) -> Result<Option<RemoteStat>, SftpError> {
        match self.sftp.metadata(path).await {
            Ok(attrs) => Ok(Some(RemoteStat {
                is_dir: attrs.is_dir(),
                size: attrs.len(),
            })),
            Err(e) => match sftp_error(path, e) {
                SftpError::NoSuchFile(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn create_dir(&self, path: &str) -> Result<(), SftpError> {
        self.sftp.create_dir(path).await.map_err(|e| sftp_error(path, e))
    }

    async fn remove_file(&self, path: &str) -> Result<(), SftpError> {
        self.sftp.remove_file(path).await.map_err(|e| sftp_error(path, e))
    }

    async fn remove_dir(&self, path: &str) -> Result<(), SftpError> {
        self.sftp.remove_dir(path).await.map_err(|e| sftp_error(path, e))
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<String>, SftpError> {
        let entries = self.sftp.read_dir(path).await.map_err(|e| sftp_error(path, e))?;
        Ok(entries
            .map(|entry| entry.file_name())
            .filter(|name| name != "." && name != "..")
            .collect())
    }

    async fn open_read(&self, path: &str) -> Result<RemoteReader, SftpError> {
        let file = self.sftp.open(path).await.map_err(|e| sftp_error(path, e))?;
        Ok(Box::pin(file))
    }

    async fn create(&self, path: &str) -> Result<RemoteWriter, SftpError> {
        let file = self.sftp.create(path).await.map_err(|e| sftp_error(path, e))?;
        Ok(Box::pin(file))
    }

    fn describe(&self) -> String {
        self.target.describe()
    }
}

// ============================================================================
// LocalSession
// ============================================================================

/// Serves SFTP requests from the local filesystem
///
/// Useful for testing, and for "remote" storage mounted on this machine.
#[derive(Debug, Clone, Default)]
pub struct LocalSession;

fn local_error(path: &str, err: std::io::Error) -> SftpError {
    match err.kind() {
        std::io::ErrorKind::NotFound => SftpError::NoSuchFile(path.to_string()),
        std::io::ErrorKind::PermissionDenied => SftpError::PermissionDenied(path.to_string()),
        _ => SftpError::Io(err),
    }
}

#[async_trait]
impl ISftpSession for LocalSession {
    async fn stat(&self, path: &str) -> Result<Option<RemoteStat>, SftpError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(Some(RemoteStat {
                is_dir: meta.is_dir(),
                size: meta.len(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(local_error(path, e)),
        }
    }

    async fn create_dir(&self, path: &str) -> Result<(), SftpError> {
        tokio::fs::create_dir(path).await.map_err(|e| local_error(path, e))
    }

    async fn remove_file(&self, path: &str) -> Result<(), SftpError> {
        tokio::fs::remove_file(path).await.map_err(|e| local_error(path, e))
    }

    async fn remove_dir(&self, path: &str) -> Result<(), SftpError> {
        tokio::fs::remove_dir(path).await.map_err(|e| local_error(path, e))
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<String>, SftpError> {
        let mut entries = tokio::fs::read_dir(path).await.map_err(|e| local_error(path, e))?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn open_read(&self, path: &str) -> Result<RemoteReader, SftpError> {
        let file = tokio::fs::File::open(path).await.map_err(|e| local_error(path, e))?;
        Ok(Box::pin(file))
    }

    async fn create(&self, path: &str) -> Result<RemoteWriter, SftpError> {
        let file = tokio::fs::File::create(path).await.map_err(|e| local_error(path, e))?;
        Ok(Box::pin(file))
    }

    fn describe(&self) -> String {
        "localhost".to_string()
    }
}
