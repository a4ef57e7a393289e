//! SftpProvider - IRemoteProvider implementation over SFTP
//!
//! The provider is active when its site is enabled and the SSH connection,
//! authentication and `sftp` subsystem all came up. Transfers open one
//! remote file handle per file and stream it chunk by chunk; a pause
//! stops between chunks and removes the partially written target.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use sitesync_core::config::SitePresets;
use sitesync_core::domain::paths::{
    file_name_of, join, local_target, split_target, trim_trailing_slash,
};
use sitesync_core::domain::{
    PathTree, ProviderError, RootConfig, SettingsField, SettingsSchema, TransferOutcome,
};
use sitesync_core::ports::{
    fraction, IAnatomy, IRemoteProvider, ITransferObserver, ProgressThrottle, ProviderArgs,
    ProviderRegistration,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::session::{ISftpSession, RemoteStat, RusshSession, SshTarget, DEFAULT_PORT};
use crate::{SftpError, CHUNK_SIZE};

/// Registry code
pub const CODE: &str = "sftp";

pub const LABEL: &str = "SFTP";

/// Files handed to this provider per sync loop
pub const BATCH_LIMIT: usize = 20;

/// SFTP provider for one site
pub struct SftpProvider {
    site: String,
    presets: Option<SitePresets>,
    session: Option<Arc<dyn ISftpSession>>,
    chunk_size: usize,
}

impl SftpProvider {
    /// Builds a provider from site presets and connects to the server
    pub async fn new(args: ProviderArgs) -> Self {
        let enabled = args.presets.as_ref().map(|p| p.enabled).unwrap_or(false);
        let Some(target) = Self::target_from_presets(&args).filter(|_| enabled) else {
            return Self::from_parts(args, None);
        };

        match RusshSession::connect(target.clone()).await {
            Ok(session) => Self::with_session(args, Arc::new(session)),
            Err(e) => {
                warn!("Couldn't connect to {}: {}", target.describe(), e);
                Self::from_parts(args, None)
            }
        }
    }

    /// Builds a provider on top of an open session (useful for testing)
    pub fn with_session(args: ProviderArgs, session: Arc<dyn ISftpSession>) -> Self {
        let enabled = args.presets.as_ref().map(|p| p.enabled).unwrap_or(false);
        if !enabled {
            return Self::from_parts(args, None);
        }
        info!(site = %args.site, server = %session.describe(), "SFTP connection established");
        Self::from_parts(args, Some(session))
    }

    fn from_parts(args: ProviderArgs, session: Option<Arc<dyn ISftpSession>>) -> Self {
        Self {
            site: args.site,
            presets: args.presets,
            session,
            chunk_size: CHUNK_SIZE,
        }
    }

    fn target_from_presets(args: &ProviderArgs) -> Option<SshTarget> {
        let Some(presets) = args.presets.as_ref() else {
            warn!("Sync Server: There are no presets for {}.", args.site);
            return None;
        };
        let Some(host) = presets.get_str("sftp_host") else {
            info!("Sync Server: No host for sftp provider of '{}'", args.site);
            return None;
        };
        let Some(user) = presets.get_str("sftp_user") else {
            info!("Sync Server: No user for sftp provider of '{}'", args.site);
            return None;
        };

        let port = presets
            .get_u64("sftp_port")
            .and_then(|p| u16::try_from(p).ok())
            .unwrap_or(DEFAULT_PORT);

        Some(
            SshTarget::new(host, user)
                .with_port(port)
                .with_password(presets.get_str("sftp_pass").map(str::to_string))
                .with_key(
                    presets.get_platform_str("sftp_key").map(PathBuf::from),
                    presets.get_str("sftp_key_pass").map(str::to_string),
                ),
        )
    }

    /// Overrides the transfer chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn build(args: ProviderArgs) -> BoxFuture<'static, Box<dyn IRemoteProvider>> {
        Box::pin(async move { Box::new(SftpProvider::new(args).await) as Box<dyn IRemoteProvider> })
    }

    pub fn registration() -> ProviderRegistration {
        ProviderRegistration {
            label: LABEL,
            batch_limit: BATCH_LIMIT,
            schema: Self::settings_schema,
            build: Self::build,
        }
    }

    pub fn settings_schema() -> SettingsSchema {
        let credentials = || {
            vec![
                SettingsField::new("text", "sftp_user", "SFTP user name"),
                SettingsField::new("text", "sftp_pass", "SFTP password"),
                SettingsField::new("path", "sftp_key", "SFTP user ssh key").multiplatform(true),
                SettingsField::new("text", "sftp_key_pass", "SFTP user ssh key password"),
            ]
        };

        let mut project = vec![
            SettingsField::new("text", "sftp_host", "SFTP host name"),
            SettingsField::new("number", "sftp_port", "SFTP port"),
        ];
        project.extend(credentials());
        project.push(SettingsField::roots());

        SettingsSchema {
            system: vec![],
            project,
            // credentials can be overridden per user
            local: credentials(),
        }
    }

    fn session(&self) -> Result<&dyn ISftpSession, ProviderError> {
        self.session
            .as_deref()
            .ok_or_else(|| ProviderError::Inactive(self.site.clone()))
    }

    async fn stat(&self, path: &str) -> Result<Option<RemoteStat>, ProviderError> {
        if path.is_empty() {
            return Ok(None);
        }
        Ok(self.session()?.stat(trim_trailing_slash(path)).await?)
    }

    pub async fn file_path_exists(&self, path: &str) -> Result<bool, ProviderError> {
        Ok(self.stat(path).await?.is_some_and(|s| !s.is_dir))
    }

    pub async fn folder_path_exists(&self, path: &str) -> Result<bool, ProviderError> {
        Ok(self.stat(path).await?.is_some_and(|s| s.is_dir))
    }

    /// Creates `path` and every missing ancestor
    async fn make_dirs(&self, path: &str) -> Result<(), ProviderError> {
        let session = self.session()?;
        let path = trim_trailing_slash(path);
        let mut current = String::new();
        if path.starts_with('/') {
            current.push('/');
        }

        for part in path.split('/').filter(|p| !p.is_empty()) {
            current = join(&current, part);
            match session.stat(&current).await? {
                Some(stat) if stat.is_dir => {}
                Some(_) => {
                    return Err(ProviderError::NotADirectory(format!(
                        "{} exists and is not a folder",
                        current
                    )))
                }
                None => {
                    debug!(site = %self.site, "Creating folder {}", current);
                    session.create_dir(&current).await?;
                }
            }
        }
        Ok(())
    }

    /// Removes `root` with everything below it
    async fn remove_tree(&self, root: &str) -> Result<(), ProviderError> {
        let session = self.session()?;
        let mut pending = vec![root.to_string()];
        let mut folders = Vec::new();

        while let Some(folder) = pending.pop() {
            for name in session.read_dir(&folder).await? {
                let child = join(&folder, &name);
                match session.stat(&child).await? {
                    Some(stat) if stat.is_dir => pending.push(child),
                    Some(_) => session.remove_file(&child).await?,
                    None => {}
                }
            }
            folders.push(folder);
        }

        // children were found after their parents
        for folder in folders.iter().rev() {
            session.remove_dir(folder).await?;
        }
        Ok(())
    }

    async fn upload_stream(
        &self,
        session: &dyn ISftpSession,
        source: &Path,
        target: &str,
        size: u64,
        throttle: &mut ProgressThrottle<'_>,
    ) -> Result<(), SftpError> {
        let mut file = tokio::fs::File::open(source).await?;
        let mut remote = session.create(target).await?;
        let mut buf = vec![0u8; self.chunk_size];
        let mut sent: u64 = 0;

        loop {
            throttle.check_paused().map_err(|_| SftpError::Paused)?;
            throttle.tick(fraction(sent, size));
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            remote.write_all(&buf[..n]).await?;
            sent += n as u64;
        }

        remote.shutdown().await?;
        Ok(())
    }

    async fn download_stream(
        &self,
        session: &dyn ISftpSession,
        source: &str,
        target: &Path,
        size: u64,
        throttle: &mut ProgressThrottle<'_>,
    ) -> Result<(), SftpError> {
        let mut remote = session.open_read(source).await?;
        let mut out = tokio::fs::File::create(target).await?;
        let mut buf = vec![0u8; self.chunk_size];
        let mut received: u64 = 0;

        loop {
            throttle.check_paused().map_err(|_| SftpError::Paused)?;
            throttle.tick(fraction(received, size));
            let n = remote.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n]).await?;
            received += n as u64;
        }

        out.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl IRemoteProvider for SftpProvider {
    fn code(&self) -> &'static str {
        CODE
    }

    fn site(&self) -> &str {
        &self.site
    }

    fn is_active(&self) -> bool {
        self.presets.as_ref().map(|p| p.enabled).unwrap_or(false) && self.session.is_some()
    }

    async fn upload_file(
        &self,
        source: &Path,
        target: &str,
        observer: &dyn ITransferObserver,
        overwrite: bool,
    ) -> Result<TransferOutcome, ProviderError> {
        if !source.is_file() {
            return Err(ProviderError::NotFound(format!(
                "Source file {} doesn't exist.",
                source.display()
            )));
        }
        let session = self.session()?;

        let source_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (folder, name) = split_target(target, &source_name);
        let target_path = join(&folder, &name);

        if self.file_path_exists(&target_path).await? && !overwrite {
            return Err(ProviderError::AlreadyExists(format!(
                "File {} exists, set overwrite",
                target_path
            )));
        }

        let size = tokio::fs::metadata(source).await?.len();
        if !folder.is_empty() {
            self.make_dirs(&folder).await?;
        }

        info!("Uploading {} -> {}", source.display(), target_path);
        let mut throttle = ProgressThrottle::new(observer, "Uploaded");
        match self
            .upload_stream(session, source, &target_path, size, &mut throttle)
            .await
        {
            Ok(()) => {
                throttle.finish();
                Ok(TransferOutcome::Completed(name))
            }
            Err(e) => {
                if let Err(err) = session.remove_file(&target_path).await {
                    debug!("Could not remove partial upload {}: {}", target_path, err);
                }
                Err(e.into())
            }
        }
    }

    async fn download_file(
        &self,
        source: &str,
        local: &Path,
        observer: &dyn ITransferObserver,
        overwrite: bool,
    ) -> Result<TransferOutcome, ProviderError> {
        let size = match self.stat(source).await? {
            Some(stat) if !stat.is_dir => stat.size,
            _ => {
                return Err(ProviderError::NotFound(format!(
                    "Source file {} doesn't exist.",
                    source
                )))
            }
        };
        let session = self.session()?;

        let target = local_target(local, file_name_of(source));
        if target.is_file() && !overwrite {
            return Err(ProviderError::AlreadyExists(format!(
                "File {} exists, set overwrite",
                target.display()
            )));
        }

        info!("Downloading {} -> {}", source, target.display());
        let mut throttle = ProgressThrottle::new(observer, "Downloaded");
        match self
            .download_stream(session, source, &target, size, &mut throttle)
            .await
        {
            Ok(()) => {
                throttle.finish();
                let name = target
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(TransferOutcome::Completed(name))
            }
            Err(e) => {
                if let Err(err) = tokio::fs::remove_file(&target).await {
                    debug!("Could not remove partial download {}: {}", target.display(), err);
                }
                Err(e.into())
            }
        }
    }

    async fn delete_file(&self, path: &str) -> Result<(), ProviderError> {
        if !self.file_path_exists(path).await? {
            return Err(ProviderError::NotFound(format!(
                "File {} to be deleted doesn't exist.",
                path
            )));
        }
        self.session()?.remove_file(path).await?;
        info!(site = %self.site, "Deleted file {}", path);
        Ok(())
    }

    async fn delete_folder(&self, path: &str, force: bool) -> Result<(), ProviderError> {
        if !self.folder_path_exists(path).await? {
            return Err(ProviderError::NotFound(format!("Folder {} doesn't exist", path)));
        }
        let path = trim_trailing_slash(path);
        if force {
            self.remove_tree(path).await?;
        } else {
            if !self.list_folder(path).await?.is_empty() {
                return Err(ProviderError::NotEmpty(path.to_string()));
            }
            self.session()?.remove_dir(path).await?;
        }
        info!(site = %self.site, "Deleted folder {}", path);
        Ok(())
    }

    async fn list_folder(&self, path: &str) -> Result<Vec<String>, ProviderError> {
        if !self.folder_path_exists(path).await? {
            return Err(ProviderError::NotFound(format!("Folder {} doesn't exist", path)));
        }
        Ok(self.session()?.read_dir(trim_trailing_slash(path)).await?)
    }

    async fn create_folder(&self, path: &str) -> Result<String, ProviderError> {
        let path = trim_trailing_slash(path);
        self.make_dirs(path).await?;
        debug!(site = %self.site, "Ensured folder {}", path);
        Ok(file_name_of(path).to_string())
    }

    async fn get_tree(&self) -> Result<Option<PathTree>, ProviderError> {
        Ok(None)
    }

    fn get_roots_config(&self, _anatomy: Option<&dyn IAnatomy>) -> RootConfig {
        // roots cannot be locally overridden
        self.presets
            .as_ref()
            .map(|p| p.root.clone())
            .unwrap_or_default()
    }
}
