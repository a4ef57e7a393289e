//! Local drive provider
//!
//! Serves sites whose storage is reachable through the local filesystem:
//! the studio site, a mounted network share or an external disk. Remote
//! paths are plain filesystem paths.
//!
//! ## Design Decisions
//!
//! - **Chunked copy**: files are copied in [`CHUNK_SIZE`] chunks so that a
//!   pause is honored and progress is reported on large plates.
//! - **Atomic writes**: chunks go to `<target>.part`, renamed on completion;
//!   a paused or failed copy never leaves a truncated target behind.
//! - **Roots**: the anatomy roots, which carry the user's local overrides,
//!   win over the site presets.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use sitesync_core::config::SitePresets;
use sitesync_core::domain::paths::{file_name_of, join, local_target, split_target, trim_trailing_slash};
use sitesync_core::domain::{
    PathTree, ProviderError, RootConfig, SettingsField, SettingsSchema, TransferOutcome,
};
use sitesync_core::ports::{
    fraction, IAnatomy, IRemoteProvider, ITransferObserver, ProgressThrottle, ProviderArgs,
    ProviderRegistration,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, instrument};

/// Registry code
pub const CODE: &str = "local_drive";

pub const LABEL: &str = "Local Drive";

/// Files handed to this provider per sync loop
pub const BATCH_LIMIT: usize = 50;

/// Bytes per copy chunk
pub const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Provider for one locally mounted site
#[derive(Debug, Clone)]
pub struct LocalDriveProvider {
    project: String,
    site: String,
    presets: Option<SitePresets>,
    chunk_size: usize,
}

impl LocalDriveProvider {
    pub fn new(args: ProviderArgs) -> Self {
        Self {
            project: args.project,
            site: args.site,
            presets: args.presets,
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Overrides the copy chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn build(args: ProviderArgs) -> BoxFuture<'static, Box<dyn IRemoteProvider>> {
        Box::pin(async move { Box::new(LocalDriveProvider::new(args)) as Box<dyn IRemoteProvider> })
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
        SettingsSchema {
            system: vec![],
            project: vec![SettingsField::roots()],
            local: vec![SettingsField::local_override("root", "Local root", true)],
        }
    }

    /// Copies `source` to `target` chunk by chunk through a `.part` file
    #[instrument(skip(self, throttle), fields(source = %source.display(), target = %target.display()))]
    async fn copy(
        &self,
        source: &Path,
        target: &Path,
        throttle: &mut ProgressThrottle<'_>,
    ) -> Result<(), ProviderError> {
        let part = part_path(target);
        let copied = self.copy_chunks(source, &part, throttle).await;

        match copied {
            Ok(()) => {
                tokio::fs::rename(&part, target).await?;
                throttle.finish();
                Ok(())
            }
            Err(e) => {
                if let Err(err) = tokio::fs::remove_file(&part).await {
                    debug!("Could not remove {}: {}", part.display(), err);
                }
                Err(e)
            }
        }
    }

    async fn copy_chunks(
        &self,
        source: &Path,
        part: &Path,
        throttle: &mut ProgressThrottle<'_>,
    ) -> Result<(), ProviderError> {
        let size = tokio::fs::metadata(source).await?.len();
        let mut input = tokio::fs::File::open(source).await?;
        let mut output = tokio::fs::File::create(part).await?;
        let mut buf = vec![0u8; self.chunk_size];
        let mut copied: u64 = 0;

        loop {
            throttle.check_paused()?;
            throttle.tick(fraction(copied, size));
            let n = input.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            output.write_all(&buf[..n]).await?;
            copied += n as u64;
        }

        output.flush().await?;
        debug!(bytes = copied, "copy complete");
        Ok(())
    }
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl IRemoteProvider for LocalDriveProvider {
    fn code(&self) -> &'static str {
        CODE
    }

    fn site(&self) -> &str {
        &self.site
    }

    fn is_active(&self) -> bool {
        self.presets.as_ref().map(|p| p.enabled).unwrap_or(true)
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

        let (folder, name) = split_target(target, &name_of(source));
        let target_path = PathBuf::from(join(&folder, &name));
        if target_path.exists() && !overwrite {
            return Err(ProviderError::AlreadyExists(format!(
                "File {} exists, set overwrite",
                target_path.display()
            )));
        }
        if !folder.is_empty() {
            tokio::fs::create_dir_all(&folder).await?;
        }

        info!("Copying {} -> {}", source.display(), target_path.display());
        let mut throttle = ProgressThrottle::new(observer, "Copied");
        self.copy(source, &target_path, &mut throttle).await?;
        Ok(TransferOutcome::Completed(name))
    }

    async fn download_file(
        &self,
        source: &str,
        local: &Path,
        observer: &dyn ITransferObserver,
        overwrite: bool,
    ) -> Result<TransferOutcome, ProviderError> {
        let source_path = Path::new(source);
        if !source_path.is_file() {
            return Err(ProviderError::NotFound(format!(
                "Source file {} doesn't exist.",
                source
            )));
        }

        let target = local_target(local, file_name_of(source));
        if target.exists() && !overwrite {
            return Err(ProviderError::AlreadyExists(format!(
                "File {} exists, set overwrite",
                target.display()
            )));
        }
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!("Copying {} -> {}", source, target.display());
        let mut throttle = ProgressThrottle::new(observer, "Copied");
        self.copy(source_path, &target, &mut throttle).await?;
        Ok(TransferOutcome::Completed(name_of(&target)))
    }

    async fn delete_file(&self, path: &str) -> Result<(), ProviderError> {
        if !Path::new(path).is_file() {
            return Err(ProviderError::NotFound(format!(
                "File {} to be deleted doesn't exist.",
                path
            )));
        }
        tokio::fs::remove_file(path).await?;
        Ok(())
    }

    async fn delete_folder(&self, path: &str, force: bool) -> Result<(), ProviderError> {
        if !Path::new(path).is_dir() {
            return Err(ProviderError::NotFound(format!("Folder {} doesn't exist", path)));
        }
        if force {
            tokio::fs::remove_dir_all(path).await?;
        } else {
            if !self.list_folder(path).await?.is_empty() {
                return Err(ProviderError::NotEmpty(path.to_string()));
            }
            tokio::fs::remove_dir(path).await?;
        }
        Ok(())
    }

    async fn list_folder(&self, path: &str) -> Result<Vec<String>, ProviderError> {
        if !Path::new(path).is_dir() {
            return Err(ProviderError::NotFound(format!("Folder {} doesn't exist", path)));
        }
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn create_folder(&self, path: &str) -> Result<String, ProviderError> {
        let path = trim_trailing_slash(path);
        if Path::new(path).is_file() {
            return Err(ProviderError::NotADirectory(path.to_string()));
        }
        tokio::fs::create_dir_all(path).await?;
        Ok(path.to_string())
    }

    async fn get_tree(&self) -> Result<Option<PathTree>, ProviderError> {
        Ok(None)
    }

    fn get_roots_config(&self, anatomy: Option<&dyn IAnatomy>) -> RootConfig {
        anatomy
            .and_then(|a| a.roots())
            .or_else(|| self.presets.as_ref().map(|p| p.root.clone()))
            .unwrap_or_default()
    }
}
