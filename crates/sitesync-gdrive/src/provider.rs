//! GDriveProvider - IRemoteProvider implementation for Google Drive
//!
//! Drive addresses folders by id only. The provider resolves the configured
//! roots (My Drive or shared drives), lists every folder once and keeps the
//! resulting path tree for the lifetime of the instance. The tree can be
//! handed to the next instance for the same site through
//! [`ProviderArgs::tree`].
//!
//! ## Design Notes
//!
//! - Uses `tokio::sync::Mutex` for the tree because `IRemoteProvider`
//!   methods take `&self` and folder creation updates it across awaits.
//!   Concurrent `create_folder` calls on one instance are serialized by it.
//! - Transfer failures follow the soft failure contract: HTTP 404 and quota
//!   403s return [`TransferOutcome::RetryLater`], a 403 caused by missing
//!   consent fails with [`ProviderError::PermissionDenied`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use sitesync_core::config::SitePresets;
use sitesync_core::domain::paths::{
    file_name_of, join, local_target, parent_of, split_target, trim_trailing_slash,
};
use sitesync_core::domain::{
    build_tree, PathTree, ProviderError, RootConfig, RootFolder, SettingsField, SettingsSchema,
    TransferOutcome, MY_DRIVE,
};
use sitesync_core::ports::{
    IAnatomy, IRemoteProvider, ITransferObserver, ProgressThrottle, ProviderArgs,
    ProviderRegistration,
};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::auth::{expand_env, Credentials, TokenSource};
use crate::client::{DriveFile, GDriveClient};
use crate::{download, upload, GDriveError};

/// Registry code
pub const CODE: &str = "gdrive";

/// Human readable provider name
pub const LABEL: &str = "Google Drive";

/// Files handed to this provider per sync loop
pub const BATCH_LIMIT: usize = 7;

/// Pause after a quota 403 before the file is retried
pub const QUOTA_BACKOFF: Duration = Duration::from_secs(60);

/// Google Drive provider for one site
pub struct GDriveProvider {
    project: String,
    site: String,
    presets: Option<SitePresets>,
    client: Option<GDriveClient>,
    tree: Mutex<Option<PathTree>>,
    roots: Mutex<Option<Vec<RootFolder>>>,
    quota_backoff: Duration,
}

impl GDriveProvider {
    /// Builds a provider from site presets
    ///
    /// Missing presets, credentials or environment variables leave the
    /// provider inactive; the reason is logged at info level.
    pub fn new(args: ProviderArgs) -> Self {
        let client = Self::client_from_presets(&args);
        Self::from_parts(args, client)
    }

    /// Builds a provider around an existing client (useful for testing)
    pub fn with_client(args: ProviderArgs, client: GDriveClient) -> Self {
        Self::from_parts(args, Some(client))
    }

    fn from_parts(args: ProviderArgs, client: Option<GDriveClient>) -> Self {
        let enabled = args.presets.as_ref().map(|p| p.enabled).unwrap_or(false);
        Self {
            project: args.project,
            site: args.site,
            presets: args.presets,
            client: if enabled { client } else { None },
            tree: Mutex::new(args.tree),
            roots: Mutex::new(None),
            quota_backoff: QUOTA_BACKOFF,
        }
    }

    /// Overrides the pause applied after a quota 403
    pub fn with_quota_backoff(mut self, backoff: Duration) -> Self {
        self.quota_backoff = backoff;
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn client_from_presets(args: &ProviderArgs) -> Option<GDriveClient> {
        let Some(presets) = args.presets.as_ref() else {
            info!("Sync Server: There are no presets for {}.", args.site);
            return None;
        };

        let platform = sitesync_core::config::current_platform();
        let Some(template) = presets.get_platform_str("credentials_url") else {
            info!(
                "Sync Server: Please, fill the credentials for gdrive provider for platform '{}' !",
                platform
            );
            return None;
        };

        let cred_path = match expand_env(template) {
            Ok(path) => path,
            Err(missing) => {
                info!(
                    "Sync Server: The key(s) {} does not exist in the environment variables",
                    missing.join(" ")
                );
                return None;
            }
        };

        if !Path::new(&cred_path).exists() {
            info!(
                "Sync Server: No credentials for gdrive provider for '{}' on path '{}'!",
                args.site, cred_path
            );
            return None;
        }

        if !presets.enabled {
            return None;
        }

        let tokens = Credentials::from_file(Path::new(&cred_path))
            .and_then(TokenSource::from_credentials);
        match tokens {
            Ok(tokens) => Some(GDriveClient::new(tokens)),
            Err(e) => {
                error!(
                    "Connection failed, check '{}' credentials file: {:#}",
                    cred_path, e
                );
                None
            }
        }
    }

    /// Async constructor used by the provider registry
    pub fn build(args: ProviderArgs) -> BoxFuture<'static, Box<dyn IRemoteProvider>> {
        Box::pin(async move { Box::new(GDriveProvider::new(args)) as Box<dyn IRemoteProvider> })
    }

    /// Registry entry for this provider
    pub fn registration() -> ProviderRegistration {
        ProviderRegistration {
            label: LABEL,
            batch_limit: BATCH_LIMIT,
            schema: Self::settings_schema,
            build: Self::build,
        }
    }

    /// Editable settings on every level
    pub fn settings_schema() -> SettingsSchema {
        SettingsSchema {
            system: vec![],
            project: vec![
                // credentials can be overridden on project or user level
                SettingsField::new("path", "credentials_url", "Credentials url")
                    .multiplatform(true)
                    .placeholder("Credentials url"),
                // roots only on project level
                SettingsField::roots(),
            ],
            local: vec![SettingsField::local_override(
                "credentials_url",
                "Credentials url",
                true,
            )],
        }
    }

    fn client(&self) -> Result<&GDriveClient, ProviderError> {
        self.client
            .as_ref()
            .ok_or_else(|| ProviderError::Inactive(self.site.clone()))
    }

    // ------------------------------------------------------------------------
    // Roots and tree
    // ------------------------------------------------------------------------

    /// Root folders of the configured roots, queried once
    ///
    /// # Errors
    /// HTTP failures are [`ProviderError::Unavailable`] so the sync loop
    /// retries next loop.
    pub async fn root_folders(&self) -> Result<Vec<RootFolder>, ProviderError> {
        let mut cached = self.roots.lock().await;
        if let Some(roots) = cached.as_ref() {
            return Ok(roots.clone());
        }

        let roots = self.prepare_root_info().await.map_err(|e| match e {
            ProviderError::InvalidConfig(_) => e,
            other => {
                warn!("HttpError in sync loop, trying next loop: {}", other);
                ProviderError::Unavailable(other.to_string())
            }
        })?;
        *cached = Some(roots.clone());
        Ok(roots)
    }

    async fn prepare_root_info(&self) -> Result<Vec<RootFolder>, ProviderError> {
        let client = self.client()?;
        let config = self.get_roots_config(None);
        let mut roots: Vec<RootFolder> = Vec::new();
        let mut shared_drives = None;

        fn add(roots: &mut Vec<RootFolder>, name: &str, id: &str) {
            if !roots.iter().any(|r| r.name == name) {
                roots.push(RootFolder {
                    name: name.to_string(),
                    id: id.to_string(),
                });
            }
        }

        for path in config.paths() {
            if path.contains(MY_DRIVE) {
                let root = client.get_root().await?;
                add(&mut roots, MY_DRIVE, &root.id);
                continue;
            }

            let folders: Vec<&str> = path.split('/').collect();
            if folders.len() < 2 {
                return Err(ProviderError::InvalidConfig(format!(
                    "Wrong root folder definition {}",
                    path
                )));
            }

            if shared_drives.is_none() {
                shared_drives = Some(client.list_drives().await?);
            }
            for drive in shared_drives.iter().flatten() {
                if drive.name.contains(folders[1]) {
                    add(&mut roots, &drive.name, &drive.id);
                }
            }
        }

        // My Drive is always present
        if !roots.iter().any(|r| r.name == MY_DRIVE) {
            let root = client.get_root().await?;
            add(&mut roots, MY_DRIVE, &root.id);
        }

        debug!(site = %self.site, roots = ?roots, "Resolved root folders");
        Ok(roots)
    }

    /// Locks the tree, building it on first use
    async fn tree(&self) -> Result<MappedMutexGuard<'_, PathTree>, ProviderError> {
        let mut guard = self.tree.lock().await;
        if guard.is_none() {
            let roots = self.root_folders().await?;
            let folders = self.client()?.list_folders().await?;
            *guard = Some(build_tree(&roots, folders));
        }
        MutexGuard::try_map(guard, Option::as_mut)
            .map_err(|_| ProviderError::Backend("folder tree unavailable".into()))
    }

    /// Folder id of the folder at `path`
    async fn folder_id(&self, path: &str) -> Result<Option<String>, ProviderError> {
        if path.is_empty() {
            return Ok(None);
        }
        let tree = self.tree().await?;
        Ok(tree.id_of(trim_trailing_slash(path)).map(str::to_string))
    }

    /// File metadata of `name` directly inside `folder`
    async fn find_file(
        &self,
        folder: &str,
        name: &str,
    ) -> Result<Option<DriveFile>, ProviderError> {
        match self.folder_id(folder).await? {
            Some(folder_id) => Ok(self.client()?.find_file(name, &folder_id).await?),
            None => Ok(None),
        }
    }

    /// Maps an HTTP failure of a running transfer onto the retry contract
    async fn transfer_failure(&self, err: GDriveError) -> Result<TransferOutcome, ProviderError> {
        match err {
            GDriveError::Api { status: 404, .. } => {
                warn!("Not found during transfer, retrying next loop: {}", err);
                Ok(TransferOutcome::RetryLater)
            }
            GDriveError::Api { status: 403, .. } if err.is_permission_denied() => {
                Err(ProviderError::PermissionDenied(err.to_string()))
            }
            GDriveError::Api { status: 403, .. } => {
                warn!(
                    "Forbidden received, hit quota. Injecting {}s delay.",
                    self.quota_backoff.as_secs()
                );
                tokio::time::sleep(self.quota_backoff).await;
                Ok(TransferOutcome::RetryLater)
            }
            other => Err(other.into()),
        }
    }
}

#[async_trait]
impl IRemoteProvider for GDriveProvider {
    fn code(&self) -> &'static str {
        CODE
    }

    fn site(&self) -> &str {
        &self.site
    }

    fn is_active(&self) -> bool {
        self.presets.as_ref().map(|p| p.enabled).unwrap_or(false) && self.client.is_some()
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
        let client = self.client()?;

        let source_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (folder, name) = split_target(target, &source_name);
        let target_path = join(&folder, &name);

        let existing = self.find_file(&folder, &name).await?;
        if existing.is_some() && !overwrite {
            return Err(ProviderError::AlreadyExists(target_path));
        }

        let Some(folder_id) = self.folder_id(&folder).await? else {
            return Err(ProviderError::NotADirectory(format!(
                "Folder {} doesn't exists",
                folder
            )));
        };

        let size = tokio::fs::metadata(source).await?.len();
        let mut throttle = ProgressThrottle::new(observer, "Uploaded");

        debug!("Start Upload! {}", source.display());
        let result = async {
            let session = client
                .start_resumable(&name, &folder_id, existing.as_ref().map(|f| f.id.as_str()), size)
                .await?;
            upload::upload_resumable(client, &session, source, size, &mut throttle).await
        }
        .await;

        match result {
            Ok(id) => Ok(TransferOutcome::Completed(id)),
            Err(err) => self.transfer_failure(err).await,
        }
    }

    async fn download_file(
        &self,
        source: &str,
        local: &Path,
        observer: &dyn ITransferObserver,
        overwrite: bool,
    ) -> Result<TransferOutcome, ProviderError> {
        let client = self.client()?;
        let Some(remote) = self.find_file(parent_of(source), file_name_of(source)).await? else {
            return Err(ProviderError::NotFound(format!(
                "Source file {} doesn't exist.",
                source
            )));
        };

        let target = local_target(local, file_name_of(source));
        if target.is_file() && !overwrite {
            return Err(ProviderError::AlreadyExists(target.display().to_string()));
        }

        let target_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut throttle = ProgressThrottle::new(observer, "Downloaded");
        let result =
            download::download_ranged(client, &remote.id, remote.size_bytes(), &target, &mut throttle)
                .await;

        match result {
            Ok(()) => Ok(TransferOutcome::Completed(target_name)),
            Err(err) => {
                // a partial file is never a valid result
                if let Err(e) = tokio::fs::remove_file(&target).await {
                    debug!("Could not remove partial download {}: {}", target.display(), e);
                }
                self.transfer_failure(err).await
            }
        }
    }

    async fn delete_file(&self, path: &str) -> Result<(), ProviderError> {
        let Some(file) = self.find_file(parent_of(path), file_name_of(path)).await? else {
            return Err(ProviderError::NotFound(format!("File {} doesn't exist", path)));
        };
        self.client()?.delete(&file.id).await?;
        info!(site = %self.site, "Deleted file {}", path);
        Ok(())
    }

    async fn delete_folder(&self, path: &str, force: bool) -> Result<(), ProviderError> {
        let client = self.client()?;
        let path = trim_trailing_slash(path);
        let mut tree = self.tree().await?;
        let Some(folder_id) = tree.id_of(path).map(str::to_string) else {
            return Err(ProviderError::NotFound(format!("Not valid folder path {}", path)));
        };

        if !force && client.has_children(&folder_id).await? {
            return Err(ProviderError::NotEmpty(path.to_string()));
        }

        client.delete(&folder_id).await?;

        let prefix = format!("{}/", path);
        let stale: Vec<String> = tree
            .iter()
            .filter(|(p, _)| *p == path || p.starts_with(&prefix))
            .map(|(p, _)| p.to_string())
            .collect();
        for p in stale {
            tree.remove(&p);
        }
        info!(site = %self.site, "Deleted folder {}", path);
        Ok(())
    }

    async fn list_folder(&self, path: &str) -> Result<Vec<String>, ProviderError> {
        let client = self.client()?;
        let folder_id = {
            let tree = self.tree().await?;
            tree.id_of(trim_trailing_slash(path)).map(str::to_string)
        };
        let Some(folder_id) = folder_id else {
            return Err(ProviderError::NotFound(format!("Not valid folder path {}", path)));
        };
        let children = client.list_children(&folder_id).await?;
        Ok(children.into_iter().map(|f| f.name).collect())
    }

    async fn create_folder(&self, path: &str) -> Result<String, ProviderError> {
        let client = self.client()?;
        let path = trim_trailing_slash(path).trim();
        let mut tree = self.tree().await?;

        if let Some(id) = tree.id_of(path) {
            return Ok(id.to_string());
        }

        let mut parts: Vec<&str> = path.split('/').collect();
        let mut to_create: Vec<&str> = Vec::new();

        while let Some(last) = parts.pop() {
            to_create.push(last);
            let mut parent = parts.join("/");
            // lowest existing ancestor
            if let Some(parent_id) = tree.id_of(&parent) {
                let mut folder_id = parent_id.to_string();
                while let Some(name) = to_create.pop() {
                    folder_id = client.create_folder(name, &folder_id).await?;
                    let new_path = format!("{}/{}", parent, name);
                    tree.insert(&new_path, folder_id.clone());
                    parent = new_path;
                }
                info!(site = %self.site, "Created folder {}", path);
                return Ok(folder_id);
            }
        }

        Err(ProviderError::NotADirectory(format!(
            "Folder {} has no existing root",
            path
        )))
    }

    async fn get_tree(&self) -> Result<Option<PathTree>, ProviderError> {
        let tree = self.tree().await?;
        Ok(Some(tree.clone()))
    }

    fn get_roots_config(&self, _anatomy: Option<&dyn IAnatomy>) -> RootConfig {
        // GDrive roots cannot be locally overridden
        self.presets
            .as_ref()
            .map(|p| p.root.clone())
            .unwrap_or_default()
    }
}
