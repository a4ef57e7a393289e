//! DropboxProvider - IRemoteProvider implementation for Dropbox Business
//!
//! Construction is async: the acting member and the team folder namespace
//! are looked up from the team token before the provider is handed out. A
//! site with incomplete presets, or whose member or team folder does not
//! exist, is returned inactive.
//!
//! Dropbox has native paths, so there is no folder tree.

use std::path::Path;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use sitesync_core::config::SitePresets;
use sitesync_core::domain::paths::{file_name_of, join, local_target, parent_of, split_target};
use sitesync_core::domain::{
    PathTree, ProviderError, RootConfig, SettingsField, SettingsSchema, TransferOutcome,
};
use sitesync_core::ports::{
    fraction, IAnatomy, IRemoteProvider, ITransferObserver, ProgressThrottle, ProviderArgs,
    ProviderRegistration,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::client::{api_path, DropboxClient, WriteMode};
use crate::{DropboxError, CHUNK_SIZE};

/// Registry code
pub const CODE: &str = "dropbox";

pub const LABEL: &str = "Dropbox";

/// Files handed to this provider per sync loop
pub const BATCH_LIMIT: usize = 10;

/// Dropbox provider for one site
pub struct DropboxProvider {
    site: String,
    presets: Option<SitePresets>,
    client: Option<DropboxClient>,
    chunk_size: usize,
}

impl DropboxProvider {
    /// Builds a provider from site presets, connecting to the API
    pub async fn new(args: ProviderArgs) -> Self {
        let token = Self::required_presets(&args).map(|(token, _, _)| token.to_string());
        match token {
            Some(token) => Self::with_client(args, DropboxClient::new(token)).await,
            None => Self::inactive(args),
        }
    }

    /// Builds a provider on top of `team_client` (useful for testing)
    ///
    /// `team_client` is used for the member and team folder lookup and then
    /// narrowed to the acting member.
    pub async fn with_client(args: ProviderArgs, team_client: DropboxClient) -> Self {
        let Some((_, team_folder, member)) = Self::required_presets(&args) else {
            return Self::inactive(args);
        };
        let enabled = args.presets.as_ref().map(|p| p.enabled).unwrap_or(false);
        if !enabled {
            return Self::inactive(args);
        }

        let client = match connect(team_client, member, team_folder).await {
            Ok(client) => Some(client),
            Err(e) => {
                info!("Could not establish dropbox object: {}", e);
                None
            }
        };

        Self {
            site: args.site,
            presets: args.presets,
            client,
            chunk_size: CHUNK_SIZE,
        }
    }

    fn inactive(args: ProviderArgs) -> Self {
        Self {
            site: args.site,
            presets: args.presets,
            client: None,
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Token, team folder name and acting member, each logged when missing
    fn required_presets(args: &ProviderArgs) -> Option<(&str, &str, &str)> {
        let Some(presets) = args.presets.as_ref() else {
            info!("Sync Server: There are no presets for {}.", args.site);
            return None;
        };
        let Some(token) = presets.get_str("token") else {
            info!("Sync Server: No access token for dropbox provider");
            return None;
        };
        let Some(team_folder) = presets.get_str("team_folder_name") else {
            info!("Sync Server: No team folder name for dropbox provider");
            return None;
        };
        let Some(member) = presets.get_str("acting_as_member") else {
            info!("Sync Server: No acting member for dropbox provider");
            return None;
        };
        Some((token, team_folder, member))
    }

    /// Overrides the single request limit and session chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn build(args: ProviderArgs) -> BoxFuture<'static, Box<dyn IRemoteProvider>> {
        Box::pin(async move { Box::new(DropboxProvider::new(args).await) as Box<dyn IRemoteProvider> })
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
            project: vec![
                SettingsField::new("text", "token", "Access Token"),
                SettingsField::new("text", "team_folder_name", "Team Folder Name"),
                SettingsField::new("text", "acting_as_member", "Acting As Member"),
                SettingsField::roots(),
            ],
            local: vec![SettingsField::local_override(
                "acting_as_member",
                "Acting As Member",
                false,
            )],
        }
    }

    fn client(&self) -> Result<&DropboxClient, ProviderError> {
        self.client
            .as_ref()
            .ok_or_else(|| ProviderError::Inactive(self.site.clone()))
    }

    /// True when the parent of `path` lists an entry named like its last
    /// component; listing failures count as absent
    async fn path_exists(&self, path: &str) -> Result<bool, ProviderError> {
        let client = self.client()?;
        if api_path(path).is_empty() {
            return Ok(true);
        }
        let name = file_name_of(path.trim_end_matches('/'));
        match client.list_folder(parent_of(path.trim_end_matches('/'))).await {
            Ok(entries) => Ok(entries.iter().any(|e| e.name == name)),
            Err(e) => {
                debug!("Listing parent of {} failed: {}", path, e);
                Ok(false)
            }
        }
    }

    fn transfer_failure(&self, err: DropboxError) -> Result<TransferOutcome, ProviderError> {
        if err.is_rate_limited() {
            warn!("Too many requests, retrying next loop: {}", err);
            return Ok(TransferOutcome::RetryLater);
        }
        Err(err.into())
    }

    async fn upload_chunks(
        &self,
        client: &DropboxClient,
        source: &Path,
        target: &str,
        size: u64,
        mode: WriteMode,
        throttle: &mut ProgressThrottle<'_>,
    ) -> Result<(), DropboxError> {
        let chunk_size = self.chunk_size;
        let mut file = tokio::fs::File::open(source).await?;
        let mut buf = vec![0u8; chunk_size];

        throttle.check_paused().map_err(|_| DropboxError::Paused)?;
        throttle.tick(0.0);

        if size <= chunk_size as u64 {
            let n = read_chunk(&mut file, &mut buf).await?;
            client.upload_whole(target, buf[..n].to_vec(), mode).await?;
            throttle.finish();
            return Ok(());
        }

        debug!("Uploading {} in {} chunks", source.display(), size.div_ceil(chunk_size as u64));
        let n = read_chunk(&mut file, &mut buf).await?;
        let mut cursor = client.session_start(buf[..n].to_vec()).await?;

        loop {
            throttle.check_paused().map_err(|_| DropboxError::Paused)?;
            throttle.tick(fraction(cursor.offset, size));

            let n = read_chunk(&mut file, &mut buf).await?;
            if n == 0 {
                return Err(DropboxError::InvalidResponse(format!(
                    "{} shrank during upload",
                    source.display()
                )));
            }
            if size - cursor.offset <= chunk_size as u64 {
                client
                    .session_finish(&cursor, buf[..n].to_vec(), target, mode)
                    .await?;
                throttle.finish();
                return Ok(());
            }
            client.session_append(&cursor, buf[..n].to_vec()).await?;
            cursor.offset += n as u64;
        }
    }

    async fn download_stream(
        client: &DropboxClient,
        source: &str,
        target: &Path,
        throttle: &mut ProgressThrottle<'_>,
    ) -> Result<(), DropboxError> {
        let mut response = client.download(source).await?;
        let total = response.content_length().unwrap_or(0);
        let mut out = tokio::fs::File::create(target).await?;
        let mut written: u64 = 0;

        loop {
            throttle.check_paused().map_err(|_| DropboxError::Paused)?;
            throttle.tick(fraction(written, total));
            match response.chunk().await? {
                Some(bytes) => {
                    out.write_all(&bytes).await?;
                    written += bytes.len() as u64;
                }
                None => break,
            }
        }

        out.flush().await?;
        throttle.finish();
        Ok(())
    }
}

/// Finds the acting member and the team folder, returns the narrowed client
async fn connect(
    team_client: DropboxClient,
    member: &str,
    team_folder: &str,
) -> Result<DropboxClient, DropboxError> {
    let members = team_client.team_members().await?;
    let Some(member_id) = members
        .iter()
        .find(|m| m.display_name == member)
        .map(|m| m.team_member_id.clone())
    else {
        let names: Vec<&str> = members.iter().map(|m| m.display_name.as_str()).collect();
        return Err(DropboxError::Lookup(format!(
            "Could not find member \"{}\". Available members: {:?}",
            member, names
        )));
    };

    let folders = team_client.team_folders().await?;
    let Some(namespace_id) = folders
        .iter()
        .find(|f| f.name == team_folder)
        .map(|f| f.team_folder_id.clone())
    else {
        let names: Vec<&str> = folders.iter().map(|f| f.name.as_str()).collect();
        return Err(DropboxError::Lookup(format!(
            "Could not find team folder \"{}\". Available folders: {:?}",
            team_folder, names
        )));
    };

    debug!(member_id = %member_id, namespace_id = %namespace_id, "Dropbox member resolved");
    Ok(team_client.as_member(member_id, namespace_id))
}

/// Reads until `buf` is full or the reader is exhausted
async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[async_trait]
impl IRemoteProvider for DropboxProvider {
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

        if self.path_exists(&target_path).await? && !overwrite {
            return Err(ProviderError::AlreadyExists(target_path));
        }

        let size = tokio::fs::metadata(source).await?.len();
        let mode = WriteMode::from_overwrite(overwrite);
        let mut throttle = ProgressThrottle::new(observer, "Uploaded");

        info!("Uploading {} to {}", source.display(), target_path);
        match self
            .upload_chunks(client, source, &target_path, size, mode, &mut throttle)
            .await
        {
            Ok(()) => Ok(TransferOutcome::Completed(target_path)),
            Err(err) => self.transfer_failure(err),
        }
    }

    async fn download_file(
        &self,
        source: &str,
        local: &Path,
        observer: &dyn ITransferObserver,
        overwrite: bool,
    ) -> Result<TransferOutcome, ProviderError> {
        if !self.path_exists(source).await? {
            return Err(ProviderError::NotFound(format!(
                "Source file {} doesn't exist.",
                source
            )));
        }

        let target = local_target(local, file_name_of(source));
        let target_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if target.exists() {
            if !overwrite {
                return Err(ProviderError::AlreadyExists(target.display().to_string()));
            }
            tokio::fs::remove_file(&target).await?;
        }

        let client = self.client()?;
        let mut throttle = ProgressThrottle::new(observer, "Downloaded");
        match Self::download_stream(client, source, &target, &mut throttle).await {
            Ok(()) => Ok(TransferOutcome::Completed(target_name)),
            Err(err) => {
                if let Err(e) = tokio::fs::remove_file(&target).await {
                    debug!("Could not remove partial download {}: {}", target.display(), e);
                }
                self.transfer_failure(err)
            }
        }
    }

    async fn delete_file(&self, path: &str) -> Result<(), ProviderError> {
        if !self.path_exists(path).await? {
            return Err(ProviderError::NotFound(format!("File {} doesn't exist", path)));
        }
        self.client()?.delete(path).await?;
        info!(site = %self.site, "Deleted file {}", path);
        Ok(())
    }

    async fn delete_folder(&self, path: &str, force: bool) -> Result<(), ProviderError> {
        if !self.path_exists(path).await? {
            return Err(ProviderError::NotFound(format!("Folder {} doesn't exist", path)));
        }
        let client = self.client()?;
        if !force && !client.list_folder(path).await?.is_empty() {
            return Err(ProviderError::NotEmpty(path.to_string()));
        }
        client.delete(path).await?;
        info!(site = %self.site, "Deleted folder {}", path);
        Ok(())
    }

    async fn list_folder(&self, path: &str) -> Result<Vec<String>, ProviderError> {
        if !self.path_exists(path).await? {
            return Err(ProviderError::NotFound(format!(
                "Folder \"{}\" does not exist",
                path
            )));
        }
        let entries = self.client()?.list_folder(path).await?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    async fn create_folder(&self, path: &str) -> Result<String, ProviderError> {
        if self.path_exists(path).await? {
            return Ok(path.to_string());
        }
        // intermediate folders are created by the API
        self.client()?.create_folder(path).await?;
        info!(site = %self.site, "Created folder {}", path);
        Ok(path.to_string())
    }

    async fn get_tree(&self) -> Result<Option<PathTree>, ProviderError> {
        Ok(None)
    }

    fn get_roots_config(&self, _anatomy: Option<&dyn IAnatomy>) -> RootConfig {
        self.presets
            .as_ref()
            .map(|p| p.root.clone())
            .unwrap_or_default()
    }
}
