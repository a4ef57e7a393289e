//! Single file transfers between the active site and a remote site
//!
//! A file of a representation is stored as a root template such as
//! `{root[work]}/shots/sh010/scene.ma`. Both sides resolve the template
//! with their own roots: the local side through the local drive provider,
//! the remote side through the remote site's provider.
//!
//! Changes to the remote folder structure are serialized through
//! [`SiteContext`]; the transfers themselves run concurrently.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use sitesync_core::config::{Config, SitePresets};
use sitesync_core::domain::paths::parent_of;
use sitesync_core::domain::{PathTree, ProviderError, TransferOutcome};
use sitesync_core::ports::{IAnatomy, IRemoteProvider, ITransferObserver};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::factory::ProviderFactory;
use crate::local_drive;

/// Sites taking part in the synchronization of one project
pub struct SiteContext {
    pub project: String,
    /// Site of this machine
    pub local_site: String,
    pub remote_site: String,
    sites: BTreeMap<String, SitePresets>,
    anatomy: Option<Arc<dyn IAnatomy>>,
    structure_lock: Mutex<()>,
}

impl SiteContext {
    pub fn new(
        project: impl Into<String>,
        local_site: impl Into<String>,
        remote_site: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            local_site: local_site.into(),
            remote_site: remote_site.into(),
            sites: BTreeMap::new(),
            anatomy: None,
            structure_lock: Mutex::new(()),
        }
    }

    /// Context of the project, sites and presets named in `config`
    pub fn from_config(config: &Config) -> Self {
        let mut context = Self::new(
            config.sync.project.clone(),
            config.sync.active_site.clone(),
            config.sync.remote_site.clone(),
        );
        context.sites = config.sites.clone();
        context
    }

    pub fn with_site(mut self, site: impl Into<String>, presets: SitePresets) -> Self {
        self.sites.insert(site.into(), presets);
        self
    }

    pub fn with_anatomy(mut self, anatomy: Arc<dyn IAnatomy>) -> Self {
        self.anatomy = Some(anatomy);
        self
    }

    pub fn presets(&self, site: &str) -> Option<&SitePresets> {
        self.sites.get(site)
    }

    /// Provider code serving `site`; unconfigured sites are local drives
    pub fn provider_code(&self, site: &str) -> &str {
        self.presets(site)
            .map(|p| p.provider.as_str())
            .unwrap_or(local_drive::CODE)
    }

    pub fn anatomy(&self) -> Option<&dyn IAnatomy> {
        self.anatomy.as_deref()
    }

    /// Instantiates the provider of `site`
    pub async fn provider(
        &self,
        factory: &ProviderFactory,
        site: &str,
        tree: Option<PathTree>,
    ) -> Result<Box<dyn IRemoteProvider>, ProviderError> {
        factory
            .get_provider(
                self.provider_code(site),
                &self.project,
                site,
                tree,
                self.presets(site).cloned(),
            )
            .await
    }
}

/// Resolves `file_path` to the local path and, given a remote provider,
/// the remote path
///
/// The remote path is empty when `remote` is `None`.
pub async fn resolve_paths(
    factory: &ProviderFactory,
    context: &SiteContext,
    file_path: &str,
    remote: Option<&dyn IRemoteProvider>,
) -> Result<(PathBuf, String), ProviderError> {
    let remote_path = match remote {
        Some(provider) => provider.resolve_path(file_path, None, context.anatomy())?,
        None => String::new(),
    };

    let local = factory
        .get_provider(
            local_drive::CODE,
            &context.project,
            &context.local_site,
            None,
            context.presets(&context.local_site).cloned(),
        )
        .await?;
    let local_path = local.resolve_path(file_path, None, context.anatomy())?;

    Ok((PathBuf::from(local_path), remote_path))
}

fn ensure_active(provider: &dyn IRemoteProvider) -> Result<(), ProviderError> {
    if provider.is_active() {
        Ok(())
    } else {
        Err(ProviderError::Inactive(provider.site().to_string()))
    }
}

/// Stores the provider's current path tree in `tree`
///
/// Providers addressing folders by path keep `tree` as it is.
async fn hand_back_tree(remote: &dyn IRemoteProvider, tree: &mut Option<PathTree>) {
    match remote.get_tree().await {
        Ok(Some(current)) => *tree = Some(current),
        Ok(None) => {}
        Err(e) => debug!(site = remote.site(), error = %e, "Path tree not handed back"),
    }
}

/// Uploads one file of a representation to the remote site
///
/// Overwrites an existing remote file. `tree` is the remote site's cached
/// path tree, if any; on return it holds the tree of this call's provider
/// instance, including folders it created, for the next instance to reuse.
#[instrument(skip(factory, context, tree, observer), fields(site = %context.remote_site))]
pub async fn upload_file(
    factory: &ProviderFactory,
    context: &SiteContext,
    file_path: &str,
    tree: &mut Option<PathTree>,
    observer: &dyn ITransferObserver,
) -> Result<TransferOutcome, ProviderError> {
    let (remote, local_path, remote_path) = {
        let _structure = context.structure_lock.lock().await;

        let remote = context
            .provider(factory, &context.remote_site, tree.clone())
            .await?;
        ensure_active(remote.as_ref())?;
        let (local_path, remote_path) =
            resolve_paths(factory, context, file_path, Some(remote.as_ref())).await?;

        let target_folder = parent_of(&remote_path);
        let folder_id = remote.create_folder(target_folder).await?;
        hand_back_tree(remote.as_ref(), tree).await;
        if folder_id.is_empty() {
            return Err(ProviderError::NotADirectory(format!(
                "Folder {} wasn't created. Check permissions.",
                target_folder
            )));
        }
        debug!(folder = target_folder, id = %folder_id, "Remote folder ready");
        (remote, local_path, remote_path)
    };

    let outcome = remote
        .upload_file(&local_path, &remote_path, observer, true)
        .await?;
    info!(
        "Uploaded {} -> {} on {}",
        local_path.display(),
        remote_path,
        context.remote_site
    );
    Ok(outcome)
}

/// Downloads one file of a representation from the remote site to the
/// active site
///
/// Overwrites an existing local file. `tree` is handed over and back as in
/// [`upload_file`].
#[instrument(skip(factory, context, tree, observer), fields(site = %context.remote_site))]
pub async fn download_file(
    factory: &ProviderFactory,
    context: &SiteContext,
    file_path: &str,
    tree: &mut Option<PathTree>,
    observer: &dyn ITransferObserver,
) -> Result<TransferOutcome, ProviderError> {
    let (remote, local_path, remote_path) = {
        let _structure = context.structure_lock.lock().await;

        let remote = context
            .provider(factory, &context.remote_site, tree.clone())
            .await?;
        ensure_active(remote.as_ref())?;
        let (local_path, remote_path) =
            resolve_paths(factory, context, file_path, Some(remote.as_ref())).await?;

        if let Some(folder) = local_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(folder).await?;
        }
        (remote, local_path, remote_path)
    };

    let result = remote
        .download_file(&remote_path, &local_path, observer, true)
        .await;
    hand_back_tree(remote.as_ref(), tree).await;
    let outcome = result?;
    info!(
        "Downloaded {} -> {} from {}",
        remote_path,
        local_path.display(),
        context.remote_site
    );
    Ok(outcome)
}

/// True when the provider of `site` comes up active
pub async fn site_is_working(factory: &ProviderFactory, context: &SiteContext, site: &str) -> bool {
    match context.provider(factory, site, None).await {
        Ok(provider) => provider.is_active(),
        Err(e) => {
            warn!(site, error = %e, "Site is not configured");
            false
        }
    }
}

/// Local path of `file_path` on the active site
pub async fn local_path_of(
    factory: &ProviderFactory,
    context: &SiteContext,
    file_path: &str,
) -> Result<PathBuf, ProviderError> {
    let (local, _) = resolve_paths(factory, context, file_path, None).await?;
    Ok(local)
}
