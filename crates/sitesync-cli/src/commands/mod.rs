//! Subcommands and the state they share

pub mod files;
pub mod providers;
pub mod resolve;
pub mod sites;
pub mod transfer;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use sitesync_core::config::Config;
use sitesync_core::ports::IRemoteProvider;
use sitesync_sync::progress::{IProgressStore, MemoryProgressStore, ProgressKey};
use sitesync_sync::{ProviderFactory, SiteContext};
use tracing::{debug, info};

use crate::output::Output;

/// Configuration and provider registry of one invocation
pub struct Session {
    pub config: Config,
    pub config_path: PathBuf,
    pub factory: ProviderFactory,
}

impl Session {
    /// Loads `path`, or the default configuration file when `None`
    ///
    /// An explicit path must exist; a missing default file yields the
    /// default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config, config_path) = match path {
            Some(path) => (Config::load(path)?, path.to_path_buf()),
            None => {
                let path = Config::default_path();
                (Config::load_or_default(&path), path)
            }
        };
        Ok(Self {
            config,
            config_path,
            factory: ProviderFactory::with_builtin(),
        })
    }

    pub fn context(&self) -> SiteContext {
        SiteContext::from_config(&self.config)
    }

    /// Provider of a configured site, active or not
    pub async fn site_provider(&self, site: &str) -> Result<Box<dyn IRemoteProvider>> {
        if self.config.site(site).is_none() {
            bail!(
                "Site '{}' is not configured in {}",
                site,
                self.config_path.display()
            );
        }
        let provider = self
            .context()
            .provider(&self.factory, site, None)
            .await
            .with_context(|| format!("Failed to create provider of site '{}'", site))?;
        debug!(site, code = provider.code(), "Provider created");
        Ok(provider)
    }

    /// Provider of a configured site that came up active
    pub async fn active_provider(&self, site: &str) -> Result<Box<dyn IRemoteProvider>> {
        let provider = self.site_provider(site).await?;
        if !provider.is_active() {
            bail!(
                "Site '{}' ({}) is not active, check its credentials and 'enabled' flag",
                site,
                provider.code()
            );
        }
        Ok(provider)
    }
}

/// True when `path` contains a root placeholder
pub fn has_root_placeholder(path: &str) -> bool {
    path.starts_with("root[") || path.contains("{root")
}

/// Resolves root placeholders of a remote path; plain paths pass through
pub fn resolve_remote(provider: &dyn IRemoteProvider, path: &str) -> Result<String> {
    if !has_root_placeholder(path) {
        return Ok(path.to_string());
    }
    let resolved = provider
        .resolve_path(path, None, None)
        .with_context(|| format!("Failed to resolve '{}'", path))?;
    debug!(path, resolved = %resolved, "Resolved remote path");
    Ok(resolved)
}

// ============================================================================
// Terminal progress
// ============================================================================

/// Progress store that echoes progress to the terminal
///
/// Ctrl-C pauses the project, which the running transfer notices at its
/// next chunk boundary.
pub struct TerminalProgressStore {
    output: Output,
    label: &'static str,
    inner: MemoryProgressStore,
}

impl TerminalProgressStore {
    pub fn new(output: Output, label: &'static str, interval: Duration) -> Self {
        Self {
            output,
            label,
            inner: MemoryProgressStore::new().with_interval(interval),
        }
    }

    /// Pauses `project` once Ctrl-C is pressed
    pub fn pause_on_ctrl_c(self: &Arc<Self>, project: &str) {
        let store = Arc::clone(self);
        let project = project.to_string();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, pausing transfer");
                store.inner.pause_project(&project);
            }
        });
    }
}

impl IProgressStore for TerminalProgressStore {
    fn update_progress(&self, key: &ProgressKey, progress: f64) {
        self.inner.update_progress(key, progress);
        self.output.progress(self.label, progress);
    }

    fn is_representation_paused(
        &self,
        collection: &str,
        representation_id: &str,
        check_parents: bool,
    ) -> bool {
        self.inner
            .is_representation_paused(collection, representation_id, check_parents)
    }

    fn progress_interval(&self) -> Duration {
        self.inner.progress_interval()
    }
}
