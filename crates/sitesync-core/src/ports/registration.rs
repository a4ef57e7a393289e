//! Provider registration types
//!
//! The registry itself lives in `sitesync-sync`; provider crates only
//! describe how to build themselves so that they do not depend on it.

use futures_util::future::BoxFuture;

use crate::config::SitePresets;
use crate::domain::schema::SettingsSchema;
use crate::domain::tree::PathTree;
use crate::ports::remote_provider::IRemoteProvider;

/// Everything a provider constructor receives
#[derive(Debug, Clone, Default)]
pub struct ProviderArgs {
    pub project: String,
    pub site: String,
    /// Tree built by a previous instance for the same site, if any
    pub tree: Option<PathTree>,
    pub presets: Option<SitePresets>,
}

impl ProviderArgs {
    pub fn new(project: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            site: site.into(),
            tree: None,
            presets: None,
        }
    }

    pub fn with_tree(mut self, tree: Option<PathTree>) -> Self {
        self.tree = tree;
        self
    }

    pub fn with_presets(mut self, presets: Option<SitePresets>) -> Self {
        self.presets = presets;
        self
    }
}

/// Async constructor of a provider instance
///
/// Construction never fails: a provider that cannot reach its backend is
/// returned inactive.
pub type ProviderBuilder = fn(ProviderArgs) -> BoxFuture<'static, Box<dyn IRemoteProvider>>;

/// Registry entry of one provider code
#[derive(Clone, Copy)]
pub struct ProviderRegistration {
    /// Human readable name, e.g. "Google Drive"
    pub label: &'static str,
    /// Maximum number of files the sync loop hands to this provider per
    /// iteration, tuned to the backend's API rate limits
    pub batch_limit: usize,
    pub schema: fn() -> SettingsSchema,
    pub build: ProviderBuilder,
}

impl std::fmt::Debug for ProviderRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistration")
            .field("label", &self.label)
            .field("batch_limit", &self.batch_limit)
            .finish_non_exhaustive()
    }
}
