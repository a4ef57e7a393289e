//! Provider registry
//!
//! [`ProviderFactory`] maps provider codes to their registration: a label,
//! the per-loop batch limit and the async constructor. It is built once at
//! startup and passed to whatever needs to instantiate providers.

use std::collections::BTreeMap;

use sitesync_core::config::SitePresets;
use sitesync_core::domain::{PathTree, ProviderError, SettingsSchema};
use sitesync_core::ports::{IRemoteProvider, ProviderArgs, ProviderRegistration};
use sitesync_dropbox::DropboxProvider;
use sitesync_gdrive::GDriveProvider;
use sitesync_sftp::SftpProvider;
use tracing::debug;

use crate::local_drive::{self, LocalDriveProvider};

/// Registry of provider codes
#[derive(Debug, Clone, Default)]
pub struct ProviderFactory {
    providers: BTreeMap<String, ProviderRegistration>,
}

impl ProviderFactory {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the four built-in providers
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        factory.register(sitesync_gdrive::CODE, GDriveProvider::registration());
        factory.register(sitesync_dropbox::CODE, DropboxProvider::registration());
        factory.register(local_drive::CODE, LocalDriveProvider::registration());
        factory.register(sitesync_sftp::CODE, SftpProvider::registration());
        factory
    }

    /// Registers `registration` under `code`, replacing a previous entry
    pub fn register(&mut self, code: impl Into<String>, registration: ProviderRegistration) {
        let code = code.into();
        debug!(code = %code, label = registration.label, "Registering provider");
        self.providers.insert(code, registration);
    }

    fn registration(&self, code: &str) -> Result<&ProviderRegistration, ProviderError> {
        self.providers
            .get(code)
            .ok_or_else(|| ProviderError::NotRegistered(code.to_string()))
    }

    /// Instantiates the provider `code` for one site
    ///
    /// `tree` is a path tree built by a previous instance of the same site;
    /// passing it spares the provider a full remote listing.
    pub async fn get_provider(
        &self,
        code: &str,
        project: &str,
        site: &str,
        tree: Option<PathTree>,
        presets: Option<SitePresets>,
    ) -> Result<Box<dyn IRemoteProvider>, ProviderError> {
        let registration = self.registration(code)?;
        let args = ProviderArgs::new(project, site)
            .with_tree(tree)
            .with_presets(presets);
        Ok((registration.build)(args).await)
    }

    /// Maximum number of files handed to `code` per sync loop
    pub fn get_provider_batch_limit(&self, code: &str) -> Result<usize, ProviderError> {
        Ok(self.registration(code)?.batch_limit)
    }

    pub fn label(&self, code: &str) -> Result<&'static str, ProviderError> {
        Ok(self.registration(code)?.label)
    }

    pub fn settings_schema(&self, code: &str) -> Result<SettingsSchema, ProviderError> {
        Ok((self.registration(code)?.schema)())
    }

    /// Registered codes in alphabetical order
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}
