//! Remote provider port (driven/secondary port)
//!
//! One implementation per storage backend: Google Drive, Dropbox, the
//! local drive and SFTP sites. A provider instance is built per
//! (project, site) pair and either is active, meaning its credentials were
//! accepted and the backend was reachable, or is treated as a no-op by the
//! caller.
//!
//! ## Design Notes
//!
//! - Uses [`ProviderError`] because the sync loop reacts differently to
//!   missing sources, conflicts, pauses and transient failures.
//! - Remote paths are `/`-delimited strings, local paths are [`Path`]s.
//! - A target path either ends with a file name (it has an extension) or
//!   names the folder, in which case the source file name is kept.
//! - Uses `#[async_trait]`; every call still completes the whole transfer
//!   before returning.

use std::path::Path;

use tracing::error;

use crate::domain::errors::ProviderError;
use crate::domain::outcome::TransferOutcome;
use crate::domain::roots::RootConfig;
use crate::domain::tree::PathTree;
use crate::ports::anatomy::IAnatomy;
use crate::ports::transfer::ITransferObserver;

/// Port trait for a storage backend of one site
#[async_trait::async_trait]
pub trait IRemoteProvider: Send + Sync {
    /// Registry code of the provider, e.g. `gdrive`
    fn code(&self) -> &'static str;

    /// Name of the site this instance serves
    fn site(&self) -> &str;

    /// True iff credentials are present and the backend client was built
    fn is_active(&self) -> bool;

    /// Copies a local file to `target`
    ///
    /// # Errors
    /// - `NotFound` if `source` is not a file
    /// - `AlreadyExists` if the target exists and `overwrite` is false
    /// - `Paused` if the observer asked to stop between chunks
    async fn upload_file(
        &self,
        source: &Path,
        target: &str,
        observer: &dyn ITransferObserver,
        overwrite: bool,
    ) -> Result<TransferOutcome, ProviderError>;

    /// Copies the remote file `source` to `local`
    ///
    /// # Errors
    /// Symmetric to [`upload_file`](Self::upload_file).
    async fn download_file(
        &self,
        source: &str,
        local: &Path,
        observer: &dyn ITransferObserver,
        overwrite: bool,
    ) -> Result<TransferOutcome, ProviderError>;

    /// Deletes a single file, `NotFound` when it does not exist
    async fn delete_file(&self, path: &str) -> Result<(), ProviderError>;

    /// Deletes a folder; a non-empty folder requires `force`
    async fn delete_folder(&self, path: &str, force: bool) -> Result<(), ProviderError>;

    /// Names of the direct children of `path`
    async fn list_folder(&self, path: &str) -> Result<Vec<String>, ProviderError>;

    /// Creates `path` including missing intermediate folders
    ///
    /// Idempotent: an existing folder returns its id instead of failing.
    async fn create_folder(&self, path: &str) -> Result<String, ProviderError>;

    /// Path index for providers without a native hierarchy, built on first
    /// use; `None` for providers that address folders by path
    async fn get_tree(&self) -> Result<Option<PathTree>, ProviderError>;

    /// Roots used to resolve templates of this site
    fn get_roots_config(&self, anatomy: Option<&dyn IAnatomy>) -> RootConfig;

    /// Replaces root placeholders in `path`
    ///
    /// Uses `root_config` when given, otherwise
    /// [`get_roots_config`](Self::get_roots_config). When substitution fails
    /// the anatomy gets a chance to fill the template.
    fn resolve_path(
        &self,
        path: &str,
        root_config: Option<&RootConfig>,
        anatomy: Option<&dyn IAnatomy>,
    ) -> Result<String, ProviderError> {
        let fetched;
        let roots = match root_config {
            Some(roots) if !roots.is_empty() => roots,
            _ => {
                fetched = self.get_roots_config(anatomy);
                &fetched
            }
        };

        match roots.fill(path) {
            Ok(resolved) => Ok(resolved),
            Err(err) => match anatomy {
                Some(anatomy) => anatomy.fill_root(path).map_err(|_| {
                    error!(path, site = self.site(), "Error in resolving local root from anatomy");
                    ProviderError::PathResolution(format!(
                        "cannot resolve '{}' from site roots or anatomy",
                        path
                    ))
                }),
                None => {
                    error!(path, site = self.site(), error = %err, "Error in resolving root");
                    Err(err)
                }
            },
        }
    }
}
