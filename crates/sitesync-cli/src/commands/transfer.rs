//! Transfer commands
//!
//! - `upload` / `download` copy one file between this machine and a site.
//! - `push` / `pull` move one file of the project between the active site
//!   and the remote site of the configuration, resolving its root template
//!   on both sides.
//!
//! Progress is printed while the transfer runs; Ctrl-C pauses it at the
//! next chunk boundary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use sitesync_core::domain::paths::file_name_of;
use sitesync_core::domain::{ProviderError, TransferOutcome};
use sitesync_sync::progress::{ProgressKey, RepresentationObserver};
use sitesync_sync::transfer;
use tracing::info;

use super::{resolve_remote, Session, TerminalProgressStore};
use crate::output::Output;

/// Representation id used for transfers started from the command line
const CLI_REPRESENTATION: &str = "cli";

fn observer(
    session: &Session,
    output: Output,
    label: &'static str,
    site: &str,
    file: &str,
) -> RepresentationObserver {
    let project = session.config.sync.project.as_str();
    let store = Arc::new(TerminalProgressStore::new(
        output,
        label,
        session.config.progress_interval(),
    ));
    store.pause_on_ctrl_c(project);
    RepresentationObserver::new(
        store,
        ProgressKey::new(project, CLI_REPRESENTATION, site, file),
    )
}

fn report(output: Output, verb: &str, from: &str, to: &str, outcome: &TransferOutcome) -> Result<()> {
    match outcome {
        TransferOutcome::Completed(value) => {
            if output.is_json() {
                output.report(
                    &serde_json::json!({"from": from, "to": to, "result": value}),
                    Vec::new(),
                );
            } else {
                output.success(&format!("{} {} -> {} ({})", verb, from, to, value));
            }
            Ok(())
        }
        TransferOutcome::RetryLater => {
            output.warn("The backend asked to retry later, run the command again");
            Ok(())
        }
    }
}

fn paused(err: ProviderError) -> anyhow::Error {
    match err {
        ProviderError::Paused => anyhow::anyhow!("Transfer paused, partial data was removed"),
        other => other.into(),
    }
}

/// Upload a local file to a site
#[derive(Debug, Args)]
pub struct UploadCommand {
    pub site: String,
    pub source: PathBuf,
    /// Remote file or folder path, root placeholders allowed
    pub target: String,

    /// Replace an existing remote file
    #[arg(long)]
    pub overwrite: bool,
}

impl UploadCommand {
    pub async fn execute(&self, session: &Session, output: Output) -> Result<()> {
        let provider = session.active_provider(&self.site).await?;
        let target = resolve_remote(provider.as_ref(), &self.target)?;
        let name = self
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!(site = %self.site, source = %self.source.display(), target = %target, "Uploading");
        let observer = observer(session, output, "Uploaded", &self.site, &name);
        let outcome = provider
            .upload_file(&self.source, &target, &observer, self.overwrite)
            .await
            .map_err(paused)
            .with_context(|| format!("Failed to upload {}", self.source.display()))?;

        report(output, "Uploaded", &self.source.display().to_string(), &target, &outcome)
    }
}

/// Download a file of a site to this machine
#[derive(Debug, Args)]
pub struct DownloadCommand {
    pub site: String,
    /// Remote file path, root placeholders allowed
    pub source: String,
    /// Local file or folder
    pub target: PathBuf,

    /// Replace an existing local file
    #[arg(long)]
    pub overwrite: bool,
}

impl DownloadCommand {
    pub async fn execute(&self, session: &Session, output: Output) -> Result<()> {
        let provider = session.active_provider(&self.site).await?;
        let source = resolve_remote(provider.as_ref(), &self.source)?;

        info!(site = %self.site, source = %source, target = %self.target.display(), "Downloading");
        let observer = observer(session, output, "Downloaded", &self.site, file_name_of(&source));
        let outcome = provider
            .download_file(&source, &self.target, &observer, self.overwrite)
            .await
            .map_err(paused)
            .with_context(|| format!("Failed to download {}", source))?;

        report(output, "Downloaded", &source, &self.target.display().to_string(), &outcome)
    }
}

/// Upload a project file from the active site to the remote site
#[derive(Debug, Args)]
pub struct PushCommand {
    /// File template, e.g. "{root[work]}/shots/sh010/scene.ma"
    pub file: String,
}

impl PushCommand {
    pub async fn execute(&self, session: &Session, output: Output) -> Result<()> {
        let context = session.context();
        let observer = observer(
            session,
            output,
            "Uploaded",
            &context.remote_site,
            file_name_of(&self.file),
        );
        let outcome =
            transfer::upload_file(&session.factory, &context, &self.file, &mut None, &observer)
                .await
                .map_err(paused)
                .with_context(|| {
                    format!("Failed to push {} to '{}'", self.file, context.remote_site)
                })?;

        report(output, "Pushed", &context.local_site, &context.remote_site, &outcome)
    }
}

/// Download a project file from the remote site to the active site
#[derive(Debug, Args)]
pub struct PullCommand {
    /// File template, e.g. "{root[work]}/shots/sh010/scene.ma"
    pub file: String,
}

impl PullCommand {
    pub async fn execute(&self, session: &Session, output: Output) -> Result<()> {
        let context = session.context();
        let observer = observer(
            session,
            output,
            "Downloaded",
            &context.local_site,
            file_name_of(&self.file),
        );
        let outcome =
            transfer::download_file(&session.factory, &context, &self.file, &mut None, &observer)
                .await
                .map_err(paused)
                .with_context(|| {
                    format!("Failed to pull {} from '{}'", self.file, context.remote_site)
                })?;

        report(output, "Pulled", &context.remote_site, &context.local_site, &outcome)
    }
}
