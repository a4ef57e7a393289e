//! Remote file management commands: `tree`, `ls`, `mkdir` and `rm`
//!
//! Paths may use root placeholders (`{root[work]}/shots`), which are
//! resolved with the site's roots.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use super::{resolve_remote, Session};
use crate::output::Output;

/// Print the folder index of a site
#[derive(Debug, Args)]
pub struct TreeCommand {
    pub site: String,
}

impl TreeCommand {
    pub async fn execute(&self, session: &Session, output: Output) -> Result<()> {
        let provider = session.active_provider(&self.site).await?;
        let tree = provider
            .get_tree()
            .await
            .with_context(|| format!("Failed to build folder tree of '{}'", self.site))?;

        let Some(tree) = tree else {
            output.success(&format!(
                "Site '{}' ({}) addresses folders by path, there is no tree",
                self.site,
                provider.code()
            ));
            return Ok(());
        };

        let entries: serde_json::Map<_, _> = tree
            .iter()
            .map(|(path, entry)| (path.to_string(), serde_json::json!(entry.id)))
            .collect();
        if !output.is_json() {
            output.success(&format!("{} folders on '{}'", tree.len(), self.site));
        }
        output.report(
            &serde_json::Value::Object(entries),
            tree.iter().map(|(path, entry)| format!("{}  {}", path, entry.id)),
        );
        Ok(())
    }
}

/// List the children of a remote folder
#[derive(Debug, Args)]
pub struct LsCommand {
    pub site: String,
    pub path: String,
}

impl LsCommand {
    pub async fn execute(&self, session: &Session, output: Output) -> Result<()> {
        let provider = session.active_provider(&self.site).await?;
        let path = resolve_remote(provider.as_ref(), &self.path)?;
        let names = provider
            .list_folder(&path)
            .await
            .with_context(|| format!("Failed to list '{}'", path))?;

        output.report(&serde_json::json!(names), names.iter().cloned());
        Ok(())
    }
}

/// Create a remote folder with its missing parents
#[derive(Debug, Args)]
pub struct MkdirCommand {
    pub site: String,
    pub path: String,
}

impl MkdirCommand {
    pub async fn execute(&self, session: &Session, output: Output) -> Result<()> {
        let provider = session.active_provider(&self.site).await?;
        let path = resolve_remote(provider.as_ref(), &self.path)?;
        let id = provider
            .create_folder(&path)
            .await
            .with_context(|| format!("Failed to create '{}'", path))?;

        info!(site = %self.site, path = %path, id = %id, "Folder created");
        if output.is_json() {
            output.report(&serde_json::json!({"path": path, "id": id}), Vec::new());
        } else {
            output.success(&format!("Created {} ({})", path, id));
        }
        Ok(())
    }
}

/// Delete a remote file, or a folder with `--folder`
#[derive(Debug, Args)]
pub struct RmCommand {
    pub site: String,
    pub path: String,

    /// Delete a folder instead of a file
    #[arg(long)]
    pub folder: bool,

    /// Delete a non-empty folder with its content
    #[arg(long, requires = "folder")]
    pub force: bool,
}

impl RmCommand {
    pub async fn execute(&self, session: &Session, output: Output) -> Result<()> {
        let provider = session.active_provider(&self.site).await?;
        let path = resolve_remote(provider.as_ref(), &self.path)?;

        if self.folder {
            provider
                .delete_folder(&path, self.force)
                .await
                .with_context(|| format!("Failed to delete folder '{}'", path))?;
        } else {
            provider
                .delete_file(&path)
                .await
                .with_context(|| format!("Failed to delete '{}'", path))?;
        }

        info!(site = %self.site, path = %path, "Deleted");
        output.success(&format!("Deleted {}", path));
        Ok(())
    }
}
