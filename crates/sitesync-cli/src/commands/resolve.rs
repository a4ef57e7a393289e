//! Resolve command - Fill root placeholders with a site's roots

use anyhow::{Context, Result};
use clap::Args;

use super::Session;
use crate::output::Output;

#[derive(Debug, Args)]
pub struct ResolveCommand {
    pub site: String,

    /// Path template, e.g. "{root[work]}/shots/sh010/scene.ma"
    pub template: String,
}

impl ResolveCommand {
    pub async fn execute(&self, session: &Session, output: Output) -> Result<()> {
        // roots live in the presets, an inactive provider resolves as well
        let provider = session.site_provider(&self.site).await?;
        let resolved = provider
            .resolve_path(&self.template, None, None)
            .with_context(|| format!("Failed to resolve '{}' on '{}'", self.template, self.site))?;

        output.report(
            &serde_json::json!({
                "site": self.site,
                "template": self.template,
                "path": resolved,
            }),
            [resolved.clone()],
        );
        Ok(())
    }
}
