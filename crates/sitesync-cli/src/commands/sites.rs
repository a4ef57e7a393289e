//! Sites command - List configured sites and check them
//!
//! Builds the provider of every site in the configuration and reports
//! whether it came up active. Validation problems of the configuration
//! file are printed as warnings first.

use anyhow::Result;
use clap::Args;
use sitesync_sync::transfer::site_is_working;
use tracing::info;

use super::Session;
use crate::output::Output;

#[derive(Debug, Args)]
pub struct SitesCommand {}

impl SitesCommand {
    pub async fn execute(&self, session: &Session, output: Output) -> Result<()> {
        info!(config = %session.config_path.display(), "Listing sites");

        for problem in session.config.validate() {
            output.warn(&problem.to_string());
        }

        if session.config.sites.is_empty() {
            output.error(&format!(
                "No sites configured in {}",
                session.config_path.display()
            ));
            return Ok(());
        }

        let context = session.context();
        let mut rows = Vec::new();
        let mut lines = Vec::new();
        for (name, presets) in &session.config.sites {
            let active = site_is_working(&session.factory, &context, name).await;
            let role = if *name == context.local_site {
                "local"
            } else if *name == context.remote_site {
                "remote"
            } else {
                ""
            };

            lines.push(format!(
                "{:<16} {:<12} {:<9} {}",
                name,
                presets.provider,
                if active { "active" } else { "inactive" },
                role
            ));
            rows.push(serde_json::json!({
                "site": name,
                "provider": presets.provider,
                "enabled": presets.enabled,
                "active": active,
                "role": role,
                "roots": presets.root.iter().collect::<std::collections::BTreeMap<_, _>>(),
            }));
        }

        if !output.is_json() {
            output.success(&format!("Sites of project '{}'", context.project));
        }
        output.report(&serde_json::Value::Array(rows), lines);
        Ok(())
    }
}
