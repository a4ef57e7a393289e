//! Provider registry commands: `schema` and `batch-limit`

use anyhow::{Context, Result};
use clap::Args;

use super::Session;
use crate::output::Output;

/// Print the settings fields of a provider
#[derive(Debug, Args)]
pub struct SchemaCommand {
    /// Provider code, e.g. gdrive
    pub provider: String,
}

impl SchemaCommand {
    pub async fn execute(&self, session: &Session, output: Output) -> Result<()> {
        let schema = session.factory.settings_schema(&self.provider)?;
        let label = session.factory.label(&self.provider)?;

        if output.is_json() {
            let value = serde_json::to_value(&schema)
                .context("Failed to serialize settings schema to JSON")?;
            output.report(&value, Vec::new());
            return Ok(());
        }

        output.success(&format!("{} ({})", label, self.provider));
        let yaml =
            serde_yaml::to_string(&schema).context("Failed to serialize settings schema to YAML")?;
        output.report(&serde_json::Value::Null, yaml.lines().map(str::to_string));
        Ok(())
    }
}

/// Print how many files a provider takes per sync loop
#[derive(Debug, Args)]
pub struct BatchLimitCommand {
    /// Provider code, e.g. dropbox
    pub provider: String,
}

impl BatchLimitCommand {
    pub async fn execute(&self, session: &Session, output: Output) -> Result<()> {
        let limit = session.factory.get_provider_batch_limit(&self.provider)?;
        output.report(
            &serde_json::json!({"provider": self.provider, "batch_limit": limit}),
            [format!("{}: {}", self.provider, limit)],
        );
        Ok(())
    }
}
