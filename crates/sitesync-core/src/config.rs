//! Configuration module for sitesync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//!
//! ```yaml
//! sync:
//!   project: commercial_2024
//!   active_site: studio
//!   remote_site: gdrive
//! logging:
//!   level: info
//! sites:
//!   studio:
//!     provider: local_drive
//!     root:
//!       work: /mnt/projects
//!   gdrive:
//!     provider: gdrive
//!     credentials_url:
//!       linux: "{HOME}/.config/gdrive/credentials.json"
//!     root: "/My Drive"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::roots::RootConfig;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for sitesync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Site name → presets of the provider serving it.
    #[serde(default)]
    pub sites: BTreeMap<String, SitePresets>,
}

/// Sync loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Project whose representations are synchronized.
    pub project: String,
    /// Site of this machine (downloads land here).
    pub active_site: String,
    /// Site files are uploaded to.
    pub remote_site: String,
    /// Minimum seconds between two progress reports of one transfer.
    pub progress_interval_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// Presets of a single site.
///
/// `provider`, `enabled` and `root` are common to all providers; every
/// other key is provider specific (`credentials_url`, `token`,
/// `sftp_host`, ...) and kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitePresets {
    pub provider: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub root: RootConfig,
    #[serde(flatten)]
    pub settings: BTreeMap<String, serde_yaml::Value>,
}

fn default_enabled() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/sitesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("sitesync")
            .join("config.yaml")
    }

    /// Presets of `site`, if configured.
    pub fn site(&self, site: &str) -> Option<&SitePresets> {
        self.sites.get(site)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.sync.progress_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            project: "default".to_string(),
            active_site: "studio".to_string(),
            remote_site: "studio".to_string(),
            progress_interval_secs: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// SitePresets accessors
// ---------------------------------------------------------------------------

/// Name of the current platform as used by multiplatform settings keys.
pub fn current_platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

impl SitePresets {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            enabled: true,
            root: RootConfig::default(),
            settings: BTreeMap::new(),
        }
    }

    pub fn with_root(mut self, root: RootConfig) -> Self {
        self.root = root;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<serde_yaml::Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// String value of `key`; empty strings count as missing.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.settings.get(key) {
            Some(serde_yaml::Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Value of a multiplatform key for the current platform.
    ///
    /// Accepts both `key: value` and `key: {linux: ..., darwin: ..., windows: ...}`.
    pub fn get_platform_str(&self, key: &str) -> Option<&str> {
        match self.settings.get(key)? {
            serde_yaml::Value::String(s) if !s.is_empty() => Some(s.as_str()),
            serde_yaml::Value::Mapping(map) => map
                .get(current_platform())
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty()),
            _ => None,
        }
    }

    /// Numeric value of `key`; numbers written as strings are accepted.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.settings.get(key)? {
            serde_yaml::Value::Number(n) => n.as_u64(),
            serde_yaml::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.project"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.project.trim().is_empty() {
            errors.push(ValidationError {
                field: "sync.project".into(),
                message: "must not be empty".into(),
            });
        }
        if self.sync.progress_interval_secs == 0 {
            errors.push(ValidationError {
                field: "sync.progress_interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        // sites are optional, but once some are configured the sync
        // endpoints must point at them
        if !self.sites.is_empty() {
            for (field, site) in [
                ("sync.active_site", &self.sync.active_site),
                ("sync.remote_site", &self.sync.remote_site),
            ] {
                if !self.sites.contains_key(site) {
                    errors.push(ValidationError {
                        field: field.into(),
                        message: format!("site '{}' is not configured", site),
                    });
                }
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        // --- sites ---
        for (name, site) in &self.sites {
            if site.provider.trim().is_empty() {
                errors.push(ValidationError {
                    field: format!("sites.{}.provider", name),
                    message: "must not be empty".into(),
                });
            }
            if site.enabled && site.root.is_empty() && site.provider != "local_drive" {
                errors.push(ValidationError {
                    field: format!("sites.{}.root", name),
                    message: "enabled site needs at least one root".into(),
                });
            }
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use sitesync_core::config::{ConfigBuilder, SitePresets};
/// use sitesync_core::domain::RootConfig;
///
/// let config = ConfigBuilder::new()
///     .project("commercial_2024")
///     .remote_site("gdrive")
///     .site("gdrive", SitePresets::new("gdrive").with_root(RootConfig::single("/My Drive")))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.config.sync.project = project.into();
        self
    }

    pub fn active_site(mut self, site: impl Into<String>) -> Self {
        self.config.sync.active_site = site.into();
        self
    }

    pub fn remote_site(mut self, site: impl Into<String>) -> Self {
        self.config.sync.remote_site = site.into();
        self
    }

    pub fn progress_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.progress_interval_secs = seconds;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- sites ---

    pub fn site(mut self, name: impl Into<String>, presets: SitePresets) -> Self {
        self.config.sites.insert(name.into(), presets);
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
