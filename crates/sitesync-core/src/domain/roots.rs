//! Root configuration and placeholder substitution
//!
//! A root is a named logical mount point. Site presets carry either a
//! single root (`root: "/My Drive"`) or a mapping of named roots
//! (`root: {work: /studio/work, publish: /studio/publish}`). Both shapes are
//! normalized into [`RootConfig`] before any template is filled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::errors::ProviderError;

/// Name used for the root of a single-root configuration
pub const SINGLE_ROOT_NAME: &str = "root";

/// Root setting exactly as written in site presets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RootSetting {
    /// `root: "/My Drive"`
    Single(String),
    /// `root: {root_one: "/My Drive", root_two: "/My Drive/other"}`
    Multi(BTreeMap<String, String>),
}

impl Default for RootSetting {
    fn default() -> Self {
        RootSetting::Multi(BTreeMap::new())
    }
}

/// Normalized mapping of root name to absolute path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RootSetting", into = "RootSetting")]
pub struct RootConfig {
    roots: BTreeMap<String, String>,
    single: bool,
}

impl From<RootSetting> for RootConfig {
    fn from(setting: RootSetting) -> Self {
        match setting {
            RootSetting::Single(path) => {
                let mut roots = BTreeMap::new();
                roots.insert(SINGLE_ROOT_NAME.to_string(), path);
                Self {
                    roots,
                    single: true,
                }
            }
            RootSetting::Multi(roots) => Self {
                roots,
                single: false,
            },
        }
    }
}

impl From<RootConfig> for RootSetting {
    fn from(config: RootConfig) -> Self {
        if config.single {
            let path = config
                .roots
                .get(SINGLE_ROOT_NAME)
                .cloned()
                .unwrap_or_default();
            RootSetting::Single(path)
        } else {
            RootSetting::Multi(config.roots)
        }
    }
}

impl RootConfig {
    /// Builds a multi-root configuration from `(name, path)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            roots: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            single: false,
        }
    }

    /// Builds a single-root configuration
    pub fn single(path: impl Into<String>) -> Self {
        RootSetting::Single(path.into()).into()
    }

    pub fn is_single(&self) -> bool {
        self.single
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.roots.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.roots.keys().map(String::as_str)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.roots.values().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.roots.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Value substituted for a bare `{root}` placeholder
    fn default_root(&self) -> Option<&str> {
        self.get(SINGLE_ROOT_NAME).or_else(|| {
            if self.roots.len() == 1 {
                self.paths().next()
            } else {
                None
            }
        })
    }

    fn named(&self, name: &str) -> Result<&str, ProviderError> {
        self.get(name).ok_or_else(|| {
            ProviderError::PathResolution(format!("root '{}' is not configured", name))
        })
    }

    /// Replaces root placeholders in `template`.
    ///
    /// Accepted forms are `{root[name]}`, `{root}` and a bare `root[name]`
    /// prefix. `{{` and `}}` are literal braces. Any other placeholder is an
    /// error so that callers can fall back to another root source.
    pub fn fill(&self, template: &str) -> Result<String, ProviderError> {
        if self.is_empty() {
            return Err(ProviderError::PathResolution(
                "no roots configured".to_string(),
            ));
        }

        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        if let Some(after) = rest.strip_prefix("root[") {
            let end = after.find(']').ok_or_else(|| {
                ProviderError::PathResolution(format!("unclosed root in '{}'", template))
            })?;
            out.push_str(self.named(&after[..end])?);
            rest = &after[end + 1..];
        }

        while let Some(pos) = rest.find(['{', '}']) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if let Some(after) = tail.strip_prefix("{{") {
                out.push('{');
                rest = after;
                continue;
            }
            if let Some(after) = tail.strip_prefix("}}") {
                out.push('}');
                rest = after;
                continue;
            }
            if tail.starts_with('}') {
                return Err(ProviderError::PathResolution(format!(
                    "single '}}' in '{}'",
                    template
                )));
            }

            let close = tail.find('}').ok_or_else(|| {
                ProviderError::PathResolution(format!("unclosed placeholder in '{}'", template))
            })?;
            let field = &tail[1..close];

            let value = if field == "root" {
                self.default_root().ok_or_else(|| {
                    ProviderError::PathResolution(
                        "'{root}' is ambiguous for a multi-root configuration".to_string(),
                    )
                })?
            } else if let Some(name) = field
                .strip_prefix("root[")
                .and_then(|n| n.strip_suffix(']'))
            {
                self.named(name)?
            } else {
                return Err(ProviderError::PathResolution(format!(
                    "unknown placeholder '{{{}}}'",
                    field
                )));
            };

            out.push_str(value);
            rest = &tail[close + 1..];
        }
        out.push_str(rest);

        Ok(out)
    }
}
