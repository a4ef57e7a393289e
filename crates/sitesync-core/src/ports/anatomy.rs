//! Anatomy port: externally supplied root overrides
//!
//! The project anatomy knows the roots of the active site after local
//! settings were applied. Providers whose roots can be overridden per user
//! (the local drive) consult it before their own presets, and path
//! resolution falls back to it when the presets cannot fill a template.

use crate::domain::errors::ProviderError;
use crate::domain::roots::RootConfig;

/// Source of root values outside of the site presets
pub trait IAnatomy: Send + Sync {
    /// Roots of the current site, if the anatomy defines any
    fn roots(&self) -> Option<RootConfig>;

    /// Fills root placeholders in `template`
    fn fill_root(&self, template: &str) -> Result<String, ProviderError>;
}

/// Anatomy backed by a fixed root configuration
#[derive(Debug, Clone, Default)]
pub struct StaticAnatomy {
    roots: RootConfig,
}

impl StaticAnatomy {
    pub fn new(roots: RootConfig) -> Self {
        Self { roots }
    }
}

impl IAnatomy for StaticAnatomy {
    fn roots(&self) -> Option<RootConfig> {
        if self.roots.is_empty() {
            None
        } else {
            Some(self.roots.clone())
        }
    }

    fn fill_root(&self, template: &str) -> Result<String, ProviderError> {
        self.roots.fill(template)
    }
}
