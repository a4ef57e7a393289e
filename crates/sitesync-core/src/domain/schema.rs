//! Editable settings descriptors exposed by each provider
//!
//! A settings UI (not part of this workspace) renders these descriptors on
//! three levels: system, project and local (per user). The serialized shape
//! is the field-descriptor mapping the UI expects:
//!
//! ```json
//! {"type": "path", "key": "credentials_url", "label": "Credentials url", "multiplatform": true}
//! ```

use serde::{Deserialize, Serialize};

/// Value type of a nested dictionary field (e.g. every root of `dict-roots`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectType {
    #[serde(rename = "type")]
    pub field_type: String,
    pub multiplatform: bool,
    pub multipath: bool,
}

/// A single editable field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsField {
    #[serde(rename = "type")]
    pub field_type: String,
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplatform: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multipath: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Settings namespace the value is stored under, for local overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<ObjectType>,
}

impl SettingsField {
    pub fn new(
        field_type: impl Into<String>,
        key: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            field_type: field_type.into(),
            key: key.into(),
            label: label.into(),
            multiplatform: None,
            multipath: None,
            placeholder: None,
            namespace: None,
            object_type: None,
        }
    }

    pub fn multiplatform(mut self, value: bool) -> Self {
        self.multiplatform = Some(value);
        self
    }

    pub fn multipath(mut self, value: bool) -> Self {
        self.multipath = Some(value);
        self
    }

    pub fn placeholder(mut self, value: impl Into<String>) -> Self {
        self.placeholder = Some(value.into());
        self
    }

    pub fn namespace(mut self, value: impl Into<String>) -> Self {
        self.namespace = Some(value.into());
        self
    }

    pub fn object_type(mut self, value: ObjectType) -> Self {
        self.object_type = Some(value);
        self
    }

    /// The `root` field shared by every provider: a mapping of root name to
    /// a single path, editable on project level only
    pub fn roots() -> Self {
        Self::new("dict-roots", "root", "Roots").object_type(ObjectType {
            field_type: "path".to_string(),
            multiplatform: false,
            multipath: false,
        })
    }

    /// A local-level text override stored under the site's settings
    pub fn local_override(key: &str, label: &str, platform_specific: bool) -> Self {
        let mut namespace = format!(
            "{{project_settings}}/global/sync_server/sites/{{site}}/{}",
            key
        );
        if platform_specific {
            namespace.push_str("/{platform}");
        }
        Self::new("text", key, label).namespace(namespace)
    }
}

/// Editable fields of one provider on every settings level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSchema {
    pub system: Vec<SettingsField>,
    pub project: Vec<SettingsField>,
    pub local: Vec<SettingsField>,
}

impl SettingsSchema {
    pub fn is_empty(&self) -> bool {
        self.system.is_empty() && self.project.is_empty() && self.local.is_empty()
    }
}
