//! Domain types and pure logic
//!
//! This module contains the core domain types for sitesync:
//! - Root configuration and placeholder substitution
//! - The folder tree index for providers without native paths
//! - `/`-delimited path helpers
//! - Transfer outcomes and provider errors
//! - Settings schema descriptors

pub mod errors;
pub mod outcome;
pub mod paths;
pub mod roots;
pub mod schema;
pub mod tree;

// Re-export commonly used types
pub use errors::ProviderError;
pub use outcome::TransferOutcome;
pub use roots::{RootConfig, RootSetting, SINGLE_ROOT_NAME};
pub use schema::{ObjectType, SettingsField, SettingsSchema};
pub use tree::{build_tree, FolderRecord, PathTree, RootFolder, TreeEntry, MAX_RESOLVE_PASSES, MY_DRIVE};
