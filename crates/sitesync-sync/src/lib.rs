//! sitesync Sync - Provider registry and transfer orchestration
//!
//! Provides:
//! - The local drive provider
//! - An explicit provider registry with per-provider batch limits
//! - Per-file upload/download helpers used by the sync loop
//! - Progress store adapter for transfer observers
//!
//! ## Modules
//!
//! - [`local_drive`] - Provider for folders reachable through the local filesystem
//! - [`factory`] - [`ProviderFactory`] mapping provider codes to constructors
//! - [`transfer`] - Path resolution and single file upload/download
//! - [`progress`] - Progress keys, the progress store port and its observer

pub mod factory;
pub mod local_drive;
pub mod progress;
pub mod transfer;

pub use factory::ProviderFactory;
pub use local_drive::LocalDriveProvider;
pub use progress::{IProgressStore, MemoryProgressStore, ProgressKey, RepresentationObserver};
pub use transfer::SiteContext;
