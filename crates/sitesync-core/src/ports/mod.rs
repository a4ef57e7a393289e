//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Implementations live in the provider crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteProvider`] - Storage backend of one site (GDrive, Dropbox, local drive, SFTP)
//! - [`ITransferObserver`] - Progress and pause hooks of a single transfer
//! - [`IAnatomy`] - Externally supplied root overrides

pub mod anatomy;
pub mod registration;
pub mod remote_provider;
pub mod transfer;

pub use anatomy::{IAnatomy, StaticAnatomy};
pub use registration::{ProviderArgs, ProviderBuilder, ProviderRegistration};
pub use remote_provider::IRemoteProvider;
pub use transfer::{fraction, ITransferObserver, NoopObserver, ProgressThrottle, DEFAULT_PROGRESS_INTERVAL};
