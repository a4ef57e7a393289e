//! sitesync Core - Domain logic and provider ports
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `RootConfig`, `PathTree`, `TransferOutcome`, settings schema
//! - **Port definitions** - Traits for adapters: `IRemoteProvider`, `ITransferObserver`, `IAnatomy`
//! - **Configuration** - YAML site presets and sync settings
//!
//! # Architecture
//!
//! The domain module holds pure logic (root substitution, folder tree
//! reconciliation, path splitting) with no I/O. Ports define the trait
//! interfaces that the provider crates (`sitesync-gdrive`, `sitesync-dropbox`,
//! `sitesync-sftp`, `sitesync-sync`) implement.

pub mod config;
pub mod domain;
pub mod ports;
