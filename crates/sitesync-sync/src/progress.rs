//! Progress store port and its transfer observer
//!
//! The sync loop persists transfer progress per file of a representation
//! and lets users pause a representation, or a whole project, while its
//! files are in flight. [`RepresentationObserver`] exposes that store to a
//! provider through the narrow [`ITransferObserver`] hooks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use sitesync_core::ports::{ITransferObserver, DEFAULT_PROGRESS_INTERVAL};
use tracing::trace;

/// Identifies one file of a representation on one site
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgressKey {
    /// Project the representation belongs to
    pub collection: String,
    pub representation_id: String,
    pub site: String,
    pub file_id: String,
}

impl ProgressKey {
    pub fn new(
        collection: impl Into<String>,
        representation_id: impl Into<String>,
        site: impl Into<String>,
        file_id: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            representation_id: representation_id.into(),
            site: site.into(),
            file_id: file_id.into(),
        }
    }
}

/// Persistence of transfer progress and pause flags
pub trait IProgressStore: Send + Sync {
    /// Stores the transferred fraction of one file
    fn update_progress(&self, key: &ProgressKey, progress: f64);

    /// True when the representation is paused; with `check_parents` a
    /// paused project pauses all of its representations
    fn is_representation_paused(
        &self,
        collection: &str,
        representation_id: &str,
        check_parents: bool,
    ) -> bool;

    /// Minimum time between two stored progress values
    fn progress_interval(&self) -> Duration {
        DEFAULT_PROGRESS_INTERVAL
    }
}

/// Observer of a single file transfer backed by a progress store
#[derive(Clone)]
pub struct RepresentationObserver {
    store: Arc<dyn IProgressStore>,
    key: ProgressKey,
}

impl RepresentationObserver {
    pub fn new(store: Arc<dyn IProgressStore>, key: ProgressKey) -> Self {
        Self { store, key }
    }

    pub fn key(&self) -> &ProgressKey {
        &self.key
    }
}

impl ITransferObserver for RepresentationObserver {
    fn report_progress(&self, fraction: f64) {
        self.store.update_progress(&self.key, fraction);
    }

    fn is_cancelled(&self) -> bool {
        self.store
            .is_representation_paused(&self.key.collection, &self.key.representation_id, true)
    }

    fn progress_interval(&self) -> Duration {
        self.store.progress_interval()
    }
}

/// In-memory progress store
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    interval: Option<Duration>,
    progress: Mutex<BTreeMap<ProgressKey, f64>>,
    paused_representations: Mutex<BTreeSet<(String, String)>>,
    paused_projects: Mutex<BTreeSet<String>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Last stored fraction of `key`
    pub fn progress(&self, key: &ProgressKey) -> Option<f64> {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }

    pub fn pause_representation(&self, collection: &str, representation_id: &str) {
        self.paused_representations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((collection.to_string(), representation_id.to_string()));
    }

    pub fn unpause_representation(&self, collection: &str, representation_id: &str) {
        self.paused_representations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(collection.to_string(), representation_id.to_string()));
    }

    pub fn pause_project(&self, collection: &str) {
        self.paused_projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection.to_string());
    }

    pub fn unpause_project(&self, collection: &str) {
        self.paused_projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(collection);
    }
}

impl IProgressStore for MemoryProgressStore {
    fn update_progress(&self, key: &ProgressKey, progress: f64) {
        trace!(file = %key.file_id, site = %key.site, progress, "progress update");
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), progress);
    }

    fn is_representation_paused(
        &self,
        collection: &str,
        representation_id: &str,
        check_parents: bool,
    ) -> bool {
        let representation_paused = self
            .paused_representations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(collection.to_string(), representation_id.to_string()));
        if representation_paused || !check_parents {
            return representation_paused;
        }
        self.paused_projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(collection)
    }

    fn progress_interval(&self) -> Duration {
        self.interval.unwrap_or(DEFAULT_PROGRESS_INTERVAL)
    }
}
