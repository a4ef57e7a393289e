//! Result of a single file transfer

use serde::{Deserialize, Serialize};

/// Outcome of an upload or download that did not fail hard
///
/// Hard failures (missing source, conflict, permission, pause) are
/// [`ProviderError`](super::errors::ProviderError)s. `RetryLater` is the soft
/// failure the sync loop answers by trying the same file again next loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum TransferOutcome {
    /// Transfer finished; carries the provider file id, remote path or
    /// target file name depending on the provider
    Completed(String),
    /// Transient backend condition, nothing was committed
    RetryLater,
}

impl TransferOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferOutcome::Completed(_))
    }

    /// Returns the completion value, if any
    pub fn value(&self) -> Option<&str> {
        match self {
            TransferOutcome::Completed(value) => Some(value),
            TransferOutcome::RetryLater => None,
        }
    }
}

impl std::fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferOutcome::Completed(value) => write!(f, "completed: {}", value),
            TransferOutcome::RetryLater => write!(f, "retry later"),
        }
    }
}
