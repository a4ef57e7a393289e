//! Transfer observer port (driving side of a single file transfer)
//!
//! A provider reports progress and polls for a pause request through this
//! narrow interface instead of talking to the sync server directly.
//!
//! ## Design Notes
//!
//! - Pause is cooperative: providers poll [`ITransferObserver::is_cancelled`]
//!   only at chunk boundaries.
//! - Progress is rate limited by [`ProgressThrottle`] so that one transfer
//!   writes to the progress store at most once per interval.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::domain::errors::ProviderError;

/// Default minimum time between two progress reports
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Hooks a provider calls while a file is being transferred
pub trait ITransferObserver: Send + Sync {
    /// Receives the transferred fraction, `0.0..=1.0`
    fn report_progress(&self, fraction: f64);

    /// Returns true when the transfer should stop at the next chunk boundary
    fn is_cancelled(&self) -> bool;

    /// Minimum time between two progress reports
    fn progress_interval(&self) -> Duration {
        DEFAULT_PROGRESS_INTERVAL
    }
}

/// Observer for callers that do not track progress and never pause
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ITransferObserver for NoopObserver {
    fn report_progress(&self, _fraction: f64) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Rate limiter between a chunk loop and its observer
///
/// The first [`tick`](Self::tick) always reports, later ticks report only
/// once the observer's interval has elapsed since the last report.
pub struct ProgressThrottle<'a> {
    observer: &'a dyn ITransferObserver,
    interval: Duration,
    last_tick: Option<Instant>,
    label: &'static str,
}

impl<'a> ProgressThrottle<'a> {
    /// `label` is used in debug logs, e.g. "Uploaded"
    pub fn new(observer: &'a dyn ITransferObserver, label: &'static str) -> Self {
        Self {
            observer,
            interval: observer.progress_interval(),
            last_tick: None,
            label,
        }
    }

    /// Fails with [`ProviderError::Paused`] when the observer asks to stop
    pub fn check_paused(&self) -> Result<(), ProviderError> {
        if self.observer.is_cancelled() {
            return Err(ProviderError::Paused);
        }
        Ok(())
    }

    /// Reports `fraction` if the interval allows it; returns whether it did
    pub fn tick(&mut self, fraction: f64) -> bool {
        let due = match self.last_tick {
            None => true,
            Some(last) => last.elapsed() >= self.interval,
        };
        if due {
            self.last_tick = Some(Instant::now());
            let fraction = fraction.clamp(0.0, 1.0);
            debug!("{} {}%", self.label, (fraction * 100.0) as u32);
            self.observer.report_progress(fraction);
        }
        due
    }

    /// Reports completion unconditionally
    pub fn finish(&mut self) {
        self.last_tick = Some(Instant::now());
        debug!("{} 100%", self.label);
        self.observer.report_progress(1.0);
    }
}

/// Transferred fraction, `0.0` for empty totals
pub fn fraction(done: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        done as f64 / total as f64
    }
}
