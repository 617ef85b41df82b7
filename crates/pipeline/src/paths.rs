//! Per-path tracking state shared by the debouncer and the dispatcher.
//!
//! A path absent from the table is idle. A path is either waiting out its
//! quiet window or in flight, never both. Every transition happens under
//! one mutex, so checking and claiming a path is atomic.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// State of a tracked (non-idle) path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    /// A write was seen; waiting for the quiet window to pass.
    PendingQuiet { last_write: Instant },
    /// Submitted and awaiting a terminal outcome.
    InFlight,
}

/// Shared, cheaply clonable path-state table.
#[derive(Debug, Clone, Default)]
pub struct PathTable {
    inner: Arc<Mutex<HashMap<PathBuf, PathState>>>,
}

impl PathTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write at `at`. Ignored (returns `false`) while in flight.
    pub fn record_write(&self, path: &Path, at: Instant) -> bool {
        let mut table = self.lock();
        if matches!(table.get(path), Some(PathState::InFlight)) {
            return false;
        }
        table.insert(path.to_path_buf(), PathState::PendingQuiet { last_write: at });
        true
    }

    /// Move every path whose last write is older than `quiet` to in-flight
    /// and return them, sorted.
    pub fn take_ready(&self, now: Instant, quiet: Duration) -> Vec<PathBuf> {
        let mut table = self.lock();
        let mut ready: Vec<PathBuf> = table
            .iter()
            .filter_map(|(path, state)| match state {
                PathState::PendingQuiet { last_write }
                    if now.saturating_duration_since(*last_write) > quiet =>
                {
                    Some(path.clone())
                }
                _ => None,
            })
            .collect();
        for path in &ready {
            table.insert(path.clone(), PathState::InFlight);
        }
        ready.sort();
        ready
    }

    /// Mark an idle path in flight directly, bypassing the quiet window.
    ///
    /// Returns `false` if the path is tracked in any state, so a path the
    /// watcher has seen written stays debounced.
    pub fn claim_idle(&self, path: &Path) -> bool {
        let mut table = self.lock();
        if table.contains_key(path) {
            return false;
        }
        table.insert(path.to_path_buf(), PathState::InFlight);
        true
    }

    /// Drop a path that is waiting out its quiet window, e.g. because it
    /// was renamed away or removed. In-flight paths are left alone.
    pub fn forget_pending(&self, path: &Path) -> bool {
        let mut table = self.lock();
        if matches!(table.get(path), Some(PathState::PendingQuiet { .. })) {
            table.remove(path);
            return true;
        }
        false
    }

    /// Return a path to idle.
    pub fn release(&self, path: &Path) {
        self.lock().remove(path);
    }

    pub fn state(&self, path: &Path) -> Option<PathState> {
        self.lock().get(path).copied()
    }

    pub fn in_flight_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|s| matches!(s, PathState::InFlight))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, PathState>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
