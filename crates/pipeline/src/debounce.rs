//! Write debouncing for the directory watcher.
//!
//! A file being copied into the input directory produces a burst of create
//! and write notifications. [`Debouncer`] records the time of the latest
//! write per path and, on every tick, hands over the paths that have been
//! quiet for longer than the quiet window. Handed-over paths are marked in
//! flight in the shared [`PathTable`], so writes arriving while a file is
//! being processed are ignored.

use std::path::PathBuf;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::paths::PathTable;
use crate::watcher::FsEvents;

/// Turns raw filesystem events into "file ready" signals.
#[derive(Debug, Clone)]
pub struct Debouncer {
    paths: PathTable,
    quiet_window: Duration,
    tick_interval: Duration,
}

impl Debouncer {
    pub fn new(paths: PathTable, quiet_window: Duration, tick_interval: Duration) -> Self {
        Self {
            paths,
            quiet_window,
            tick_interval,
        }
    }

    /// Record the written paths of `event` at `now`.
    ///
    /// Returns how many paths were recorded. Directories and paths that are
    /// already in flight are skipped. Paths that vanish before settling are
    /// dropped from the pending set.
    pub fn observe(&self, event: &Event, now: Instant) -> usize {
        let (gone, written) = split_paths(event);
        for path in gone {
            if self.paths.forget_pending(path) {
                tracing::trace!(path = %path.display(), "Pending path vanished");
            }
        }
        written
            .iter()
            .filter(|path| !path.is_dir())
            .filter(|path| self.paths.record_write(path, now))
            .count()
    }

    /// Paths whose last write is older than the quiet window at `now`.
    pub fn flush(&self, now: Instant) -> Vec<PathBuf> {
        self.paths.take_ready(now, self.quiet_window)
    }

    /// Consume `events` until `cancel` fires.
    ///
    /// `on_ready` is called once per settled path, `on_error` for every
    /// watcher error. If the event stream ends, pending paths are still
    /// flushed on later ticks.
    pub async fn run<R, E>(
        self,
        mut events: FsEvents,
        cancel: CancellationToken,
        mut on_ready: R,
        mut on_error: E,
    ) where
        R: FnMut(PathBuf),
        E: FnMut(notify::Error),
    {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut open = true;

        tracing::debug!(
            quiet_window = ?self.quiet_window,
            tick = ?self.tick_interval,
            "Debouncer started",
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Debouncer shutting down");
                    break;
                }
                received = events.recv(), if open => match received {
                    Some(Ok(event)) => {
                        self.observe(&event, Instant::now());
                    }
                    Some(Err(e)) => on_error(e),
                    None => {
                        tracing::warn!("Filesystem event stream ended");
                        open = false;
                    }
                },
                _ = ticker.tick() => {
                    for path in self.flush(Instant::now()) {
                        on_ready(path);
                    }
                }
            }
        }
    }
}

/// Split the paths of `event` into those that went away and those that
/// were written.
///
/// A file renamed into the directory counts as created. For a rename with
/// both ends known, `paths[0]` is the source and `paths[1]` the target.
/// Metadata changes and access events are neither.
fn split_paths(event: &Event) -> (&[PathBuf], &[PathBuf]) {
    const NONE: &[PathBuf] = &[];
    let paths = event.paths.as_slice();
    match event.kind {
        EventKind::Create(_)
        | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
        | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => (NONE, paths),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            paths.split_at(paths.len().min(1))
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) | EventKind::Remove(_) => {
            (paths, NONE)
        }
        _ => (NONE, NONE),
    }
}
