//! Native filesystem watcher bridged into tokio.

use std::path::Path;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Raw notification stream from a [`RecommendedWatcher`].
pub type FsEvents = mpsc::UnboundedReceiver<notify::Result<Event>>;

/// Start watching `dir` (non-recursively).
///
/// Events are forwarded into an unbounded channel. The returned watcher
/// must be kept alive for as long as events are wanted; dropping it ends
/// the stream.
pub fn watch_directory(dir: &Path) -> Result<(RecommendedWatcher, FsEvents), notify::Error> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        // Receiver gone means the session is over.
        let _ = tx.send(res);
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    tracing::debug!(dir = %dir.display(), "Watching directory");
    Ok((watcher, rx))
}
