//! Lifecycle of a watch session.
//!
//! [`Orchestrator::start`] validates the configuration, starts the directory
//! watcher (if continuous watching is requested), schedules the files already
//! present in the input directory (unless suppressed) from a listing taken
//! before returning, and hands back the receiving end of the event line.
//! Without continuous watching the session stops by itself once every
//! scheduled file has reached an outcome.
//!
//! Every file runs on its own task under a child of the session's master
//! cancellation token. [`Orchestrator::stop`] closes the event line and
//! cancels the master token; it is safe to call any number of times from
//! any number of tasks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hotfolder_core::config::{ConfigError, WatchConfig};
use hotfolder_core::error::PipelineError;
use hotfolder_core::service::JobService;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::debounce::Debouncer;
use crate::dispatcher::Dispatcher;
use crate::events::{EventLine, WatchEvent};
use crate::paths::PathTable;
use crate::watcher::watch_directory;

/// Errors that prevent a session from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to watch input directory: {0}")]
    Watch(#[from] notify::Error),
}

/// Handle to a running watch session. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<WatchConfig>,
    dispatcher: Dispatcher,
    paths: PathTable,
    line: EventLine,
    cancel: CancellationToken,
    /// Cancellation token of every in-flight file, tagged with a sequence
    /// number so a finished task never removes a newer entry for the same
    /// path.
    file_tokens: Mutex<HashMap<PathBuf, (u64, CancellationToken)>>,
    next_seq: AtomicU64,
    tracker: TaskTracker,
}

impl Orchestrator {
    /// Start a session. Must be called from within a tokio runtime.
    ///
    /// Fails if the configuration is invalid or the watcher cannot be
    /// started; nothing has been scheduled in that case.
    pub fn start(
        config: WatchConfig,
        service: Arc<dyn JobService>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>), StartError> {
        config.validate()?;

        let config = Arc::new(config);
        let (line, events) = EventLine::channel();
        let paths = PathTable::new();
        let dispatcher = Dispatcher::new(service, Arc::clone(&config), paths.clone(), line.clone());

        let orchestrator = Self {
            inner: Arc::new(Inner {
                config: Arc::clone(&config),
                dispatcher,
                paths,
                line,
                cancel: CancellationToken::new(),
                file_tokens: Mutex::new(HashMap::new()),
                next_seq: AtomicU64::new(0),
                tracker: TaskTracker::new(),
            }),
        };

        tracing::info!(
            input = %config.input.display(),
            output = %config.output.display(),
            watch = config.watch,
            preserve = config.preserve,
            skip_existing = config.skip_existing,
            "Starting watch session",
        );

        // The watcher goes first so files created during the scan are seen.
        if config.watch {
            orchestrator.start_watcher()?;
        }

        if !config.skip_existing {
            orchestrator.scan_existing();
        }

        if !config.watch {
            let tracker = orchestrator.inner.tracker.clone();
            tracker.close();
            let this = orchestrator.clone();
            tokio::spawn(async move {
                tracker.wait().await;
                tracing::debug!("All scanned files finished");
                this.stop();
            });
        }

        Ok((orchestrator, events))
    }

    /// Stop the session: close the event line and cancel all work.
    ///
    /// Only the first call has any effect.
    pub fn stop(&self) {
        if self.inner.line.close() {
            self.inner.cancel.cancel();
            tracing::info!("Watch session stopped");
        }
    }

    /// Cancel processing of one file. Returns `false` if it is not in
    /// flight.
    pub fn cancel(&self, path: &Path) -> bool {
        match self.file_tokens().get(path) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Resolve once the session has stopped.
    pub async fn stopped(&self) {
        self.inner.cancel.cancelled().await
    }

    /// Number of files currently being processed.
    pub fn in_flight(&self) -> usize {
        self.inner.paths.in_flight_count()
    }

    fn start_watcher(&self) -> Result<(), StartError> {
        let (watcher, fs_events) = watch_directory(&self.inner.config.input)?;
        let debouncer = Debouncer::new(
            self.inner.paths.clone(),
            self.inner.config.quiet_window,
            self.inner.config.tick_interval,
        );

        let cancel = self.inner.cancel.clone();
        let ready = self.clone();
        let errors = self.inner.line.clone();
        let input = self.inner.config.input.clone();

        tokio::spawn(async move {
            // Dropping the watcher ends the notification stream.
            let _watcher = watcher;
            debouncer
                .run(
                    fs_events,
                    cancel,
                    move |path| {
                        tracing::debug!(path = %path.display(), "File settled");
                        ready.inner.line.emit(WatchEvent::Change(path.clone()));
                        ready.schedule(path);
                    },
                    move |e| {
                        tracing::warn!(error = %e, "Filesystem watcher error");
                        errors.emit(WatchEvent::Error(PipelineError::Filesystem {
                            path: input.clone(),
                            source: std::io::Error::other(e),
                        }));
                    },
                )
                .await;
        });

        Ok(())
    }

    /// Schedule every regular file directly inside the input directory, in
    /// name order.
    ///
    /// The listing is taken before `start` returns, so it holds only files
    /// that existed before the caller could write. Paths the watcher has
    /// already seen stay with the debouncer.
    fn scan_existing(&self) {
        let input = &self.inner.config.input;
        match list_files(input) {
            Ok(files) => {
                let mut scheduled = 0;
                for path in files {
                    if self.inner.paths.claim_idle(&path) {
                        self.schedule(path);
                        scheduled += 1;
                    }
                }
                tracing::info!(count = scheduled, "Scheduled existing files");
            }
            Err(source) => {
                tracing::error!(input = %input.display(), error = %source, "Startup scan failed");
                self.inner.line.emit(WatchEvent::Error(PipelineError::Filesystem {
                    path: input.clone(),
                    source,
                }));
            }
        }
    }

    /// Run the dispatcher for an in-flight path on its own task.
    fn schedule(&self, path: PathBuf) {
        if self.is_stopped() {
            self.inner.paths.release(&path);
            return;
        }

        let token = self.inner.cancel.child_token();
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        self.file_tokens()
            .insert(path.clone(), (seq, token.clone()));

        let this = self.clone();
        self.inner.tracker.spawn(async move {
            this.inner.dispatcher.process(path.clone(), token).await;
            let mut tokens = this.file_tokens();
            if matches!(tokens.get(&path), Some((current, _)) if *current == seq) {
                tokens.remove(&path);
            }
        });
    }

    fn file_tokens(&self) -> MutexGuard<'_, HashMap<PathBuf, (u64, CancellationToken)>> {
        self.inner
            .file_tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable entry"),
        }
    }
    files.sort();
    Ok(files)
}
