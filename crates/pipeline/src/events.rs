//! Events delivered to the consumer of a watch session.
//!
//! All three notification lines (change, done, error) travel over one
//! unbounded channel as [`WatchEvent`] variants. The sending half lives in
//! an [`EventLine`] that can be closed exactly once; after that every
//! emit is dropped and the receiver observes end-of-stream.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hotfolder_core::error::PipelineError;
use hotfolder_core::types::{Artifact, Job};
use tokio::sync::mpsc;

/// One artifact of a finished job, written to disk.
#[derive(Debug, Clone)]
pub struct JobDone {
    /// Input file the job was created from.
    pub source: PathBuf,
    pub job: Arc<Job>,
    pub artifact: Artifact,
    /// Where the artifact was written.
    pub output: PathBuf,
}

/// A notification from a running watch session.
#[derive(Debug)]
pub enum WatchEvent {
    /// A watched file settled and is about to be submitted.
    Change(PathBuf),
    /// One artifact of a completed job has been materialized.
    Done(JobDone),
    /// Processing of one file failed at some stage.
    Error(PipelineError),
}

/// Multi-producer sending side of the event channel.
#[derive(Debug, Clone)]
pub struct EventLine {
    tx: Arc<Mutex<Option<mpsc::UnboundedSender<WatchEvent>>>>,
}

impl EventLine {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WatchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Send an event. Returns `false` once the line is closed.
    pub fn emit(&self, event: WatchEvent) -> bool {
        match self.lock().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => {
                tracing::trace!(?event, "Dropping event after close");
                false
            }
        }
    }

    /// Close the line. Only the first call returns `true`.
    pub fn close(&self) -> bool {
        self.lock().take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<WatchEvent>>> {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
