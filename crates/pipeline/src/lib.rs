//! Watch-dispatch-poll-materialize pipeline.
//!
//! - [`Orchestrator`]: owns the event line, runs the startup scan and
//!   the directory watcher, and stops idempotently.
//! - [`Debouncer`]: collapses bursts of filesystem writes into single
//!   "file ready" signals.
//! - [`Dispatcher`]: submits a ready file and routes the outcome.
//! - [`JobPoller`]: drives one job to a terminal state, honouring
//!   cancellation.
//! - [`Materializer`]: downloads every artifact of a completed job and
//!   disposes of the original.

pub mod debounce;
pub mod dispatcher;
pub mod events;
pub mod materializer;
pub mod orchestrator;
pub mod paths;
pub mod poller;
pub mod watcher;

pub use debounce::Debouncer;
pub use dispatcher::Dispatcher;
pub use events::{EventLine, JobDone, WatchEvent};
pub use materializer::Materializer;
pub use orchestrator::{Orchestrator, StartError};
pub use paths::{PathState, PathTable};
pub use poller::{JobPoller, PollError};
