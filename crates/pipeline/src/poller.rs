//! Job completion polling.
//!
//! After submission a job is observable only by asking for its status.
//! [`JobPoller::wait`] queries immediately, then once per interval, while
//! the job is uploading or executing and carries no error. Both the
//! in-flight query and the sleep between queries race the cancellation
//! token, so a cancelled session returns without waiting on the service.

use std::time::Duration;

use hotfolder_core::config::DEFAULT_POLL_INTERVAL;
use hotfolder_core::error::ServiceError;
use hotfolder_core::service::JobService;
use hotfolder_core::types::{Job, JobHandle};
use tokio_util::sync::CancellationToken;

/// Why a polling session ended without a terminal snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Polling cancelled")]
    Cancelled,

    #[error("Status query failed: {0}")]
    Service(#[from] ServiceError),
}

/// Drives one job to a terminal state by repeated status queries.
#[derive(Debug, Clone, Copy)]
pub struct JobPoller {
    interval: Duration,
}

impl Default for JobPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl JobPoller {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll until the job leaves `{uploading, executing}` or reports an
    /// error, and return that snapshot.
    ///
    /// No query is issued after a terminal snapshot or after `cancel`
    /// fires. A failed query ends the session.
    pub async fn wait(
        &self,
        service: &dyn JobService,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> Result<Job, PollError> {
        let mut polls = 0u32;

        loop {
            let job = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                result = service.job_status(handle) => result?,
            };
            polls += 1;

            if !job.is_pending() {
                tracing::debug!(
                    job_id = %job.id,
                    status = %job.status,
                    polls,
                    "Job reached terminal state",
                );
                return Ok(job);
            }

            tracing::debug!(job_id = %job.id, status = %job.status, polls, "Job still running");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
