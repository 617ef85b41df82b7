//! Per-file processing: submit, poll, materialize, report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hotfolder_core::config::WatchConfig;
use hotfolder_core::error::PipelineError;
use hotfolder_core::service::{JobService, JobSubmission, UploadFile};
use hotfolder_core::types::{Job, JobStatus};
use tokio_util::sync::CancellationToken;

use crate::events::{EventLine, WatchEvent};
use crate::materializer::Materializer;
use crate::paths::PathTable;
use crate::poller::{JobPoller, PollError};

/// Multipart field name the input file is uploaded under.
pub const UPLOAD_FIELD: &str = "file";

/// Takes one settled file through the whole pipeline.
///
/// The path must already be marked in flight. Whatever the outcome, it is
/// released again before the outcome is reported, and every outcome is
/// reported on the event line.
#[derive(Clone)]
pub struct Dispatcher {
    service: Arc<dyn JobService>,
    config: Arc<WatchConfig>,
    paths: PathTable,
    line: EventLine,
    materializer: Materializer,
    poller: JobPoller,
}

impl Dispatcher {
    pub fn new(
        service: Arc<dyn JobService>,
        config: Arc<WatchConfig>,
        paths: PathTable,
        line: EventLine,
    ) -> Self {
        let materializer =
            Materializer::new(Arc::clone(&service), config.output.clone(), config.preserve);
        let poller = JobPoller::new(config.poll_interval);
        Self {
            service,
            config,
            paths,
            line,
            materializer,
            poller,
        }
    }

    /// Process `path` to completion or failure.
    pub async fn process(&self, path: PathBuf, cancel: CancellationToken) {
        let job = match self.run_job(&path, &cancel).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Processing failed");
                self.paths.release(&path);
                self.line.emit(WatchEvent::Error(e));
                return;
            }
        };

        let outcomes = self.materializer.materialize(&path, Arc::new(job)).await;
        self.paths.release(&path);

        for outcome in outcomes {
            self.line.emit(match outcome {
                Ok(done) => WatchEvent::Done(done),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Materialization failed");
                    WatchEvent::Error(e)
                }
            });
        }
    }

    /// Submit and poll, returning a completed job with at least one artifact.
    async fn run_job(&self, path: &Path, cancel: &CancellationToken) -> Result<Job, PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled {
                path: path.to_path_buf(),
            });
        }

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| PipelineError::Filesystem {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let submission = JobSubmission {
            files: vec![UploadFile {
                field: UPLOAD_FIELD.to_string(),
                file_name,
                file,
            }],
            instructions: self.config.instructions.clone(),
            notify_url: self.config.notify_url.clone(),
        };

        let submitted = self
            .service
            .submit_job(submission)
            .await
            .map_err(|source| PipelineError::Submission {
                path: path.to_path_buf(),
                source,
            })?;
        if let Some(message) = submitted.error {
            return Err(remote(path, message));
        }

        tracing::info!(
            path = %path.display(),
            job_id = %submitted.id,
            status = %submitted.status,
            "Job submitted",
        );

        let job = self
            .poller
            .wait(self.service.as_ref(), &submitted.handle, cancel)
            .await
            .map_err(|e| match e {
                PollError::Cancelled => PipelineError::Cancelled {
                    path: path.to_path_buf(),
                },
                PollError::Service(source) => {
                    remote(path, format!("status query failed: {source}"))
                }
            })?;

        if let Some(message) = &job.error {
            return Err(remote(path, message.clone()));
        }
        if job.status != JobStatus::Completed {
            return Err(remote(path, format!("job ended as {}", job.status)));
        }
        if job.artifact_count() == 0 {
            return Err(remote(path, "job completed without results".to_string()));
        }

        tracing::info!(
            path = %path.display(),
            job_id = %job.id,
            artifacts = job.artifact_count(),
            "Job completed",
        );
        Ok(job)
    }
}

fn remote(path: &Path, message: String) -> PipelineError {
    PipelineError::RemoteJob {
        path: path.to_path_buf(),
        message,
    }
}
