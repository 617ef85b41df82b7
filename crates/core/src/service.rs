//! The remote job service seen from the pipeline.
//!
//! The pipeline never talks HTTP itself. It hands files and instructions to
//! a [`JobService`] and reads back [`Job`] snapshots.

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::config::JobInstructions;
use crate::error::ServiceError;
use crate::types::{Artifact, Job, JobHandle};

/// A file to stream to the service as part of a submission.
///
/// The open handle is moved into the submission and dropped by the service
/// once streaming finishes.
#[derive(Debug)]
pub struct UploadFile {
    /// Multipart field name.
    pub field: String,
    /// File name reported to the service.
    pub file_name: String,
    pub file: tokio::fs::File,
}

/// Everything needed to create one job.
#[derive(Debug)]
pub struct JobSubmission {
    pub files: Vec<UploadFile>,
    pub instructions: JobInstructions,
    /// URL the service notifies when the job finishes.
    pub notify_url: Option<String>,
}

/// Client for a remote job-processing service.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Upload the files and create a job. Returns the initial snapshot.
    async fn submit_job(&self, submission: JobSubmission) -> Result<Job, ServiceError>;

    /// Fetch the current snapshot of a job.
    async fn job_status(&self, handle: &JobHandle) -> Result<Job, ServiceError>;

    /// Stream an artifact's content into `sink`. Returns the bytes written.
    async fn download_artifact(
        &self,
        artifact: &Artifact,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, ServiceError>;
}
