//! In-memory job service shared by the pipeline integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use hotfolder_core::config::{JobInstructions, WatchConfig};
use hotfolder_core::error::ServiceError;
use hotfolder_core::service::{JobService, JobSubmission};
use hotfolder_core::types::{Artifact, Job, JobHandle, JobStatus};
use hotfolder_pipeline::WatchEvent;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Step every fake job produces one artifact for.
pub const STEP: &str = "resize";

/// Scripted stand-in for the remote service.
///
/// Each submission becomes a job that reports `executing` for a configured
/// number of status queries and then `completed` with one artifact named
/// after the uploaded file. Artifact content is `resized:<upload content>`.
#[derive(Default)]
pub struct FakeService {
    executing_polls: usize,
    never_complete: bool,
    reject: HashSet<String>,
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    submissions: Vec<String>,
    jobs: HashMap<String, FakeJob>,
}

struct FakeJob {
    file_name: String,
    content: Vec<u8>,
    polls: usize,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `executing` for the first `polls` status queries.
    pub fn executing_for(mut self, polls: usize) -> Self {
        self.executing_polls = polls;
        self
    }

    /// Never leave `executing`.
    pub fn never_completing(mut self) -> Self {
        self.never_complete = true;
        self
    }

    /// Fail the submission of files named `name`.
    pub fn rejecting(mut self, name: &str) -> Self {
        self.reject.insert(name.to_string());
        self
    }

    /// File names submitted so far, in order.
    pub fn submissions(&self) -> Vec<String> {
        self.state.lock().unwrap().submissions.clone()
    }

    fn job(&self, id: &str, status: JobStatus, file_name: &str) -> Job {
        let mut results = BTreeMap::new();
        if status == JobStatus::Completed {
            results.insert(
                STEP.to_string(),
                vec![Artifact {
                    step: STEP.to_string(),
                    ordinal: 0,
                    name: file_name.to_string(),
                    url: format!("https://tmp.test/{id}/{file_name}"),
                }],
            );
        }
        Job {
            id: id.to_string(),
            handle: JobHandle::new(format!("https://api.test/assemblies/{id}")),
            status,
            error: None,
            results,
        }
    }
}

#[async_trait]
impl JobService for FakeService {
    async fn submit_job(&self, submission: JobSubmission) -> Result<Job, ServiceError> {
        let mut upload = submission
            .files
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Decode("no file".into()))?;

        self.state
            .lock()
            .unwrap()
            .submissions
            .push(upload.file_name.clone());

        if self.reject.contains(&upload.file_name) {
            return Err(ServiceError::Api {
                status: 400,
                code: "FILE_FILTER_DECLINED_FILE".into(),
                message: format!("{} was declined", upload.file_name),
            });
        }

        let mut content = Vec::new();
        upload.file.read_to_end(&mut content).await?;

        let mut state = self.state.lock().unwrap();
        let id = format!("job-{}", state.jobs.len() + 1);
        state.jobs.insert(
            id.clone(),
            FakeJob {
                file_name: upload.file_name.clone(),
                content,
                polls: 0,
            },
        );
        Ok(self.job(&id, JobStatus::Uploading, &upload.file_name))
    }

    async fn job_status(&self, handle: &JobHandle) -> Result<Job, ServiceError> {
        let id = handle
            .as_str()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let (file_name, polls) = {
            let mut state = self.state.lock().unwrap();
            let job = state
                .jobs
                .get_mut(&id)
                .ok_or_else(|| ServiceError::Decode(format!("unknown job {id}")))?;
            job.polls += 1;
            (job.file_name.clone(), job.polls)
        };

        let status = if self.never_complete || polls <= self.executing_polls {
            JobStatus::Executing
        } else {
            JobStatus::Completed
        };
        Ok(self.job(&id, status, &file_name))
    }

    async fn download_artifact(
        &self,
        artifact: &Artifact,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, ServiceError> {
        let id = artifact.url.split('/').nth(3).unwrap_or_default().to_string();
        let body = {
            let state = self.state.lock().unwrap();
            let job = state
                .jobs
                .get(&id)
                .ok_or_else(|| ServiceError::Decode(format!("unknown job {id}")))?;
            let mut body = b"resized:".to_vec();
            body.extend_from_slice(&job.content);
            body
        };
        sink.write_all(&body).await?;
        Ok(body.len() as u64)
    }
}

/// Scan-only, preserving configuration with a short poll interval.
pub fn scan_config(input: &Path, output: &Path) -> WatchConfig {
    let mut config = WatchConfig::new(input, output, JobInstructions::template("tpl-resize"));
    config.poll_interval = Duration::from_millis(20);
    config
}

/// Receive events until the line closes, failing after `limit`.
pub async fn collect(events: &mut mpsc::UnboundedReceiver<WatchEvent>, limit: Duration) -> Vec<WatchEvent> {
    tokio::time::timeout(limit, async {
        let mut collected = Vec::new();
        while let Some(event) = events.recv().await {
            collected.push(event);
        }
        collected
    })
    .await
    .expect("event line did not close in time")
}
