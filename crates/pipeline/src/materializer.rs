//! Result download and original-file disposal.
//!
//! Every artifact of a completed job is downloaded on its own task. Only
//! once all of them have finished is the original input moved into the
//! output directory (preserve mode) or deleted. A failed download does not
//! undo siblings already written.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use hotfolder_core::error::{PipelineError, ServiceError};
use hotfolder_core::naming::{artifact_file_name, original_file_name};
use hotfolder_core::service::JobService;
use hotfolder_core::types::{Artifact, Job};
use tokio::io::AsyncWriteExt;

use crate::events::JobDone;

/// Writes job results into the output directory.
#[derive(Clone)]
pub struct Materializer {
    service: Arc<dyn JobService>,
    output: PathBuf,
    preserve: bool,
}

impl Materializer {
    pub fn new(service: Arc<dyn JobService>, output: impl Into<PathBuf>, preserve: bool) -> Self {
        Self {
            service,
            output: output.into(),
            preserve,
        }
    }

    /// Output path for an artifact.
    pub fn artifact_path(&self, artifact: &Artifact) -> PathBuf {
        self.output
            .join(artifact_file_name(&artifact.step, artifact.ordinal, &artifact.name))
    }

    /// Download every artifact of `job`, then dispose of `source`.
    ///
    /// Returns one outcome per artifact, followed by the disposal error if
    /// disposal failed.
    pub async fn materialize(
        &self,
        source: &Path,
        job: Arc<Job>,
    ) -> Vec<Result<JobDone, PipelineError>> {
        let downloads: Vec<_> = job
            .artifacts()
            .map(|artifact| {
                let dest = self.artifact_path(artifact);
                let task = tokio::spawn(download(
                    Arc::clone(&self.service),
                    artifact.clone(),
                    dest.clone(),
                ));
                (artifact.clone(), dest, task)
            })
            .collect();

        let (meta, tasks): (Vec<_>, Vec<_>) = downloads
            .into_iter()
            .map(|(artifact, dest, task)| ((artifact, dest), task))
            .unzip();

        let mut outcomes = Vec::with_capacity(meta.len() + 1);
        for ((artifact, dest), joined) in meta.into_iter().zip(join_all(tasks).await) {
            let result = match joined {
                Ok(result) => result,
                Err(e) => Err(ServiceError::Transport(format!("download task failed: {e}"))),
            };
            outcomes.push(match result {
                Ok(bytes) => {
                    tracing::info!(
                        job_id = %job.id,
                        step = %artifact.step,
                        ordinal = artifact.ordinal,
                        output = %dest.display(),
                        bytes,
                        "Artifact downloaded",
                    );
                    Ok(JobDone {
                        source: source.to_path_buf(),
                        job: Arc::clone(&job),
                        artifact,
                        output: dest,
                    })
                }
                Err(source_err) => {
                    tracing::warn!(
                        job_id = %job.id,
                        url = %artifact.url,
                        error = %source_err,
                        "Artifact download failed",
                    );
                    Err(PipelineError::Download {
                        path: dest,
                        url: artifact.url,
                        source: source_err,
                    })
                }
            });
        }

        if let Err(e) = self.dispose(source).await {
            outcomes.push(Err(e));
        }

        outcomes
    }

    /// Move the original into the output directory, or delete it.
    pub async fn dispose(&self, source: &Path) -> Result<(), PipelineError> {
        let result = if self.preserve {
            let base = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let dest = self.output.join(original_file_name(&base));
            tracing::debug!(source = %source.display(), dest = %dest.display(), "Preserving original");
            tokio::fs::rename(source, &dest).await
        } else {
            tracing::debug!(source = %source.display(), "Removing original");
            tokio::fs::remove_file(source).await
        };

        result.map_err(|e| PipelineError::Disposal {
            path: source.to_path_buf(),
            source: e,
        })
    }
}

/// Stream one artifact into `dest`. A partial file is removed on failure.
async fn download(
    service: Arc<dyn JobService>,
    artifact: Artifact,
    dest: PathBuf,
) -> Result<u64, ServiceError> {
    let mut file = tokio::fs::File::create(&dest).await?;
    let result = match service.download_artifact(&artifact, &mut file).await {
        Ok(bytes) => file.flush().await.map(|()| bytes).map_err(ServiceError::from),
        Err(e) => Err(e),
    };
    if result.is_err() {
        drop(file);
        let _ = tokio::fs::remove_file(&dest).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use hotfolder_core::service::JobSubmission;
    use hotfolder_core::types::{JobHandle, JobStatus};
    use tokio::io::AsyncWrite;

    use super::*;

    /// Serves artifact content keyed by URL; unknown URLs fail.
    struct StaticContent(BTreeMap<String, Vec<u8>>);

    #[async_trait]
    impl JobService for StaticContent {
        async fn submit_job(&self, _submission: JobSubmission) -> Result<Job, ServiceError> {
            unreachable!()
        }

        async fn job_status(&self, _handle: &JobHandle) -> Result<Job, ServiceError> {
            unreachable!()
        }

        async fn download_artifact(
            &self,
            artifact: &Artifact,
            sink: &mut (dyn AsyncWrite + Unpin + Send),
        ) -> Result<u64, ServiceError> {
            let body = self.0.get(&artifact.url).ok_or_else(|| ServiceError::Api {
                status: 404,
                code: "NOT_FOUND".into(),
                message: artifact.url.clone(),
            })?;
            sink.write_all(body).await?;
            Ok(body.len() as u64)
        }
    }

    fn artifact(step: &str, ordinal: usize, name: &str) -> Artifact {
        Artifact {
            step: step.into(),
            ordinal,
            name: name.into(),
            url: format!("https://tmp.test/{step}/{ordinal}"),
        }
    }

    fn completed_job(artifacts: Vec<Artifact>) -> Arc<Job> {
        let mut results: BTreeMap<String, Vec<Artifact>> = BTreeMap::new();
        for a in artifacts {
            results.entry(a.step.clone()).or_default().push(a);
        }
        Arc::new(Job {
            id: "job-1".into(),
            handle: JobHandle::new("h"),
            status: JobStatus::Completed,
            error: None,
            results,
        })
    }

    struct Dirs {
        input: tempfile::TempDir,
        output: tempfile::TempDir,
    }

    fn dirs_with_source(name: &str) -> (Dirs, PathBuf) {
        let dirs = Dirs {
            input: tempfile::tempdir().unwrap(),
            output: tempfile::tempdir().unwrap(),
        };
        let source = dirs.input.path().join(name);
        std::fs::write(&source, b"original").unwrap();
        (dirs, source)
    }

    #[tokio::test]
    async fn downloads_all_artifacts_and_preserves_original() {
        let (dirs, source) = dirs_with_source("a.jpg");
        let content = StaticContent(BTreeMap::from([
            ("https://tmp.test/resize/0".to_string(), b"small".to_vec()),
            ("https://tmp.test/thumb/0".to_string(), b"tiny-0".to_vec()),
            ("https://tmp.test/thumb/1".to_string(), b"tiny-1".to_vec()),
        ]));
        let materializer = Materializer::new(Arc::new(content), dirs.output.path(), true);
        let job = completed_job(vec![
            artifact("resize", 0, "a.jpg"),
            artifact("thumb", 0, "a.jpg"),
            artifact("thumb", 1, "a b.jpg"),
        ]);

        let outcomes = materializer.materialize(&source, job).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(Result::is_ok));
        let out = dirs.output.path();
        assert_eq!(std::fs::read(out.join("resize_0_a.jpg")).unwrap(), b"small");
        assert_eq!(std::fs::read(out.join("thumb_0_a.jpg")).unwrap(), b"tiny-0");
        assert_eq!(std::fs::read(out.join("thumb_1_a-b.jpg")).unwrap(), b"tiny-1");
        assert_eq!(std::fs::read(out.join("-original_0_a.jpg")).unwrap(), b"original");
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn non_preserve_mode_deletes_original() {
        let (dirs, source) = dirs_with_source("a.jpg");
        let content = StaticContent(BTreeMap::from([(
            "https://tmp.test/resize/0".to_string(),
            b"small".to_vec(),
        )]));
        let materializer = Materializer::new(Arc::new(content), dirs.output.path(), false);

        let outcomes = materializer
            .materialize(&source, completed_job(vec![artifact("resize", 0, "a.jpg")]))
            .await;

        assert_eq!(outcomes.len(), 1);
        assert!(!source.exists());
        assert!(!dirs.output.path().join("-original_0_a.jpg").exists());
    }

    #[tokio::test]
    async fn failed_download_keeps_siblings_and_still_disposes() {
        let (dirs, source) = dirs_with_source("a.jpg");
        let content = StaticContent(BTreeMap::from([(
            "https://tmp.test/resize/0".to_string(),
            b"small".to_vec(),
        )]));
        let materializer = Materializer::new(Arc::new(content), dirs.output.path(), true);
        let job = completed_job(vec![
            artifact("resize", 0, "a.jpg"),
            artifact("resize", 1, "missing.jpg"),
        ]);

        let outcomes = materializer.materialize(&source, job).await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_ok());
        assert_matches!(&outcomes[1], Err(PipelineError::Download { url, .. }) if url == "https://tmp.test/resize/1");
        assert!(dirs.output.path().join("resize_0_a.jpg").exists());
        assert!(!dirs.output.path().join("resize_1_missing.jpg").exists());
        assert!(dirs.output.path().join("-original_0_a.jpg").exists());
    }

    #[tokio::test]
    async fn missing_original_reports_disposal_error() {
        let (dirs, source) = dirs_with_source("a.jpg");
        std::fs::remove_file(&source).unwrap();
        let content = StaticContent(BTreeMap::from([(
            "https://tmp.test/resize/0".to_string(),
            b"small".to_vec(),
        )]));
        let materializer = Materializer::new(Arc::new(content), dirs.output.path(), false);

        let outcomes = materializer
            .materialize(&source, completed_job(vec![artifact("resize", 0, "a.jpg")]))
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_ok());
        assert_matches!(&outcomes[1], Err(PipelineError::Disposal { path, .. }) if path == &source);
    }
}
