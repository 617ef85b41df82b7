//! Assembly response wire types.
//!
//! The API describes a job as a JSON object whose `ok` field carries the
//! status code (`ASSEMBLY_EXECUTING`, ...) and whose optional `error`
//! field carries a job-level failure. This module deserializes that shape
//! and maps it onto [`hotfolder_core::types::Job`].

use std::collections::BTreeMap;

use hotfolder_core::error::ServiceError;
use hotfolder_core::types::{Artifact, Job, JobHandle, JobStatus};
use serde::Deserialize;

pub const OK_UPLOADING: &str = "ASSEMBLY_UPLOADING";
pub const OK_EXECUTING: &str = "ASSEMBLY_EXECUTING";
pub const OK_COMPLETED: &str = "ASSEMBLY_COMPLETED";
pub const OK_CANCELED: &str = "ASSEMBLY_CANCELED";
pub const OK_ABORTED: &str = "REQUEST_ABORTED";

/// Body of an assembly create/status response.
#[derive(Debug, Clone, Deserialize)]
pub struct AssemblyResponse {
    #[serde(default)]
    pub ok: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub assembly_id: Option<String>,
    #[serde(default)]
    pub assembly_url: Option<String>,
    #[serde(default)]
    pub assembly_ssl_url: Option<String>,
    #[serde(default)]
    pub results: Option<BTreeMap<String, Vec<ResultFile>>>,
}

/// One result file inside `results`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultFile {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub ssl_url: Option<String>,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(default)]
    pub message: String,
}

/// Map the `ok`/`error` pair onto a [`JobStatus`].
///
/// An error always wins. A missing `ok` means the job has been accepted
/// but not started. Unknown codes are rejected.
pub fn parse_status(ok: Option<&str>, error: Option<&str>) -> Result<JobStatus, ServiceError> {
    if error.is_some() {
        return Ok(JobStatus::Errored);
    }
    match ok {
        None => Ok(JobStatus::Submitted),
        Some(OK_UPLOADING) => Ok(JobStatus::Uploading),
        Some(OK_EXECUTING) => Ok(JobStatus::Executing),
        Some(OK_COMPLETED) => Ok(JobStatus::Completed),
        Some(OK_CANCELED) => Ok(JobStatus::Canceled),
        Some(OK_ABORTED) => Ok(JobStatus::Aborted),
        Some(other) => Err(ServiceError::Decode(format!("unknown job status '{other}'"))),
    }
}

impl AssemblyResponse {
    /// Convert the wire response into a [`Job`] snapshot.
    pub fn into_job(self) -> Result<Job, ServiceError> {
        let status = parse_status(self.ok.as_deref(), self.error.as_deref())?;

        let error = self.error.map(|code| match self.message.as_deref() {
            Some(message) if !message.is_empty() => format!("{code}: {message}"),
            _ => code,
        });

        let handle = match (self.assembly_ssl_url, self.assembly_url) {
            (Some(url), _) | (None, Some(url)) => url,
            // Failed submissions may come back without a URL.
            (None, None) if error.is_some() => String::new(),
            (None, None) => {
                return Err(ServiceError::Decode(
                    "response carries no assembly URL".to_string(),
                ))
            }
        };

        let mut results = BTreeMap::new();
        for (step, files) in self.results.unwrap_or_default() {
            let mut artifacts = Vec::with_capacity(files.len());
            for (ordinal, file) in files.into_iter().enumerate() {
                let url = file.ssl_url.or(file.url).ok_or_else(|| {
                    ServiceError::Decode(format!("result {step}[{ordinal}] has no URL"))
                })?;
                artifacts.push(Artifact {
                    step: step.clone(),
                    ordinal,
                    name: file.name,
                    url,
                });
            }
            results.insert(step, artifacts);
        }

        Ok(Job {
            id: self.assembly_id.unwrap_or_default(),
            handle: JobHandle::new(handle),
            status,
            error,
            results,
        })
    }
}

/// Parse a response body into a [`Job`].
pub fn parse_job(body: &str) -> Result<Job, ServiceError> {
    let response: AssemblyResponse =
        serde_json::from_str(body).map_err(|e| ServiceError::Decode(e.to_string()))?;
    response.into_job()
}
