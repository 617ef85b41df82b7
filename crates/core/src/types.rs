use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle used to query a submitted job.
///
/// For the HTTP service this is the job's status URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle(pub String);

impl JobHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a remote job.
///
/// `Uploading` and `Executing` are the only states the poller waits in.
/// The last four variants are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Uploading,
    Executing,
    Completed,
    Canceled,
    Aborted,
    Errored,
}

impl JobStatus {
    /// `true` while the remote system is still working on the job.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Uploading | Self::Executing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Uploading => "uploading",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Aborted => "aborted",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Artifact / Job
// ---------------------------------------------------------------------------

/// One output file produced by a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Name of the step that produced this artifact.
    pub step: String,
    /// Position within the step's output list.
    pub ordinal: usize,
    /// Display name reported by the service (usually the file name).
    pub name: String,
    /// Location the content can be fetched from.
    pub url: String,
}

/// Immutable snapshot of a remote job as last reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub handle: JobHandle,
    pub status: JobStatus,
    /// Job-level error reported by the service, if any.
    pub error: Option<String>,
    /// Step name to ordered artifact list. Empty until the job completes.
    #[serde(default)]
    pub results: BTreeMap<String, Vec<Artifact>>,
}

impl Job {
    /// Iterate every artifact, step by step, in ordinal order.
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.results.values().flat_map(|list| list.iter())
    }

    pub fn artifact_count(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    /// `true` when the poller should keep waiting on this snapshot.
    pub fn is_pending(&self) -> bool {
        self.error.is_none() && self.status.is_active()
    }
}
