use std::path::PathBuf;

/// Errors reported by a [`JobService`](crate::service::JobService)
/// implementation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The transport failed (network, DNS, TLS, body streaming).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with a non-2xx status.
    #[error("Service error ({status}): {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// Writing fetched content to the local sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Filesystem,
    Submission,
    RemoteJob,
    Download,
    Disposal,
    Cancelled,
}

/// A failure while moving one file through the pipeline.
///
/// Every variant names the path it concerns so consumers of the error line
/// can tell files apart.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The input directory or a tracked file could not be read.
    #[error("Filesystem error on {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Uploading the file to the service failed.
    #[error("Submission of {path} failed: {source}")]
    Submission {
        path: PathBuf,
        #[source]
        source: ServiceError,
    },

    /// The service reported a job-level error or a non-completed terminal
    /// status.
    #[error("Job for {path} failed: {message}")]
    RemoteJob { path: PathBuf, message: String },

    /// Fetching or writing a result artifact failed.
    #[error("Download of {url} to {path} failed: {source}")]
    Download {
        path: PathBuf,
        url: String,
        #[source]
        source: ServiceError,
    },

    /// Renaming or deleting the original input file failed.
    #[error("Disposal of {path} failed: {source}")]
    Disposal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Polling was cancelled before the job reached a terminal state.
    #[error("Polling for {path} was cancelled")]
    Cancelled { path: PathBuf },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Filesystem { .. } => ErrorKind::Filesystem,
            Self::Submission { .. } => ErrorKind::Submission,
            Self::RemoteJob { .. } => ErrorKind::RemoteJob,
            Self::Download { .. } => ErrorKind::Download,
            Self::Disposal { .. } => ErrorKind::Disposal,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// The path this error concerns.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Filesystem { path, .. }
            | Self::Submission { path, .. }
            | Self::RemoteJob { path, .. }
            | Self::Download { path, .. }
            | Self::Disposal { path, .. }
            | Self::Cancelled { path } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = PipelineError::Cancelled {
            path: PathBuf::from("/in/a.jpg"),
        };
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(err.path(), std::path::Path::new("/in/a.jpg"));
    }

    #[test]
    fn display_includes_service_message() {
        let err = PipelineError::Submission {
            path: PathBuf::from("/in/a.jpg"),
            source: ServiceError::Api {
                status: 400,
                code: "INVALID_SIGNATURE".into(),
                message: "bad signature".into(),
            },
        };
        let text = err.to_string();
        assert!(text.contains("/in/a.jpg"));
        assert!(text.contains("INVALID_SIGNATURE"));
    }
}
