//! Watch configuration and job instructions.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default minimum time without writes before a file counts as stable.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(500);
/// Default period of the debounce tick.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
/// Default spacing between job status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What the service should do with each uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobInstructions {
    /// Use a template stored on the service.
    Template { template_id: String },
    /// Inline step graph, step name to processor-specific parameters.
    Steps(serde_json::Map<String, serde_json::Value>),
}

impl JobInstructions {
    pub fn template(template_id: impl Into<String>) -> Self {
        Self::Template {
            template_id: template_id.into(),
        }
    }

    /// Load an inline step graph from a JSON file.
    ///
    /// The top level must be an object mapping step names to step
    /// definitions.
    pub fn from_steps_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadSteps {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_steps_json(&content).map_err(|source| ConfigError::ParseSteps {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse an inline step graph from JSON text.
    pub fn from_steps_json(content: &str) -> Result<Self, serde_json::Error> {
        let steps: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content)?;
        Ok(Self::Steps(steps))
    }
}

/// Configuration for one watch session.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Directory whose files are submitted.
    pub input: PathBuf,
    /// Directory that receives artifacts (and preserved originals).
    pub output: PathBuf,
    /// Keep watching `input` for new files after the startup scan.
    pub watch: bool,
    pub instructions: JobInstructions,
    /// URL the service calls when a job finishes.
    pub notify_url: Option<String>,
    /// Move originals into `output` instead of deleting them.
    pub preserve: bool,
    /// Skip the startup scan of files already in `input`.
    pub skip_existing: bool,
    pub quiet_window: Duration,
    pub tick_interval: Duration,
    pub poll_interval: Duration,
}

impl WatchConfig {
    /// Create a scan-only, preserving configuration with default timings.
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        instructions: JobInstructions,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            watch: false,
            instructions,
            notify_url: None,
            preserve: true,
            skip_existing: false,
            quiet_window: DEFAULT_QUIET_WINDOW,
            tick_interval: DEFAULT_TICK_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Check that both directories exist and differ.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.input.is_dir() {
            return Err(ConfigError::MissingDirectory {
                role: "Input",
                path: self.input.clone(),
            });
        }
        if !self.output.is_dir() {
            return Err(ConfigError::MissingDirectory {
                role: "Output",
                path: self.output.clone(),
            });
        }
        if same_directory(&self.input, &self.output) {
            return Err(ConfigError::SameDirectory(self.input.clone()));
        }
        Ok(())
    }
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Invalid watch configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{role} directory does not exist: {path}")]
    MissingDirectory { role: &'static str, path: PathBuf },

    #[error("Input and output directory are both: {0}")]
    SameDirectory(PathBuf),

    #[error("Error reading template file {path}: {source}")]
    ReadSteps {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing template file {path}: {source}")]
    ParseSteps {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn new_uses_default_timings() {
        let config = WatchConfig::new("/in", "/out", JobInstructions::template("tpl"));
        assert!(!config.watch);
        assert!(config.preserve);
        assert_eq!(config.quiet_window, Duration::from_millis(500));
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn validate_rejects_missing_input() {
        let out = tempfile::tempdir().unwrap();
        let config = WatchConfig::new(
            out.path().join("nope"),
            out.path(),
            JobInstructions::template("tpl"),
        );
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingDirectory { role: "Input", .. }));
    }

    #[test]
    fn validate_rejects_same_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = WatchConfig::new(dir.path(), dir.path(), JobInstructions::template("tpl"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SameDirectory(_))
        ));
    }

    #[test]
    fn validate_accepts_distinct_directories() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let config = WatchConfig::new(input.path(), output.path(), JobInstructions::template("t"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn steps_file_is_parsed_as_object() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"resize": {{"robot": "/image/resize", "width": 75, "use": ":original"}}}}"#
        )
        .unwrap();

        let instructions = JobInstructions::from_steps_file(file.path()).unwrap();
        match instructions {
            JobInstructions::Steps(steps) => {
                assert_eq!(steps["resize"]["robot"], "/image/resize");
                assert_eq!(steps["resize"]["width"], 75);
            }
            other => panic!("Expected Steps, got {other:?}"),
        }
    }

    #[test]
    fn steps_file_must_be_an_object() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2, 3]").unwrap();
        assert!(matches!(
            JobInstructions::from_steps_file(file.path()),
            Err(ConfigError::ParseSteps { .. })
        ));
    }
}
