use std::path::{Path, PathBuf};

use hotfolder_client::{ClientConfig, DEFAULT_ENDPOINT};
use hotfolder_core::config::{JobInstructions, WatchConfig};

/// Errors loading the worker configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value}")]
    Invalid { var: &'static str, value: String },

    #[error("Either HOTFOLDER_TEMPLATE_ID or HOTFOLDER_TEMPLATE_FILE must be set")]
    MissingInstructions,

    #[error(transparent)]
    Instructions(#[from] hotfolder_core::config::ConfigError),

    #[error("Failed to resolve working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub client: ClientConfig,
    pub watch: WatchConfig,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                   | Default                        |
    /// |---------------------------|--------------------------------|
    /// | `TRANSLOADIT_KEY`         | required                       |
    /// | `TRANSLOADIT_SECRET`      | required                       |
    /// | `TRANSLOADIT_ENDPOINT`    | `https://api2.transloadit.com` |
    /// | `HOTFOLDER_INPUT`         | `.`                            |
    /// | `HOTFOLDER_OUTPUT`        | required                       |
    /// | `HOTFOLDER_TEMPLATE_ID`   | one of id / file required      |
    /// | `HOTFOLDER_TEMPLATE_FILE` | one of id / file required      |
    /// | `HOTFOLDER_NOTIFY_URL`    | none                           |
    /// | `HOTFOLDER_WATCH`         | `false`                        |
    /// | `HOTFOLDER_PRESERVE`      | `true`                         |
    /// | `HOTFOLDER_SKIP_EXISTING` | `false`                        |
    ///
    /// Directories starting with `~` are expanded against `HOME`, and
    /// relative directories are resolved against the working directory.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(ConfigError::WorkingDirectory)?;
        Self::from_lookup(|name| std::env::var(name).ok(), &cwd)
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F, cwd: &Path) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let client = ClientConfig {
            auth_key: required("TRANSLOADIT_KEY")?,
            auth_secret: required("TRANSLOADIT_SECRET")?,
            endpoint: var("TRANSLOADIT_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        };

        let home = var("HOME");
        let input = resolve_dir(
            &var("HOTFOLDER_INPUT").unwrap_or_else(|| ".".into()),
            home.as_deref(),
            cwd,
        );
        let output = resolve_dir(&required("HOTFOLDER_OUTPUT")?, home.as_deref(), cwd);

        let instructions = match (var("HOTFOLDER_TEMPLATE_ID"), var("HOTFOLDER_TEMPLATE_FILE")) {
            (Some(id), _) => JobInstructions::template(id),
            (None, Some(file)) => {
                JobInstructions::from_steps_file(&resolve_dir(&file, home.as_deref(), cwd))?
            }
            (None, None) => return Err(ConfigError::MissingInstructions),
        };

        let mut watch = WatchConfig::new(input, output, instructions);
        watch.notify_url = var("HOTFOLDER_NOTIFY_URL");
        watch.watch = flag(&var, "HOTFOLDER_WATCH", false)?;
        watch.preserve = flag(&var, "HOTFOLDER_PRESERVE", true)?;
        watch.skip_existing = flag(&var, "HOTFOLDER_SKIP_EXISTING", false)?;

        Ok(Self { client, watch })
    }
}

fn flag<F>(var: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { var: name, value }),
        },
    }
}

/// Expand a leading `~` and make the path absolute.
fn resolve_dir(raw: &str, home: Option<&str>, cwd: &Path) -> PathBuf {
    let expanded = match (raw.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            PathBuf::from(format!("{home}{rest}"))
        }
        _ => PathBuf::from(raw),
    };
    if expanded.is_absolute() {
        expanded
    } else if expanded == Path::new(".") {
        cwd.to_path_buf()
    } else {
        cwd.join(expanded)
    }
}
