//! REST client for the assembly endpoints.
//!
//! Wraps job submission, status retrieval and result download using
//! [`reqwest`], and exposes them through [`JobService`].

use async_trait::async_trait;
use hotfolder_core::config::JobInstructions;
use hotfolder_core::error::ServiceError;
use hotfolder_core::service::{JobService, JobSubmission};
use hotfolder_core::types::{Artifact, Job, JobHandle};
use reqwest::multipart::{Form, Part};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::messages::{parse_job, ApiErrorBody};
use crate::signing::{sign_params, SignedParams};

/// Base URL of the public API.
pub const DEFAULT_ENDPOINT: &str = "https://api2.transloadit.com";

/// Value of the client identification header.
const CLIENT_HEADER: &str = concat!("hotfolder:", env!("CARGO_PKG_VERSION"));

/// Account credentials and API location.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub auth_key: String,
    pub auth_secret: String,
    /// Base HTTP URL, e.g. `https://api2.transloadit.com`.
    pub endpoint: String,
}

impl ClientConfig {
    /// Credentials against [`DEFAULT_ENDPOINT`].
    pub fn new(auth_key: impl Into<String>, auth_secret: impl Into<String>) -> Self {
        Self {
            auth_key: auth_key.into(),
            auth_secret: auth_secret.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

/// Errors constructing a [`TransloaditClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to create client: missing {0}")]
    MissingCredential(&'static str),
}

/// HTTP client bound to one account.
pub struct TransloaditClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl TransloaditClient {
    /// Create a client. Both key and secret must be non-empty.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: ClientConfig) -> Result<Self, ClientError> {
        if config.auth_key.is_empty() {
            return Err(ClientError::MissingCredential("auth key"));
        }
        if config.auth_secret.is_empty() {
            return Err(ClientError::MissingCredential("auth secret"));
        }
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Resolve a path against the endpoint. Absolute URLs pass through.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.config.endpoint.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        }
    }

    fn sign(&self, params: serde_json::Map<String, serde_json::Value>) -> SignedParams {
        sign_params(
            &self.config.auth_key,
            &self.config.auth_secret,
            params,
            chrono::Utc::now(),
            rand::random(),
        )
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. On failure the body
    /// is decoded as an API error when possible.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        let (code, message) = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(api) => (api.error, api.message),
            Err(_) => ("HTTP_ERROR".to_string(), body),
        };
        Err(ServiceError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }

    async fn parse_response(response: reqwest::Response) -> Result<Job, ServiceError> {
        let response = Self::ensure_success(response).await?;
        let body = response.text().await.map_err(transport)?;
        parse_job(&body)
    }
}

/// Build the unsigned params document for a submission.
pub fn submission_params(
    instructions: &JobInstructions,
    notify_url: Option<&str>,
) -> serde_json::Map<String, serde_json::Value> {
    let mut params = serde_json::Map::new();
    match instructions {
        JobInstructions::Template { template_id } => {
            params.insert("template_id".to_string(), template_id.clone().into());
        }
        JobInstructions::Steps(steps) if !steps.is_empty() => {
            params.insert("steps".to_string(), serde_json::Value::Object(steps.clone()));
        }
        JobInstructions::Steps(_) => {}
    }
    if let Some(url) = notify_url {
        params.insert("notify_url".to_string(), url.into());
    }
    params
}

fn transport(e: reqwest::Error) -> ServiceError {
    ServiceError::Transport(e.to_string())
}

#[async_trait]
impl JobService for TransloaditClient {
    async fn submit_job(&self, submission: JobSubmission) -> Result<Job, ServiceError> {
        let params = submission_params(
            &submission.instructions,
            submission.notify_url.as_deref(),
        );
        let signed = self.sign(params);

        let mut form = Form::new()
            .text("params", signed.params)
            .text("signature", signed.signature);
        for upload in submission.files {
            let body = reqwest::Body::wrap_stream(ReaderStream::new(upload.file));
            form = form.part(upload.field, Part::stream(body).file_name(upload.file_name));
        }

        let response = self
            .client
            .post(self.resolve_url("assemblies"))
            .header("Transloadit-Client", CLIENT_HEADER)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;

        let job = Self::parse_response(response).await?;
        tracing::debug!(job_id = %job.id, status = %job.status, "Assembly created");
        Ok(job)
    }

    async fn job_status(&self, handle: &JobHandle) -> Result<Job, ServiceError> {
        let signed = self.sign(serde_json::Map::new());

        let response = self
            .client
            .get(self.resolve_url(handle.as_str()))
            .header("Transloadit-Client", CLIENT_HEADER)
            .query(&[
                ("params", signed.params.as_str()),
                ("signature", signed.signature.as_str()),
            ])
            .send()
            .await
            .map_err(transport)?;

        Self::parse_response(response).await
    }

    async fn download_artifact(
        &self,
        artifact: &Artifact,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, ServiceError> {
        let response = self
            .client
            .get(&artifact.url)
            .send()
            .await
            .map_err(transport)?;
        let mut response = Self::ensure_success(response).await?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(transport)? {
            sink.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        sink.flush().await?;

        Ok(written)
    }
}
