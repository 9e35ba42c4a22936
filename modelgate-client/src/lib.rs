//! One-shot validation client.
//!
//! Issues exactly one HTTP request against a running serving instance and
//! returns the textual response body. No retries; a single overall request
//! timeout guards against a hung server. Request failures are surfaced to
//! the caller, which is expected to terminate the process with a non-zero
//! exit code.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Overall deadline for the single validation request.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Raw endpoint the validation request posts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEndpoint {
    Json,
    Nd4j,
    Numpy,
}

impl RawEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Json => "/raw/json",
            Self::Nd4j => "/raw/nd4j",
            Self::Numpy => "/raw/numpy",
        }
    }
}

/// Errors surfaced by the validation request.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to read attachment {}: {source}", .path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One-shot HTTP caller for a local serving instance.
pub struct ValidationClient {
    base_url: String,
    http: reqwest::Client,
}

impl ValidationClient {
    /// Client for a server on localhost at the given port.
    pub fn new(port: u16) -> Self {
        Self::with_base_url(format!("http://localhost:{port}"))
    }

    /// Client for an explicit base URL (no trailing slash).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn read_response(url: String, response: reqwest::Response) -> Result<String, ClientError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ClientError::Request { url, source })?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// POST an inline JSON record to `/raw/json` and return the body.
    pub async fn post_json(&self, body: &Value) -> Result<String, ClientError> {
        let url = self.url(RawEndpoint::Json.path());
        debug!(url = url, "Sending validation request");

        let response = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Request {
                url: url.clone(),
                source,
            })?;

        let body = Self::read_response(url, response).await?;
        info!(bytes = body.len(), "Validation response received");
        Ok(body)
    }

    /// POST one file attachment per tensor name to a raw tensor endpoint
    /// and return the body.
    pub async fn post_tensor_files(
        &self,
        endpoint: RawEndpoint,
        fields: &[(String, PathBuf)],
    ) -> Result<String, ClientError> {
        let url = self.url(endpoint.path());
        debug!(url = url, fields = fields.len(), "Sending validation request");

        let mut form = reqwest::multipart::Form::new();
        for (name, path) in fields {
            let data = tokio::fs::read(path)
                .await
                .map_err(|source| ClientError::Attachment {
                    path: path.clone(),
                    source,
                })?;
            let file_name = file_name_of(path);
            form = form.part(
                name.clone(),
                reqwest::multipart::Part::bytes(data).file_name(file_name),
            );
        }

        let response = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .multipart(form)
            .send()
            .await
            .map_err(|source| ClientError::Request {
                url: url.clone(),
                source,
            })?;

        let body = Self::read_response(url, response).await?;
        info!(bytes = body.len(), "Validation response received");
        Ok(body)
    }

    /// GET `/health`, for use as a startup probe.
    pub async fn health(&self) -> Result<String, ClientError> {
        let url = self.url("/health");
        let response = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|source| ClientError::Request {
                url: url.clone(),
                source,
            })?;
        Self::read_response(url, response).await
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_formats() {
        let client = ValidationClient::new(40000);
        assert_eq!(client.base_url(), "http://localhost:40000");
        assert_eq!(client.url("/raw/json"), "http://localhost:40000/raw/json");

        let client = ValidationClient::with_base_url("http://10.0.0.2:8080");
        assert_eq!(client.url("/health"), "http://10.0.0.2:8080/health");
    }

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(RawEndpoint::Json.path(), "/raw/json");
        assert_eq!(RawEndpoint::Nd4j.path(), "/raw/nd4j");
        assert_eq!(RawEndpoint::Numpy.path(), "/raw/numpy");
    }

    #[test]
    fn test_file_name_fallback() {
        assert_eq!(file_name_of(Path::new("/tmp/sample.bin")), "sample.bin");
        assert_eq!(file_name_of(Path::new("/")), "attachment");
    }

    #[tokio::test]
    async fn test_missing_attachment_is_client_side_error() {
        let client = ValidationClient::new(40000);
        let err = client
            .post_tensor_files(
                RawEndpoint::Nd4j,
                &[("a".to_string(), PathBuf::from("/nonexistent/input.bin"))],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Attachment { .. }));
    }
}
