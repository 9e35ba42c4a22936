//! Bridge to an external inference worker process.
//!
//! The worker process is the serving engine proper: it loads the model
//! artifact and runs inference. This bridge spawns it (or attaches to an
//! already-running one), and exchanges length-prefixed JSON messages over a
//! Unix domain socket.
//!
//! # Protocol
//!
//! - Request: 4-byte big-endian length + JSON [`InferRequest`]
//! - Response: 4-byte big-endian length + JSON [`InferResponse`]
//!
//! Tensor payloads travel base64-encoded inside the JSON body; the bridge
//! never interprets the bytes.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use modelgate_config::{ModelInferenceStep, ModelType};

/// Default socket path for the inference worker.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/modelgate_worker.sock";

/// Maximum time to wait for the worker to create its socket (in milliseconds)
const STARTUP_TIMEOUT_MS: u64 = 10_000;

/// Interval between connection retry attempts (in milliseconds)
const RETRY_INTERVAL_MS: u64 = 50;

/// Errors that can occur on the worker bridge.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("failed to spawn worker process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("connection to worker socket failed after timeout")]
    ConnectionTimeout,

    #[error("failed to serialize request: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IPC communication error: {0}")]
    Ipc(String),

    #[error("inference timeout: worker did not respond within {0:?}")]
    InferenceTimeout(Duration),
}

/// Inference request sent to the worker.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InferRequest {
    /// Correlation identifier echoed back by the worker.
    pub request_id: String,

    /// Artifact the worker should have loaded for this step.
    pub model_path: String,

    /// Kind of artifact.
    pub model_type: ModelType,

    /// Named input tensors, base64-encoded. Empty in record mode.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tensors: BTreeMap<String, String>,

    /// Inline JSON record. Absent in tensor mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<Map<String, Value>>,
}

impl InferRequest {
    fn base(step: &ModelInferenceStep) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            model_path: step.model().loading_path().display().to_string(),
            model_type: step.model().model_type(),
            tensors: BTreeMap::new(),
            record: None,
        }
    }

    /// Request carrying an inline JSON record.
    pub fn for_record(step: &ModelInferenceStep, record: Map<String, Value>) -> Self {
        Self {
            record: Some(record),
            ..Self::base(step)
        }
    }

    /// Request carrying base64-encoded tensor buffers.
    pub fn for_tensors(step: &ModelInferenceStep, tensors: BTreeMap<String, String>) -> Self {
        Self {
            tensors,
            ..Self::base(step)
        }
    }
}

/// Inference response read back from the worker.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InferResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Named output tensors, base64-encoded.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tensors: BTreeMap<String, String>,

    /// Output record in record mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<Map<String, Value>>,

    /// Worker-side failure message, if inference failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Handle to the external inference worker: the spawned process (if this
/// bridge owns it) plus the connected socket.
pub struct InferenceWorker {
    process: Option<Child>,
    socket: UnixStream,
    socket_path: String,
}

impl InferenceWorker {
    /// Spawn the worker process and connect to its Unix socket.
    ///
    /// The command is invoked with the socket path as its single argument
    /// and killed when the bridge is dropped. Any stale socket file from a
    /// previous run is removed first.
    pub async fn start(command: &str, socket_path: &str) -> Result<Self, WorkerError> {
        info!(command = %command, socket_path = %socket_path, "Starting inference worker");

        if Path::new(socket_path).exists() {
            debug!(socket_path = %socket_path, "Removing stale socket file");
            let _ = std::fs::remove_file(socket_path);
        }

        let child = Command::new(command)
            .arg(socket_path)
            .kill_on_drop(true)
            .spawn()?;

        info!(pid = child.id(), "Inference worker process spawned");

        let socket = Self::connect_with_retry(socket_path).await?;
        info!(socket_path = %socket_path, "Connected to inference worker socket");

        Ok(Self {
            process: Some(child),
            socket,
            socket_path: socket_path.to_string(),
        })
    }

    /// Attach to a worker that is already listening on `socket_path`.
    ///
    /// The process lifecycle stays with whoever started the worker.
    pub async fn connect(socket_path: &str) -> Result<Self, WorkerError> {
        let socket = Self::connect_with_retry(socket_path).await?;
        info!(socket_path = %socket_path, "Attached to running inference worker");
        Ok(Self {
            process: None,
            socket,
            socket_path: socket_path.to_string(),
        })
    }

    async fn connect_with_retry(socket_path: &str) -> Result<UnixStream, WorkerError> {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(STARTUP_TIMEOUT_MS);
        let retry_interval = Duration::from_millis(RETRY_INTERVAL_MS);

        loop {
            match UnixStream::connect(socket_path).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    if start.elapsed() > timeout {
                        error!(
                            socket_path = %socket_path,
                            elapsed_ms = start.elapsed().as_millis(),
                            "Connection timeout waiting for inference worker"
                        );
                        return Err(WorkerError::ConnectionTimeout);
                    }
                    debug!(socket_path = %socket_path, error = %e, "Socket not ready, retrying");
                    tokio::time::sleep(retry_interval).await;
                }
            }
        }
    }

    /// Send one request and await the response over IPC.
    pub async fn infer(&mut self, request: &InferRequest) -> Result<InferResponse, WorkerError> {
        debug!(request_id = %request.request_id, "Sending inference request");

        let payload = serde_json::to_vec(request)?;

        // Assemble the frame in one buffer so the length prefix and payload
        // hit the socket together.
        let mut frame = BytesMut::with_capacity(4 + payload.len());
        frame.put_u32(payload.len() as u32);
        frame.put_slice(&payload);

        self.socket
            .write_all(&frame)
            .await
            .map_err(|e| WorkerError::Ipc(format!("failed to write frame: {e}")))?;
        self.socket
            .flush()
            .await
            .map_err(|e| WorkerError::Ipc(format!("failed to flush: {e}")))?;

        debug!(payload_len = payload.len(), "Request sent, awaiting response");

        let mut len_buf = [0u8; 4];
        self.socket
            .read_exact(&mut len_buf)
            .await
            .map_err(|e| WorkerError::Ipc(format!("failed to read response length: {e}")))?;
        let resp_len = u32::from_be_bytes(len_buf) as usize;

        let mut resp_buf = vec![0u8; resp_len];
        self.socket
            .read_exact(&mut resp_buf)
            .await
            .map_err(|e| WorkerError::Ipc(format!("failed to read response: {e}")))?;

        debug!(response_len = resp_len, "Response received");

        Ok(serde_json::from_slice::<InferResponse>(&resp_buf)?)
    }

    /// `infer` with an overall deadline, so a hung worker cannot block the
    /// calling task indefinitely.
    pub async fn infer_with_timeout(
        &mut self,
        request: &InferRequest,
        timeout: Duration,
    ) -> Result<InferResponse, WorkerError> {
        match tokio::time::timeout(timeout, self.infer(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis(),
                    request_id = %request.request_id,
                    "Inference request timed out"
                );
                Err(WorkerError::InferenceTimeout(timeout))
            }
        }
    }

    /// Whether the worker process is still running. Always true for an
    /// attached worker whose process this bridge does not own.
    pub fn is_alive(&mut self) -> bool {
        match self.process.as_mut() {
            None => true,
            Some(child) => matches!(child.try_wait(), Ok(None)),
        }
    }

    /// Process ID of the spawned worker, if owned and still running.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(Child::id)
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    /// Terminate an owned worker process and remove its socket file.
    pub async fn shutdown(mut self) -> Result<(), WorkerError> {
        if let Some(process) = self.process.as_mut() {
            info!(pid = process.id(), "Shutting down inference worker");
            if let Err(e) = process.kill().await {
                warn!(error = %e, "Error during worker shutdown");
            }
        }
        if Path::new(&self.socket_path).exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::net::UnixListener;

    use modelgate_config::{ModelDescriptor, TensorType};

    fn model_step(artifact: &tempfile::NamedTempFile) -> ModelInferenceStep {
        let model = ModelDescriptor::builder()
            .loading_path(artifact.path())
            .model_type(ModelType::TensorFlow)
            .input("a", TensorType::Float)
            .output("out")
            .build()
            .unwrap();
        ModelInferenceStep::new(model, 1).unwrap()
    }

    #[test]
    fn test_request_serialization_skips_empty_fields() {
        let mut artifact = tempfile::NamedTempFile::new().unwrap();
        artifact.write_all(b"weights").unwrap();
        let step = model_step(&artifact);

        let mut record = Map::new();
        record.insert("a".to_string(), Value::String("x".to_string()));
        let request = InferRequest::for_record(&step, record);

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"record\""));
        assert!(!json.contains("\"tensors\""));
        assert!(json.contains("TENSOR_FLOW"));
    }

    #[test]
    fn test_response_deserialization_defaults() {
        let response: InferResponse = serde_json::from_str(r#"{"error": "model not loaded"}"#).unwrap();
        assert_eq!(response.error.as_deref(), Some("model not loaded"));
        assert!(response.tensors.is_empty());
        assert!(response.record.is_none());
    }

    /// Drives the full frame protocol against an in-process echo worker.
    #[tokio::test]
    async fn test_frame_protocol_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("worker.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        // Echo worker: answer every request with its tensors and id.
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut len_buf = [0u8; 4];
            stream.read_exact(&mut len_buf).await.unwrap();
            let mut buf = vec![0u8; u32::from_be_bytes(len_buf) as usize];
            stream.read_exact(&mut buf).await.unwrap();
            let request: InferRequest = serde_json::from_slice(&buf).unwrap();

            let response = InferResponse {
                request_id: Some(request.request_id),
                tensors: request.tensors,
                record: None,
                error: None,
            };
            let payload = serde_json::to_vec(&response).unwrap();
            stream
                .write_all(&(payload.len() as u32).to_be_bytes())
                .await
                .unwrap();
            stream.write_all(&payload).await.unwrap();
        });

        let mut artifact = tempfile::NamedTempFile::new().unwrap();
        artifact.write_all(b"weights").unwrap();
        let step = model_step(&artifact);

        let mut worker = InferenceWorker::connect(socket_path.to_str().unwrap())
            .await
            .unwrap();

        let mut tensors = BTreeMap::new();
        tensors.insert("a".to_string(), "AAECAw==".to_string());
        let request = InferRequest::for_tensors(&step, tensors.clone());
        let response = worker
            .infer_with_timeout(&request, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(response.request_id.as_deref(), Some(request.request_id.as_str()));
        assert_eq!(response.tensors, tensors);
        assert!(worker.is_alive());
    }

    #[test]
    fn test_connect_timeout_error_message() {
        let err = WorkerError::InferenceTimeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
    }

    /// Integration test that requires a real worker binary on PATH.
    /// Run with: cargo test --package modelgate-runtime -- --ignored
    #[tokio::test]
    #[ignore = "Requires an external inference worker binary"]
    async fn test_spawned_worker_round_trip() {
        let command =
            std::env::var("MODELGATE_WORKER_CMD").unwrap_or_else(|_| "modelgate-worker".into());
        let mut worker = InferenceWorker::start(&command, DEFAULT_SOCKET_PATH)
            .await
            .expect("Failed to start worker");

        let mut artifact = tempfile::NamedTempFile::new().unwrap();
        artifact.write_all(b"weights").unwrap();
        let step = model_step(&artifact);

        let request = InferRequest::for_tensors(&step, BTreeMap::new());
        let response = worker.infer(&request).await.expect("Inference call failed");
        assert!(response.error.is_none());

        worker.shutdown().await.expect("Shutdown failed");
    }
}
