//! Step processors and the processor registry.
//!
//! A step processor executes one model-inference step. The registry maps
//! processor identity strings (a launch option) to implementations, so the
//! launcher can select how model steps run without the handlers caring.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use modelgate_config::ModelInferenceStep;

use crate::workers::{InferRequest, InferenceWorker, WorkerError};

/// Identity of the built-in echo processor.
pub const LOOPBACK_PROCESSOR: &str = "loopback";

/// Identity of the external-worker processor.
pub const WORKER_PROCESSOR: &str = "worker";

/// Default per-request deadline for the worker processor.
const WORKER_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors raised while executing a model-inference step.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("inference worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("worker rejected request: {0}")]
    Rejected(String),

    #[error("worker returned an undecodable tensor for '{name}': {source}")]
    TensorDecode {
        name: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("worker response carried no {0}")]
    EmptyResponse(&'static str),
}

/// Executes one model-inference step, either over an inline JSON record or
/// over opaque named tensor buffers.
#[async_trait]
pub trait StepProcessor: Send + Sync {
    async fn process_record(
        &self,
        step: &ModelInferenceStep,
        record: Map<String, Value>,
    ) -> Result<Map<String, Value>, ProcessError>;

    async fn process_tensors(
        &self,
        step: &ModelInferenceStep,
        inputs: BTreeMap<String, Vec<u8>>,
    ) -> Result<BTreeMap<String, Vec<u8>>, ProcessError>;
}

/// Concurrent map of processor identity to implementation.
pub struct ProcessorRegistry {
    processors: DashMap<String, Arc<dyn StepProcessor>>,
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorRegistry {
    /// Registry with the built-in loopback processor pre-registered.
    pub fn new() -> Self {
        let registry = Self {
            processors: DashMap::new(),
        };
        registry.register(LOOPBACK_PROCESSOR, Arc::new(LoopbackProcessor));
        registry
    }

    pub fn register(&self, name: impl Into<String>, processor: Arc<dyn StepProcessor>) {
        let name = name.into();
        tracing::debug!(processor = name, "Step processor registered");
        self.processors.insert(name, processor);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StepProcessor>> {
        self.processors.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processors.contains_key(name)
    }
}

/// Echo processor: returns the record unchanged, and maps each output name
/// to an input buffer (by position, clamped to the last input). Lets the
/// harness and tests exercise the full request path without an external
/// engine.
pub struct LoopbackProcessor;

#[async_trait]
impl StepProcessor for LoopbackProcessor {
    async fn process_record(
        &self,
        _step: &ModelInferenceStep,
        record: Map<String, Value>,
    ) -> Result<Map<String, Value>, ProcessError> {
        Ok(record)
    }

    async fn process_tensors(
        &self,
        step: &ModelInferenceStep,
        inputs: BTreeMap<String, Vec<u8>>,
    ) -> Result<BTreeMap<String, Vec<u8>>, ProcessError> {
        let model = step.model();
        let ordered: Vec<&Vec<u8>> = model
            .input_names()
            .iter()
            .filter_map(|name| inputs.get(name))
            .collect();
        if ordered.is_empty() {
            return Err(ProcessError::EmptyResponse("input tensors"));
        }

        let mut outputs = BTreeMap::new();
        for (i, name) in model.output_names().iter().enumerate() {
            let buffer = ordered[i.min(ordered.len() - 1)];
            outputs.insert(name.clone(), buffer.clone());
        }
        Ok(outputs)
    }
}

/// Processor that forwards model steps to the external inference worker.
///
/// The worker connection is serialized behind a mutex; request parallelism
/// across workers is the external engine's concern, not the bridge's.
pub struct WorkerProcessor {
    worker: Mutex<InferenceWorker>,
    timeout: Duration,
}

impl WorkerProcessor {
    pub fn new(worker: InferenceWorker) -> Self {
        Self {
            worker: Mutex::new(worker),
            timeout: Duration::from_secs(WORKER_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn round_trip(&self, request: InferRequest) -> Result<crate::workers::InferResponse, ProcessError> {
        let mut worker = self.worker.lock().await;
        let response = worker.infer_with_timeout(&request, self.timeout).await?;
        if let Some(message) = response.error {
            return Err(ProcessError::Rejected(message));
        }
        Ok(response)
    }
}

#[async_trait]
impl StepProcessor for WorkerProcessor {
    async fn process_record(
        &self,
        step: &ModelInferenceStep,
        record: Map<String, Value>,
    ) -> Result<Map<String, Value>, ProcessError> {
        let response = self
            .round_trip(InferRequest::for_record(step, record))
            .await?;
        response
            .record
            .ok_or(ProcessError::EmptyResponse("record"))
    }

    async fn process_tensors(
        &self,
        step: &ModelInferenceStep,
        inputs: BTreeMap<String, Vec<u8>>,
    ) -> Result<BTreeMap<String, Vec<u8>>, ProcessError> {
        let encoded = inputs
            .into_iter()
            .map(|(name, data)| (name, BASE64.encode(data)))
            .collect();
        let response = self
            .round_trip(InferRequest::for_tensors(step, encoded))
            .await?;

        if response.tensors.is_empty() {
            return Err(ProcessError::EmptyResponse("tensors"));
        }
        let mut outputs = BTreeMap::new();
        for (name, data) in response.tensors {
            let decoded = BASE64
                .decode(&data)
                .map_err(|source| ProcessError::TensorDecode {
                    name: name.clone(),
                    source,
                })?;
            outputs.insert(name, decoded);
        }
        Ok(outputs)
    }
}
