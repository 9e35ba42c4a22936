//! Pipeline execution over live requests.
//!
//! Transform steps run in-process; model-inference steps go through the
//! selected step processor.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use modelgate_config::{ColumnOp, InferenceConfiguration, PipelineStep, TransformStep};

use crate::registry::{ProcessError, StepProcessor};

/// Request-time pipeline failures. `Process` is a server-side fault; the
/// other variants are malformed requests.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("missing input column '{0}'")]
    MissingColumn(String),

    #[error("column '{0}' must be a string")]
    NotAString(String),

    #[error("pipeline has no model step")]
    NoModelStep,

    #[error("missing input tensor '{0}'")]
    MissingTensor(String),

    #[error("unknown input tensor '{0}'")]
    UnknownTensor(String),

    #[error("step processor failure: {0}")]
    Process(#[from] ProcessError),
}

impl PipelineError {
    /// Whether the failure is the client's (bad request) rather than ours.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Process(_))
    }
}

/// Apply one transform step to a record in place.
fn apply_transform(step: &TransformStep, record: &mut Map<String, Value>) -> Result<(), PipelineError> {
    // Every declared input column must be present; extra fields pass through.
    for name in step.input_schema().names() {
        if !record.contains_key(name) {
            return Err(PipelineError::MissingColumn(name.to_string()));
        }
    }

    for op in step.transform().ops() {
        match op {
            ColumnOp::AppendString { column, suffix } => {
                match record.get_mut(column) {
                    Some(Value::String(s)) => s.push_str(suffix),
                    Some(_) => return Err(PipelineError::NotAString(column.clone())),
                    None => return Err(PipelineError::MissingColumn(column.clone())),
                }
            }
            ColumnOp::RenameColumn { from, to } => {
                let value = record
                    .remove(from)
                    .ok_or_else(|| PipelineError::MissingColumn(from.clone()))?;
                record.insert(to.clone(), value);
            }
            ColumnOp::RemoveColumn { column } => {
                record.remove(column);
            }
        }
    }
    Ok(())
}

/// Run an inline JSON record through every pipeline step in order.
pub async fn run_record(
    config: &InferenceConfiguration,
    processor: &dyn StepProcessor,
    mut record: Map<String, Value>,
) -> Result<Map<String, Value>, PipelineError> {
    for step in config.steps() {
        match step {
            PipelineStep::Transform(transform) => apply_transform(transform, &mut record)?,
            PipelineStep::ModelInference(model) => {
                record = processor.process_record(model, record).await?;
            }
        }
    }
    Ok(record)
}

/// Run named tensor buffers through the pipeline's model step.
///
/// Tensor payloads are opaque to the runtime, so transform steps do not
/// apply here; the first model step consumes the buffers after the field
/// names are checked against its declared inputs.
pub async fn run_tensors(
    config: &InferenceConfiguration,
    processor: &dyn StepProcessor,
    inputs: BTreeMap<String, Vec<u8>>,
) -> Result<BTreeMap<String, Vec<u8>>, PipelineError> {
    let step = config.model_step().ok_or(PipelineError::NoModelStep)?;
    let declared = step.model().input_names();

    for name in declared {
        if !inputs.contains_key(name) {
            return Err(PipelineError::MissingTensor(name.clone()));
        }
    }
    for name in inputs.keys() {
        if !declared.iter().any(|d| d == name) {
            return Err(PipelineError::UnknownTensor(name.clone()));
        }
    }

    Ok(processor.process_tensors(step, inputs).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LoopbackProcessor;
    use modelgate_config::{
        ModelDescriptor, ModelInferenceStep, ModelType, Schema, ServingConfig, TensorType,
        TransformDefinition,
    };
    use std::io::Write;

    fn transform_config() -> InferenceConfiguration {
        let input = Schema::builder()
            .string_column("a")
            .string_column("b")
            .build()
            .unwrap();
        let output = Schema::builder()
            .string_column("a")
            .string_column("renamed")
            .build()
            .unwrap();
        let transform = TransformDefinition::builder()
            .append_string("a", "!")
            .rename_column("b", "renamed")
            .build()
            .unwrap();
        InferenceConfiguration::builder()
            .transform_step(TransformStep::new(input, transform, output).unwrap())
            .serving(ServingConfig::builder().http_port(40000).build().unwrap())
            .build()
            .unwrap()
    }

    fn record(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::String((*v).to_string())))
            .collect()
    }

    #[tokio::test]
    async fn test_transform_pipeline() {
        let config = transform_config();
        let out = run_record(&config, &LoopbackProcessor, record(&[("a", "x"), ("b", "y")]))
            .await
            .unwrap();

        assert_eq!(out["a"], "x!");
        assert_eq!(out["renamed"], "y");
        assert!(!out.contains_key("b"));
    }

    #[tokio::test]
    async fn test_missing_column_is_client_error() {
        let config = transform_config();
        let err = run_record(&config, &LoopbackProcessor, record(&[("a", "x")]))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn(ref c) if c == "b"));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_non_string_append_rejected() {
        let config = transform_config();
        let mut rec = record(&[("b", "y")]);
        rec.insert("a".to_string(), Value::from(42));
        let err = run_record(&config, &LoopbackProcessor, rec).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotAString(_)));
    }

    #[tokio::test]
    async fn test_extra_fields_pass_through() {
        let config = transform_config();
        let mut rec = record(&[("a", "x"), ("b", "y")]);
        rec.insert("extra".to_string(), Value::from(1));
        let out = run_record(&config, &LoopbackProcessor, rec).await.unwrap();
        assert_eq!(out["extra"], 1);
    }

    #[tokio::test]
    async fn test_tensors_require_model_step() {
        let config = transform_config();
        let err = run_tensors(&config, &LoopbackProcessor, BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoModelStep));
    }

    #[tokio::test]
    async fn test_tensor_name_validation() {
        let mut artifact = tempfile::NamedTempFile::new().unwrap();
        artifact.write_all(b"weights").unwrap();
        let model = ModelDescriptor::builder()
            .loading_path(artifact.path())
            .model_type(ModelType::TensorFlow)
            .input("a", TensorType::Float)
            .output("out")
            .build()
            .unwrap();
        let config = InferenceConfiguration::builder()
            .model_step(ModelInferenceStep::new(model, 1).unwrap())
            .serving(ServingConfig::builder().http_port(40000).build().unwrap())
            .build()
            .unwrap();

        let err = run_tensors(&config, &LoopbackProcessor, BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingTensor(_)));

        let mut inputs = BTreeMap::new();
        inputs.insert("a".to_string(), vec![1u8]);
        inputs.insert("stray".to_string(), vec![2u8]);
        let err = run_tensors(&config, &LoopbackProcessor, inputs)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownTensor(ref n) if n == "stray"));
    }
}
