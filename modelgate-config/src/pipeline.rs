//! Pipeline steps and the root inference configuration document.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::ModelDescriptor;
use crate::schema::Schema;
use crate::serving::ServingConfig;
use crate::transform::TransformDefinition;

/// A model-inference stage: one descriptor plus the worker parallelism the
/// external engine should use for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInferenceStep {
    model: ModelDescriptor,
    parallelism: u32,
}

impl ModelInferenceStep {
    /// `parallelism` is forwarded to the external engine and must be >= 1.
    pub fn new(model: ModelDescriptor, parallelism: u32) -> Result<Self, ConfigError> {
        if parallelism == 0 {
            return Err(ConfigError::InvalidParallelism);
        }
        Ok(Self { model, parallelism })
    }

    pub fn model(&self) -> &ModelDescriptor {
        &self.model
    }

    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }
}

/// A data-transform stage: input schema, the op list, and the declared
/// output schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformStep {
    input_schema: Schema,
    output_schema: Schema,
    transform: TransformDefinition,
}

impl TransformStep {
    /// Assemble a transform step, checking that applying the ops to
    /// `input_schema` yields exactly `output_schema`.
    pub fn new(
        input_schema: Schema,
        transform: TransformDefinition,
        output_schema: Schema,
    ) -> Result<Self, ConfigError> {
        let derived = transform.output_schema(&input_schema)?;
        if derived != output_schema {
            return Err(ConfigError::SchemaMismatch);
        }
        Ok(Self {
            input_schema,
            output_schema,
            transform,
        })
    }

    pub fn input_schema(&self) -> &Schema {
        &self.input_schema
    }

    pub fn output_schema(&self) -> &Schema {
        &self.output_schema
    }

    pub fn transform(&self) -> &TransformDefinition {
        &self.transform
    }
}

/// One stage of the inference pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineStep {
    ModelInference(ModelInferenceStep),
    Transform(TransformStep),
}

impl PipelineStep {
    pub fn as_model_inference(&self) -> Option<&ModelInferenceStep> {
        match self {
            Self::ModelInference(step) => Some(step),
            Self::Transform(_) => None,
        }
    }

    pub fn as_transform(&self) -> Option<&TransformStep> {
        match self {
            Self::Transform(step) => Some(step),
            Self::ModelInference(_) => None,
        }
    }
}

/// The root configuration document: ordered pipeline steps plus server
/// options. Owns every other entity and is serialized wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfiguration {
    steps: Vec<PipelineStep>,
    serving: ServingConfig,
}

impl InferenceConfiguration {
    pub fn builder() -> InferenceConfigurationBuilder {
        InferenceConfigurationBuilder::default()
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn serving(&self) -> &ServingConfig {
        &self.serving
    }

    /// First model-inference step of the pipeline, if any. The raw tensor
    /// endpoints require one.
    pub fn model_step(&self) -> Option<&ModelInferenceStep> {
        self.steps.iter().find_map(PipelineStep::as_model_inference)
    }

    /// Copy of this document with the serving port replaced, re-validated.
    pub fn with_http_port(mut self, port: u16) -> Result<Self, ConfigError> {
        self.serving = self.serving.with_http_port(port)?;
        Ok(self)
    }
}

/// Assembles pipeline steps and serving options into the root document.
#[derive(Debug, Default)]
pub struct InferenceConfigurationBuilder {
    steps: Vec<PipelineStep>,
    serving: Option<ServingConfig>,
}

impl InferenceConfigurationBuilder {
    pub fn step(mut self, step: PipelineStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn model_step(self, step: ModelInferenceStep) -> Self {
        self.step(PipelineStep::ModelInference(step))
    }

    pub fn transform_step(self, step: TransformStep) -> Self {
        self.step(PipelineStep::Transform(step))
    }

    pub fn serving(mut self, serving: ServingConfig) -> Self {
        self.serving = Some(serving);
        self
    }

    pub fn build(self) -> Result<InferenceConfiguration, ConfigError> {
        let serving = self.serving.ok_or(ConfigError::MissingField("serving"))?;
        if self.steps.is_empty() {
            return Err(ConfigError::EmptyPipeline);
        }
        Ok(InferenceConfiguration {
            steps: self.steps,
            serving,
        })
    }
}
