//! Modelgate configuration library
//!
//! Provides the inference configuration model consumed by the serving
//! runtime:
//! - Model descriptors (artifact path, tensor names and types)
//! - Serving options (port, data formats)
//! - Pipeline steps (model inference, column transforms)
//! - JSON persistence of the assembled document
//!
//! Every entity is immutable once built; construction goes through fluent
//! builders that enforce the document invariants up front, so a persisted
//! configuration is always valid for the launcher to consume.

pub mod error;
pub mod model;
pub mod persist;
pub mod pipeline;
pub mod schema;
pub mod serving;
pub mod transform;

// Re-export commonly used items
pub use error::ConfigError;
pub use model::{ModelDescriptor, ModelDescriptorBuilder, ModelType, TensorType};
pub use persist::ConfigPersister;
pub use pipeline::{
    InferenceConfiguration, InferenceConfigurationBuilder, ModelInferenceStep, PipelineStep,
    TransformStep,
};
pub use schema::{Column, ColumnType, Schema, SchemaBuilder};
pub use serving::{DataFormat, ServingConfig, ServingConfigBuilder, DEFAULT_LISTEN_HOST};
pub use transform::{ColumnOp, TransformDefinition, TransformDefinitionBuilder};
