//! Model descriptors: which artifact to load and how its tensors are shaped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Scalar element type of an input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TensorType {
    Float,
    Double,
    Int32,
    Int64,
}

/// Kind of model artifact the serving engine should load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelType {
    TensorFlow,
    MultiLayerNetwork,
    ComputationGraph,
}

impl std::str::FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TENSOR_FLOW" | "TENSORFLOW" => Ok(Self::TensorFlow),
            "MULTI_LAYER_NETWORK" => Ok(Self::MultiLayerNetwork),
            "COMPUTATION_GRAPH" => Ok(Self::ComputationGraph),
            other => Err(format!("unknown model type '{other}'")),
        }
    }
}

/// Immutable description of one model: artifact location, declared input
/// tensors and their scalar types, and ordered output tensor names.
///
/// Built via [`ModelDescriptor::builder`]; `build()` enforces that every
/// typed input is also a declared input name, that names are duplicate-free,
/// and that the artifact exists on disk at assembly time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    loading_path: PathBuf,
    model_type: ModelType,
    input_names: Vec<String>,
    input_types: BTreeMap<String, TensorType>,
    output_names: Vec<String>,
}

impl ModelDescriptor {
    pub fn builder() -> ModelDescriptorBuilder {
        ModelDescriptorBuilder::default()
    }

    pub fn loading_path(&self) -> &Path {
        &self.loading_path
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    /// Declared scalar type of an input, if one was given.
    pub fn input_type(&self, name: &str) -> Option<TensorType> {
        self.input_types.get(name).copied()
    }

    pub fn input_types(&self) -> &BTreeMap<String, TensorType> {
        &self.input_types
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }
}

/// Fluent builder for [`ModelDescriptor`].
#[derive(Debug, Default)]
pub struct ModelDescriptorBuilder {
    loading_path: Option<PathBuf>,
    model_type: Option<ModelType>,
    input_names: Vec<String>,
    input_types: BTreeMap<String, TensorType>,
    output_names: Vec<String>,
}

impl ModelDescriptorBuilder {
    pub fn loading_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.loading_path = Some(path.into());
        self
    }

    pub fn model_type(mut self, model_type: ModelType) -> Self {
        self.model_type = Some(model_type);
        self
    }

    /// Declare an input tensor together with its scalar type.
    pub fn input(mut self, name: impl Into<String>, tensor_type: TensorType) -> Self {
        let name = name.into();
        self.input_types.insert(name.clone(), tensor_type);
        self.input_names.push(name);
        self
    }

    /// Declare an input tensor without a scalar type.
    pub fn input_name(mut self, name: impl Into<String>) -> Self {
        self.input_names.push(name.into());
        self
    }

    /// Declare the scalar type of an input named separately. The name must
    /// also be declared via `input` or `input_name` or `build()` fails.
    pub fn tensor_type(mut self, name: impl Into<String>, tensor_type: TensorType) -> Self {
        self.input_types.insert(name.into(), tensor_type);
        self
    }

    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.output_names.push(name.into());
        self
    }

    /// Validate and freeze the descriptor.
    pub fn build(self) -> Result<ModelDescriptor, ConfigError> {
        let loading_path = self
            .loading_path
            .ok_or(ConfigError::MissingField("loading_path"))?;
        let model_type = self
            .model_type
            .ok_or(ConfigError::MissingField("model_type"))?;

        if self.input_names.is_empty() {
            return Err(ConfigError::Empty("input_names"));
        }
        if self.output_names.is_empty() {
            return Err(ConfigError::Empty("output_names"));
        }
        check_unique(&self.input_names, "input")?;
        check_unique(&self.output_names, "output")?;

        // Every typed input must be a declared input name.
        for name in self.input_types.keys() {
            if !self.input_names.iter().any(|n| n == name) {
                return Err(ConfigError::UnknownInput(name.clone()));
            }
        }

        // Artifact acquisition is the caller's concern; assembly only
        // checks the artifact is actually there.
        if !loading_path.exists() {
            return Err(ConfigError::MissingArtifact(loading_path));
        }

        tracing::debug!(
            path = %loading_path.display(),
            inputs = self.input_names.len(),
            outputs = self.output_names.len(),
            "Model descriptor assembled"
        );

        Ok(ModelDescriptor {
            loading_path,
            model_type,
            input_names: self.input_names,
            input_types: self.input_types,
            output_names: self.output_names,
        })
    }
}

fn check_unique(names: &[String], kind: &'static str) -> Result<(), ConfigError> {
    for (i, name) in names.iter().enumerate() {
        if names[..i].contains(name) {
            return Err(ConfigError::DuplicateName {
                kind,
                name: name.clone(),
            });
        }
    }
    Ok(())
}
