//! Configuration error taxonomy.

use std::path::PathBuf;
use thiserror::Error;

use crate::schema::ColumnType;

/// Errors raised while assembling, persisting or loading a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("http port must be in 1..=65535, got {0}")]
    InvalidPort(u16),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("tensor type declared for unknown input '{0}'")]
    UnknownInput(String),

    #[error("model artifact not found at {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("model step parallelism must be >= 1")]
    InvalidParallelism,

    #[error("transform references unknown column '{0}'")]
    UnknownColumn(String),

    #[error("column '{column}' is {actual:?}, transform op expects {expected:?}")]
    ColumnTypeMismatch {
        column: String,
        expected: ColumnType,
        actual: ColumnType,
    },

    #[error("rename target column '{0}' already exists")]
    ColumnExists(String),

    #[error("declared output schema does not match the schema produced by the transform")]
    SchemaMismatch,

    #[error("pipeline must contain at least one step")]
    EmptyPipeline,

    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration document error: {0}")]
    Json(#[from] serde_json::Error),
}
