//! Launch and serve error taxonomy.

use thiserror::Error;

use crate::workers::WorkerError;

/// Errors surfaced by the launcher and the running server.
#[derive(Error, Debug)]
pub enum ServingError {
    #[error("configuration error: {0}")]
    Config(#[from] modelgate_config::ConfigError),

    #[error("launch options name no configuration source")]
    MissingConfigSource,

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server i/o failure: {0}")]
    Serve(#[source] std::io::Error),

    #[error("unknown step processor '{0}'")]
    UnknownProcessor(String),

    #[error("worker bridge error: {0}")]
    Worker(#[from] WorkerError),

    #[error("failed to build tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
