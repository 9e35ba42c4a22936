//! Modelgate serving runtime
//!
//! Binds an embedded HTTP server to a persisted inference configuration:
//! - Raw inference endpoints (`/raw/json`, `/raw/nd4j`, `/raw/numpy`)
//! - In-process execution of transform steps
//! - Model-inference steps delegated to a pluggable step processor;
//!   the default `worker` processor bridges to an external inference
//!   engine process over a Unix domain socket
//! - A launcher owning the bind-listen-serve lifecycle with an optional
//!   ready callback, plus the `modelgate-server` binary entrypoint
//!
//! The HTTP protocol stack, model inference and tensor marshalling are all
//! external; this crate only wires the configuration document into them.

pub mod error;
pub mod handlers;
pub mod launcher;
pub mod pipeline;
pub mod registry;
pub mod state;
pub mod workers;

// Re-export commonly used items
pub use error::ServingError;
pub use launcher::{launch, run_main, ConfigStore, LaunchOptions, RunningServer, ThreadingMode};
pub use registry::{
    LoopbackProcessor, ProcessError, ProcessorRegistry, StepProcessor, WorkerProcessor,
    LOOPBACK_PROCESSOR, WORKER_PROCESSOR,
};
pub use state::AppState;
pub use workers::{InferRequest, InferResponse, InferenceWorker, WorkerError};
