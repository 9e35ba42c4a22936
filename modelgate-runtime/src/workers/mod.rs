//! Worker bridge to the external inference engine.
//!
//! Model inference runs out of process; this module owns the IPC seam.

mod inference_worker;

pub use inference_worker::{
    InferRequest, InferResponse, InferenceWorker, WorkerError, DEFAULT_SOCKET_PATH,
};
