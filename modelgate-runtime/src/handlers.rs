//! HTTP surface of the serving runtime.
//!
//! Endpoints:
//! - POST /raw/json  - inline JSON record through the pipeline
//! - POST /raw/nd4j  - multipart tensor attachments to the model step
//! - POST /raw/numpy - multipart tensor attachments to the model step
//! - GET  /health    - liveness check
//! - GET  /ready     - readiness with pipeline summary
//! - GET  /config    - echo of the loaded configuration document

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::pipeline::{self, PipelineError};
use crate::state::AppState;

type HandlerError = (StatusCode, Json<Value>);

/// Build the router for a loaded configuration.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/raw/json", post(raw_json_handler))
        .route("/raw/nd4j", post(raw_tensors_handler))
        .route("/raw/numpy", post(raw_tensors_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/config", get(config_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn error_body(message: impl std::fmt::Display) -> Json<Value> {
    Json(json!({ "error": message.to_string() }))
}

fn map_pipeline_error(err: PipelineError) -> HandlerError {
    if err.is_client_error() {
        warn!(error = %err, "Rejected inference request");
        (StatusCode::BAD_REQUEST, error_body(err))
    } else {
        error!(error = %err, "Inference request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, error_body(err))
    }
}

fn selected_processor(
    state: &AppState,
) -> Result<Arc<dyn crate::registry::StepProcessor>, HandlerError> {
    state.processor().ok_or_else(|| {
        error!(processor = state.processor_id, "Selected step processor is not registered");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body("step processor not registered"),
        )
    })
}

/// Inline JSON record through every pipeline step.
async fn raw_json_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, HandlerError> {
    let Value::Object(record) = body else {
        return Err((
            StatusCode::BAD_REQUEST,
            error_body(PipelineError::NotAnObject),
        ));
    };

    let processor = selected_processor(&state)?;
    let output = pipeline::run_record(&state.config, processor.as_ref(), record)
        .await
        .map_err(map_pipeline_error)?;

    info!(fields = output.len(), "Record request served");
    Ok(Json(Value::Object(output)))
}

/// Multipart tensor attachments to the model step. Serves both /raw/nd4j
/// and /raw/numpy; field bytes are opaque to the runtime either way.
async fn raw_tensors_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, HandlerError> {
    let mut inputs: BTreeMap<String, Vec<u8>> = BTreeMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, error_body(e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name.is_empty() {
            return Err((
                StatusCode::BAD_REQUEST,
                error_body("multipart field without a name"),
            ));
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, error_body(e)))?;
        inputs.insert(name, data.to_vec());
    }

    let processor = selected_processor(&state)?;
    let outputs = pipeline::run_tensors(&state.config, processor.as_ref(), inputs)
        .await
        .map_err(map_pipeline_error)?;

    info!(tensors = outputs.len(), "Tensor request served");
    let body: serde_json::Map<String, Value> = outputs
        .into_iter()
        .map(|(name, data)| (name, Value::String(BASE64.encode(data))))
        .collect();
    Ok(Json(Value::Object(body)))
}

/// Liveness check.
async fn health_handler() -> &'static str {
    "OK"
}

/// Readiness with a pipeline summary.
async fn ready_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "port": state.config.serving().http_port(),
        "steps": state.config.steps().len(),
        "processor": state.processor_id,
        "uptime_secs": state.uptime_secs(),
    }))
}

/// Echo of the loaded configuration document.
async fn config_handler(State(state): State<Arc<AppState>>) -> Result<Json<Value>, HandlerError> {
    serde_json::to_value(&state.config)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, error_body(e)))
}
