//! End-to-end serving harness.
//!
//! Reproduces the full single-shot flow: assemble a configuration, print
//! and persist the document, launch the embedded server, and once it is
//! ready fire one validation request at it. The response body goes to
//! stdout and the process exits 0; any validation failure exits 1.
//!
//! Modes (first argument or MODELGATE_MODE):
//! - `transform` (default): string-column pipeline validated over /raw/json
//! - `model`: model descriptor from the environment, validated over
//!   /raw/nd4j with generated sample attachments
//!
//! Environment:
//! - MODELGATE_CONFIG_PATH  - where the document is persisted (config.json)
//! - MODEL_PATH, MODEL_TYPE - model artifact in model mode
//! - MODELGATE_INPUT_NAMES, MODELGATE_OUTPUT_NAMES - comma-separated tensor
//!   names in model mode
//! - MODELGATE_WORKER_CMD   - external inference worker command; when set,
//!   model steps run through the `worker` processor instead of `loopback`

use anyhow::Context;
use rand::Rng;
use std::path::PathBuf;
use tracing::{error, info};

use modelgate_client::{RawEndpoint, ValidationClient};
use modelgate_config::{
    ConfigPersister, DataFormat, InferenceConfiguration, ModelDescriptor, ModelInferenceStep,
    ModelType, Schema, ServingConfig, TensorType, TransformDefinition, TransformStep,
};
use modelgate_runtime::{run_main, LaunchOptions, WORKER_PROCESSOR};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modelgate_harness=info,modelgate_runtime=info".into()),
        )
        .init();

    let mode = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MODELGATE_MODE").ok())
        .unwrap_or_else(|| "transform".to_string());

    match mode.as_str() {
        "transform" => run_transform_flow(),
        "model" => run_model_flow(),
        other => anyhow::bail!("unknown mode '{other}' (expected 'transform' or 'model')"),
    }
}

/// Random serving port, mirroring the single-shot examples this harness
/// generalizes. Collisions surface as a bind error at launch.
fn random_port() -> u16 {
    rand::thread_rng().gen_range(10_000..=65_535)
}

fn config_path() -> PathBuf {
    std::env::var("MODELGATE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"))
}

/// Persist the document (printing it first) and return the path.
fn persist(config: &InferenceConfiguration) -> anyhow::Result<PathBuf> {
    println!("{}", ConfigPersister::to_json(config)?);
    let path = config_path();
    ConfigPersister::save(config, &path)?;
    Ok(path)
}

fn run_transform_flow() -> anyhow::Result<()> {
    let port = random_port();

    let schema = Schema::builder().string_column("first").build()?;
    let transform = TransformDefinition::builder()
        .append_string("first", "two")
        .build()?;
    let config = InferenceConfiguration::builder()
        .transform_step(TransformStep::new(schema.clone(), transform, schema)?)
        .serving(ServingConfig::builder().http_port(port).build()?)
        .build()?;

    let path = persist(&config)?;
    info!(port = port, path = %path.display(), "Launching transform pipeline");

    run_main(LaunchOptions::from_file(&path), move |addr| async move {
        let client = ValidationClient::new(addr.port());
        match client.post_json(&serde_json::json!({ "first": "value" })).await {
            Ok(body) => {
                println!("{body}");
                std::process::exit(0);
            }
            Err(e) => {
                error!(error = %e, "Validation request failed");
                std::process::exit(1);
            }
        }
    })?;
    Ok(())
}

fn run_model_flow() -> anyhow::Result<()> {
    let model_path = std::env::var("MODEL_PATH").context("MODEL_PATH is required in model mode")?;
    let model_type: ModelType = std::env::var("MODEL_TYPE")
        .unwrap_or_else(|_| "MULTI_LAYER_NETWORK".to_string())
        .parse()
        .map_err(anyhow::Error::msg)?;
    let input_names = name_list("MODELGATE_INPUT_NAMES", "image_array");
    let output_names = name_list("MODELGATE_OUTPUT_NAMES", "output");

    let mut builder = ModelDescriptor::builder()
        .loading_path(&model_path)
        .model_type(model_type);
    for name in &input_names {
        builder = builder.input(name, TensorType::Float);
    }
    for name in &output_names {
        builder = builder.output(name);
    }
    let model = builder.build()?;

    let port = random_port();
    let config = InferenceConfiguration::builder()
        .model_step(ModelInferenceStep::new(model, 1)?)
        .serving(
            ServingConfig::builder()
                .http_port(port)
                .input_format(DataFormat::Nd4j)
                .output_format(DataFormat::Nd4j)
                .build()?,
        )
        .build()?;

    let path = persist(&config)?;

    // One sample attachment per declared input.
    let fields = write_sample_attachments(&input_names)?;

    let mut options = LaunchOptions::from_file(&path);
    if let Ok(command) = std::env::var("MODELGATE_WORKER_CMD") {
        options = options.worker_command(command).processor(WORKER_PROCESSOR);
    }

    info!(port = port, model = model_path, "Launching model pipeline");
    run_main(options, move |addr| async move {
        let client = ValidationClient::new(addr.port());
        match client.post_tensor_files(RawEndpoint::Nd4j, &fields).await {
            Ok(body) => {
                println!("{body}");
                std::process::exit(0);
            }
            Err(e) => {
                error!(error = %e, "Validation request failed");
                std::process::exit(1);
            }
        }
    })?;
    Ok(())
}

fn name_list(var: &str, default: &str) -> Vec<String> {
    std::env::var(var)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Write a random sample payload file per tensor name and return the
/// (name, path) pairs for the multipart request.
fn write_sample_attachments(names: &[String]) -> anyhow::Result<Vec<(String, PathBuf)>> {
    let mut fields = Vec::with_capacity(names.len());
    for name in names {
        let file_stem: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let path = std::env::temp_dir().join(format!("modelgate-sample-{file_stem}.bin"));

        let mut payload = vec![0u8; 64];
        rand::thread_rng().fill(payload.as_mut_slice());
        std::fs::write(&path, &payload)
            .with_context(|| format!("failed to write sample attachment {}", path.display()))?;

        fields.push((name.clone(), path));
    }
    Ok(fields)
}
