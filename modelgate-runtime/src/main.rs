//! modelgate-server: launch the serving runtime from a persisted
//! configuration document.
//!
//! Usage: modelgate-server --config-path config.json [--single-threaded]
//!
//! Environment:
//! - MODELGATE_CONFIG_PATH - configuration document (overridden by the flag)
//! - MODELGATE_PROCESSOR   - step processor identity (default "loopback",
//!   or "worker" when a worker command is set)
//! - MODELGATE_WORKER_CMD  - external inference worker command to spawn
//! - MODELGATE_WORKER_SOCKET - worker socket path

use anyhow::Context;
use tracing::info;

use modelgate_runtime::{run_main, LaunchOptions, ThreadingMode, WORKER_PROCESSOR};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modelgate_runtime=info,tower_http=debug".into()),
        )
        .init();

    let mut config_path = std::env::var("MODELGATE_CONFIG_PATH").ok();
    let mut single_threaded = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config-path" => config_path = args.next(),
            "--single-threaded" => single_threaded = true,
            other => anyhow::bail!("unknown argument '{other}'"),
        }
    }
    let config_path = config_path
        .context("configuration path required (--config-path or MODELGATE_CONFIG_PATH)")?;

    let mut options = LaunchOptions::from_file(&config_path);
    if single_threaded {
        options = options.threading(ThreadingMode::SingleThreaded);
    }
    if let Ok(command) = std::env::var("MODELGATE_WORKER_CMD") {
        options = options.worker_command(command).processor(WORKER_PROCESSOR);
    }
    if let Ok(socket) = std::env::var("MODELGATE_WORKER_SOCKET") {
        options = options.worker_socket(socket);
    }
    if let Ok(processor) = std::env::var("MODELGATE_PROCESSOR") {
        options = options.processor(processor);
    }

    info!(config_path = config_path, "Starting modelgate server");
    run_main(options, |addr| async move {
        info!(%addr, "Server ready");
    })?;
    Ok(())
}
