//! Server launcher: bind the embedded server to a persisted configuration.
//!
//! The launcher owns the whole server lifecycle for the duration of the
//! process: load document, select the step processor, bind the configured
//! port, serve. There is no retry or failure recovery; a launch failure
//! propagates to the caller and the binary exits non-zero.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use modelgate_config::{ConfigPersister, InferenceConfiguration};

use crate::error::ServingError;
use crate::handlers;
use crate::registry::{ProcessorRegistry, WorkerProcessor, LOOPBACK_PROCESSOR, WORKER_PROCESSOR};
use crate::state::AppState;
use crate::workers::{InferenceWorker, DEFAULT_SOCKET_PATH};

/// Where the launcher takes the configuration document from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStore {
    /// Re-read the persisted document from disk at launch.
    File,
    /// Use an in-memory document handed to the options directly.
    Memory,
}

/// Tokio runtime flavor used by the blocking entrypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadingMode {
    MultiThreaded,
    SingleThreaded,
}

/// Launch options for the serving runtime.
#[derive(Debug)]
pub struct LaunchOptions {
    config_path: Option<PathBuf>,
    config: Option<InferenceConfiguration>,
    store: ConfigStore,
    ha: bool,
    threading: ThreadingMode,
    port_override: Option<u16>,
    processor: String,
    worker_command: Option<String>,
    worker_socket: String,
}

impl LaunchOptions {
    /// Launch from a persisted configuration file.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(path.into()),
            config: None,
            store: ConfigStore::File,
            ha: false,
            threading: ThreadingMode::MultiThreaded,
            port_override: None,
            processor: LOOPBACK_PROCESSOR.to_string(),
            worker_command: None,
            worker_socket: DEFAULT_SOCKET_PATH.to_string(),
        }
    }

    /// Launch from an already-assembled document without touching disk.
    pub fn from_config(config: InferenceConfiguration) -> Self {
        Self {
            config_path: None,
            config: Some(config),
            store: ConfigStore::Memory,
            ha: false,
            threading: ThreadingMode::MultiThreaded,
            port_override: None,
            processor: LOOPBACK_PROCESSOR.to_string(),
            worker_command: None,
            worker_socket: DEFAULT_SOCKET_PATH.to_string(),
        }
    }

    /// High-availability flag, accepted for document compatibility.
    /// Single-instance serving is the only behavior.
    pub fn ha(mut self, ha: bool) -> Self {
        self.ha = ha;
        self
    }

    pub fn threading(mut self, mode: ThreadingMode) -> Self {
        self.threading = mode;
        self
    }

    /// Serve on this port instead of the one named in the document.
    pub fn port_override(mut self, port: u16) -> Self {
        self.port_override = Some(port);
        self
    }

    /// Identity of the step processor model steps run through.
    pub fn processor(mut self, name: impl Into<String>) -> Self {
        self.processor = name.into();
        self
    }

    /// Command to spawn as the external inference worker. Registers the
    /// `worker` processor at launch.
    pub fn worker_command(mut self, command: impl Into<String>) -> Self {
        self.worker_command = Some(command.into());
        self
    }

    pub fn worker_socket(mut self, path: impl Into<String>) -> Self {
        self.worker_socket = path.into();
        self
    }
}

/// Handle to a launched server.
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<Result<(), ServingError>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Signal graceful shutdown and wait for the serve loop to finish.
    pub async fn shutdown(mut self) -> Result<(), ServingError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.join
            .await
            .map_err(|e| ServingError::Serve(std::io::Error::other(e)))?
    }

    /// Wait for the serve loop without signalling shutdown.
    pub async fn wait(self) -> Result<(), ServingError> {
        self.join
            .await
            .map_err(|e| ServingError::Serve(std::io::Error::other(e)))?
    }
}

/// Resolve the document, bind the configured port and start serving.
///
/// Binding is the commitment point: the listener takes exactly the port the
/// document (or the override) names, and a conflict with another process
/// surfaces as [`ServingError::Bind`].
pub async fn launch(options: LaunchOptions) -> Result<RunningServer, ServingError> {
    let mut config = match options.store {
        ConfigStore::File => {
            let path = options
                .config_path
                .as_ref()
                .ok_or(ServingError::MissingConfigSource)?;
            info!(path = %path.display(), "Loading configuration document");
            ConfigPersister::load(path)?
        }
        ConfigStore::Memory => options
            .config
            .clone()
            .ok_or(ServingError::MissingConfigSource)?,
    };

    if let Some(port) = options.port_override {
        config = config.with_http_port(port)?;
    }

    let registry = ProcessorRegistry::new();
    if let Some(command) = &options.worker_command {
        let worker = InferenceWorker::start(command, &options.worker_socket).await?;
        registry.register(WORKER_PROCESSOR, Arc::new(WorkerProcessor::new(worker)));
    }
    if !registry.contains(&options.processor) {
        return Err(ServingError::UnknownProcessor(options.processor));
    }

    let addr = config.serving().bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServingError::Bind {
            addr: addr.clone(),
            source,
        })?;
    let local_addr = listener.local_addr().map_err(ServingError::Serve)?;

    info!(
        %local_addr,
        steps = config.steps().len(),
        processor = options.processor,
        ha = options.ha,
        "Serving runtime listening"
    );

    let state = Arc::new(AppState::new(config, registry, options.processor));
    let app = handlers::router(state);

    let (tx, rx) = oneshot::channel::<()>();
    let join = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await
            .map_err(ServingError::Serve)
    });

    Ok(RunningServer {
        local_addr,
        shutdown: Some(tx),
        join,
    })
}

/// Blocking entrypoint: build the tokio runtime per the threading mode,
/// launch, fire the ready callback once with the bound address, and serve
/// until the process exits.
///
/// The callback runs on a runtime thread the caller does not control; the
/// harness uses it to run the one-shot validation request and terminate the
/// process.
pub fn run_main<F, Fut>(options: LaunchOptions, on_ready: F) -> Result<(), ServingError>
where
    F: FnOnce(SocketAddr) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let runtime = match options.threading {
        ThreadingMode::MultiThreaded => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build(),
        ThreadingMode::SingleThreaded => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build(),
    }
    .map_err(ServingError::Runtime)?;

    runtime.block_on(async move {
        let server = launch(options).await?;
        let addr = server.local_addr();
        tokio::spawn(on_ready(addr));
        server.wait().await
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = LaunchOptions::from_file("config.json");
        assert_eq!(options.store, ConfigStore::File);
        assert_eq!(options.threading, ThreadingMode::MultiThreaded);
        assert_eq!(options.processor, LOOPBACK_PROCESSOR);
        assert!(!options.ha);
        assert!(options.worker_command.is_none());
    }

    #[test]
    fn test_options_fluent_chain() {
        let options = LaunchOptions::from_file("config.json")
            .ha(true)
            .threading(ThreadingMode::SingleThreaded)
            .port_override(40123)
            .processor(WORKER_PROCESSOR)
            .worker_command("inference-engine")
            .worker_socket("/tmp/test.sock");

        assert!(options.ha);
        assert_eq!(options.threading, ThreadingMode::SingleThreaded);
        assert_eq!(options.port_override, Some(40123));
        assert_eq!(options.processor, WORKER_PROCESSOR);
        assert_eq!(options.worker_command.as_deref(), Some("inference-engine"));
        assert_eq!(options.worker_socket, "/tmp/test.sock");
    }

    #[tokio::test]
    async fn test_launch_without_source_fails() {
        let mut options = LaunchOptions::from_file("config.json");
        options.config_path = None;
        let err = launch(options).await.unwrap_err();
        assert!(matches!(err, ServingError::MissingConfigSource));
    }
}
