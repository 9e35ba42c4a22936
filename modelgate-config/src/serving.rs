//! Server-level options: bind port, host and wire data formats.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default host the embedded server binds to.
pub const DEFAULT_LISTEN_HOST: &str = "127.0.0.1";

/// Wire format of request and response payloads on the raw endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataFormat {
    Json,
    Nd4j,
    Numpy,
}

impl DataFormat {
    /// Raw endpoint path the validation client posts to for this format.
    pub fn raw_path(self) -> &'static str {
        match self {
            Self::Json => "/raw/json",
            Self::Nd4j => "/raw/nd4j",
            Self::Numpy => "/raw/numpy",
        }
    }
}

/// Options governing the embedded HTTP server.
///
/// The port is chosen before the server binds; two concurrent servers on one
/// host must not share a port, and the launcher surfaces the bind error when
/// they do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServingConfig {
    http_port: u16,
    listen_host: String,
    input_format: DataFormat,
    output_format: DataFormat,
}

impl ServingConfig {
    pub fn builder() -> ServingConfigBuilder {
        ServingConfigBuilder::default()
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn listen_host(&self) -> &str {
        &self.listen_host
    }

    /// Bind address string, `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.http_port)
    }

    pub fn input_format(&self) -> DataFormat {
        self.input_format
    }

    pub fn output_format(&self) -> DataFormat {
        self.output_format
    }

    /// Copy of this config bound to a different port, re-validated. Used by
    /// the launcher's port override.
    pub fn with_http_port(mut self, port: u16) -> Result<Self, ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.http_port = port;
        Ok(self)
    }
}

/// Fluent builder for [`ServingConfig`].
#[derive(Debug)]
pub struct ServingConfigBuilder {
    http_port: Option<u16>,
    listen_host: String,
    input_format: DataFormat,
    output_format: DataFormat,
}

impl Default for ServingConfigBuilder {
    fn default() -> Self {
        Self {
            http_port: None,
            listen_host: DEFAULT_LISTEN_HOST.to_string(),
            input_format: DataFormat::Json,
            output_format: DataFormat::Json,
        }
    }
}

impl ServingConfigBuilder {
    pub fn http_port(mut self, port: u16) -> Self {
        self.http_port = Some(port);
        self
    }

    pub fn listen_host(mut self, host: impl Into<String>) -> Self {
        self.listen_host = host.into();
        self
    }

    pub fn input_format(mut self, format: DataFormat) -> Self {
        self.input_format = format;
        self
    }

    pub fn output_format(mut self, format: DataFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn build(self) -> Result<ServingConfig, ConfigError> {
        let http_port = self.http_port.ok_or(ConfigError::MissingField("http_port"))?;
        // Port 0 would delegate the choice to the OS; the persisted document
        // must name the concrete port the server will bind.
        if http_port == 0 {
            return Err(ConfigError::InvalidPort(http_port));
        }
        if self.listen_host.is_empty() {
            return Err(ConfigError::Empty("listen_host"));
        }

        Ok(ServingConfig {
            http_port,
            listen_host: self.listen_host,
            input_format: self.input_format,
            output_format: self.output_format,
        })
    }
}
