//! Canonical on-disk persistence of the configuration document.

use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::pipeline::InferenceConfiguration;

/// Serializes the assembled configuration to a JSON document and back.
///
/// `save` overwrites any existing file at the target path; there is no
/// merging, versioning or schema evolution.
pub struct ConfigPersister;

impl ConfigPersister {
    /// The canonical document string.
    pub fn to_json(config: &InferenceConfiguration) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(config)?)
    }

    /// Write the document to `path`, overwriting any existing file.
    pub fn save(config: &InferenceConfiguration, path: &Path) -> Result<(), ConfigError> {
        let document = Self::to_json(config)?;
        fs::write(path, document).map_err(|source| ConfigError::Io {
            action: "write",
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Configuration persisted");
        Ok(())
    }

    /// Read a previously persisted document from `path`.
    pub fn load(path: &Path) -> Result<InferenceConfiguration, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            action: "read",
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}
