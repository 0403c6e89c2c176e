//! Schema file loading.

use crate::error::CliError;
use modelry_core::ModelRegistry;
use std::path::Path;
use tracing::debug;

/// Read a JSON schema file into a validated registry.
pub fn load_registry(path: &Path) -> Result<ModelRegistry, CliError> {
    let schema_error = |message: String| CliError::Schema {
        path: path.to_path_buf(),
        message,
    };

    let text = std::fs::read_to_string(path).map_err(|e| schema_error(e.to_string()))?;
    let registry = ModelRegistry::from_json(&text).map_err(|e| schema_error(e.to_string()))?;
    debug!(path = %path.display(), entities = registry.len(), "schema loaded");
    Ok(registry)
}
