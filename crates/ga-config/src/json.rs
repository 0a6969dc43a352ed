//! JSON file helpers for rule sets and recordings

use crate::error::{ConfigError, ConfigResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Read and deserialize a JSON file
pub fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> ConfigResult<T> {
    let path = path.as_ref();
    debug!("Loading JSON file: {:?}", path);

    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| ConfigError::ParseJson {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Serialize a value as pretty-printed JSON and write it to a file
pub fn write_json_file<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> ConfigResult<()> {
    let path = path.as_ref();

    let content = serde_json::to_string_pretty(value).map_err(|e| ConfigError::SerializeJson {
        path: path.to_path_buf(),
        source: e,
    })?;

    fs::write(path, content).map_err(|e| ConfigError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!("Wrote JSON file: {:?}", path);
    Ok(())
}
