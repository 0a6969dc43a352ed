//! Configuration errors

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Failures while reading, expanding or writing configuration and data files
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot encode JSON for {path}: {source}")]
    SerializeJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A custom tag was given an argument it cannot use
    #[error("bad argument to {tag} in {path}: {reason}")]
    TagArgument {
        tag: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// A file includes itself, directly or through other files
    #[error("include cycle: {}", display_chain(.chain))]
    IncludeCycle { chain: Vec<PathBuf> },

    #[error("environment variable {var} is not set")]
    MissingEnvVar { var: String },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigError {
    /// The file being read does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ConfigError::ReadFile { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

fn display_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub(crate) fn tag_argument(tag: &'static str, path: &Path, reason: impl Into<String>) -> ConfigError {
    ConfigError::TagArgument {
        tag,
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}
