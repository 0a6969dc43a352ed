//! YAML loading with file composition tags
//!
//! A state machine file is usually split up: one file per state, a
//! directory of trigger lists. The loader expands three tags while reading:
//!
//! - `!include path` - the whole document of another file
//! - `!include_dir_merge_list dir` - the concatenated lists of every
//!   `.yaml`/`.yml` file in a directory, in file name order
//! - `!env_var VAR` - an environment variable, re-read as a YAML scalar
//!
//! Relative tag arguments resolve against the file that contains the tag.
//! Mapping order is the document order.

use serde::de::DeserializeOwned;
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::error::{tag_argument, ConfigError, ConfigResult};

const INCLUDE: &str = "!include";
const INCLUDE_DIR_MERGE_LIST: &str = "!include_dir_merge_list";
const ENV_VAR: &str = "!env_var";

/// Tags the loader understands
enum Tag {
    Include,
    IncludeDirMergeList,
    EnvVar,
}

impl Tag {
    fn parse(tag: &str) -> Option<Self> {
        match tag {
            INCLUDE => Some(Tag::Include),
            INCLUDE_DIR_MERGE_LIST => Some(Tag::IncludeDirMergeList),
            ENV_VAR => Some(Tag::EnvVar),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Tag::Include => INCLUDE,
            Tag::IncludeDirMergeList => INCLUDE_DIR_MERGE_LIST,
            Tag::EnvVar => ENV_VAR,
        }
    }
}

/// Reads YAML files and expands composition tags
pub struct YamlLoader {
    config_dir: PathBuf,
    /// Files being expanded, outermost first
    open_files: Vec<PathBuf>,
}

impl YamlLoader {
    /// Loader resolving top-level relative paths against `config_dir`
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            open_files: Vec::new(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Read a file and expand its tags
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = match path.as_ref() {
            p if p.is_absolute() => p.to_path_buf(),
            p => self.config_dir.join(p),
        };

        if self.open_files.contains(&path) {
            let mut chain = self.open_files.clone();
            chain.push(path);
            return Err(ConfigError::IncludeCycle { chain });
        }

        debug!(path = %path.display(), "Loading YAML");
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile {
            path: path.clone(),
            source,
        })?;

        self.open_files.push(path.clone());
        let result = self.load_string(&content, &path);
        self.open_files.pop();
        result
    }

    /// Parse YAML text and expand its tags; `source_path` anchors relative
    /// tag arguments
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let document: Value =
            serde_yaml::from_str(content).map_err(|source| ConfigError::ParseYaml {
                path: source_path.to_path_buf(),
                source,
            })?;
        self.expand(document, source_path)
    }

    fn expand(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        Ok(match value {
            Value::Tagged(tagged) => self.expand_tagged(*tagged, source_path)?,
            Value::Sequence(items) => Value::Sequence(
                items
                    .into_iter()
                    .map(|item| self.expand(item, source_path))
                    .collect::<ConfigResult<_>>()?,
            ),
            Value::Mapping(entries) => {
                let mut expanded = Mapping::with_capacity(entries.len());
                for (key, value) in entries {
                    expanded.insert(
                        self.expand(key, source_path)?,
                        self.expand(value, source_path)?,
                    );
                }
                Value::Mapping(expanded)
            }
            scalar => scalar,
        })
    }

    fn expand_tagged(&mut self, tagged: TaggedValue, source_path: &Path) -> ConfigResult<Value> {
        let Some(tag) = Tag::parse(&tagged.tag.to_string()) else {
            // Foreign tags pass through with their contents expanded
            return Ok(Value::Tagged(Box::new(TaggedValue {
                tag: tagged.tag,
                value: self.expand(tagged.value, source_path)?,
            })));
        };

        let Value::String(argument) = tagged.value else {
            return Err(tag_argument(tag.name(), source_path, "expected a string"));
        };
        trace!(tag = tag.name(), %argument, "Expanding tag");

        match tag {
            Tag::Include => {
                let target = relative_to(source_path, &argument);
                self.load_file(target)
            }
            Tag::IncludeDirMergeList => {
                let dir = relative_to(source_path, &argument);
                self.merge_dir_lists(&dir, source_path)
            }
            Tag::EnvVar => env_scalar(&argument),
        }
    }

    fn merge_dir_lists(&mut self, dir: &Path, source_path: &Path) -> ConfigResult<Value> {
        let entries = fs::read_dir(dir).map_err(|e| {
            tag_argument(
                INCLUDE_DIR_MERGE_LIST,
                source_path,
                format!("cannot list {}: {e}", dir.display()),
            )
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_yaml_file(path))
            .collect();
        files.sort();
        debug!(dir = %dir.display(), files = files.len(), "Merging list files");

        let mut merged = Vec::new();
        for file in files {
            match self.load_file(&file)? {
                Value::Sequence(items) => merged.extend(items),
                Value::Null => {}
                single => merged.push(single),
            }
        }
        Ok(Value::Sequence(merged))
    }
}

fn relative_to(source_path: &Path, argument: &str) -> PathBuf {
    let argument = Path::new(argument);
    match source_path.parent() {
        Some(dir) if argument.is_relative() => dir.join(argument),
        _ => argument.to_path_buf(),
    }
}

fn is_yaml_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

fn env_scalar(var: &str) -> ConfigResult<Value> {
    let raw = std::env::var(var).map_err(|_| ConfigError::MissingEnvVar {
        var: var.to_string(),
    })?;
    match serde_yaml::from_str::<Value>(&raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => Ok(value),
        _ => Ok(Value::String(raw)),
    }
}

/// Read a file under `config_dir` with tags expanded
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new(config_dir).load_file(file)
}

/// Parse YAML text with tags expanded; `source_name` anchors relative tag
/// arguments and names the source in errors
pub fn load_yaml_string(
    config_dir: impl Into<PathBuf>,
    content: &str,
    source_name: &str,
) -> ConfigResult<Value> {
    YamlLoader::new(config_dir).load_string(content, Path::new(source_name))
}

/// Deserialize an expanded document into a typed record
pub fn from_yaml_value<T: DeserializeOwned>(value: Value, key: &str) -> ConfigResult<T> {
    serde_yaml::from_value(value).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
