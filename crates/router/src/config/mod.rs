//! Application configuration.
//!
//! Every `*.toml` file directly inside a config directory contributes one top-level key named
//! after the file stem: `app.toml` becomes `app`, so its `debug` entry is read as `app.debug`.
//! Directories are merged in order, later ones overriding earlier ones key by key; tables merge
//! recursively while any other value replaces the previous one.

mod cache;

pub use cache::{ConfigCache, ConfigCacheEntry};

use crate::cache::RuntimeMode;
use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Merged configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    root: Map<String, Value>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an already merged tree; anything but a JSON object yields an empty config.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(root) => Self { root },
            _ => Self::default(),
        }
    }

    /// Loads and merges every config file under `dirs`.
    ///
    /// # Errors
    /// Fails on unreadable or malformed files.
    pub fn load(dirs: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for file in config_files(dirs)? {
            config.merge_file(&file)?;
        }
        Ok(config)
    }

    pub(crate) fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let Some(key) = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()) else {
            return Ok(());
        };

        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let table = source
            .parse::<toml::Table>()
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source: Box::new(source) })?;

        let mut overlay = Map::new();
        overlay.insert(key, toml_to_json(toml::Value::Table(table)));
        merge(&mut self.root, overlay);
        Ok(())
    }

    /// Looks up a dotted key such as `app.middleware`. Numeric segments index into arrays.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut segments = key.split('.');
        let mut current = self.root.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Deserializes the value at `key`. `Ok(None)` if the key is absent.
    ///
    /// # Errors
    /// [`ConfigError::Deserialize`] when the value does not have the shape of `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.get(key)
            .map(|value| T::deserialize(value).map_err(|source| ConfigError::Deserialize { key: key.to_owned(), source }))
            .transpose()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// The mode requested by `app.debug`, accepting a boolean or a flag string.
    pub fn mode(&self) -> Option<RuntimeMode> {
        match self.get("app.debug")? {
            Value::Bool(debug) => Some(RuntimeMode::from_debug(*debug)),
            Value::String(flag) => RuntimeMode::parse(flag),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }
}

/// Config files directly inside each of `dirs`, directories in order, files sorted by name.
/// A directory given twice contributes its files once.
pub(crate) fn config_files(dirs: &[PathBuf]) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    let mut seen = BTreeSet::new();
    for dir in dirs.iter().filter(|dir| dir.is_dir()) {
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && is_config_file(entry.path()) && seen.insert(entry.path().to_path_buf()) {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

fn is_config_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}

fn merge(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => merge(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(datetime) => Value::String(datetime.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(table.into_iter().map(|(key, value)| (key, toml_to_json(value))).collect()),
    }
}
