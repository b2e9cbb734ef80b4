//! Error types of the kernel.
//!
//! Boot-time problems (bad patterns, name clashes, unresolved references) are fatal and surface
//! before any traffic is served. URL generation errors are recoverable by the caller. Cache read
//! failures never appear here: a cache that cannot be read is treated as absent.

use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type returned by handlers and middleware, propagated unchanged out of dispatch.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("route name '{name}' is already registered")]
    DuplicateRouteName { name: String },

    #[error("route '{pattern}' has no http methods")]
    EmptyMethods { pattern: String },

    #[error("invalid http method '{method}'")]
    InvalidMethod { method: String },
}

impl RouteError {
    pub fn invalid_pattern<P: ToString, R: ToString>(pattern: P, reason: R) -> Self {
        Self::InvalidPattern { pattern: pattern.to_string(), reason: reason.to_string() }
    }

    pub fn duplicate_route_name<S: ToString>(name: S) -> Self {
        Self::DuplicateRouteName { name: name.to_string() }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UrlError {
    #[error("no route named '{name}'")]
    UnknownRouteName { name: String },

    #[error("route '{name}' requires parameter '{param}'")]
    MissingParameter { name: String, param: String },
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache io error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to encode cache entry: {source}")]
    Encode {
        #[from]
        source: serde_json::Error,
    },
}

impl CacheError {
    pub fn io<P: AsRef<Path>>(path: P, source: io::Error) -> Self {
        Self::Io { path: path.as_ref().to_path_buf(), source }
    }
}

#[derive(Error, Debug)]
pub enum RouteCacheError {
    #[error("failed to read route file {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to scan route directory: {source}")]
    Walk {
        #[from]
        source: walkdir::Error,
    },

    #[error("failed to parse route file {}: {source}", path.display())]
    Parse { path: PathBuf, source: Box<toml::de::Error> },

    #[error("invalid route in {}: {source}", path.display())]
    Route { path: PathBuf, source: RouteError },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to scan config directory: {source}")]
    Walk {
        #[from]
        source: walkdir::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse { path: PathBuf, source: Box<toml::de::Error> },

    #[error("config key '{key}' has an unexpected shape: {source}")]
    Deserialize { key: String, source: serde_json::Error },
}

#[derive(Error, Debug)]
pub enum BootError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Routes(#[from] RouteCacheError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("no handler registered under '{key}'")]
    UnknownHandler { key: String },

    #[error("no middleware or middleware group registered under '{key}'")]
    UnknownMiddleware { key: String },

    #[error("middleware group '{key}' includes itself")]
    MiddlewareGroupCycle { key: String },
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("expected content type '{expected}', found '{found}'")]
    UnsupportedContentType { expected: String, found: String },

    #[error("invalid query string: {source}")]
    Query { source: serde_urlencoded::de::Error },

    #[error("invalid form body: {source}")]
    Form { source: serde_urlencoded::de::Error },

    #[error("invalid json body: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}
