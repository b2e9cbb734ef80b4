use super::{Config, config_files};
use crate::cache::{CACHE_FORMAT_VERSION, CacheStatus, CacheStore, Fingerprint, RuntimeMode, reconcile, unix_now};
use crate::cache::fingerprint::mtime;
use crate::error::{BootError, CacheError, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// The serialized form of a merged configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigCacheEntry {
    pub version: u32,
    pub config: Config,
    pub fingerprint: Fingerprint,
    pub built_at: u64,
}

impl ConfigCacheEntry {
    /// Loads and merges the config files under `dirs`.
    ///
    /// # Errors
    /// See [`Config::load`].
    pub fn compile(dirs: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        let mut fingerprint = Fingerprint::default();

        for path in config_files(dirs)? {
            let stamp = mtime(&path).map_err(|source| ConfigError::Io { path: path.clone(), source })?;
            config.merge_file(&path)?;
            fingerprint.insert(path, stamp);
        }

        Ok(Self { version: CACHE_FORMAT_VERSION, config, fingerprint, built_at: unix_now() })
    }

    pub fn is_fresh(&self, dirs: &[PathBuf]) -> bool {
        config_files(dirs).is_ok_and(|files| self.fingerprint.matches(&files))
    }
}

/// The config cache, structured like [`RouteCache`](crate::cache::RouteCache).
#[derive(Debug, Clone)]
pub struct ConfigCache {
    store: CacheStore,
    source_dirs: Vec<PathBuf>,
}

impl ConfigCache {
    pub fn new(cache_file: impl Into<PathBuf>, source_dirs: Vec<PathBuf>) -> Self {
        Self { store: CacheStore::new(cache_file), source_dirs }
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// # Errors
    /// See [`Config::load`].
    pub fn compile(&self) -> Result<ConfigCacheEntry, ConfigError> {
        ConfigCacheEntry::compile(&self.source_dirs)
    }

    pub fn is_fresh(&self, entry: &ConfigCacheEntry) -> bool {
        entry.is_fresh(&self.source_dirs)
    }

    pub fn load(&self) -> Option<ConfigCacheEntry> {
        self.store.load::<ConfigCacheEntry>().filter(|entry| {
            let current = entry.version == CACHE_FORMAT_VERSION;
            if !current {
                info!(path = %self.path().display(), version = entry.version, "ignoring config cache of another format version");
            }
            current
        })
    }

    /// # Errors
    /// See [`CacheStore::save`].
    pub fn save(&self, entry: &ConfigCacheEntry) -> Result<(), CacheError> {
        self.store.save(entry)
    }

    /// # Errors
    /// See [`CacheStore::clear`].
    pub fn clear(&self) -> Result<bool, CacheError> {
        self.store.clear()
    }

    /// # Errors
    /// Load and write errors are both returned.
    pub fn rebuild(&self) -> Result<ConfigCacheEntry, BootError> {
        let entry = self.compile()?;
        self.save(&entry)?;
        info!(path = %self.path().display(), "config cache rebuilt");
        Ok(entry)
    }

    /// Loads the configuration following the cache policy and settles the runtime mode.
    ///
    /// The mode is `mode` when given, otherwise `app.debug` of the configuration, otherwise
    /// production. Without an explicit mode, the policy for a stale entry is decided by the
    /// `app.debug` recorded in that entry.
    ///
    /// # Errors
    /// Only load errors; a failed cache write is logged and ignored.
    pub fn resolve(&self, mode: Option<RuntimeMode>) -> Result<(Config, RuntimeMode, CacheStatus), ConfigError> {
        let cached = self.load();
        let policy = mode.or_else(|| cached.as_ref().and_then(|entry| entry.config.mode())).unwrap_or_default();

        let (entry, status) =
            reconcile("config", cached, policy, |entry| self.is_fresh(entry), || self.compile(), |entry| self.save(entry))?;

        let mode = mode.or_else(|| entry.config.mode()).unwrap_or_default();
        Ok((entry.config, mode, status))
    }
}
