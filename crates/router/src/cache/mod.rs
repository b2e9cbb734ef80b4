//! On-disk caches of compiled boot artifacts.
//!
//! A cache entry carries a [`Fingerprint`] of the source files it was built from. At boot the
//! fingerprint is compared against the files on disk and the [`RuntimeMode`] decides what happens
//! to a stale entry:
//!
//! | cache      | debug            | production                   |
//! |------------|------------------|------------------------------|
//! | missing    | build and write  | build and write              |
//! | unreadable | build and write  | build and write              |
//! | fresh      | use              | use                          |
//! | stale      | rebuild and write| use as is, log a warning     |
//!
//! A failed cache write is logged and boot continues with the freshly built artifact.

pub(crate) mod fingerprint;
mod routes;
mod store;

pub use fingerprint::{Fingerprint, source_files};
pub use routes::{ROUTE_FILE_NAME, RouteCache, RouteCacheEntry};
pub use store::CacheStore;

use crate::error::CacheError;
use std::env;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Version written into every cache file; entries with another version are ignored.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Environment variable consulted by [`RuntimeMode::from_env`].
pub const DEBUG_ENV: &str = "APP_DEBUG";

/// Whether stale caches are rebuilt (`Debug`) or trusted (`Production`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeMode {
    Debug,
    #[default]
    Production,
}

impl RuntimeMode {
    pub fn from_debug(debug: bool) -> Self {
        if debug { Self::Debug } else { Self::Production }
    }

    /// Reads [`DEBUG_ENV`]. Unset or unrecognised values yield `None`.
    pub fn from_env() -> Option<Self> {
        env::var(DEBUG_ENV).ok().and_then(|value| Self::parse(&value))
    }

    /// Parses a boolean-ish flag: `1/true/yes/on` or `0/false/no/off`, case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(Self::Debug),
            "0" | "false" | "no" | "off" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn is_debug(self) -> bool {
        self == Self::Debug
    }
}

/// How a boot artifact was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// The cache was fresh and used.
    Fresh,
    /// The cache was stale but used anyway (production mode).
    Stale,
    /// The artifact was built from source, because the cache was missing, unreadable or stale.
    Rebuilt,
}

/// Applies the cache policy for one artifact.
pub(crate) fn reconcile<T, E>(
    artifact: &'static str,
    cached: Option<T>,
    mode: RuntimeMode,
    is_fresh: impl FnOnce(&T) -> bool,
    build: impl FnOnce() -> Result<T, E>,
    save: impl FnOnce(&T) -> Result<(), CacheError>,
) -> Result<(T, CacheStatus), E> {
    let fresh = cached.as_ref().is_some_and(is_fresh);
    match cached {
        Some(entry) if fresh => {
            debug!(artifact, "cache is fresh");
            return Ok((entry, CacheStatus::Fresh));
        }
        Some(entry) if !mode.is_debug() => {
            warn!(artifact, "cache is stale, sources changed since it was built; rebuild it to pick up the changes");
            return Ok((entry, CacheStatus::Stale));
        }
        Some(_) => info!(artifact, "cache is stale, rebuilding"),
        None => info!(artifact, "no usable cache, building"),
    }

    let entry = build()?;
    if let Err(e) = save(&entry) {
        warn!(artifact, cause = %e, "failed to write cache, continuing without it");
    }
    Ok((entry, CacheStatus::Rebuilt))
}

/// Seconds since the unix epoch, as stored in `builtAt`.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|elapsed| elapsed.as_secs()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io;

    fn run(cached: Option<u32>, fresh: bool, mode: RuntimeMode, saved: &Cell<bool>) -> (u32, CacheStatus) {
        reconcile(
            "test",
            cached,
            mode,
            |_| fresh,
            || Ok::<_, io::Error>(2),
            |_| {
                saved.set(true);
                Ok(())
            },
        )
        .unwrap()
    }

    #[test]
    fn test_policy() {
        let saved = Cell::new(false);
        assert_eq!(run(Some(1), true, RuntimeMode::Debug, &saved), (1, CacheStatus::Fresh));
        assert_eq!(run(Some(1), true, RuntimeMode::Production, &saved), (1, CacheStatus::Fresh));
        assert_eq!(run(Some(1), false, RuntimeMode::Production, &saved), (1, CacheStatus::Stale));
        assert!(!saved.get());

        assert_eq!(run(Some(1), false, RuntimeMode::Debug, &saved), (2, CacheStatus::Rebuilt));
        assert!(saved.replace(false));

        assert_eq!(run(None, false, RuntimeMode::Production, &saved), (2, CacheStatus::Rebuilt));
        assert!(saved.get());
    }

    #[test]
    fn test_failed_write_is_not_fatal() {
        let (value, status) = reconcile(
            "test",
            None,
            RuntimeMode::Debug,
            |_: &u32| false,
            || Ok::<_, io::Error>(7),
            |_| Err(CacheError::io("/nowhere", io::Error::other("read-only"))),
        )
        .unwrap();

        assert_eq!((value, status), (7, CacheStatus::Rebuilt));
    }

    #[test]
    fn test_build_error_propagates() {
        let result = reconcile("test", None, RuntimeMode::Debug, |_: &u32| true, || Err(io::Error::other("boom")), |_| Ok(()));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(RuntimeMode::parse("TRUE"), Some(RuntimeMode::Debug));
        assert_eq!(RuntimeMode::parse(" 1 "), Some(RuntimeMode::Debug));
        assert_eq!(RuntimeMode::parse("off"), Some(RuntimeMode::Production));
        assert_eq!(RuntimeMode::parse("maybe"), None);
        assert_eq!(RuntimeMode::default(), RuntimeMode::Production);
    }
}
