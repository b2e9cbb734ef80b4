use super::{CACHE_FORMAT_VERSION, CacheStatus, CacheStore, Fingerprint, RuntimeMode, reconcile, source_files, unix_now};
use crate::cache::fingerprint::mtime;
use crate::error::{CacheError, RouteCacheError};
use crate::route::{CompiledRoute, RouteFile, RouteTable};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the route files collected from the route directories.
pub const ROUTE_FILE_NAME: &str = "routes.toml";

fn is_route_file(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == ROUTE_FILE_NAME)
}

/// The serialized form of a compiled route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteCacheEntry {
    pub version: u32,
    pub routes: Vec<CompiledRoute>,
    pub fingerprint: Fingerprint,
    pub built_at: u64,
}

impl RouteCacheEntry {
    /// Compiles every route file under `dirs` into a single table.
    ///
    /// Directories are read in the given order and route files in path order within each
    /// directory, which fixes the registration order and therefore match precedence.
    ///
    /// # Errors
    /// Fails on unreadable or malformed route files and on invalid routes.
    pub fn compile(dirs: &[PathBuf]) -> Result<Self, RouteCacheError> {
        let mut table = RouteTable::new();
        let mut fingerprint = Fingerprint::default();

        for path in source_files(dirs, is_route_file)? {
            // stamp before reading: an edit racing the read leaves the entry stale, not wrong
            let stamp = mtime(&path).map_err(|source| RouteCacheError::Io { path: path.clone(), source })?;
            let source = fs::read_to_string(&path).map_err(|source| RouteCacheError::Io { path: path.clone(), source })?;

            let file = RouteFile::parse(&source)
                .map_err(|source| RouteCacheError::Parse { path: path.clone(), source: Box::new(source) })?;
            file.register_into(&mut table).map_err(|source| RouteCacheError::Route { path: path.clone(), source })?;

            fingerprint.insert(path, stamp);
        }

        Ok(Self { version: CACHE_FORMAT_VERSION, routes: table.into_routes(), fingerprint, built_at: unix_now() })
    }

    /// Returns true if the route files under `dirs` are exactly those this entry was built from.
    pub fn is_fresh(&self, dirs: &[PathBuf]) -> bool {
        source_files(dirs, is_route_file).is_ok_and(|files| self.fingerprint.matches(&files))
    }
}

/// The route cache: a [`CacheStore`] plus the directories its routes are compiled from.
#[derive(Debug, Clone)]
pub struct RouteCache {
    store: CacheStore,
    source_dirs: Vec<PathBuf>,
}

impl RouteCache {
    pub fn new(cache_file: impl Into<PathBuf>, source_dirs: Vec<PathBuf>) -> Self {
        Self { store: CacheStore::new(cache_file), source_dirs }
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// # Errors
    /// See [`RouteCacheEntry::compile`].
    pub fn compile(&self) -> Result<RouteCacheEntry, RouteCacheError> {
        RouteCacheEntry::compile(&self.source_dirs)
    }

    pub fn is_fresh(&self, entry: &RouteCacheEntry) -> bool {
        entry.is_fresh(&self.source_dirs)
    }

    /// Reads the cached entry. Entries written by another format version are ignored.
    pub fn load(&self) -> Option<RouteCacheEntry> {
        self.store.load::<RouteCacheEntry>().filter(|entry| {
            let current = entry.version == CACHE_FORMAT_VERSION;
            if !current {
                info!(path = %self.path().display(), version = entry.version, "ignoring route cache of another format version");
            }
            current
        })
    }

    /// # Errors
    /// See [`CacheStore::save`].
    pub fn save(&self, entry: &RouteCacheEntry) -> Result<(), CacheError> {
        self.store.save(entry)
    }

    /// # Errors
    /// See [`CacheStore::clear`].
    pub fn clear(&self) -> Result<bool, CacheError> {
        self.store.clear()
    }

    /// Compiles the routes and writes the cache unconditionally.
    ///
    /// # Errors
    /// Compilation and write errors are both returned.
    pub fn rebuild(&self) -> Result<RouteCacheEntry, crate::error::BootError> {
        let entry = self.compile()?;
        self.save(&entry)?;
        info!(path = %self.path().display(), routes = entry.routes.len(), "route cache rebuilt");
        Ok(entry)
    }

    /// Loads the route table following the cache policy for `mode`.
    ///
    /// # Errors
    /// Only compilation errors; a failed cache write is logged and ignored.
    pub fn resolve(&self, mode: RuntimeMode) -> Result<(RouteCacheEntry, CacheStatus), RouteCacheError> {
        reconcile("routes", self.load(), mode, |entry| self.is_fresh(entry), || self.compile(), |entry| self.save(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    const WEB: &str = r#"
[[route]]
method = "GET"
path = "/"
handler = "home"
name = "home"
"#;

    const CONTACTS: &str = r#"
prefix = "/contacts"
name_prefix = "contacts."

[[route]]
method = "GET"
path = "/{id}"
handler = "contacts.show"
name = "show"
"#;

    struct Fixture {
        dir: tempfile::TempDir,
        cache: RouteCache,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::create_dir_all(dir.path().join("routes/contacts")).unwrap();
            fs::write(dir.path().join("routes/routes.toml"), WEB).unwrap();
            fs::write(dir.path().join("routes/contacts/routes.toml"), CONTACTS).unwrap();
            fs::write(dir.path().join("routes/README.md"), "ignored").unwrap();

            let cache = RouteCache::new(dir.path().join("cache/routes.json"), vec![dir.path().join("routes")]);
            Self { dir, cache }
        }

        fn route_file(&self) -> PathBuf {
            self.dir.path().join("routes/contacts/routes.toml")
        }

        fn edit(&self, contents: &str) {
            let path = self.route_file();
            fs::write(&path, contents).unwrap();
            let file = fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();
        }
    }

    fn patterns(entry: &RouteCacheEntry) -> Vec<&str> {
        entry.routes.iter().map(|route| route.pattern().source()).collect()
    }

    #[test]
    fn test_compile_collects_route_files_in_order() {
        let fixture = Fixture::new();
        let entry = fixture.cache.compile().unwrap();

        // contacts/routes.toml sorts before routes.toml
        assert_eq!(patterns(&entry), vec!["/contacts/{id}", "/"]);
        assert_eq!(entry.version, CACHE_FORMAT_VERSION);
        assert_eq!(entry.fingerprint.len(), 2);
        assert!(fixture.cache.is_fresh(&entry));
    }

    #[test]
    fn test_cache_file_shape() {
        let fixture = Fixture::new();
        fixture.cache.rebuild().unwrap();

        let json: serde_json::Value = serde_json::from_slice(&fs::read(fixture.cache.path()).unwrap()).unwrap();
        assert_eq!(json["version"], CACHE_FORMAT_VERSION);
        assert!(json["builtAt"].is_u64());
        assert_eq!(json["routes"][1]["name"], "home");
        assert_eq!(json["fingerprint"].as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_round_trip_through_disk() {
        let fixture = Fixture::new();
        let built = fixture.cache.rebuild().unwrap();

        assert_eq!(fixture.cache.load(), Some(built));
    }

    #[test]
    fn test_loaded_entry_goes_stale_when_a_file_is_touched() {
        let fixture = Fixture::new();
        fixture.cache.save(&fixture.cache.compile().unwrap()).unwrap();

        let loaded = fixture.cache.load().unwrap();
        assert!(fixture.cache.is_fresh(&loaded));

        fixture.edit(CONTACTS);
        assert!(!fixture.cache.is_fresh(&loaded));
    }

    #[test]
    fn test_other_format_version_is_ignored() {
        let fixture = Fixture::new();
        let mut entry = fixture.cache.compile().unwrap();
        entry.version = CACHE_FORMAT_VERSION + 1;
        fixture.cache.save(&entry).unwrap();

        assert_eq!(fixture.cache.load(), None);
    }

    #[test]
    fn test_debug_mode_rebuilds_stale_cache() {
        let fixture = Fixture::new();
        fixture.cache.rebuild().unwrap();
        fixture.edit(&CONTACTS.replace("/{id}", "/{contact}"));

        let (entry, status) = fixture.cache.resolve(RuntimeMode::Debug).unwrap();

        assert_eq!(status, CacheStatus::Rebuilt);
        assert_eq!(patterns(&entry), vec!["/contacts/{contact}", "/"]);
        assert_eq!(fixture.cache.load(), Some(entry));
    }

    #[test]
    fn test_production_mode_keeps_stale_cache() {
        let fixture = Fixture::new();
        let built = fixture.cache.rebuild().unwrap();
        fixture.edit(&CONTACTS.replace("/{id}", "/{contact}"));

        let (entry, status) = fixture.cache.resolve(RuntimeMode::Production).unwrap();

        assert_eq!(status, CacheStatus::Stale);
        assert_eq!(entry, built);
    }

    #[test]
    fn test_missing_cache_is_built_in_any_mode() {
        let fixture = Fixture::new();

        let (entry, status) = fixture.cache.resolve(RuntimeMode::Production).unwrap();
        assert_eq!(status, CacheStatus::Rebuilt);
        assert_eq!(entry.routes.len(), 2);

        let (_, status) = fixture.cache.resolve(RuntimeMode::Production).unwrap();
        assert_eq!(status, CacheStatus::Fresh);
    }

    #[test]
    fn test_corrupt_cache_is_rebuilt() {
        let fixture = Fixture::new();
        fs::create_dir_all(fixture.cache.path().parent().unwrap()).unwrap();
        fs::write(fixture.cache.path(), "not json").unwrap();

        let (_, status) = fixture.cache.resolve(RuntimeMode::Production).unwrap();
        assert_eq!(status, CacheStatus::Rebuilt);
        assert!(fixture.cache.load().is_some());
    }

    #[test]
    fn test_overlapping_route_dirs_register_each_file_once() {
        let fixture = Fixture::new();
        let routes = fixture.dir.path().join("routes");
        let cache = RouteCache::new(fixture.dir.path().join("cache/routes.json"), vec![routes.clone(), routes.join("contacts")]);

        let (entry, status) = cache.resolve(RuntimeMode::Production).unwrap();
        assert_eq!(status, CacheStatus::Rebuilt);
        assert_eq!(patterns(&entry), vec!["/contacts/{id}", "/"]);
        assert_eq!(entry.fingerprint.len(), 2);

        let (_, status) = cache.resolve(RuntimeMode::Production).unwrap();
        assert_eq!(status, CacheStatus::Fresh);
    }

    #[test]
    fn test_invalid_route_file_names_the_file() {
        let fixture = Fixture::new();
        fixture.edit("[[route]]\nmethod = \"GET\"\npath = \"/{id\"\nhandler = \"h\"\n");

        let err = fixture.cache.compile().unwrap_err();
        assert!(matches!(&err, RouteCacheError::Route { path, .. } if *path == fixture.route_file()));
    }
}
