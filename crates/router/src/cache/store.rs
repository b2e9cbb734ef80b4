use crate::error::CacheError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// A single JSON cache file.
///
/// Writes go to a uniquely named temporary file next to the target which is then renamed over
/// it, so a concurrent reader sees either the old or the new entry, never a partial one. Each
/// save gets its own temporary file, so concurrent writers never share one.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the entry. A missing, unreadable or undecodable file yields `None`.
    pub fn load<T: DeserializeOwned>(&self) -> Option<T> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "cache file does not exist");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), cause = %e, "failed to read cache file, ignoring it");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(path = %self.path.display(), cause = %e, "cache file is corrupt, ignoring it");
                None
            }
        }
    }

    /// Writes the entry atomically, creating parent directories as needed.
    ///
    /// # Errors
    /// Fails on encoding or filesystem errors; the previous entry, if any, is left in place.
    pub fn save<T: Serialize>(&self, entry: &T) -> Result<(), CacheError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;

        // dropped, and thereby removed, on any error before persist
        let tmp = NamedTempFile::new_in(parent).map_err(|e| CacheError::io(parent, e))?;
        let tmp = write_json(tmp, entry)?;
        tmp.persist(&self.path).map_err(|e| CacheError::io(&self.path, e.error))?;

        debug!(path = %self.path.display(), "cache file written");
        Ok(())
    }

    /// Deletes the cache file. Returns false if there was none.
    ///
    /// # Errors
    /// Fails when the file exists but cannot be removed.
    pub fn clear(&self) -> Result<bool, CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(&self.path, e)),
        }
    }
}

fn write_json<T: Serialize>(tmp: NamedTempFile, entry: &T) -> Result<NamedTempFile, CacheError> {
    let path = tmp.path().to_path_buf();
    let mut writer = BufWriter::new(tmp);
    serde_json::to_writer_pretty(&mut writer, entry)?;
    let tmp = writer.into_inner().map_err(|e| CacheError::io(&path, e.into_error()))?;
    tmp.as_file().sync_all().map_err(|e| CacheError::io(&path, e))?;
    Ok(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        version: u32,
        items: Vec<String>,
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("nested/cache/routes.json"));
        assert_eq!(store.load::<Entry>(), None);

        let entry = Entry { version: 1, items: vec!["a".into()] };
        store.save(&entry).unwrap();
        assert_eq!(store.load::<Entry>(), Some(entry));

        let leftovers = fs::read_dir(store.path().parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert_eq!(store.load::<Entry>(), None);
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("routes.json"));

        fs::write(store.path(), "{\"version\": 1, \"items\": [").unwrap();
        assert_eq!(store.load::<Entry>(), None);

        fs::write(store.path(), "{\"unexpected\": true}").unwrap();
        assert_eq!(store.load::<Entry>(), None);
    }

    #[test]
    fn test_save_into_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();

        let store = CacheStore::new(blocker.join("routes.json"));
        assert!(matches!(store.save(&Entry { version: 1, items: vec![] }), Err(CacheError::Io { .. })));
    }

    #[test]
    fn test_concurrent_saves_never_expose_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("routes.json"));
        let entry = |writer: usize, round: usize| Entry {
            version: 1,
            items: (0..500).map(|i| format!("writer-{writer}-round-{round}-item-{i}")).collect(),
        };
        store.save(&entry(0, 0)).unwrap();

        let done = std::sync::atomic::AtomicBool::new(false);
        std::thread::scope(|scope| {
            let writers = (0..8)
                .map(|writer| {
                    let store = &store;
                    scope.spawn(move || {
                        for round in 0..20 {
                            store.save(&entry(writer, round)).unwrap();
                        }
                    })
                })
                .collect::<Vec<_>>();

            let reader = scope.spawn(|| {
                while !done.load(std::sync::atomic::Ordering::Acquire) {
                    let loaded = store.load::<Entry>().expect("a complete entry is always readable");
                    assert_eq!(loaded.items.len(), 500);
                }
            });

            for writer in writers {
                writer.join().unwrap();
            }
            done.store(true, std::sync::atomic::Ordering::Release);
            reader.join().unwrap();
        });

        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
