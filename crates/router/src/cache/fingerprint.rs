use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;
use walkdir::WalkDir;

/// Modification times of the source files an artifact was built from, keyed by path.
///
/// Two fingerprints are equal when the same set of files exists with the same mtimes, so adding,
/// removing or touching a source file all make a cache stale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint {
    files: BTreeMap<PathBuf, u64>,
}

impl Fingerprint {
    /// Fingerprints the given files.
    ///
    /// # Errors
    /// Fails when a file cannot be stat'ed.
    pub fn of<'a, I>(files: I) -> io::Result<Self>
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        let mut fingerprint = Self::default();
        for file in files {
            fingerprint.insert(file.clone(), mtime(file)?);
        }
        Ok(fingerprint)
    }

    pub(crate) fn insert(&mut self, path: PathBuf, mtime: u64) {
        self.files.insert(path, mtime);
    }

    /// Returns true if `files` is exactly the recorded set of files, with unchanged mtimes.
    /// A file that can no longer be stat'ed counts as changed.
    pub fn matches(&self, files: &[PathBuf]) -> bool {
        let listed = files.iter().map(PathBuf::as_path).collect::<BTreeSet<_>>();
        listed.len() == self.files.len()
            && listed.into_iter().all(|file| match (self.files.get(file), mtime(file)) {
                (Some(&recorded), Ok(current)) => recorded == current,
                _ => false,
            })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, u64)> {
        self.files.iter().map(|(path, mtime)| (path.as_path(), *mtime))
    }
}

/// Lists the files under `dirs` accepted by `include`: directories in the given order, files
/// sorted by path within each directory. Missing directories are skipped and a file reachable
/// from several of `dirs` is listed once, at its first position.
///
/// # Errors
/// Fails when a directory cannot be walked.
pub fn source_files(dirs: &[PathBuf], include: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    let mut seen = BTreeSet::new();
    for dir in dirs {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "source directory does not exist, skipping");
            continue;
        }
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && include(entry.path()) && seen.insert(entry.path().to_path_buf()) {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

/// Modification time in nanoseconds since the unix epoch.
pub(crate) fn mtime(path: &Path) -> io::Result<u64> {
    let modified = fs::metadata(path)?.modified()?;
    let nanos = modified.duration_since(UNIX_EPOCH).map(|elapsed| elapsed.as_nanos()).unwrap_or_default();
    Ok(u64::try_from(nanos).unwrap_or(u64::MAX))
}
