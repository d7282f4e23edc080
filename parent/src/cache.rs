//! The derived-artifact cache.
//!
//! Derivations are keyed by the identity of their input, the operation
//! which produced them and a caller-chosen logical name. The store is an
//! explicit dependency of the pipeline rather than a global, so tests
//! can point it at a disposable directory.
//!
//! The disk implementation publishes atomically: content is written to
//! a temporary file in the cache directory and renamed into place, so
//! readers never observe a partially written artifact and concurrent
//! writers of the same key leave exactly one complete file. The cache
//! never evicts; invalidation is removing the cache directory.

use snafu::{Backtrace, ResultExt, Snafu};
use std::io::Write;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// An error which may occur when storing an artifact.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The cache directory could not be created.
    #[snafu(display("Could not create cache directory '{}': {}", path.display(), source))]
    CreateCacheDir {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The artifact could not be written to a temporary file.
    #[snafu(display("Could not write artifact: {}", source))]
    WriteArtifact {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The temporary file could not be published to its final path.
    #[snafu(display("Could not publish artifact to '{}': {}", path.display(), source))]
    PublishArtifact {
        path: PathBuf,
        source: tempfile::PersistError,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The identity of a derived artifact:
/// input identity, operation, and logical output name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// identity of the input (usually the source file path)
    pub source: String,
    /// the operation which derives the artifact (e.g. `"image"`)
    pub operation: String,
    /// caller-chosen logical name of the output
    pub name: String,
    /// file extension of the output, without the dot
    pub extension: String,
}

impl CacheKey {
    /// Create a cache key for a derivation of the given source file.
    pub fn new(
        source: impl AsRef<Path>,
        operation: impl Into<String>,
        name: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        CacheKey {
            source: source.as_ref().to_string_lossy().into_owned(),
            operation: operation.into(),
            name: name.into(),
            extension: extension.into(),
        }
    }

    /// The file name of this key's artifact within a cache directory.
    fn file_name(&self) -> String {
        // the source identity is folded into a short hash so that the
        // same logical name under different inputs cannot collide
        format!(
            "{:016x}-{}-{}.{}",
            xxh3_64(self.source.as_bytes()),
            self.operation,
            sanitize(&self.name),
            self.extension
        )
    }
}

/// Replace file-system-relevant characters in a logical name.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

/// Trait for a store of derived artifacts.
pub trait ArtifactStore {
    /// Look up the artifact for the given key,
    /// returning the path of a previously stored derivation, if any.
    fn resolve(&self, key: &CacheKey) -> Option<PathBuf>;

    /// Store the artifact bytes under the given key and return the
    /// path of the stored file.
    ///
    /// Concurrent callers storing the same key observe at most one
    /// complete write; a caller that loses the race silently accepts
    /// the other writer's output.
    fn store(&self, key: &CacheKey, bytes: &[u8]) -> Result<PathBuf>;
}

/// An artifact store over a directory on disk.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Create a disk cache over the given directory,
    /// creating the directory if necessary.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).context(CreateCacheDirSnafu { path: dir.clone() })?;
        Ok(DiskCache { dir })
    }

    /// The directory backing this cache.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactStore for DiskCache {
    fn resolve(&self, key: &CacheKey) -> Option<PathBuf> {
        let path = self.dir.join(key.file_name());
        if path.is_file() {
            Some(path)
        } else {
            None
        }
    }

    fn store(&self, key: &CacheKey, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(key.file_name());

        let mut tmp = tempfile::Builder::new()
            .prefix(".dcmstack-")
            .tempfile_in(&self.dir)
            .context(WriteArtifactSnafu)?;
        tmp.write_all(bytes).context(WriteArtifactSnafu)?;
        tmp.flush().context(WriteArtifactSnafu)?;

        // atomic publication; the last rename wins and the file is
        // complete either way
        let file = tmp
            .persist(&path)
            .context(PublishArtifactSnafu { path: path.clone() })?;
        drop(file);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::{ArtifactStore, CacheKey, DiskCache};
    use std::sync::Arc;

    #[test]
    fn resolve_misses_then_hits_after_store() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path()).unwrap();
        let key = CacheKey::new("/data/scan-0001.dcm", "image", "scan-0001", "png");

        assert!(cache.resolve(&key).is_none());
        let path = cache.store(&key, b"artifact bytes").unwrap();
        assert_eq!(cache.resolve(&key).as_deref(), Some(&*path));
        assert_eq!(std::fs::read(&path).unwrap(), b"artifact bytes");
    }

    #[test]
    fn different_sources_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path()).unwrap();
        let a = CacheKey::new("/data/a.dcm", "image", "out", "png");
        let b = CacheKey::new("/data/b.dcm", "image", "out", "png");

        let path_a = cache.store(&a, b"a").unwrap();
        let path_b = cache.store(&b, b"b").unwrap();
        assert_ne!(path_a, path_b);
    }

    #[test]
    fn concurrent_writers_leave_one_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(DiskCache::new(dir.path()).unwrap());
        let key = CacheKey::new("/data/scan.dcm", "image", "race", "png");

        let mut handles = Vec::new();
        for i in 0..8 {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            handles.push(std::thread::spawn(move || {
                let content = vec![i as u8; 4096];
                cache.store(&key, &content).unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let path = cache.resolve(&key).expect("an artifact must exist");
        let content = std::fs::read(path).unwrap();
        assert_eq!(content.len(), 4096);
        // whole content comes from a single writer
        assert!(content.windows(2).all(|w| w[0] == w[1]));
    }
}
