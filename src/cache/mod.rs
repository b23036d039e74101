//! File-backed record cache with TTL freshness and corruption recovery.
//!
//! Every entry is one file holding the raw codec bytes of a record or a
//! record sequence. Freshness comes from the file's modification time and a
//! TTL supplied on each read, so the same file can be read under different
//! freshness policies.
//!
//! | Situation | `read` result |
//! |-----------|---------------|
//! | File absent | `Ok(None)` |
//! | TTL given and `now > modified + ttl` | `Ok(None)` |
//! | Bytes decode | `Ok(Some(value))` |
//! | Bytes fail to decode | file deleted, `Err(CorruptCache)` |
//! | Filesystem failure | `Err(Io)` |
//!
//! Writes go to a temporary file beside the target and are renamed over it,
//! so readers never see a half-written entry. The store holds no state
//! besides the filesystem; concurrent writers to the same key are not
//! serialized here.

mod key;

pub use key::{file_name, is_valid_namespace, FILE_NAME_LEN};

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tempfile::NamedTempFile;

use crate::codec::{self, Record};
use crate::config::CacheConfig;
use crate::error::{DecodeError, Error, Result};

/// Wall clock used for freshness checks.
pub type Clock = Arc<dyn Fn() -> SystemTime + Send + Sync>;

/// Whether an entry modified at `modified` is stale at `now`.
///
/// The boundary is fresh: exactly `modified + ttl` is not expired.
pub fn is_expired(modified: SystemTime, ttl: Duration, now: SystemTime) -> bool {
    match modified.checked_add(ttl) {
        Some(deadline) => now > deadline,
        None => false,
    }
}

/// File-backed cache of codec records.
#[derive(Clone)]
pub struct CacheStore {
    root: PathBuf,
    default_ttl: Option<Duration>,
    clock: Clock,
}

impl CacheStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            default_ttl: None,
            clock: Arc::new(SystemTime::now),
        }
    }

    /// Create a store from configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(&config.dir).with_default_ttl(config.default_ttl())
    }

    /// Set the TTL used by [`read_fresh`](Self::read_fresh).
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: impl Fn() -> SystemTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Get the cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the default TTL.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Resolve a path against the root; absolute paths are kept as-is.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    /// Path of the entry for `key` in `namespace`.
    pub fn entry_path(&self, namespace: &str, key: &str) -> Result<PathBuf> {
        Ok(self.namespace_dir(namespace)?.join(file_name(key)))
    }

    /// Read a record. `None` when absent or expired.
    pub fn read<R: Record>(&self, path: impl AsRef<Path>, ttl: Option<Duration>) -> Result<Option<R>> {
        self.load(path.as_ref(), ttl, codec::decode)
    }

    /// Read a record sequence. `None` when absent or expired.
    pub fn read_list<R: Record>(
        &self,
        path: impl AsRef<Path>,
        ttl: Option<Duration>,
    ) -> Result<Option<Vec<R>>> {
        self.load(path.as_ref(), ttl, codec::decode_sequence)
    }

    /// [`read`](Self::read) with the store's default TTL.
    pub fn read_fresh<R: Record>(&self, path: impl AsRef<Path>) -> Result<Option<R>> {
        self.read(path, self.default_ttl)
    }

    /// [`read_list`](Self::read_list) with the store's default TTL.
    pub fn read_list_fresh<R: Record>(&self, path: impl AsRef<Path>) -> Result<Option<Vec<R>>> {
        self.read_list(path, self.default_ttl)
    }

    /// Write a record, creating parent directories.
    pub fn write<R: Record>(&self, path: impl AsRef<Path>, value: &R) -> Result<()> {
        self.store(path.as_ref(), &codec::encode(value))
    }

    /// Write a record sequence, creating parent directories.
    pub fn write_list<R: Record>(&self, path: impl AsRef<Path>, values: &[R]) -> Result<()> {
        self.store(path.as_ref(), &codec::encode_sequence(values))
    }

    /// Delete an entry. Returns whether a file was removed.
    pub fn invalidate(&self, path: impl AsRef<Path>) -> Result<bool> {
        let path = self.resolve(path);
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Invalidated cache entry: {:?}", path);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every entry of a namespace. Returns the number of files removed.
    pub fn purge_namespace(&self, namespace: &str) -> Result<usize> {
        let dir = self.namespace_dir(namespace)?;
        let removed = self.purge_prefix(&dir, "")?;
        // Leftover subdirectories or a racing writer may keep it non-empty.
        if let Err(e) = fs::remove_dir(&dir) {
            match e.kind() {
                io::ErrorKind::NotFound | io::ErrorKind::DirectoryNotEmpty => {}
                _ => log::debug!("Keeping namespace dir {:?}: {}", dir, e),
            }
        }
        Ok(removed)
    }

    /// Delete files in `dir` whose names start with `prefix`.
    pub fn purge_prefix(&self, dir: impl AsRef<Path>, prefix: &str) -> Result<usize> {
        let dir = self.resolve(dir);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with(prefix) {
                match fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        log::debug!("Purged {} cache entries from {:?} (prefix {:?})", removed, dir, prefix);
        Ok(removed)
    }

    /// Remove the whole cache tree.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {
                log::info!("Cleared cache: {:?}", self.root);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Total size in bytes of all files under the root.
    pub fn disk_usage(&self) -> Result<u64> {
        match dir_size(&self.root) {
            Ok(size) => Ok(size),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf> {
        if !is_valid_namespace(namespace) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid cache namespace: {:?}", namespace),
            )));
        }
        Ok(self.root.join(namespace))
    }

    fn load<T>(
        &self,
        path: &Path,
        ttl: Option<Duration>,
        decode: impl FnOnce(&[u8]) -> std::result::Result<T, DecodeError>,
    ) -> Result<Option<T>> {
        let path = self.resolve(path);

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if let Some(ttl) = ttl {
            let modified = metadata.modified()?;
            let now = (self.clock)();
            if is_expired(modified, ttl, now) {
                if log::log_enabled!(log::Level::Debug) {
                    let overdue = now
                        .duration_since(modified + ttl)
                        .unwrap_or_default()
                        .as_secs();
                    log::debug!("Cache {:?} expired for {}s", path, overdue);
                }
                return Ok(None);
            }
        }

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match decode(&data) {
            Ok(value) => Ok(Some(value)),
            Err(source) => {
                log::warn!("Unable to decode {:?}: {}, deleting", path, source);
                remove_quietly(&path);
                Err(Error::CorruptCache { path, source })
            }
        }
    }

    fn store(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = self.resolve(path);
        let result = write_atomic(&path, data);

        if let Err(ref e) = result {
            log::error!("Unable to write cache {:?}: {}", path, e);
            // A failed write invalidates the entry.
            remove_quietly(&path);
        }

        result.map_err(Error::from)
    }
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("root", &self.root)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

/// Write `data` to a temp file beside `path`, then rename it over `path`.
///
/// The temp file is deleted when dropped on any error path.
fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid parent dir of {:?}", path),
            )
        })?;
    fs::create_dir_all(parent)?;

    let mut temp_file = NamedTempFile::new_in(parent)?;
    temp_file.write_all(data)?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            log::warn!("Failed to delete {:?}: {}", path, e);
        }
    }
}

fn dir_size(path: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            total += dir_size(&entry.path())?;
        } else if file_type.is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}
