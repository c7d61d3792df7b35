//! Store facade
//!
//! Composes the resolver, lock, codec, and maintenance modules into the
//! public key/container API.
//!
//! ## Control flow
//! Every operation resolves its path through the resolver first. Write-path
//! operations then create missing parent directories and acquire the
//! advisory lock on the opened handle before any data is transferred; the
//! resulting stream is wrapped by the codec per the call's options.
//!
//! ## Concurrency model
//! Everything here is synchronous, blocking I/O. Safety across processes
//! (and across handles within one process) rests solely on the OS advisory
//! lock: a write-capable open either takes the lock immediately or fails
//! with `Locked`. This layer never retries, never blocks on a lock, and
//! provides no additional in-process mutual exclusion.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use regex::Regex;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::codec::{CodecOptions, ValueHandle};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::lock;
use crate::maintenance;
use crate::resolver::PathResolver;

/// Default prefix for keys allocated by [`Store::create`]
pub const CREATE_PREFIX: &str = "tmp";

/// Suffix appended to compressed auto-named keys
pub const GZIP_SUFFIX: &str = ".gz";

/// How a key is opened by [`Store::open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only; the key must exist; no lock is taken
    Read,
    /// Write-only; creates the key, truncating any existing value
    Write,
    /// Write-only; creates the key if missing, appends to the end
    Append,
    /// Read-write; the key must exist. Used by [`Store::get`] so that
    /// reading a value excludes concurrent writers for the duration.
    ReadWrite,
    /// Read-write; creates the key, truncating any existing value
    WriteCreate,
}

impl OpenMode {
    /// Modes that read an existing value (codec read side)
    pub(crate) fn reads_existing(self) -> bool {
        matches!(self, OpenMode::Read | OpenMode::ReadWrite)
    }

    /// Every mode other than pure read creates parents and takes the lock
    fn is_write_capable(self) -> bool {
        !matches!(self, OpenMode::Read)
    }

    fn options(self) -> OpenOptions {
        let mut opts = OpenOptions::new();
        match self {
            OpenMode::Read => {
                opts.read(true);
            }
            OpenMode::Write => {
                opts.write(true).create(true).truncate(true);
            }
            OpenMode::Append => {
                opts.append(true).create(true);
            }
            OpenMode::ReadWrite => {
                opts.read(true).write(true);
            }
            OpenMode::WriteCreate => {
                opts.read(true).write(true).create(true).truncate(true);
            }
        }
        opts
    }
}

/// A key-value store backed by a directory tree.
///
/// Keys are slash-separated path strings, one regular file each; containers
/// are directories grouping keys under a common prefix. All paths resolve
/// inside the store root; anything that would escape it is rejected with
/// [`StoreError::Invalid`].
pub struct Store {
    resolver: PathResolver,
    config: StoreConfig,
}

impl Store {
    /// Open a store over `location` with the default configuration.
    ///
    /// The location is made absolute lexically; it is not required to
    /// exist yet — the root is created by the first write.
    pub fn new(location: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(location, StoreConfig::default())
    }

    /// Open a store over `location` with an explicit configuration.
    pub fn with_config(location: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let location = location.as_ref();
        let root = std::path::absolute(location)
            .map_err(|e| StoreError::from_io(&location.to_string_lossy(), e))?;
        Ok(Self {
            resolver: PathResolver::new(root),
            config,
        })
    }

    /// The absolute store root
    pub fn location(&self) -> &Path {
        self.resolver.root()
    }

    /// The store's default codec and configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // =========================================================================
    // Predicates
    // =========================================================================

    /// Test whether a key or container exists at `path`.
    ///
    /// Absence is `Ok(false)`; only an invalid path errors.
    pub fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolver.resolve(path)?.exists())
    }

    /// Test whether `path` is a key (a regular file).
    pub fn is_key(&self, path: &str) -> Result<bool> {
        Ok(self.resolver.resolve(path)?.is_file())
    }

    /// Test whether `path` is a container (a directory).
    pub fn is_container(&self, path: &str) -> Result<bool> {
        Ok(self.resolver.resolve(path)?.is_dir())
    }

    // =========================================================================
    // Stat-derived metadata
    // =========================================================================

    /// Modification time of `key`.
    pub fn modified(&self, key: &str) -> Result<SystemTime> {
        let meta = self.key_metadata(key)?;
        meta.modified().map_err(|e| StoreError::from_io(key, e))
    }

    /// Size in bytes of the on-disk contents of `key`.
    ///
    /// This is the stored (possibly compressed) size, not the logical
    /// value length.
    pub fn size(&self, key: &str) -> Result<u64> {
        Ok(self.key_metadata(key)?.len())
    }

    fn key_metadata(&self, key: &str) -> Result<fs::Metadata> {
        let abs = self.resolver.resolve(key)?;
        let meta = fs::metadata(&abs).map_err(|e| StoreError::from_io(key, e))?;
        // stat succeeds on directories, so the wrong-kind case is explicit.
        if meta.is_dir() {
            return Err(StoreError::NotAKey { key: key.to_string() });
        }
        Ok(meta)
    }

    // =========================================================================
    // Open / create
    // =========================================================================

    /// Open `key` with the store's default codec.
    pub fn open(&self, key: &str, mode: OpenMode) -> Result<ValueHandle> {
        self.open_with(key, mode, self.config.codec)
    }

    /// Open `key` and return a stream over its value.
    ///
    /// For any mode other than [`OpenMode::Read`], parent directories are
    /// created first and the advisory lock is acquired on the opened
    /// handle before any data is transferred.
    pub fn open_with(&self, key: &str, mode: OpenMode, opts: CodecOptions) -> Result<ValueHandle> {
        let abs = self.resolver.resolve(key)?;
        if mode.is_write_capable() {
            maintenance::ensure_parents(&abs).map_err(|e| StoreError::from_io(key, e))?;
        }
        let file = mode
            .options()
            .open(&abs)
            .map_err(|e| StoreError::from_io(key, e))?;
        if mode.is_write_capable() {
            lock::lock(key, &file)?;
        }
        Ok(ValueHandle::wrap(key, file, mode, opts))
    }

    /// Atomically allocate a brand-new, uniquely-named key with the
    /// store's default codec, prefix, and suffix.
    pub fn create(&self, container: Option<&str>) -> Result<(String, ValueHandle)> {
        self.create_with(container, self.config.codec, CREATE_PREFIX, "")
    }

    /// Atomically allocate a brand-new, uniquely-named key inside
    /// `container` (or the store root), creating the container if missing.
    ///
    /// Returns the generated key and an already-locked write handle.
    /// Uniqueness is guaranteed by the atomic temp-file creation
    /// primitive, not by a naming convention. An empty `suffix` defaults
    /// to `.gz` when compression is requested.
    pub fn create_with(
        &self,
        container: Option<&str>,
        opts: CodecOptions,
        prefix: &str,
        suffix: &str,
    ) -> Result<(String, ValueHandle)> {
        let label = container.unwrap_or("");
        let dst = match container {
            Some(path) => self.resolver.resolve_container(path)?,
            None => self.resolver.root().to_path_buf(),
        };
        if !dst.exists() {
            fs::create_dir_all(&dst).map_err(|e| StoreError::from_io(label, e))?;
        }

        let suffix = if opts.compress && suffix.is_empty() {
            GZIP_SUFFIX
        } else {
            suffix
        };
        let tmp = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(&dst)
            .map_err(|e| StoreError::from_io(label, e))?;
        let (file, path) = tmp
            .keep()
            .map_err(|e| StoreError::from_io(label, e.error))?;

        let key = self.resolver.key_of(&path);
        if let Err(err) = lock::lock(&key, &file) {
            // Don't leave the freshly persisted file behind on failure.
            fs::remove_file(&path).ok();
            return Err(err);
        }
        debug!(key = %key, "created key");
        Ok((
            key.clone(),
            ValueHandle::wrap(key, file, OpenMode::WriteCreate, opts),
        ))
    }

    /// Create a new container at `path`.
    ///
    /// Fails loudly if anything already exists there, container or not —
    /// silently reusing an existing path is never correct here.
    pub fn create_container(&self, path: &str) -> Result<()> {
        let abs = self.resolver.resolve_container(path)?;
        if abs.exists() {
            let message = if abs.is_dir() {
                "container already exists"
            } else {
                "path already exists but is not a container"
            };
            return Err(StoreError::Io {
                key: path.to_string(),
                source: io::Error::new(io::ErrorKind::AlreadyExists, message),
            });
        }
        fs::create_dir_all(&abs).map_err(|e| StoreError::from_io(path, e))
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Delete the key `key`.
    pub fn delete(&self, key: &str) -> Result<()> {
        let abs = self.resolver.resolve(key)?;
        // remove_file's errno for a directory differs per platform, so the
        // wrong-kind case is checked explicitly.
        if abs.is_dir() {
            return Err(StoreError::NotAKey { key: key.to_string() });
        }
        fs::remove_file(&abs).map_err(|e| StoreError::from_io(key, e))?;
        debug!(key, "deleted key");
        Ok(())
    }

    /// Recursively remove the container at `path` and everything under it.
    pub fn drop_container(&self, path: &str) -> Result<()> {
        let abs = self.resolver.resolve_container(path)?;
        fs::remove_dir_all(&abs).map_err(|e| StoreError::from_io(path, e))?;
        debug!(container = path, "dropped container");
        Ok(())
    }

    /// Remove every empty directory in the store.
    ///
    /// If that empties the root itself, the root is recreated so the
    /// store remains usable.
    pub fn clean(&self) -> Result<()> {
        let root = self.resolver.root();
        let removed = maintenance::prune_empty(root)
            .map_err(|e| StoreError::from_io(&root.to_string_lossy(), e))?;
        debug!(removed, "cleaned empty directories");
        Ok(())
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// List existing keys matching `pattern`, lazily.
    ///
    /// `pattern` is a regular expression matched at the *start* of the
    /// candidate string: the full key (container prefix included) when
    /// `match_path` is true, only the final path segment otherwise. If
    /// `path` is given the walk starts there instead of the store root,
    /// and yielded keys include that prefix.
    ///
    /// The returned iterator is forward-only and not restartable, holds no
    /// lock, and reflects a live view of the tree: concurrent mutation may
    /// be observed mid-walk. Traversal order follows directory-walk order
    /// and is not otherwise guaranteed.
    pub fn find(&self, pattern: &str, path: Option<&str>, match_path: bool) -> Result<Find> {
        let base = match path {
            Some(p) => self.resolver.resolve_container(p)?,
            None => self.resolver.root().to_path_buf(),
        };
        let prefix = self.resolver.key_of(&base);
        Ok(Find {
            walker: WalkDir::new(base.clone()).into_iter(),
            base,
            prefix,
            pattern: Regex::new(pattern)?,
            match_path,
        })
    }

    // =========================================================================
    // Rename
    // =========================================================================

    /// Rename key `src` to `dst`, creating `dst`'s parent directories.
    ///
    /// Assumes `src` exists; filesystem errors surface through the usual
    /// mapping rather than a pre-check.
    pub fn rename(&self, src: &str, dst: &str) -> Result<()> {
        let src_abs = self.resolver.resolve(src)?;
        let dst_abs = self.resolver.resolve(dst)?;
        let context = || format!("{src} -> {dst}");
        maintenance::ensure_parents(&dst_abs).map_err(|e| StoreError::from_io(&context(), e))?;
        fs::rename(&src_abs, &dst_abs).map_err(|e| StoreError::from_io(&context(), e))?;
        debug!(src, dst, "renamed key");
        Ok(())
    }

    // =========================================================================
    // Convenience compositions
    // =========================================================================

    /// Set the value of `key` to `value` (open write-truncate, write, close).
    pub fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.put_with(key, value, self.config.codec)
    }

    /// [`put`](Store::put) with explicit codec options.
    pub fn put_with(&self, key: &str, value: &[u8], opts: CodecOptions) -> Result<()> {
        let mut handle = self.open_with(key, OpenMode::Write, opts)?;
        handle
            .write_all(value)
            .map_err(|e| StoreError::from_io(key, e))?;
        handle.close()
    }

    /// Append `value` to the current value of `key`.
    pub fn append(&self, key: &str, value: &[u8]) -> Result<()> {
        self.append_with(key, value, self.config.codec)
    }

    /// [`append`](Store::append) with explicit codec options.
    pub fn append_with(&self, key: &str, value: &[u8], opts: CodecOptions) -> Result<()> {
        let mut handle = self.open_with(key, OpenMode::Append, opts)?;
        handle
            .write_all(value)
            .map_err(|e| StoreError::from_io(key, e))?;
        handle.close()
    }

    /// Return the value of `key`.
    ///
    /// Opens read-write so the advisory lock is held for the duration of
    /// the read: a `get` excludes concurrent writers, and contends with
    /// them. The key must exist.
    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.get_with(key, self.config.codec)
    }

    /// [`get`](Store::get) with explicit codec options.
    pub fn get_with(&self, key: &str, opts: CodecOptions) -> Result<Vec<u8>> {
        let mut handle = self.open_with(key, OpenMode::ReadWrite, opts)?;
        let value = handle
            .read_all()
            .map_err(|e| StoreError::from_io(key, e))?;
        handle.close()?;
        Ok(value)
    }
}

/// Lazy key traversal produced by [`Store::find`].
///
/// Forward-only and non-restartable; reflects a live, unsynchronized view
/// of the directory tree.
pub struct Find {
    walker: walkdir::IntoIter,
    base: PathBuf,
    prefix: String,
    pattern: Regex,
    match_path: bool,
}

impl Find {
    fn key_for(&self, abs: &Path) -> String {
        let mut key = String::new();
        if !self.prefix.is_empty() {
            key.push_str(&self.prefix);
        }
        let rel = abs.strip_prefix(&self.base).unwrap_or(abs);
        for component in rel.components() {
            if !key.is_empty() {
                key.push('/');
            }
            key.push_str(&component.as_os_str().to_string_lossy());
        }
        key
    }

    /// Anchored-at-start match, the way the pattern applies to candidates.
    fn matches(&self, candidate: &str) -> bool {
        self.pattern
            .find(candidate)
            .is_some_and(|m| m.start() == 0)
    }
}

impl Iterator for Find {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                // A missing start path just means there is nothing to list.
                Err(e)
                    if e.io_error()
                        .is_some_and(|io| io.kind() == io::ErrorKind::NotFound) =>
                {
                    continue;
                }
                Err(e) => {
                    let key = self.prefix.clone();
                    return Some(Err(StoreError::from_io(&key, e.into())));
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let key = self.key_for(entry.path());
            let candidate = if self.match_path {
                key.as_str()
            } else {
                key.rsplit('/').next().unwrap_or(&key)
            };
            if self.matches(candidate) {
                return Some(Ok(key));
            }
        }
    }
}

// =============================================================================
// Store lifecycle
// =============================================================================

/// Open the store at `location` and return a [`Store`] handle.
pub fn open_store(location: impl AsRef<Path>) -> Result<Store> {
    Store::new(location)
}

/// Recursively delete the entire store at `location`.
pub fn drop_store(location: impl AsRef<Path>) -> Result<()> {
    let location = location.as_ref();
    fs::remove_dir_all(location)
        .map_err(|e| StoreError::from_io(&location.to_string_lossy(), e))?;
    info!(location = %location.display(), "dropped store");
    Ok(())
}

/// Create a fresh, uniquely-named store directory under `parent` (or the
/// system temp directory) and return its location with an open handle.
pub fn create_store(parent: Option<&Path>) -> Result<(PathBuf, Store)> {
    let dir = match parent {
        Some(parent) => tempfile::tempdir_in(parent),
        None => tempfile::tempdir(),
    }
    .map_err(|e| StoreError::from_io("", e))?;
    let location = dir.keep();
    info!(location = %location.display(), "created store");
    let store = Store::new(&location)?;
    Ok((location, store))
}
