//! Path resolution and sandbox containment
//!
//! Maps logical key strings to absolute filesystem paths under the store
//! root, and back. Every public store operation goes through here before
//! touching the filesystem.
//!
//! ## Rules
//! - Keys are slash-separated relative paths; a trailing separator denotes
//!   a container where a key is required and is rejected.
//! - A leading separator is treated as root-relative, not absolute.
//! - `.` and `..` segments are normalized lexically *before* the
//!   containment check, so `a/../../etc/passwd` is rejected rather than
//!   resolved outside the root.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, StoreError};

/// Resolves logical keys against a fixed store root
#[derive(Debug, Clone)]
pub(crate) struct PathResolver {
    /// Absolute store root; never mutated after construction
    root: PathBuf,
}

impl PathResolver {
    /// Create a resolver over an absolute root path
    pub(crate) fn new(root: PathBuf) -> Self {
        debug_assert!(root.is_absolute());
        Self { root }
    }

    /// The store root this resolver is anchored at
    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to its absolute backing path.
    ///
    /// Rejects a trailing separator (that denotes a container, not a key)
    /// and any path that would escape the store root. The empty string
    /// resolves to the root itself, which container-level operations rely
    /// on.
    pub(crate) fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.ends_with('/') || (cfg!(windows) && path.ends_with('\\')) {
            return Err(StoreError::invalid(path, "path may not end with a separator"));
        }
        self.resolve_relative(path)
    }

    /// Resolve a container path: same containment rules as [`resolve`],
    /// but a trailing separator is permitted.
    pub(crate) fn resolve_container(&self, path: &str) -> Result<PathBuf> {
        self.resolve_relative(path.trim_end_matches(['/', '\\']))
    }

    fn resolve_relative(&self, path: &str) -> Result<PathBuf> {
        // Leading separator means root-relative, not absolute-outside-store.
        let trimmed = path.trim_start_matches(['/', '\\']);

        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(StoreError::invalid(path, "path escapes the store root"));
                    }
                    resolved.pop();
                    depth -= 1;
                }
                // Absolute/prefixed components cannot appear after the trim
                // on Unix; on Windows a drive prefix is an escape attempt.
                Component::RootDir | Component::Prefix(_) => {
                    return Err(StoreError::invalid(path, "path escapes the store root"));
                }
            }
        }

        Ok(resolved)
    }

    /// Inverse mapping: the key string for an absolute path under the root.
    ///
    /// Components are joined with `/` so keys are platform-independent
    /// strings. Returns the empty string for the root itself.
    pub(crate) fn key_of(&self, abs: &Path) -> String {
        let rel = abs.strip_prefix(&self.root).unwrap_or(abs);
        let mut key = String::new();
        for component in rel.components() {
            if !key.is_empty() {
                key.push('/');
            }
            key.push_str(&component.as_os_str().to_string_lossy());
        }
        key
    }
}
