//! Directory maintenance
//!
//! Creates missing intermediate directories on the write path and prunes
//! empty directories on demand. Pruning walks the tree bottom-up
//! (children before their parents) and relies on nothing else about
//! traversal order: `remove_dir` simply fails on a non-empty directory
//! and the directory is kept.

use std::fs;
use std::io;
use std::path::Path;

use tracing::trace;
use walkdir::WalkDir;

/// Create all missing intermediate directories for `path`'s parent.
///
/// No-op when the full path already exists. Errors if the resolved path
/// has no directory component or no filename component.
pub(crate) fn ensure_parents(path: &Path) -> io::Result<()> {
    if path.exists() {
        return Ok(());
    }

    let parent = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "expected a directory component")
    })?;
    if path.file_name().is_none() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "expected a filename component",
        ));
    }

    if !parent.exists() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Remove every empty directory under `root`, bottom-up.
///
/// A directory whose children were all removed earlier in the pass is
/// itself removed. If the pass empties `root`, the root is removed and
/// immediately recreated so the store stays usable. Returns the number of
/// directories removed (not counting the root).
pub(crate) fn prune_empty(root: &Path) -> io::Result<usize> {
    let mut removed = 0usize;

    for entry in WalkDir::new(root)
        .contents_first(true)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_dir() && e.path() != root)
    {
        // Fails on non-empty directories, which is exactly the filter we want.
        if fs::remove_dir(entry.path()).is_ok() {
            trace!(dir = %entry.path().display(), "removed empty directory");
            removed += 1;
        }
    }

    if is_empty_dir(root)? {
        fs::remove_dir(root)?;
    }
    if !root.exists() {
        fs::create_dir_all(root)?;
    }

    Ok(removed)
}

fn is_empty_dir(path: &Path) -> io::Result<bool> {
    match fs::read_dir(path) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_parents_creates_missing_intermediates() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/c/key");

        ensure_parents(&target).unwrap();

        assert!(dir.path().join("a/b/c").is_dir());
        assert!(!target.exists());
    }

    #[test]
    fn ensure_parents_is_a_noop_when_path_exists() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("key");
        fs::write(&target, b"x").unwrap();

        ensure_parents(&target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"x");
    }

    #[test]
    fn prune_removes_nested_empty_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        fs::create_dir_all(dir.path().join("d")).unwrap();
        fs::write(dir.path().join("d/key"), b"x").unwrap();

        let removed = prune_empty(dir.path()).unwrap();

        assert_eq!(removed, 3);
        assert!(!dir.path().join("a").exists());
        assert!(dir.path().join("d/key").is_file());
    }

    #[test]
    fn prune_recreates_an_emptied_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        fs::create_dir_all(root.join("only/empty/dirs")).unwrap();

        prune_empty(&root).unwrap();

        assert!(root.is_dir());
        assert!(is_empty_dir(&root).unwrap());
    }

    #[test]
    fn prune_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();

        prune_empty(dir.path()).unwrap();
        let removed = prune_empty(dir.path()).unwrap();
        assert_eq!(removed, 0);
    }
}
