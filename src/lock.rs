//! Advisory file locking
//!
//! Non-blocking exclusive locks on open file handles, one backend per
//! platform behind the same signatures. Locks are cooperative: they only
//! exclude other participants that go through this engine's API.
//!
//! A lock lives exactly as long as its handle — dropping the `File`
//! releases it. Unix uses `flock`, which is scoped per open file
//! description, so two handles contend even within one process; Windows
//! uses `LockFileEx` over the whole byte range, which has the same
//! per-handle semantics.

use std::fs::File;
use std::io;

use crate::error::{Result, StoreError};

/// Attempt a non-blocking exclusive lock on `file`.
///
/// Fails with [`StoreError::Locked`] if another holder currently has the
/// lock; any other failure is surfaced unchanged as an I/O error with
/// `key` as context.
pub(crate) fn lock(key: &str, file: &File) -> Result<()> {
    match try_lock_exclusive(file) {
        Ok(()) => Ok(()),
        Err(err) if is_contention(&err) => Err(StoreError::Locked { key: key.to_string() }),
        Err(err) => Err(StoreError::from_io(key, err)),
    }
}

/// Release a lock previously acquired with [`lock`].
///
/// Idempotent: unlocking a handle that holds no lock succeeds. Closing the
/// handle releases the lock anyway; this exists so `close()` can release
/// eagerly and report errors.
pub(crate) fn unlock(file: &File) -> io::Result<()> {
    release(file)
}

fn is_contention(err: &io::Error) -> bool {
    // EWOULDBLOCK/EAGAIN on Unix; ERROR_LOCK_VIOLATION maps to WouldBlock
    // through io::Error on Windows as well.
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == Some(contention_code())
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
    use rustix::fs::{flock, FlockOperation};
    use std::os::unix::io::AsFd;

    flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
        .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(unix)]
fn release(file: &File) -> io::Result<()> {
    use rustix::fs::{flock, FlockOperation};
    use std::os::unix::io::AsFd;

    flock(file.as_fd(), FlockOperation::Unlock)
        .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(unix)]
fn contention_code() -> i32 {
    rustix::io::Errno::AGAIN.raw_os_error()
}

#[cfg(windows)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };

    let handle = file.as_raw_handle() as HANDLE;
    let flags = LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK;

    // SAFETY: OVERLAPPED is a plain data struct that is valid when
    // zero-initialized. LockFileEx is safe to call with a valid file
    // handle and zeroed OVERLAPPED.
    let result = unsafe {
        let mut overlapped = std::mem::zeroed();
        LockFileEx(handle, flags, 0, u32::MAX, u32::MAX, &mut overlapped)
    };

    if result == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(windows)]
fn release(file: &File) -> io::Result<()> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::Storage::FileSystem::UnlockFile;

    let handle = file.as_raw_handle() as HANDLE;

    // SAFETY: UnlockFile only requires a valid handle and the same range
    // that was locked.
    let result = unsafe { UnlockFile(handle, 0, 0, u32::MAX, u32::MAX) };

    if result == 0 {
        let err = io::Error::last_os_error();
        // Releasing a handle that holds no lock is a no-op, not a failure.
        let not_locked = windows_sys::Win32::Foundation::ERROR_NOT_LOCKED as i32;
        if err.raw_os_error() == Some(not_locked) {
            return Ok(());
        }
        return Err(err);
    }
    Ok(())
}

#[cfg(windows)]
fn contention_code() -> i32 {
    windows_sys::Win32::Foundation::ERROR_LOCK_VIOLATION as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;

    fn open_rw(path: &std::path::Path) -> File {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .unwrap()
    }

    #[test]
    fn second_handle_observes_contention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k");

        let first = open_rw(&path);
        lock("k", &first).unwrap();

        let second = open_rw(&path);
        assert!(matches!(
            lock("k", &second),
            Err(StoreError::Locked { key }) if key == "k"
        ));
    }

    #[test]
    fn dropping_the_handle_releases_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k");

        {
            let first = open_rw(&path);
            lock("k", &first).unwrap();
        }

        let second = open_rw(&path);
        lock("k", &second).unwrap();
    }

    #[test]
    fn unlock_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k");

        let file = open_rw(&path);
        lock("k", &file).unwrap();
        unlock(&file).unwrap();
        unlock(&file).unwrap();

        let other = open_rw(&path);
        lock("k", &other).unwrap();
    }
}
