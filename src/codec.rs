//! Transparent value compression
//!
//! Wraps the raw backing `File` of a key in gzip framing, selectable per
//! call. Compression is a storage-format detail: callers read and write
//! logical bytes and never see the framing. When compression is off the
//! raw file passes through unchanged.
//!
//! Reads go through [`MultiGzDecoder`] so that values built up with
//! compressed `append` (concatenated gzip members on disk) decode as one
//! logical byte stream. Reading a key whose on-disk bytes are not gzip
//! while compression is requested surfaces as an error from the decoder;
//! it is not specially caught.

use std::fs::File;
use std::io::{self, Read, Write};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Result, StoreError};
use crate::lock;
use crate::store::OpenMode;

/// Per-call codec selection for value operations.
///
/// Defaults to gzip compression at level 1 (fast). A store carries one of
/// these as its default; any value operation can override it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// Apply gzip framing on this operation
    pub compress: bool,
    /// Gzip compression level, 0 (none) to 9 (best)
    pub level: u32,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self { compress: true, level: 1 }
    }
}

impl CodecOptions {
    /// No compression: raw bytes on disk
    pub fn plain() -> Self {
        Self { compress: false, level: 0 }
    }

    /// Gzip compression at the given level (0-9)
    pub fn gzip(level: u32) -> Self {
        Self { compress: true, level }
    }
}

/// An open stream over one key's value.
///
/// Returned by [`Store::open`](crate::Store::open) and
/// [`Store::create`](crate::Store::create). Implements [`Read`] and
/// [`Write`]; which directions actually work depends on the mode the
/// handle was opened with (writing to a read handle is
/// `ErrorKind::Unsupported`, the same for the reverse).
///
/// Write-capable handles hold the advisory lock on the key. The lock is
/// released when the handle is closed; [`ValueHandle::close`] is the
/// supported path because it finishes the gzip trailer and reports errors,
/// but `Drop` finishes the stream as a backstop so no data is lost on
/// early-exit paths.
pub struct ValueHandle {
    /// Key this handle is open on, kept for error context
    key: String,
    stream: Stream,
}

enum Stream {
    /// Uncompressed passthrough; direction enforced by the OS open mode
    Plain(File),
    /// Gzip read side (handles concatenated members)
    Reader(MultiGzDecoder<File>),
    /// Gzip write side
    Writer(GzEncoder<File>),
}

impl ValueHandle {
    /// Wrap an already-opened (and, for write modes, already-locked) file
    /// per the requested codec and open mode.
    pub(crate) fn wrap(key: impl Into<String>, file: File, mode: OpenMode, opts: CodecOptions) -> Self {
        let stream = if !opts.compress {
            Stream::Plain(file)
        } else if mode.reads_existing() {
            Stream::Reader(MultiGzDecoder::new(file))
        } else {
            Stream::Writer(GzEncoder::new(file, Compression::new(opts.level)))
        };
        Self { key: key.into(), stream }
    }

    /// The key this handle is open on
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Finish the stream and release the lock.
    ///
    /// For compressed writes this writes the gzip trailer; for all handles
    /// it releases the advisory lock before the file is dropped.
    pub fn close(self) -> Result<()> {
        let ValueHandle { key, stream } = self;
        let file = match stream {
            Stream::Plain(file) => file,
            Stream::Reader(decoder) => decoder.into_inner(),
            Stream::Writer(encoder) => encoder.finish().map_err(|e| StoreError::Io {
                key: key.clone(),
                source: e,
            })?,
        };
        lock::unlock(&file).map_err(|e| StoreError::Io { key, source: e })?;
        Ok(())
    }

    /// Read the remaining contents into a byte vector.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl Read for ValueHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.stream {
            Stream::Plain(file) => file.read(buf),
            Stream::Reader(decoder) => decoder.read(buf),
            Stream::Writer(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "handle was opened for writing",
            )),
        }
    }
}

impl Write for ValueHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.stream {
            Stream::Plain(file) => file.write(buf),
            Stream::Writer(encoder) => encoder.write(buf),
            Stream::Reader(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "handle was opened for reading",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.stream {
            Stream::Plain(file) => file.flush(),
            Stream::Writer(encoder) => encoder.flush(),
            Stream::Reader(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn plain_write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v");

        let file = File::create(&path).unwrap();
        let mut handle = ValueHandle::wrap("v", file, OpenMode::Write, CodecOptions::plain());
        handle.write_all(b"raw bytes").unwrap();
        handle.close().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"raw bytes");
    }

    #[test]
    fn gzip_write_produces_gzip_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v");

        let file = File::create(&path).unwrap();
        let mut handle = ValueHandle::wrap("v", file, OpenMode::Write, CodecOptions::default());
        handle.write_all(b"compressed").unwrap();
        handle.close().unwrap();

        let on_disk = fs::read(&path).unwrap();
        assert_eq!(&on_disk[..2], &[0x1f, 0x8b]);

        let file = File::open(&path).unwrap();
        let mut handle = ValueHandle::wrap("v", file, OpenMode::Read, CodecOptions::default());
        assert_eq!(handle.read_all().unwrap(), b"compressed");
    }

    #[test]
    fn reader_decodes_concatenated_members() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v");

        for chunk in [&b"first "[..], &b"second"[..]] {
            let file = fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(&path)
                .unwrap();
            let mut handle = ValueHandle::wrap("v", file, OpenMode::Append, CodecOptions::default());
            handle.write_all(chunk).unwrap();
            handle.close().unwrap();
        }

        let file = File::open(&path).unwrap();
        let mut handle = ValueHandle::wrap("v", file, OpenMode::Read, CodecOptions::default());
        assert_eq!(handle.read_all().unwrap(), b"first second");
    }

    #[test]
    fn close_releases_the_lock_and_reports_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v");

        let file = File::create(&path).unwrap();
        crate::lock::lock("v", &file).unwrap();
        let mut handle = ValueHandle::wrap("v", file, OpenMode::Write, CodecOptions::default());
        handle.write_all(b"bytes").unwrap();
        handle.close().unwrap();

        // The lock is gone: a fresh handle can take it immediately.
        let other = fs::OpenOptions::new().write(true).open(&path).unwrap();
        crate::lock::lock("v", &other).unwrap();
    }

    #[test]
    fn wrong_direction_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v");
        fs::write(&path, b"").unwrap();

        let file = File::open(&path).unwrap();
        let mut reader = ValueHandle::wrap("v", file, OpenMode::Read, CodecOptions::default());
        let err = reader.write(b"nope").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);

        let file = File::create(&path).unwrap();
        let mut writer = ValueHandle::wrap("v", file, OpenMode::Write, CodecOptions::default());
        let err = writer.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
