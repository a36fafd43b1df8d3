// src/core/stream.rs

//! Backing handles for configuration references.
//!
//! A reference is backed either by a path on disk that is opened lazily and may be closed
//! and reopened at will, or by an already-open stream (standard input, standard output or
//! an in-memory buffer) that can only be rewound. Both variants expose the same
//! [`StreamCapability`] interface so the reference never branches on a boolean flag.

use log::debug;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Access mode of a reference; decides which of `load`/`dump` are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// `r`: load only.
    Read,
    /// `w`: dump only.
    Write,
    /// `r+`: load and dump.
    ReadWrite,
}

impl AccessMode {
    /// True for `r` and `r+`.
    pub fn can_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// True for `w` and `r+`.
    pub fn can_write(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }

    /// Open options matching this mode. Nothing is ever truncated on open; writes go
    /// through the backend, which replaces the file as a whole.
    pub fn open_options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            Self::Read => options.read(true),
            Self::Write => options.write(true).create(true),
            Self::ReadWrite => options.read(true).write(true),
        };
        options
    }

    /// The short mode string: `r`, `w` or `r+`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "r",
            Self::Write => "w",
            Self::ReadWrite => "r+",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An access mode string that is none of the accepted spellings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown access mode '{0}' (expected r, w, r+, read, write or read-write)")]
pub struct ModeParseError(String);

impl FromStr for AccessMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" | "read" => Ok(Self::Read),
            "w" | "write" => Ok(Self::Write),
            "r+" | "read-write" => Ok(Self::ReadWrite),
            other => Err(ModeParseError(other.to_string())),
        }
    }
}

/// In-memory byte storage shared by every clone of a buffer endpoint.
///
/// Each handle keeps its own position, so one clone can write while another reads the
/// result back from the start.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
    position: u64,
}

impl SharedBuffer {
    /// A buffer holding `content`, positioned at its start.
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(content)),
            position: 0,
        }
    }

    /// A copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_position(&mut self, position: u64) {
        self.position = position;
    }
}

impl Read for SharedBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cursor = Cursor::new(bytes.as_slice());
        cursor.set_position(self.position);
        let n = cursor.read(buf)?;
        self.position = cursor.position();
        Ok(n)
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cursor = Cursor::new(&mut *bytes);
        cursor.set_position(self.position);
        let n = cursor.write(buf)?;
        self.position = cursor.position();
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An already-open stream a reference can be built around.
#[derive(Debug)]
pub enum StreamEndpoint {
    /// The process's standard input.
    Stdin(io::Stdin),
    /// The process's standard output.
    Stdout(io::Stdout),
    /// In-memory stream, readable and writable. Used to redirect standard streams.
    Buffer(SharedBuffer),
}

impl StreamEndpoint {
    /// A handle on the process's standard input.
    pub fn stdin() -> Self {
        Self::Stdin(io::stdin())
    }

    /// A handle on the process's standard output.
    pub fn stdout() -> Self {
        Self::Stdout(io::stdout())
    }

    /// An in-memory endpoint holding `content`. Clones share the same bytes.
    pub fn buffer(content: impl Into<Vec<u8>>) -> Self {
        Self::Buffer(SharedBuffer::new(content.into()))
    }

    /// The bytes held by a `Buffer` endpoint.
    pub fn contents(&self) -> Option<Vec<u8>> {
        match self {
            Self::Buffer(buffer) => Some(buffer.contents()),
            _ => None,
        }
    }
}

impl Clone for StreamEndpoint {
    fn clone(&self) -> Self {
        match self {
            Self::Stdin(_) => Self::stdin(),
            Self::Stdout(_) => Self::stdout(),
            Self::Buffer(buffer) => Self::Buffer(buffer.clone()),
        }
    }
}

/// The operations shared by file-backed and stream-backed handles.
pub(crate) trait StreamCapability {
    /// Acquires the handle if it is not held yet.
    fn open(&mut self, mode: AccessMode) -> io::Result<()>;
    /// Releases the handle. Idempotent.
    fn close(&mut self);
    /// Seeks the open handle back to its start.
    fn rewind(&mut self) -> io::Result<()>;
    fn readable(&self) -> bool;
    fn writable(&self) -> bool;
    fn is_open(&self) -> bool;
    fn reader(&mut self, mode: AccessMode) -> io::Result<&mut dyn Read>;
    fn writer(&mut self, mode: AccessMode) -> io::Result<&mut dyn Write>;
}

#[derive(Debug)]
pub(crate) struct FileBacking {
    pub(crate) path: PathBuf,
    handle: Option<File>,
}

impl FileBacking {
    pub(crate) fn new(path: impl Into<PathBuf>, handle: Option<File>) -> Self {
        Self {
            path: path.into(),
            handle,
        }
    }

    fn handle(&mut self, mode: AccessMode) -> io::Result<&mut File> {
        let file = match self.handle.take() {
            Some(file) => file,
            None => {
                debug!("Opening '{}' with mode '{}'", self.path.display(), mode);
                mode.open_options().open(&self.path)?
            }
        };
        Ok(self.handle.insert(file))
    }
}

impl StreamCapability for FileBacking {
    fn open(&mut self, mode: AccessMode) -> io::Result<()> {
        self.handle(mode).map(|_| ())
    }

    fn close(&mut self) {
        if self.handle.take().is_some() {
            debug!("Closed '{}'", self.path.display());
        }
    }

    fn rewind(&mut self) -> io::Result<()> {
        match self.handle.as_mut() {
            Some(file) => file.seek(SeekFrom::Start(0)).map(|_| ()),
            None => Ok(()),
        }
    }

    fn readable(&self) -> bool {
        true
    }

    fn writable(&self) -> bool {
        true
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn reader(&mut self, mode: AccessMode) -> io::Result<&mut dyn Read> {
        Ok(self.handle(mode)?)
    }

    fn writer(&mut self, mode: AccessMode) -> io::Result<&mut dyn Write> {
        Ok(self.handle(mode)?)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StreamBacking {
    endpoint: Option<StreamEndpoint>,
}

impl StreamBacking {
    pub(crate) fn new(endpoint: StreamEndpoint) -> Self {
        Self {
            endpoint: Some(endpoint),
        }
    }

    pub(crate) fn endpoint(&self) -> Option<&StreamEndpoint> {
        self.endpoint.as_ref()
    }

    fn endpoint_mut(&mut self) -> io::Result<&mut StreamEndpoint> {
        self.endpoint
            .as_mut()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "stream has been closed"))
    }
}

impl StreamCapability for StreamBacking {
    fn open(&mut self, _mode: AccessMode) -> io::Result<()> {
        // A stream is handed over already open and can never be reacquired.
        self.endpoint_mut().map(|_| ())
    }

    fn close(&mut self) {
        // Only our handle goes away; the process still owns stdin/stdout.
        self.endpoint = None;
    }

    fn rewind(&mut self) -> io::Result<()> {
        match self.endpoint_mut()? {
            StreamEndpoint::Buffer(buffer) => {
                buffer.set_position(0);
                Ok(())
            }
            StreamEndpoint::Stdin(_) => Err(io::Error::new(ErrorKind::Unsupported, "standard input cannot be rewound")),
            StreamEndpoint::Stdout(_) => Err(io::Error::new(ErrorKind::Unsupported, "standard output cannot be rewound")),
        }
    }

    fn readable(&self) -> bool {
        matches!(self.endpoint, Some(StreamEndpoint::Stdin(_) | StreamEndpoint::Buffer(_)))
    }

    fn writable(&self) -> bool {
        matches!(self.endpoint, Some(StreamEndpoint::Stdout(_) | StreamEndpoint::Buffer(_)))
    }

    fn is_open(&self) -> bool {
        self.endpoint.is_some()
    }

    fn reader(&mut self, _mode: AccessMode) -> io::Result<&mut dyn Read> {
        match self.endpoint_mut()? {
            StreamEndpoint::Stdin(stdin) => Ok(stdin),
            StreamEndpoint::Buffer(buffer) => Ok(buffer),
            StreamEndpoint::Stdout(_) => Err(io::Error::new(ErrorKind::Unsupported, "standard output is not readable")),
        }
    }

    fn writer(&mut self, _mode: AccessMode) -> io::Result<&mut dyn Write> {
        match self.endpoint_mut()? {
            StreamEndpoint::Stdout(stdout) => Ok(stdout),
            StreamEndpoint::Buffer(buffer) => Ok(buffer),
            StreamEndpoint::Stdin(_) => Err(io::Error::new(ErrorKind::Unsupported, "standard input is not writable")),
        }
    }
}

/// What a reference is backed by.
#[derive(Debug)]
pub(crate) enum Backing {
    File(FileBacking),
    Stream(StreamBacking),
}

impl Backing {
    pub(crate) fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    pub(crate) fn path(&self) -> Option<&Path> {
        match self {
            Self::File(file) => Some(&file.path),
            Self::Stream(_) => None,
        }
    }

    pub(crate) fn capability(&mut self) -> &mut dyn StreamCapability {
        match self {
            Self::File(file) => file,
            Self::Stream(stream) => stream,
        }
    }

    pub(crate) fn capability_ref(&self) -> &dyn StreamCapability {
        match self {
            Self::File(file) => file,
            Self::Stream(stream) => stream,
        }
    }
}

impl Clone for Backing {
    /// File handles are never shared: the clone reopens the path on first use.
    fn clone(&self) -> Self {
        match self {
            Self::File(file) => Self::File(FileBacking::new(file.path.clone(), None)),
            Self::Stream(stream) => Self::Stream(stream.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_access_mode_permissions() {
        assert!(AccessMode::Read.can_read() && !AccessMode::Read.can_write());
        assert!(!AccessMode::Write.can_read() && AccessMode::Write.can_write());
        assert!(AccessMode::ReadWrite.can_read() && AccessMode::ReadWrite.can_write());
    }

    #[test]
    fn test_access_mode_from_str() {
        assert_eq!("r+".parse::<AccessMode>().unwrap(), AccessMode::ReadWrite);
        assert_eq!("read".parse::<AccessMode>().unwrap(), AccessMode::Read);
        assert_eq!("w".parse::<AccessMode>().unwrap(), AccessMode::Write);
        assert!("a".parse::<AccessMode>().is_err());
    }

    #[test]
    fn test_file_backing_opens_lazily_and_reopens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.conf");
        fs::write(&path, "[s]\n").unwrap();

        let mut backing = FileBacking::new(&path, None);
        assert!(!backing.is_open());

        let mut text = String::new();
        backing.reader(AccessMode::Read).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "[s]\n");
        assert!(backing.is_open());

        backing.close();
        backing.close();
        assert!(!backing.is_open());

        text.clear();
        backing.reader(AccessMode::Read).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "[s]\n");
    }

    #[test]
    fn test_write_mode_creates_without_truncating() {
        let dir = tempdir().unwrap();
        let existing = dir.path().join("existing.conf");
        fs::write(&existing, "keep me").unwrap();

        AccessMode::Write.open_options().open(&existing).unwrap();
        assert_eq!(fs::read_to_string(&existing).unwrap(), "keep me");

        let fresh = dir.path().join("fresh.conf");
        AccessMode::Write.open_options().open(&fresh).unwrap();
        assert!(fresh.exists());
    }

    #[test]
    fn test_stream_backing_cannot_reopen_after_close() {
        let mut backing = StreamBacking::new(StreamEndpoint::buffer("abc"));
        assert!(backing.readable() && backing.writable());
        backing.close();
        assert!(!backing.is_open());
        assert_eq!(backing.open(AccessMode::Read).unwrap_err().kind(), ErrorKind::NotConnected);
    }

    #[test]
    fn test_buffer_clones_share_bytes_but_not_position() {
        let original = StreamEndpoint::buffer(Vec::new());
        let mut writer = StreamBacking::new(original.clone());
        writer.writer(AccessMode::Write).unwrap().write_all(b"[s]\n").unwrap();

        assert_eq!(original.contents().as_deref(), Some(b"[s]\n".as_slice()));

        let mut reader = StreamBacking::new(original.clone());
        let mut text = String::new();
        reader.reader(AccessMode::Read).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "[s]\n");

        writer.rewind().unwrap();
        writer.writer(AccessMode::Write).unwrap().write_all(b"[t]").unwrap();
        assert_eq!(original.contents().as_deref(), Some(b"[t]\n".as_slice()));
    }

    #[test]
    fn test_standard_streams_cannot_rewind() {
        let mut stdin = StreamBacking::new(StreamEndpoint::stdin());
        assert!(stdin.readable() && !stdin.writable());
        assert_eq!(stdin.rewind().unwrap_err().kind(), ErrorKind::Unsupported);
        assert!(stdin.writer(AccessMode::Read).is_err());

        let mut stdout = StreamBacking::new(StreamEndpoint::stdout());
        assert!(stdout.reader(AccessMode::Write).is_err());
    }

    #[test]
    fn test_cloned_file_backing_drops_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.conf");
        fs::write(&path, "").unwrap();

        let mut backing = Backing::File(FileBacking::new(&path, None));
        backing.capability().open(AccessMode::Read).unwrap();
        let clone = backing.clone();
        assert!(backing.capability_ref().is_open());
        assert!(!clone.capability_ref().is_open());
        assert_eq!(clone.path(), Some(path.as_path()));
    }
}
