// src/core/file_ref.rs

//! # Configuration File Reference
//!
//! `ConfigFileReference` stands in for one configuration file (or standard stream) that has
//! not necessarily been opened yet. Opening, parsing and writing are all deferred until a
//! caller actually asks for them:
//!
//! - `data()` parses on first access and caches the result.
//! - `set_parser_option()` drops that cache whenever the effective profile changes, so the
//!   next `data()` always reflects the current parser settings.
//! - `dump()` writes through the backend and drops the cache as well.

use crate::conf::{ConfBackend, ConfData, ConfError, ParseProfile, WriteOutcome, default_backend};
use crate::core::stream::{AccessMode, Backing, FileBacking, StreamBacking, StreamCapability, StreamEndpoint};
use log::debug;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use toml::Value;

/// Errors raised by configuration references.
#[derive(Error, Debug)]
pub enum RefError {
    /// The reference's mode does not allow the requested operation.
    #[error("Cannot {operation} {kind} '{name}' opened with mode '{mode}'")]
    InvalidOperationForMode {
        /// `load` or `dump`.
        operation: &'static str,
        /// `file` or `stream`.
        kind: &'static str,
        /// Name of the reference.
        name: String,
        /// Its access mode.
        mode: AccessMode,
    },
    /// The backend failed to parse or write.
    #[error(transparent)]
    Conf(#[from] ConfError),
    /// Opening, seeking, flushing or deleting failed.
    #[error("I/O error on '{name}': {source}")]
    Io {
        /// Name of the reference.
        name: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// A stream-backed reference was used after `close()`.
    #[error("Stream '{0}' has been closed and cannot be reopened")]
    StreamClosed(String),
    /// A file-only operation was requested on a stream-backed reference.
    #[error("'{0}' is not backed by a file")]
    NotAFile(String),
    /// Reserved extension point.
    #[error("{0}() is not implemented")]
    NotImplemented(&'static str),
}

fn io_error(name: &str, is_file: bool, source: io::Error) -> RefError {
    if !is_file && source.kind() == io::ErrorKind::NotConnected {
        return RefError::StreamClosed(name.to_string());
    }
    RefError::Io {
        name: name.to_string(),
        source,
    }
}

/// A lazily-opened, mode-aware handle on one configuration file or stream.
#[derive(Debug, Clone)]
pub struct ConfigFileReference {
    name: String,
    mode: AccessMode,
    backing: Backing,
    cached: Option<ConfData>,
    profile: ParseProfile,
    backend: Arc<dyn ConfBackend>,
}

impl ConfigFileReference {
    /// A file-backed reference that touches the filesystem only when first used.
    pub fn new(name: impl Into<String>, mode: AccessMode, profile: ParseProfile) -> Self {
        let name = name.into();
        let backing = Backing::File(FileBacking::new(&name, None));
        Self::with_backing(name, mode, backing, profile)
    }

    /// A file-backed reference around a handle the caller already opened with `mode`.
    pub fn from_open_file(name: impl Into<String>, mode: AccessMode, file: File, profile: ParseProfile) -> Self {
        let name = name.into();
        let backing = Backing::File(FileBacking::new(&name, Some(file)));
        Self::with_backing(name, mode, backing, profile)
    }

    /// A stream-backed reference. The stream can be rewound but never reopened.
    pub fn from_stream(
        name: impl Into<String>,
        mode: AccessMode,
        endpoint: StreamEndpoint,
        profile: ParseProfile,
    ) -> Self {
        let backing = Backing::Stream(StreamBacking::new(endpoint));
        Self::with_backing(name.into(), mode, backing, profile)
    }

    fn with_backing(name: String, mode: AccessMode, backing: Backing, profile: ParseProfile) -> Self {
        Self {
            name,
            mode,
            backing,
            cached: None,
            profile,
            backend: default_backend(),
        }
    }

    /// Replaces the parse/write backend.
    pub fn with_backend(mut self, backend: Arc<dyn ConfBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// The path or pseudo-name (`<stdin>`, `<stdout>`) the reference was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The access mode deciding whether `load` and `dump` are allowed.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// The stored parser profile.
    pub fn profile(&self) -> &ParseProfile {
        &self.profile
    }

    /// True for a path on disk, false for a standard stream or buffer.
    pub fn is_file(&self) -> bool {
        self.backing.is_file()
    }

    /// The backing path, for file-backed references.
    pub fn path(&self) -> Option<&Path> {
        self.backing.path()
    }

    /// Whether the underlying handle is currently held.
    pub fn is_open(&self) -> bool {
        self.backing.capability_ref().is_open()
    }

    /// Whether `data()` would return without parsing.
    pub fn has_cached_data(&self) -> bool {
        self.cached.is_some()
    }

    /// The endpoint of a stream-backed reference, while it is open.
    pub fn endpoint(&self) -> Option<&StreamEndpoint> {
        match &self.backing {
            Backing::Stream(stream) => stream.endpoint(),
            Backing::File(_) => None,
        }
    }

    fn kind(&self) -> &'static str {
        if self.is_file() { "file" } else { "stream" }
    }

    fn mode_error(&self, operation: &'static str) -> RefError {
        RefError::InvalidOperationForMode {
            operation,
            kind: self.kind(),
            name: self.name.clone(),
            mode: self.mode,
        }
    }

    fn io_error(&self, source: io::Error) -> RefError {
        io_error(&self.name, self.is_file(), source)
    }

    /// Acquires the underlying stream now instead of on first use.
    pub fn open(&mut self) -> Result<(), RefError> {
        let mode = self.mode;
        self.backing.capability().open(mode).map_err(|e| self.io_error(e))
    }

    /// Sets (or with `None`, removes) one parser option.
    ///
    /// If the effective profile changes, cached data is dropped: a file-backed reference
    /// closes its stream so the next access reopens it, a stream-backed one that had
    /// already been parsed is rewound. Setting an option to its current value does nothing.
    ///
    /// # Errors
    /// If a parsed stream cannot be rewound (standard input), the error is returned and
    /// the reference keeps both its previous profile and its cached data.
    pub fn set_parser_option(&mut self, key: &str, value: Option<Value>) -> Result<(), RefError> {
        let profile = self.profile.with_option(key, value);
        if profile == self.profile {
            return Ok(());
        }

        if self.is_file() {
            self.close();
        } else if self.cached.is_some() {
            self.rewind()?;
        }
        debug!("Parser option '{}' changed for '{}'; invalidating", key, self.name);
        self.profile = profile;
        self.cached = None;
        Ok(())
    }

    /// Returns the parsed content, parsing on first access.
    pub fn data(&mut self) -> Result<&ConfData, RefError> {
        let data = match self.cached.take() {
            Some(data) => data,
            None => self.load(&ParseProfile::new())?,
        };
        Ok(self.cached.insert(data))
    }

    /// Parses the content with `overrides` layered over the stored profile.
    ///
    /// The result is not cached; use [`ConfigFileReference::data`] for that.
    pub fn load(&mut self, overrides: &ParseProfile) -> Result<ConfData, RefError> {
        if !self.mode.can_read() || (self.is_open() && !self.backing.capability_ref().readable()) {
            return Err(self.mode_error("load"));
        }
        let profile = self.profile.merged(overrides);
        let (mode, is_file) = (self.mode, self.is_file());
        if is_file {
            // An already-open handle may sit at the end of a previous read.
            self.rewind()?;
        }

        let reader = self
            .backing
            .capability()
            .reader(mode)
            .map_err(|e| io_error(&self.name, is_file, e))?;
        debug!("Loading '{}'", self.name);
        Ok(self.backend.parse(reader, &self.name, &profile)?)
    }

    /// Writes `data`, returning how the target changed.
    ///
    /// File-backed references close their stream and write only if the content differs.
    /// Stream-backed references write unconditionally and always report `Created`.
    pub fn dump(&mut self, data: &ConfData) -> Result<WriteOutcome, RefError> {
        if !self.mode.can_write() || (self.is_open() && !self.backing.capability_ref().writable()) {
            return Err(self.mode_error("dump"));
        }
        self.cached = None;

        if let Backing::File(file) = &self.backing {
            let path = file.path.clone();
            self.close();
            let outcome = self.backend.write_if_changed(&path, data)?;
            debug!("Dumped '{}' ({})", self.name, outcome);
            return Ok(outcome);
        }

        let mode = self.mode;
        let sink = self
            .backing
            .capability()
            .writer(mode)
            .map_err(|e| io_error(&self.name, false, e))?;
        self.backend.write(sink, data)?;
        sink.flush().map_err(|e| io_error(&self.name, false, e))?;
        debug!("Dumped '{}' to stream", self.name);
        Ok(WriteOutcome::Created)
    }

    /// Releases the stream if it is held. Standard streams are never closed at the OS level.
    pub fn close(&mut self) {
        self.backing.capability().close();
    }

    /// Drops cached data, if any. A file-backed reference is closed; a stream-backed one is
    /// rewound, and a failing seek is returned to the caller.
    pub fn reset(&mut self) -> Result<(), RefError> {
        if self.cached.take().is_none() {
            return Ok(());
        }
        if self.is_file() {
            self.close();
            Ok(())
        } else {
            self.rewind()
        }
    }

    fn rewind(&mut self) -> Result<(), RefError> {
        match self.backing.capability().rewind() {
            Ok(()) => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Closes the reference and deletes the backing file.
    pub fn unlink(&mut self) -> Result<(), RefError> {
        let Some(path) = self.path().map(Path::to_path_buf) else {
            return Err(RefError::NotAFile(self.name.clone()));
        };
        self.close();
        fs::remove_file(&path).map_err(|e| self.io_error(e))?;
        debug!("Removed '{}'", path.display());
        Ok(())
    }

    /// Reserved: copying the current content aside before it is modified.
    pub fn backup(&mut self, _backup_name: Option<&str>) -> Result<PathBuf, RefError> {
        Err(RefError::NotImplemented("backup"))
    }

    /// Reserved: a content hash of the backing file.
    pub fn checksum(&mut self, _algorithm: &str) -> Result<String, RefError> {
        Err(RefError::NotImplemented("checksum"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::testing::CountingBackend;
    use crate::conf::{ParseError, render};
    use tempfile::{NamedTempFile, tempdir};

    const SAMPLE: &str = "[s]\nk = v\n";

    fn temp_conf(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn reference(file: &NamedTempFile, mode: AccessMode, backend: &Arc<CountingBackend>) -> ConfigFileReference {
        ConfigFileReference::new(file.path().display().to_string(), mode, ParseProfile::new())
            .with_backend(backend.clone())
    }

    #[test]
    fn test_data_is_parsed_once_and_cached() {
        let file = temp_conf(SAMPLE);
        let backend = CountingBackend::shared();
        let mut conf = reference(&file, AccessMode::Read, &backend);

        assert!(!conf.is_open());
        assert_eq!(conf.data().unwrap()["s"]["k"], "v");
        assert!(conf.is_open());
        conf.data().unwrap();
        assert_eq!(backend.parses(), 1);
    }

    #[test]
    fn test_changed_parser_option_forces_reparse() {
        let file = temp_conf("[s]\nk = v\njunk\n");
        let backend = CountingBackend::shared();
        let mut conf = reference(&file, AccessMode::Read, &backend);

        conf.set_parser_option("strict", Some(Value::Boolean(false))).unwrap();
        assert_eq!(conf.data().unwrap()["s"].len(), 1);
        assert_eq!(backend.parses(), 1);

        conf.set_parser_option("strict", Some(Value::Boolean(true))).unwrap();
        assert!(!conf.has_cached_data());
        assert!(!conf.is_open());
        let err = conf.data().unwrap_err();
        assert!(matches!(err, RefError::Conf(ConfError::Parse(ParseError { line: 3, .. }))));
        assert_eq!(backend.parses(), 2);
    }

    #[test]
    fn test_same_parser_option_is_a_no_op() {
        let file = temp_conf(SAMPLE);
        let backend = CountingBackend::shared();
        let mut conf = reference(&file, AccessMode::Read, &backend);

        conf.set_parser_option("keep_comments", Some(Value::Boolean(false))).unwrap();
        conf.data().unwrap();
        conf.set_parser_option("keep_comments", Some(Value::Boolean(false))).unwrap();
        conf.set_parser_option("not_set", None).unwrap();

        assert!(conf.has_cached_data());
        assert!(conf.is_open());
        conf.data().unwrap();
        assert_eq!(backend.parses(), 1);
    }

    #[test]
    fn test_stream_reference_rewinds_on_profile_change() {
        let backend = CountingBackend::shared();
        let mut conf = ConfigFileReference::from_stream(
            "<buffer>",
            AccessMode::Read,
            StreamEndpoint::buffer(SAMPLE),
            ParseProfile::new(),
        )
        .with_backend(backend.clone());

        assert!(!conf.is_file());
        assert_eq!(conf.data().unwrap()["s"]["k"], "v");
        conf.set_parser_option("strict", Some(Value::Boolean(false))).unwrap();
        assert_eq!(conf.data().unwrap()["s"]["k"], "v");
        assert_eq!(backend.parses(), 2);
    }

    #[derive(Debug)]
    struct FixedBackend;

    impl ConfBackend for FixedBackend {
        fn parse(&self, _source: &mut dyn io::Read, _name: &str, _profile: &ParseProfile) -> Result<ConfData, ConfError> {
            let mut data = ConfData::new();
            data.entry("fixed".to_string()).or_default();
            Ok(data)
        }

        fn write(&self, _sink: &mut dyn Write, _data: &ConfData) -> Result<(), ConfError> {
            Ok(())
        }

        fn write_if_changed(&self, _path: &Path, _data: &ConfData) -> Result<WriteOutcome, ConfError> {
            Ok(WriteOutcome::Unchanged)
        }
    }

    #[test]
    fn test_profile_change_on_parsed_stdin_keeps_previous_state() {
        // The backend never reads, so the test does not touch the real standard input.
        let mut conf =
            ConfigFileReference::from_stream("<stdin>", AccessMode::Read, StreamEndpoint::stdin(), ParseProfile::new())
                .with_backend(Arc::new(FixedBackend));
        assert!(conf.data().unwrap().contains_key("fixed"));

        let err = conf.set_parser_option("strict", Some(Value::Boolean(true))).unwrap_err();
        assert!(matches!(err, RefError::Io { ref source, .. } if source.kind() == io::ErrorKind::Unsupported));
        assert!(conf.profile().is_empty());
        assert!(conf.has_cached_data());
        assert!(conf.data().unwrap().contains_key("fixed"));

        // Before anything was parsed there is nothing to rewind.
        let mut fresh =
            ConfigFileReference::from_stream("<stdin>", AccessMode::Read, StreamEndpoint::stdin(), ParseProfile::new())
                .with_backend(Arc::new(FixedBackend));
        fresh.set_parser_option("strict", Some(Value::Boolean(true))).unwrap();
        assert!(!fresh.profile().is_empty());
    }

    #[test]
    fn test_load_merges_overrides_without_caching() {
        let file = temp_conf("[s]\nk = 1\nk = 2\n");
        let backend = CountingBackend::shared();
        let mut conf = reference(&file, AccessMode::Read, &backend);

        let err = conf
            .load(&ParseProfile::new().with("dup_key", "exception"))
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate key 'k'"));
        assert!(!conf.has_cached_data());
        // The stored profile is untouched by the override.
        assert!(conf.profile().is_empty());
    }

    #[test]
    fn test_mode_gates_load_and_dump() {
        let file = temp_conf(SAMPLE);
        let backend = CountingBackend::shared();

        let mut write_only = reference(&file, AccessMode::Write, &backend);
        assert!(matches!(
            write_only.load(&ParseProfile::new()),
            Err(RefError::InvalidOperationForMode { operation: "load", .. })
        ));

        let mut read_only = reference(&file, AccessMode::Read, &backend);
        let err = read_only.dump(&ConfData::new()).unwrap_err();
        assert!(matches!(err, RefError::InvalidOperationForMode { operation: "dump", kind: "file", .. }));
        assert_eq!(backend.parses(), 0);
        assert_eq!(backend.smart_writes(), 0);
    }

    #[test]
    fn test_dump_clears_cache_and_next_access_reparses() {
        let file = temp_conf(SAMPLE);
        let backend = CountingBackend::shared();
        let mut conf = reference(&file, AccessMode::ReadWrite, &backend);

        let mut data = conf.data().unwrap().clone();
        data.entry("t".to_string())
            .or_default()
            .insert("x".to_string(), "1".to_string());

        assert_eq!(conf.dump(&data).unwrap(), WriteOutcome::Updated);
        assert!(!conf.has_cached_data());
        assert!(!conf.is_open());

        assert_eq!(conf.data().unwrap(), &data);
        assert_eq!(backend.parses(), 2);
        assert_eq!(backend.smart_writes(), 1);
    }

    #[test]
    fn test_dump_unchanged_content() {
        let file = temp_conf(SAMPLE);
        let backend = CountingBackend::shared();
        let mut conf = reference(&file, AccessMode::ReadWrite, &backend);

        let data = conf.data().unwrap().clone();
        assert_eq!(conf.dump(&data).unwrap(), WriteOutcome::Unchanged);
        assert_eq!(fs::read_to_string(file.path()).unwrap(), SAMPLE);
    }

    #[test]
    fn test_dump_to_stream_writes_unconditionally() {
        let backend = CountingBackend::shared();
        let mut conf = ConfigFileReference::from_stream(
            "<stdout>",
            AccessMode::Write,
            StreamEndpoint::buffer(Vec::new()),
            ParseProfile::new(),
        )
        .with_backend(backend.clone());

        let mut data = ConfData::new();
        data.entry("s".to_string())
            .or_default()
            .insert("k".to_string(), "v".to_string());

        assert_eq!(conf.dump(&data).unwrap(), WriteOutcome::Created);
        assert_eq!(conf.endpoint().and_then(StreamEndpoint::contents), Some(render(&data).into_bytes()));
        assert_eq!(backend.writes(), 1);
    }

    #[test]
    fn test_closed_stream_cannot_be_reopened() {
        let mut conf = ConfigFileReference::from_stream(
            "<buffer>",
            AccessMode::Read,
            StreamEndpoint::buffer(SAMPLE),
            ParseProfile::new(),
        );
        conf.close();
        conf.close();
        assert!(matches!(conf.data(), Err(RefError::StreamClosed(_))));
    }

    #[test]
    fn test_file_reference_reopens_after_close() {
        let file = temp_conf(SAMPLE);
        let backend = CountingBackend::shared();
        let mut conf = reference(&file, AccessMode::Read, &backend);

        conf.load(&ParseProfile::new()).unwrap();
        conf.close();
        assert!(!conf.is_open());
        assert_eq!(conf.load(&ParseProfile::new()).unwrap()["s"]["k"], "v");
    }

    #[test]
    fn test_repeated_load_reads_from_the_start() {
        let file = temp_conf(SAMPLE);
        let backend = CountingBackend::shared();
        let mut conf = reference(&file, AccessMode::Read, &backend);

        let first = conf.load(&ParseProfile::new()).unwrap();
        assert!(conf.is_open());
        assert_eq!(conf.load(&ParseProfile::new()).unwrap(), first);
    }

    #[test]
    fn test_reset() {
        let file = temp_conf(SAMPLE);
        let backend = CountingBackend::shared();
        let mut conf = reference(&file, AccessMode::Read, &backend);

        // Nothing cached yet: the stream stays as it is.
        conf.open().unwrap();
        conf.reset().unwrap();
        assert!(conf.is_open());

        conf.data().unwrap();
        conf.reset().unwrap();
        assert!(!conf.has_cached_data());
        assert!(!conf.is_open());

        let mut stream = ConfigFileReference::from_stream(
            "<buffer>",
            AccessMode::Read,
            StreamEndpoint::buffer(SAMPLE),
            ParseProfile::new(),
        );
        stream.data().unwrap();
        stream.reset().unwrap();
        assert!(stream.is_open());
        assert_eq!(stream.data().unwrap()["s"]["k"], "v");
    }

    #[test]
    fn test_unlink() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.conf");
        fs::write(&path, SAMPLE).unwrap();

        let mut conf = ConfigFileReference::new(path.display().to_string(), AccessMode::ReadWrite, ParseProfile::new());
        conf.data().unwrap();
        conf.unlink().unwrap();
        assert!(!path.exists());
        assert!(!conf.is_open());

        let mut stream = ConfigFileReference::from_stream(
            "<stdout>",
            AccessMode::Write,
            StreamEndpoint::buffer(Vec::new()),
            ParseProfile::new(),
        );
        assert!(matches!(stream.unlink(), Err(RefError::NotAFile(_))));
    }

    #[test]
    fn test_backup_and_checksum_are_not_implemented() {
        let mut conf = ConfigFileReference::new("any.conf", AccessMode::Read, ParseProfile::new());
        assert!(matches!(conf.backup(None), Err(RefError::NotImplemented("backup"))));
        assert!(matches!(conf.checksum("sha256"), Err(RefError::NotImplemented("checksum"))));
    }

    #[test]
    fn test_clone_does_not_share_the_handle() {
        let file = temp_conf(SAMPLE);
        let backend = CountingBackend::shared();
        let mut conf = reference(&file, AccessMode::Read, &backend);
        conf.data().unwrap();

        let mut clone = conf.clone();
        assert!(conf.is_open());
        assert!(!clone.is_open());
        assert!(clone.has_cached_data());
        assert_eq!(clone.data().unwrap()["s"]["k"], "v");
        assert_eq!(backend.parses(), 1);
    }
}
