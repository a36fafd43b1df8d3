// src/conf/mod.rs

//! # Conf Backend
//!
//! Parsing and serialization of Splunk-style `.conf` files. References never talk to the
//! parser or the writer directly: they go through the [`ConfBackend`] capability, so the
//! backend can be swapped (tests use a counting wrapper around [`StanzaBackend`]).
//!
//! ## Modules
//!
//! - **`profile`**: the `ParseProfile` option mapping and its validated `ParserOptions` form.
//! - **`parser`**: turns text into `ConfData`.
//! - **`writer`**: renders `ConfData`, either unconditionally or only when the file changed.

pub mod parser;
pub mod profile;
pub mod writer;

pub use parser::{ParseError, parse, parse_path};
pub use profile::{DupKey, DupStanza, ParseProfile, ParserOptions};
pub use writer::{render, write, write_if_changed};

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// The entries of one stanza, keyed by entry name.
pub type Stanza = BTreeMap<String, String>;

/// A parsed configuration file: stanza name to stanza entries.
pub type ConfData = BTreeMap<String, Stanza>;

/// Classification returned by a diff-aware write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOutcome {
    /// The target did not exist before.
    Created,
    /// The target existed with different content.
    Updated,
    /// The target already held exactly this content; nothing was written.
    Unchanged,
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        };
        f.write_str(label)
    }
}

/// Errors produced by the parse and write capabilities.
#[derive(Error, Debug)]
pub enum ConfError {
    /// The input is not valid `.conf` text.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The parse profile itself is invalid.
    #[error("option '{option}': {message}")]
    ParserConfig {
        /// The offending option name.
        option: String,
        /// What is wrong with it.
        message: String,
    },
    /// Reading or writing the underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The rendered file could not be moved into place.
    #[error("Error with temporary file: {0}")]
    TempFile(#[from] tempfile::PersistError),
}

/// The parse/write capability consumed by configuration references.
pub trait ConfBackend: fmt::Debug + Send + Sync {
    /// Parses everything readable from `source`. `source_name` is only used in error messages.
    fn parse(
        &self,
        source: &mut dyn Read,
        source_name: &str,
        profile: &ParseProfile,
    ) -> Result<ConfData, ConfError>;

    /// Writes `data` to `sink` unconditionally.
    fn write(&self, sink: &mut dyn Write, data: &ConfData) -> Result<(), ConfError>;

    /// Writes `data` to `path` only if the rendered content differs from what is on disk.
    fn write_if_changed(&self, path: &Path, data: &ConfData) -> Result<WriteOutcome, ConfError>;
}

/// The built-in backend: the `parser` and `writer` modules of this crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct StanzaBackend;

impl ConfBackend for StanzaBackend {
    fn parse(
        &self,
        source: &mut dyn Read,
        source_name: &str,
        profile: &ParseProfile,
    ) -> Result<ConfData, ConfError> {
        parser::parse(source, source_name, profile)
    }

    fn write(&self, sink: &mut dyn Write, data: &ConfData) -> Result<(), ConfError> {
        writer::write(sink, data)
    }

    fn write_if_changed(&self, path: &Path, data: &ConfData) -> Result<WriteOutcome, ConfError> {
        writer::write_if_changed(path, data)
    }
}

/// The backend used when none is configured explicitly.
pub fn default_backend() -> Arc<dyn ConfBackend> {
    Arc::new(StanzaBackend)
}
