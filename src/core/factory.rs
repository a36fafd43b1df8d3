// src/core/factory.rs

//! # Reference Factory
//!
//! Converts raw command-line tokens into configuration references while the arguments are
//! being parsed, so a command never starts with a file argument it cannot use.
//!
//! How much is verified up front depends on the [`RefAction`]:
//!
//! - **`none`**: nothing is touched; the reference is returned as-is.
//! - **`open`**: the path must be openable in the factory's mode.
//! - **`load`**: the path must also parse with the factory's profile.
//!
//! The token `-` stands for standard input in reading modes and standard output in writing
//! mode. Both can be substituted with in-memory buffers.

use crate::conf::{ConfBackend, ConfError, ParseProfile, default_backend};
use crate::constants::{STD_STREAM_TOKEN, STDIN_NAME, STDOUT_NAME};
use crate::core::dir_ref::ConfigDirReference;
use crate::core::file_ref::{ConfigFileReference, RefError};
use crate::core::stream::{AccessMode, StreamEndpoint};
use clap::builder::TypedValueParser;
use clap::error::ErrorKind;
use log::debug;
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// How much verification a conversion performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefAction {
    /// Build the reference without touching the filesystem.
    None,
    /// Open the path, failing early if that is impossible.
    #[default]
    Open,
    /// Open and parse, failing early on malformed content.
    Load,
}

impl fmt::Display for RefAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Open => "open",
            Self::Load => "load",
        })
    }
}

impl FromStr for RefAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "open" => Ok(Self::Open),
            "load" => Ok(Self::Load),
            other => Err(format!("Unknown action '{other}' (expected none, open or load)")),
        }
    }
}

/// User-facing conversion failures. The message is what ends up in the usage error.
///
/// `name` is the token as given and `detail` the underlying error.
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum ArgumentError {
    /// The path could not be opened in the factory's mode.
    #[error("can't open '{name}': {detail}")]
    CantOpen { name: String, detail: String },
    /// Standard input did not parse.
    #[error("failed to parse <stdin>: {detail}")]
    StdinParse { detail: String },
    /// The file did not parse.
    #[error("failed to parse '{name}': {detail}")]
    Parse { name: String, detail: String },
    /// The factory's profile is invalid.
    #[error("Parser config error '{name}': {detail}")]
    ParserConfig { name: String, detail: String },
}

/// The value produced for a file-typed argument.
#[derive(Debug, Clone)]
pub enum ConfRef {
    /// A file or standard stream.
    File(ConfigFileReference),
    /// A directory, when the factory accepts them.
    Dir(ConfigDirReference),
}

impl ConfRef {
    /// The file reference, unless this is a directory.
    pub fn as_file(&self) -> Option<&ConfigFileReference> {
        match self {
            Self::File(file) => Some(file),
            Self::Dir(_) => None,
        }
    }

    /// Mutable access to the file reference.
    pub fn as_file_mut(&mut self) -> Option<&mut ConfigFileReference> {
        match self {
            Self::File(file) => Some(file),
            Self::Dir(_) => None,
        }
    }

    /// Unwraps the file reference.
    pub fn into_file(self) -> Option<ConfigFileReference> {
        match self {
            Self::File(file) => Some(file),
            Self::Dir(_) => None,
        }
    }

    /// The directory reference, if any.
    pub fn as_dir(&self) -> Option<&ConfigDirReference> {
        match self {
            Self::Dir(dir) => Some(dir),
            Self::File(_) => None,
        }
    }

    /// The name the reference was created with, for messages.
    pub fn display_name(&self) -> String {
        match self {
            Self::File(file) => file.name().to_string(),
            Self::Dir(dir) => dir.name().display().to_string(),
        }
    }
}

/// Turns command-line tokens into [`ConfRef`] values.
#[derive(Debug, Clone)]
pub struct ReferenceFactory {
    mode: AccessMode,
    action: RefAction,
    profile: ParseProfile,
    accept_dir: bool,
    backend: Arc<dyn ConfBackend>,
    stdin: Option<StreamEndpoint>,
    stdout: Option<StreamEndpoint>,
}

impl ReferenceFactory {
    /// A factory for references opened with `mode`, verifying with [`RefAction::Open`].
    pub fn new(mode: AccessMode) -> Self {
        Self {
            mode,
            action: RefAction::default(),
            profile: ParseProfile::new(),
            accept_dir: false,
            backend: default_backend(),
            stdin: None,
            stdout: None,
        }
    }

    /// How much to verify while converting.
    pub fn action(mut self, action: RefAction) -> Self {
        self.action = action;
        self
    }

    /// Parser profile given to every reference.
    pub fn profile(mut self, profile: ParseProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Whether an existing directory converts to [`ConfRef::Dir`].
    pub fn accept_dir(mut self, accept_dir: bool) -> Self {
        self.accept_dir = accept_dir;
        self
    }

    /// Backend given to every reference.
    pub fn backend(mut self, backend: Arc<dyn ConfBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Serves `-` in reading modes from `endpoint` instead of the process's stdin.
    pub fn redirect_stdin(mut self, endpoint: StreamEndpoint) -> Self {
        self.stdin = Some(endpoint);
        self
    }

    /// Sends `-` in writing mode to `endpoint` instead of the process's stdout.
    pub fn redirect_stdout(mut self, endpoint: StreamEndpoint) -> Self {
        self.stdout = Some(endpoint);
        self
    }

    /// Converts one token.
    pub fn convert(&self, token: &str) -> Result<ConfRef, ArgumentError> {
        if token == STD_STREAM_TOKEN {
            return self.convert_std_stream();
        }

        if self.accept_dir && Path::new(token).is_dir() {
            debug!("'{}' converted to a directory reference", token);
            let dir = ConfigDirReference::new(token, self.mode, self.profile.clone()).with_backend(self.backend.clone());
            return Ok(ConfRef::Dir(dir));
        }

        if self.action == RefAction::None {
            let file = ConfigFileReference::new(token, self.mode, self.profile.clone()).with_backend(self.backend.clone());
            return Ok(ConfRef::File(file));
        }

        let handle = self.mode.open_options().open(token).map_err(|e| ArgumentError::CantOpen {
            name: token.to_string(),
            detail: e.to_string(),
        })?;
        let mut file = ConfigFileReference::from_open_file(token, self.mode, handle, self.profile.clone())
            .with_backend(self.backend.clone());

        if self.action == RefAction::Load {
            file.data().map_err(|e| load_error(token, e))?;
        }
        Ok(ConfRef::File(file))
    }

    fn convert_std_stream(&self) -> Result<ConfRef, ArgumentError> {
        match self.mode {
            AccessMode::Read | AccessMode::ReadWrite => {
                let endpoint = self.stdin.clone().unwrap_or_else(StreamEndpoint::stdin);
                let mut file = ConfigFileReference::from_stream(STDIN_NAME, AccessMode::Read, endpoint, self.profile.clone())
                    .with_backend(self.backend.clone());
                if self.action == RefAction::Load {
                    file.data().map_err(|e| match load_error(STDIN_NAME, e) {
                        ArgumentError::Parse { detail, .. } => ArgumentError::StdinParse { detail },
                        other => other,
                    })?;
                }
                Ok(ConfRef::File(file))
            }
            AccessMode::Write => {
                let endpoint = self.stdout.clone().unwrap_or_else(StreamEndpoint::stdout);
                let file = ConfigFileReference::from_stream(STDOUT_NAME, AccessMode::Write, endpoint, self.profile.clone())
                    .with_backend(self.backend.clone());
                Ok(ConfRef::File(file))
            }
        }
    }
}

fn load_error(name: &str, error: RefError) -> ArgumentError {
    let name = name.to_string();
    match error {
        RefError::Conf(ConfError::Parse(e)) => ArgumentError::Parse {
            name,
            detail: e.to_string(),
        },
        RefError::Conf(e @ ConfError::ParserConfig { .. }) => ArgumentError::ParserConfig {
            name,
            detail: e.to_string(),
        },
        other => ArgumentError::CantOpen {
            name,
            detail: other.to_string(),
        },
    }
}

impl TypedValueParser for ReferenceFactory {
    type Value = ConfRef;

    fn parse_ref(&self, cmd: &clap::Command, _arg: Option<&clap::Arg>, value: &OsStr) -> Result<Self::Value, clap::Error> {
        let Some(token) = value.to_str() else {
            return Err(clap::Error::new(ErrorKind::InvalidUtf8).with_cmd(cmd));
        };
        self.convert(token)
            .map_err(|e| clap::Error::raw(ErrorKind::ValueValidation, format!("{e}\n")).with_cmd(cmd))
    }
}
