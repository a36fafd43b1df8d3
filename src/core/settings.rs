// src/core/settings.rs

//! # User Settings
//!
//! An optional TOML file supplying default parser options for every command:
//!
//! ```toml
//! [parser]
//! keep_comments = false
//! dup_key = "exception"
//! ```
//!
//! The file is looked up at `$CONFKIT_CONFIG` or `~/.config/confkit/config.toml`.
//! A missing file means defaults. Options set by a command itself take precedence.

use crate::conf::{ConfError, ParseProfile, ParserOptions};
use crate::core::paths::{PathError, get_settings_path};
use lazy_static::lazy_static;
use log::{debug, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

lazy_static! {
    static ref SETTINGS: Mutex<Option<Settings>> = Mutex::new(None);
}

/// Errors loading the settings file.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The settings file could not be located.
    #[error(transparent)]
    Path(#[from] PathError),
    /// The file is not valid TOML or has unknown fields.
    #[error("Failed to parse settings file '{path}': {source}")]
    Toml {
        /// Settings file path.
        path: String,
        /// The TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// The `[parser]` table does not describe a valid profile.
    #[error("Invalid [parser] settings in '{path}': {source}")]
    InvalidParser {
        /// Settings file path.
        path: String,
        /// The validation error.
        #[source]
        source: ConfError,
    },
}

/// The deserialized settings file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Default parse options, same names and types as a `ParseProfile`.
    pub parser: BTreeMap<String, toml::Value>,
}

impl Settings {
    /// The `[parser]` table as a profile.
    pub fn parser_profile(&self) -> ParseProfile {
        ParseProfile::from(self.parser.clone())
    }
}

/// Loads settings from `path`. A missing or unreadable file yields defaults.
///
/// # Errors
/// Returns an error if the file is not valid TOML, has unknown tables, or its
/// `[parser]` table holds options the parser does not accept.
pub fn load_settings_from(path: &Path) -> Result<Settings, SettingsError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No settings file at '{}'; using defaults", path.display());
            return Ok(Settings::default());
        }
        Err(e) => {
            warn!("Could not read settings file '{}': {}; using defaults", path.display(), e);
            return Ok(Settings::default());
        }
    };

    let settings: Settings = toml::from_str(&content).map_err(|source| SettingsError::Toml {
        path: path.display().to_string(),
        source,
    })?;

    ParserOptions::from_profile(&settings.parser_profile()).map_err(|source| SettingsError::InvalidParser {
        path: path.display().to_string(),
        source,
    })?;

    debug!("Loaded settings from '{}'", path.display());
    Ok(settings)
}

/// Loads settings from the default location.
pub fn load_settings() -> Result<Settings, SettingsError> {
    load_settings_from(&get_settings_path()?)
}

/// Loads the settings once for the whole process. Later calls are no-ops.
pub fn init() -> Result<(), SettingsError> {
    let mut guard = SETTINGS.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.is_none() {
        *guard = Some(load_settings()?);
    }
    Ok(())
}

/// The process-wide settings, or defaults if `init()` has not succeeded.
pub fn get() -> Settings {
    SETTINGS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .unwrap_or_default()
}
