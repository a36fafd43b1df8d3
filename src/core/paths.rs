// src/core/paths.rs

//! Locations of confkit's own files.

use crate::constants::{APP_DIR_NAME, CONFIG_ENV_VAR, SETTINGS_FILENAME};
use lazy_static::lazy_static;
use std::env;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

lazy_static! {
    static ref CONFKIT_CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

/// Errors resolving confkit paths.
#[derive(Error, Debug)]
pub enum PathError {
    /// The platform reports no user configuration directory.
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    /// A `~` or `$VAR` in a path could not be expanded.
    #[error("Failed to expand path '{template}': {message}")]
    Expansion {
        /// The path as written.
        template: String,
        /// Why expansion failed.
        message: String,
    },
}

/// Returns the path to the confkit configuration directory (`~/.config/confkit`).
///
/// This function is memoized: the first call computes and caches the path,
/// subsequent calls return the cached value. The directory is not created;
/// confkit only ever reads from it.
pub fn get_confkit_config_dir() -> Result<PathBuf, PathError> {
    let mut cached_path_guard = CONFKIT_CONFIG_DIR.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(path) = &*cached_path_guard {
        return Ok(path.clone());
    }

    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(APP_DIR_NAME);

    *cached_path_guard = Some(config_path.clone());
    Ok(config_path)
}

/// Returns the settings file location: `$CONFKIT_CONFIG` if set, otherwise
/// `config.toml` inside the confkit configuration directory.
pub fn get_settings_path() -> Result<PathBuf, PathError> {
    match env::var(CONFIG_ENV_VAR) {
        Ok(template) if !template.trim().is_empty() => expand_path(&template),
        _ => get_confkit_config_dir().map(|dir| dir.join(SETTINGS_FILENAME)),
    }
}

/// Expands `~` and environment variables (`$VAR`, `${VAR}`) in a path.
///
/// # Errors
/// Returns `PathError::Expansion` if a referenced variable is not set.
pub fn expand_path(template: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(template).map_err(|e| PathError::Expansion {
        template: template.to_string(),
        message: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}
