// src/conf/writer.rs

//! # Writer
//!
//! Renders `ConfData` back to `.conf` text. The global stanza is written first without a
//! header; every other stanza follows in name order, separated by a blank line.

use super::{ConfData, ConfError, Stanza, WriteOutcome};
use crate::constants::{COMMENT_KEY_PREFIX, GLOBAL_STANZA};
use log::debug;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Renders `data` to a string.
pub fn render(data: &ConfData) -> String {
    let mut out = String::new();
    let mut first = true;

    if let Some(global) = data.get(GLOBAL_STANZA)
        && !global.is_empty()
    {
        render_entries(&mut out, global);
        first = false;
    }

    for (name, stanza) in data.iter().filter(|(name, _)| name.as_str() != GLOBAL_STANZA) {
        if !first {
            out.push('\n');
        }
        first = false;
        out.push_str(&format!("[{name}]\n"));
        render_entries(&mut out, stanza);
    }
    out
}

fn render_entries(out: &mut String, stanza: &Stanza) {
    for (key, value) in stanza {
        if key.starts_with(COMMENT_KEY_PREFIX) {
            out.push_str(value);
        } else {
            out.push_str(&format!("{} = {}", key, value.replace('\n', "\\\n")));
        }
        out.push('\n');
    }
}

/// Writes `data` to `sink` unconditionally.
pub fn write(sink: &mut dyn Write, data: &ConfData) -> Result<(), ConfError> {
    sink.write_all(render(data).as_bytes())?;
    Ok(())
}

/// Writes `data` to `path` unless the file already holds exactly the rendered content.
///
/// The new content goes to a temporary file in the target's directory which then replaces
/// the target, so readers never observe a half-written file. The replacement carries the
/// permissions of the file it replaces; a new file gets the usual default permissions.
///
/// # Errors
/// Returns `ConfError::Io` if the existing file cannot be read or the new one cannot be
/// written, and `ConfError::TempFile` if the rename into place fails.
pub fn write_if_changed(path: &Path, data: &ConfData) -> Result<WriteOutcome, ConfError> {
    let content = render(data);

    let outcome = match fs::read(path) {
        Ok(existing) if existing == content.as_bytes() => {
            debug!("'{}' is unchanged; skipping write", path.display());
            return Ok(WriteOutcome::Unchanged);
        }
        Ok(_) => WriteOutcome::Updated,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            // Creating the target first lets the process umask pick its permissions.
            File::create_new(path)?;
            WriteOutcome::Created
        }
        Err(e) => return Err(e.into()),
    };
    let permissions = fs::metadata(path)?.permissions();

    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().set_permissions(permissions)?;
    temp.as_file().sync_all()?;
    temp.persist(path)?;

    debug!("Wrote '{}' ({})", path.display(), outcome);
    Ok(outcome)
}
