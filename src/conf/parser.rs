// src/conf/parser.rs

//! # Parser
//!
//! Line-oriented parser for `.conf` text:
//!
//! ```text
//! global_key = applies to the global stanza
//! # a comment
//! [stanza name]
//! key = value
//! multi = first line \
//! second line
//! ```

use super::profile::{DupKey, DupStanza, ParserOptions};
use super::{ConfData, ConfError, ParseProfile};
use crate::constants::{COMMENT_KEY_PREFIX, GLOBAL_STANZA};
use log::{debug, trace};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Malformed input, located by source name and 1-based line number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (in {source_name}, line {line})")]
pub struct ParseError {
    /// The file path or pseudo-name the text came from.
    pub source_name: String,
    /// 1-based line number where the problem was detected.
    pub line: usize,
    /// Human readable description.
    pub message: String,
}

impl ParseError {
    fn new(source_name: &str, line: usize, message: impl Into<String>) -> Self {
        Self {
            source_name: source_name.to_string(),
            line,
            message: message.into(),
        }
    }
}

/// Reads `source` to the end and parses it with the given profile.
///
/// # Errors
/// `ConfError::ParserConfig` if the profile is invalid, `ConfError::Io` if reading fails,
/// `ConfError::Parse` on malformed or non-UTF-8 text.
pub fn parse(source: &mut dyn Read, source_name: &str, profile: &ParseProfile) -> Result<ConfData, ConfError> {
    let options = ParserOptions::from_profile(profile)?;
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes)?;
    let text = decode(bytes, source_name)?;
    debug!("Parsing {} ({} bytes) with {:?}", source_name, text.len(), options);
    Ok(parse_str(&text, source_name, &options)?)
}

/// Undecodable input is malformed text, reported at the line holding the first bad byte.
fn decode(bytes: Vec<u8>, source_name: &str) -> Result<String, ParseError> {
    String::from_utf8(bytes).map_err(|e| {
        let valid = e.as_bytes().get(..e.utf8_error().valid_up_to()).unwrap_or_default();
        let line = valid.iter().filter(|&&b| b == b'\n').count() + 1;
        ParseError::new(source_name, line, format!("Encoding error: {}", e.utf8_error()))
    })
}

/// Opens and parses the file at `path`.
pub fn parse_path(path: &Path, profile: &ParseProfile) -> Result<ConfData, ConfError> {
    let mut file = File::open(path)?;
    parse(&mut file, &path.display().to_string(), profile)
}

/// Parses already-decoded text.
pub fn parse_str(text: &str, source_name: &str, options: &ParserOptions) -> Result<ConfData, ParseError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut data = ConfData::new();
    let mut seen_stanzas: HashSet<String> = HashSet::new();
    let mut current = GLOBAL_STANZA.to_string();
    let mut comment_count = 0usize;
    let mut lines = text.lines().enumerate();

    while let Some((index, raw)) = lines.next() {
        let line_no = index + 1;
        let line = raw.trim();

        if line.is_empty() {
            continue;
        }

        if line.starts_with('#') || line.starts_with(';') {
            if options.keep_comments {
                comment_count += 1;
                data.entry(current.clone())
                    .or_default()
                    .insert(format!("{COMMENT_KEY_PREFIX}{comment_count:06}"), line.to_string());
            }
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let name = header.strip_suffix(']').ok_or_else(|| {
                ParseError::new(source_name, line_no, format!("Unterminated stanza header: {line}"))
            })?;
            if !seen_stanzas.insert(name.to_string()) {
                match options.dup_stanza {
                    DupStanza::Exception => {
                        return Err(ParseError::new(source_name, line_no, format!("Duplicate stanza [{name}]")));
                    }
                    DupStanza::Overwrite => {
                        trace!("Stanza [{}] redefined; discarding earlier entries", name);
                        data.insert(name.to_string(), Default::default());
                    }
                    DupStanza::Merge => trace!("Stanza [{}] redefined; merging entries", name),
                }
            }
            data.entry(name.to_string()).or_default();
            current = name.to_string();
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            if options.strict {
                return Err(ParseError::new(source_name, line_no, format!("Unexpected entry: {line}")));
            }
            debug!("Skipping unparsable line {} of {}", line_no, source_name);
            continue;
        };

        let key = key.trim();
        if key.is_empty() {
            if options.strict {
                return Err(ParseError::new(source_name, line_no, "Entry with an empty key"));
            }
            continue;
        }

        let mut value = value.trim().to_string();
        while value.ends_with('\\') {
            value.pop();
            match lines.next() {
                Some((_, next)) => {
                    value.push('\n');
                    value.push_str(next.trim_end());
                }
                None => break,
            }
        }

        let stanza = data.entry(current.clone()).or_default();
        if stanza.contains_key(key) && options.dup_key == DupKey::Exception {
            return Err(ParseError::new(
                source_name,
                line_no,
                format!("Duplicate key '{key}' in stanza [{current}]"),
            ));
        }
        stanza.insert(key.to_string(), value);
    }

    Ok(data)
}
