// src/conf/profile.rs

//! # Parse Profiles
//!
//! A `ParseProfile` is the loosely-typed mapping of parser options carried around by
//! references, factories and the settings file. The parser only ever sees the validated,
//! strongly-typed `ParserOptions` built from it.

use super::ConfError;
use std::collections::BTreeMap;
use toml::Value;

/// How to handle a stanza that appears more than once.
pub const OPT_DUP_STANZA: &str = "dup_stanza";
/// How to handle a key that appears more than once within a stanza.
pub const OPT_DUP_KEY: &str = "dup_key";
/// Reject lines that are neither stanza headers, entries, nor comments.
pub const OPT_STRICT: &str = "strict";
/// Keep comment lines as synthetic entries.
pub const OPT_KEEP_COMMENTS: &str = "keep_comments";

const DUP_EXCEPTION: &str = "exception";
const DUP_OVERWRITE: &str = "overwrite";
const DUP_MERGE: &str = "merge";

/// A mapping of parser option name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseProfile {
    options: BTreeMap<String, Value>,
}

impl ParseProfile {
    /// An empty profile; the parser falls back to its defaults for every option.
    pub fn new() -> Self {
        Self::default()
    }

    /// Duplicates are errors, unknown lines are errors, comments are kept.
    pub fn strict() -> Self {
        Self::new()
            .with(OPT_DUP_STANZA, DUP_EXCEPTION)
            .with(OPT_DUP_KEY, DUP_EXCEPTION)
            .with(OPT_STRICT, true)
            .with(OPT_KEEP_COMMENTS, true)
    }

    /// Same as [`ParseProfile::strict`], but comments are dropped.
    pub fn strict_no_comments() -> Self {
        Self::strict().with(OPT_KEEP_COMMENTS, false)
    }

    /// The parser defaults spelled out: stanzas merge, keys overwrite, strict, comments kept.
    pub fn mid() -> Self {
        Self::new()
            .with(OPT_DUP_STANZA, DUP_MERGE)
            .with(OPT_DUP_KEY, DUP_OVERWRITE)
            .with(OPT_STRICT, true)
            .with(OPT_KEEP_COMMENTS, true)
    }

    /// Tolerant parsing: stanzas merge, keys overwrite, junk lines skipped, comments dropped.
    pub fn loose() -> Self {
        Self::new()
            .with(OPT_DUP_STANZA, DUP_MERGE)
            .with(OPT_DUP_KEY, DUP_OVERWRITE)
            .with(OPT_STRICT, false)
            .with(OPT_KEEP_COMMENTS, false)
    }

    /// Builder-style setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Returns a copy of this profile with `key` set to `value`, or removed when `value` is `None`.
    pub fn with_option(&self, key: &str, value: Option<Value>) -> Self {
        let mut updated = self.clone();
        match value {
            Some(value) => {
                updated.options.insert(key.to_string(), value);
            }
            None => {
                updated.options.remove(key);
            }
        }
        updated
    }

    /// Returns a new profile where every option of `overrides` replaces the one stored here.
    pub fn merged(&self, overrides: &ParseProfile) -> Self {
        let mut merged = self.clone();
        merged
            .options
            .extend(overrides.options.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// The raw value of one option.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// True when no option is set.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Options in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.options.iter()
    }
}

impl From<BTreeMap<String, Value>> for ParseProfile {
    fn from(options: BTreeMap<String, Value>) -> Self {
        Self { options }
    }
}

impl FromIterator<(String, Value)> for ParseProfile {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            options: iter.into_iter().collect(),
        }
    }
}

/// Policy for a stanza header seen twice in one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DupStanza {
    /// Reject the file.
    Exception,
    /// The later stanza replaces the earlier one.
    Overwrite,
    /// Entries of both are combined; later keys win.
    Merge,
}

/// Policy for a key seen twice within one stanza.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DupKey {
    /// Reject the file.
    Exception,
    /// The last value wins.
    Overwrite,
}

/// Validated parser options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// See [`OPT_DUP_STANZA`].
    pub dup_stanza: DupStanza,
    /// See [`OPT_DUP_KEY`].
    pub dup_key: DupKey,
    /// See [`OPT_STRICT`].
    pub strict: bool,
    /// See [`OPT_KEEP_COMMENTS`].
    pub keep_comments: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            dup_stanza: DupStanza::Merge,
            dup_key: DupKey::Overwrite,
            strict: true,
            keep_comments: true,
        }
    }
}

impl ParserOptions {
    /// Validates a profile and resolves it against the defaults.
    ///
    /// # Errors
    /// Returns `ConfError::ParserConfig` for unknown option names, values of the wrong
    /// type, or unsupported policy names.
    pub fn from_profile(profile: &ParseProfile) -> Result<Self, ConfError> {
        let mut options = Self::default();
        for (key, value) in profile.iter() {
            match key.as_str() {
                OPT_DUP_STANZA => {
                    options.dup_stanza = match expect_str(key, value)? {
                        DUP_EXCEPTION => DupStanza::Exception,
                        DUP_OVERWRITE => DupStanza::Overwrite,
                        DUP_MERGE => DupStanza::Merge,
                        other => {
                            return Err(unsupported(key, other, &[DUP_EXCEPTION, DUP_OVERWRITE, DUP_MERGE]));
                        }
                    }
                }
                OPT_DUP_KEY => {
                    options.dup_key = match expect_str(key, value)? {
                        DUP_EXCEPTION => DupKey::Exception,
                        DUP_OVERWRITE => DupKey::Overwrite,
                        other => return Err(unsupported(key, other, &[DUP_EXCEPTION, DUP_OVERWRITE])),
                    }
                }
                OPT_STRICT => options.strict = expect_bool(key, value)?,
                OPT_KEEP_COMMENTS => options.keep_comments = expect_bool(key, value)?,
                _ => {
                    return Err(ConfError::ParserConfig {
                        option: key.clone(),
                        message: "unknown parser option".to_string(),
                    });
                }
            }
        }
        Ok(options)
    }
}

fn expect_str<'v>(key: &str, value: &'v Value) -> Result<&'v str, ConfError> {
    value.as_str().ok_or_else(|| ConfError::ParserConfig {
        option: key.to_string(),
        message: format!("expected a string, found {}", value.type_str()),
    })
}

fn expect_bool(key: &str, value: &Value) -> Result<bool, ConfError> {
    value.as_bool().ok_or_else(|| ConfError::ParserConfig {
        option: key.to_string(),
        message: format!("expected a boolean, found {}", value.type_str()),
    })
}

fn unsupported(key: &str, value: &str, allowed: &[&str]) -> ConfError {
    ConfError::ParserConfig {
        option: key.to_string(),
        message: format!("unsupported value '{}' (expected one of: {})", value, allowed.join(", ")),
    }
}
