// src/cli/registry.rs

//! # Command Registry
//!
//! The single source of truth for the subcommands confkit publishes. Each entry belongs to
//! a group (the built-ins live in [`COMMAND_GROUP`]) and is found by name or alias.
//!
//! Lookups are memoized per `(group, name)` for the life of the process. Call
//! [`reset_cache`] to force the next lookup to scan the table again.

use crate::cli::handlers;
use crate::constants::{COMMAND_GROUP, ExitCode};
use anyhow::Result;
use clap::ArgMatches;
use lazy_static::lazy_static;
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Defines a subcommand: how to build its parser and how to run it.
pub struct CommandEntry {
    /// Registry group the entry is published under.
    pub group: &'static str,
    /// Canonical subcommand name.
    pub name: &'static str,
    /// Other names the subcommand answers to.
    pub aliases: &'static [&'static str],
    /// One-line help text.
    pub about: &'static str,
    /// Builds the subcommand's argument parser.
    pub build: fn() -> clap::Command,
    /// Runs the subcommand.
    pub handler: fn(&ArgMatches) -> Result<ExitCode>,
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("group", &self.group)
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .finish_non_exhaustive()
    }
}

impl CommandEntry {
    fn matches(&self, name: &str) -> bool {
        self.name == name || self.aliases.contains(&name)
    }

    /// The entry's clap command, named and described from the table.
    pub fn command(&self) -> clap::Command {
        (self.build)()
            .name(self.name)
            .about(self.about)
            .visible_aliases(self.aliases.iter().copied())
    }
}

static BUILTIN_COMMANDS: &[CommandEntry] = &[
    CommandEntry {
        group: COMMAND_GROUP,
        name: "check",
        aliases: &[],
        about: "Perform basic syntax and sanity checks on .conf files",
        build: handlers::check::command,
        handler: handlers::check::handle,
    },
    CommandEntry {
        group: COMMAND_GROUP,
        name: "sort",
        aliases: &["fmt"],
        about: "Sort a configuration file by stanza and key",
        build: handlers::sort::command,
        handler: handlers::sort::handle,
    },
];

type CacheKey = (String, Option<String>);

lazy_static! {
    static ref LOOKUP_CACHE: Mutex<HashMap<CacheKey, Vec<&'static CommandEntry>>> = Mutex::new(HashMap::new());
}

/// Failed registry lookups.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// Nothing is registered under the group.
    #[error("No commands registered in group '{0}'")]
    UnknownGroup(String),
    /// No entry of the group answers to the name.
    #[error("Unknown command '{name}' in group '{group}'")]
    UnknownCommand {
        /// The group searched.
        group: String,
        /// The name asked for.
        name: String,
    },
}

/// Returns the entries of `group`, restricted to the one named `name` (or aliased so) when
/// a name is given.
///
/// # Errors
/// `UnknownGroup` if nothing is registered under `group`, `UnknownCommand` if no entry of
/// the group answers to `name`.
pub fn get_entrypoints(group: &str, name: Option<&str>) -> Result<Vec<&'static CommandEntry>, RegistryError> {
    let key = (group.to_string(), name.map(str::to_string));
    let mut cache = LOOKUP_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(entries) = cache.get(&key) {
        return Ok(entries.clone());
    }

    debug!("Registry cache miss for {:?}", key);
    let in_group: Vec<&'static CommandEntry> = BUILTIN_COMMANDS.iter().filter(|e| e.group == group).collect();
    if in_group.is_empty() {
        return Err(RegistryError::UnknownGroup(group.to_string()));
    }

    let entries = match name {
        None => in_group,
        Some(name) => {
            let found: Vec<_> = in_group.into_iter().filter(|e| e.matches(name)).collect();
            if found.is_empty() {
                return Err(RegistryError::UnknownCommand {
                    group: group.to_string(),
                    name: name.to_string(),
                });
            }
            found
        }
    };

    cache.insert(key, entries.clone());
    Ok(entries)
}

/// Drops every memoized lookup.
pub fn reset_cache() {
    LOOKUP_CACHE.lock().unwrap_or_else(PoisonError::into_inner).clear();
    debug!("Registry cache cleared");
}

#[cfg(test)]
pub(crate) fn is_cached(group: &str, name: Option<&str>) -> bool {
    let key = (group.to_string(), name.map(str::to_string));
    LOOKUP_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(&key)
}
