// src/cli/mod.rs

//! The `confkit` command line: global options, the command tree and dispatch.

use anyhow::{Result, anyhow};
use clap::{ArgMatches, CommandFactory, Parser};

use crate::constants::{COMMAND_GROUP, ExitCode};

pub mod args;
pub mod handlers;
pub mod registry;

/// confkit: lazy, mode-aware tooling for Splunk-style .conf files.
#[derive(Parser, Debug)]
#[command(
    name = "confkit",
    author,
    version,
    about,
    long_about = None,
    subcommand_required = true,
    arg_required_else_help = true,
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// The full command tree: the global options plus one subcommand per registry entry.
pub fn build_command() -> Result<clap::Command> {
    let entries = registry::get_entrypoints(COMMAND_GROUP, None)?;
    Ok(entries
        .into_iter()
        .fold(Cli::command(), |cmd, entry| cmd.subcommand(entry.command())))
}

/// Routes parsed arguments to the handler of the chosen subcommand.
pub fn dispatch(matches: &ArgMatches) -> Result<ExitCode> {
    if matches.get_flag("no_color") {
        colored::control::set_override(false);
    }

    let (name, sub_matches) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("No command given"))?;
    log::debug!("Dispatching '{}'", name);

    let entries = registry::get_entrypoints(COMMAND_GROUP, Some(name))?;
    let entry = entries
        .first()
        .ok_or_else(|| anyhow!("Unknown command '{}'", name))?;
    (entry.handler)(sub_matches)
}
