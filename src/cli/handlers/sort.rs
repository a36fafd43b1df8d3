// src/cli/handlers/sort.rs

//! `sort`: normalizes stanza and key order, in place or merged into one target.

use anyhow::{Result, anyhow, bail};
use clap::{ArgMatches, CommandFactory, FromArgMatches};
use colored::*;
use log::debug;
use std::io::Write;

use crate::{
    cli::args::SortArgs,
    conf::{ConfData, WriteOutcome},
    constants::{COMMENT_KEY_PREFIX, ExitCode},
    core::{CommandIo, ConfCommand, ConfRef, ConfigFileReference},
};

/// The subcommand's parser.
pub fn command() -> clap::Command {
    SortArgs::command()
}

/// Runs the subcommand on the process's standard streams.
pub fn handle(matches: &ArgMatches) -> Result<ExitCode> {
    let args = SortArgs::from_arg_matches(matches)?;
    SortCmd::new(CommandIo::std()).launch(&args)
}

fn file_of(conf: &ConfRef) -> Result<&ConfigFileReference> {
    conf.as_file()
        .ok_or_else(|| anyhow!("'{}' is a directory, not a configuration file", conf.display_name()))
}

/// The `sort` command.
#[derive(Debug)]
pub struct SortCmd<'a> {
    io: CommandIo<'a>,
}

impl<'a> SortCmd<'a> {
    /// A command talking to `io`.
    pub fn new(io: CommandIo<'a>) -> Self {
        Self { io }
    }

    fn sort_in_place(&mut self, args: &SortArgs) -> Result<ExitCode> {
        let mut changed = 0usize;
        for conf in &args.conf {
            let mut file = file_of(conf)?.clone();
            let data = file.data()?.clone();
            match file.dump(&data)? {
                WriteOutcome::Unchanged => {
                    if !args.quiet {
                        writeln!(self.io.stdout, "Nothing to update.  File {} is already sorted", file.name())?;
                    }
                }
                outcome => {
                    debug!("'{}' {}", file.name(), outcome);
                    writeln!(self.io.stderr, "{} {} with sorted content.", "Replaced file".yellow(), file.name())?;
                    changed += 1;
                }
            }
        }
        Ok(if changed > 0 { ExitCode::SortApplied } else { ExitCode::Success })
    }

    fn sort_to_target(&mut self, args: &SortArgs) -> Result<ExitCode> {
        let mut merged = ConfData::new();
        // Comment keys restart in every input; renumber them so none is overwritten.
        let mut comments = 0usize;
        for conf in &args.conf {
            let mut file = file_of(conf)?.clone();
            for (name, stanza) in file.data()? {
                let into = merged.entry(name.clone()).or_default();
                for (key, value) in stanza {
                    let key = if key.starts_with(COMMENT_KEY_PREFIX) {
                        comments += 1;
                        format!("{COMMENT_KEY_PREFIX}{comments:06}")
                    } else {
                        key.clone()
                    };
                    into.insert(key, value.clone());
                }
            }
        }

        let mut target = file_of(&args.target)?.clone();
        let outcome = target.dump(&merged)?;
        if target.is_file() && !args.quiet {
            writeln!(self.io.stdout, "Wrote sorted content to {} ({})", target.name(), outcome)?;
        }
        Ok(ExitCode::Success)
    }
}

impl ConfCommand for SortCmd<'_> {
    type Args = SortArgs;

    fn name(&self) -> &'static str {
        "sort"
    }

    fn pre_run(&mut self, args: &SortArgs) -> Result<()> {
        if args.inplace {
            for conf in &args.conf {
                if !file_of(conf)?.is_file() {
                    bail!("In-place sorting needs files on disk; cannot rewrite '{}'", conf.display_name());
                }
            }
        }
        Ok(())
    }

    fn run(&mut self, args: &SortArgs) -> Result<ExitCode> {
        if args.inplace {
            self.sort_in_place(args)
        } else {
            self.sort_to_target(args)
        }
    }

    fn post_run(&mut self, _args: &SortArgs, failure: Option<&anyhow::Error>) {
        if let Some(e) = failure {
            debug!("sort failed: {}", e);
        }
        let _ = self.io.stdout.flush();
        let _ = self.io.stderr.flush();
    }
}
