// src/cli/args.rs

//! Argument definitions of the built-in subcommands.

use crate::conf::ParseProfile;
use crate::core::settings;
use crate::core::{AccessMode, ConfRef, RefAction, ReferenceFactory};
use clap::Parser;

/// A factory for a file-typed argument. The user's `[parser]` settings sit underneath
/// `profile`, so options the command sets explicitly always win.
pub fn conf_file_type(mode: AccessMode, action: RefAction, profile: ParseProfile) -> ReferenceFactory {
    let profile = settings::get().parser_profile().merged(&profile);
    ReferenceFactory::new(mode).action(action).profile(profile)
}

/// Arguments of `check`.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "check",
    long_about = "Provide basic syntax and sanity checking for .conf files.\n\n\
                  Consider using this as part of a pre-commit hook:\n\n    \
                  find . -name '*.conf' | confkit check -"
)]
pub struct CheckArgs {
    /// One or more configuration files or directories to check. If the special value '-'
    /// is given, the list of files to validate is read from standard input.
    #[arg(
        value_name = "FILE",
        required = true,
        value_parser = conf_file_type(AccessMode::Read, RefAction::None, ParseProfile::new()).accept_dir(true)
    )]
    pub conf: Vec<ConfRef>,

    /// Reduce the volume of output.
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments of `sort`.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sort",
    long_about = "Sort a configuration file by stanza name and key. Comments are kept.\n\n\
                  Without --inplace the inputs are merged in order and written to the target."
)]
pub struct SortArgs {
    /// Input file(s) to sort.
    #[arg(
        value_name = "FILE",
        required = true,
        value_parser = conf_file_type(AccessMode::ReadWrite, RefAction::Load, ParseProfile::strict())
    )]
    pub conf: Vec<ConfRef>,

    /// File to write the sorted output to. Defaults to standard output.
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "-",
        conflicts_with = "inplace",
        value_parser = conf_file_type(AccessMode::Write, RefAction::None, ParseProfile::new())
    )]
    pub target: ConfRef,

    /// Replace the input files with their sorted content.
    #[arg(short, long)]
    pub inplace: bool,

    /// Reduce the volume of output.
    #[arg(short, long)]
    pub quiet: bool,
}
