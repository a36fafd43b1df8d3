// src/cli/handlers/check.rs

//! `check`: syntax and sanity checks for `.conf` files.

use anyhow::{Context, Result};
use clap::{ArgMatches, CommandFactory, FromArgMatches};
use colored::*;
use std::io::{BufRead, Write};
use walkdir::WalkDir;

use crate::{
    cli::args::CheckArgs,
    conf::{ConfError, ParseProfile},
    constants::{CONF_EXTENSION, ExitCode},
    core::{AccessMode, CommandIo, ConfCommand, ConfRef, ConfigDirReference, ConfigFileReference, RefError},
};

/// The subcommand's parser.
pub fn command() -> clap::Command {
    CheckArgs::command()
}

/// Runs the subcommand on the process's standard streams.
pub fn handle(matches: &ArgMatches) -> Result<ExitCode> {
    let args = CheckArgs::from_arg_matches(matches)?;
    CheckCmd::new(CommandIo::std()).launch(&args)
}

/// Tally of one `check` run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckCounts {
    /// Files looked at, including missing ones.
    pub checked: usize,
    /// Files that parsed.
    pub okay: usize,
    /// Files skipped because they do not exist.
    pub missing: usize,
    /// Files that failed to parse.
    pub error: usize,
}

/// The `check` command.
#[derive(Debug)]
pub struct CheckCmd<'a> {
    io: CommandIo<'a>,
    counts: CheckCounts,
}

impl<'a> CheckCmd<'a> {
    /// A command talking to `io`.
    pub fn new(io: CommandIo<'a>) -> Self {
        Self {
            io,
            counts: CheckCounts::default(),
        }
    }

    /// Counts so far.
    pub fn counts(&self) -> CheckCounts {
        self.counts
    }

    /// Expands the arguments into the list of files to check.
    fn targets(&mut self, args: &CheckArgs) -> Result<Vec<ConfigFileReference>> {
        // A lone '-' means: read file names from standard input.
        if let [ConfRef::File(only)] = args.conf.as_slice()
            && !only.is_file()
        {
            let mut targets = Vec::new();
            for line in (&mut self.io.stdin).lines() {
                let line = line.context("Failed to read file names from standard input")?;
                let name = line.trim();
                if !name.is_empty() {
                    targets.push(ConfigFileReference::new(name, AccessMode::Read, only.profile().clone()));
                }
            }
            return Ok(targets);
        }

        let mut targets = Vec::new();
        for conf in &args.conf {
            match conf {
                ConfRef::File(file) => targets.push(file.clone()),
                ConfRef::Dir(dir) => targets.extend(conf_files_in(dir)?),
            }
        }
        Ok(targets)
    }
}

/// Every `*.conf` file below `dir`, in a stable order.
fn conf_files_in(dir: &ConfigDirReference) -> Result<Vec<ConfigFileReference>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir.name()).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk '{}'", dir.name().display()))?;
        if !entry.file_type().is_file() || entry.path().extension().is_none_or(|ext| ext != CONF_EXTENSION) {
            continue;
        }
        if let Ok(relpath) = entry.path().strip_prefix(dir.name()) {
            files.push(dir.get_file(relpath));
        }
    }
    Ok(files)
}

impl ConfCommand for CheckCmd<'_> {
    type Args = CheckArgs;

    fn name(&self) -> &'static str {
        "check"
    }

    fn run(&mut self, args: &CheckArgs) -> Result<ExitCode> {
        let mut exit_code = ExitCode::Success;

        for mut conf in self.targets(args)? {
            self.counts.checked += 1;
            if !conf.path().is_some_and(|path| path.is_file()) {
                writeln!(self.io.stderr, "Skipping missing file:  {}", conf.name())?;
                self.counts.missing += 1;
                continue;
            }

            match conf.load(&ParseProfile::strict_no_comments()) {
                Ok(_) => {
                    self.counts.okay += 1;
                    if !args.quiet {
                        writeln!(self.io.stdout, "{} {}", "Successfully parsed".green(), conf.name())?;
                    }
                }
                Err(RefError::Conf(ConfError::Parse(e))) => {
                    writeln!(self.io.stderr, "{} {}:  {}", "Error in file".red().bold(), conf.name(), e)?;
                    exit_code = ExitCode::BadConfFile;
                    self.counts.error += 1;
                }
                Err(e) => {
                    writeln!(
                        self.io.stderr,
                        "{} {}. Aborting.\n{}",
                        "Unhandled error while parsing".red().bold(),
                        conf.name(),
                        e
                    )?;
                    exit_code = ExitCode::InternalError;
                    self.counts.error += 1;
                    break;
                }
            }
            conf.close();
        }

        let c = self.counts;
        writeln!(
            self.io.stdout,
            "Completed checking {} files.  rc={} Breakdown:\n   {} files were parsed successfully.\n   {} files failed.",
            c.checked,
            exit_code.code(),
            c.okay,
            c.error
        )?;
        Ok(exit_code)
    }

    fn post_run(&mut self, _args: &CheckArgs, _failure: Option<&anyhow::Error>) {
        let _ = self.io.stdout.flush();
        let _ = self.io.stderr.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use std::io;
    use tempfile::tempdir;

    fn run_check(argv: &[&str], stdin: &str) -> (ExitCode, CheckCounts, String, String) {
        let args = CheckArgs::try_parse_from(argv).unwrap();
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let (code, counts) = {
            let mut cmd = CheckCmd::new(CommandIo::new(stdin.as_bytes(), &mut out, &mut err));
            let code = cmd.launch(&args).unwrap();
            (code, cmd.counts())
        };
        (
            code,
            counts,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_check_good_and_bad_files() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.conf");
        let bad = dir.path().join("bad.conf");
        fs::write(&good, "# fine\n[a]\nx = 1\n").unwrap();
        fs::write(&bad, "[a]\nx = 1\n[a]\ny = 2\n").unwrap();

        let (code, counts, out, err) =
            run_check(&["check", good.to_str().unwrap(), bad.to_str().unwrap()], "");

        assert_eq!(code, ExitCode::BadConfFile);
        assert_eq!(counts.checked, 2);
        assert_eq!(counts.okay, 1);
        assert_eq!(counts.error, 1);
        assert!(out.contains("Successfully parsed"));
        assert!(out.contains("Completed checking 2 files.  rc=20"));
        assert!(err.contains("Duplicate stanza [a]"));
    }

    #[test]
    fn test_undecodable_file_does_not_stop_the_run() {
        let dir = tempdir().unwrap();
        let latin = dir.path().join("a_latin.conf");
        let good = dir.path().join("b_good.conf");
        fs::write(&latin, b"[s]\nname = caf\xe9\n").unwrap();
        fs::write(&good, "[s]\nname = cafe\n").unwrap();

        let (code, counts, out, err) =
            run_check(&["check", latin.to_str().unwrap(), good.to_str().unwrap()], "");

        assert_eq!(code, ExitCode::BadConfFile);
        assert_eq!(counts.checked, 2);
        assert_eq!(counts.okay, 1);
        assert_eq!(counts.error, 1);
        assert!(err.contains("Encoding error"));
        assert!(!err.contains("Aborting"));
        assert!(out.contains("Successfully parsed"));
        assert!(out.contains(&good.display().to_string()));
    }

    #[test]
    fn test_missing_files_are_skipped() {
        let (code, counts, _, err) = run_check(&["check", "-q", "/no/such/file.conf"], "");
        assert_eq!(code, ExitCode::Success);
        assert_eq!(counts.missing, 1);
        assert!(err.contains("Skipping missing file:  /no/such/file.conf"));
    }

    #[test]
    fn test_file_names_from_stdin() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.conf");
        let b = dir.path().join("b.conf");
        fs::write(&a, "[a]\n").unwrap();
        fs::write(&b, "[b]\n").unwrap();

        let names = format!("{}\n\n{}\n", a.display(), b.display());
        let (code, counts, out, _) = run_check(&["check", "-"], &names);

        assert_eq!(code, ExitCode::Success);
        assert_eq!(counts.checked, 2);
        assert_eq!(counts.okay, 2);
        assert!(out.contains(&a.display().to_string()));
    }

    #[test]
    fn test_directories_are_walked_for_conf_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("default")).unwrap();
        fs::write(dir.path().join("default").join("app.conf"), "[a]\n").unwrap();
        fs::write(dir.path().join("default").join("notes.txt"), "not a conf").unwrap();
        fs::write(dir.path().join("top.conf"), "junk line\n").unwrap();

        let (code, counts, _, err) = run_check(&["check", "-q", dir.path().to_str().unwrap()], "");

        assert_eq!(counts.checked, 2);
        assert_eq!(counts.okay, 1);
        assert_eq!(code, ExitCode::BadConfFile);
        assert!(err.contains("Unexpected entry: junk line"));
    }

    #[test]
    fn test_quiet_suppresses_success_lines() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.conf");
        fs::write(&good, "[a]\n").unwrap();

        let (_, _, out, _) = run_check(&["check", "--quiet", good.to_str().unwrap()], "");
        assert!(!out.contains("Successfully parsed"));
        assert!(out.contains("1 files were parsed successfully."));
    }

    #[test]
    fn test_check_cmd_debug_output() {
        let streams = CommandIo::new(io::empty(), io::sink(), io::sink());
        assert!(format!("{:?}", CheckCmd::new(streams)).contains("CommandIo"));
    }
}
