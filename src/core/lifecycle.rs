// src/core/lifecycle.rs

//! # Command Lifecycle
//!
//! Every command runs through the same three phases:
//!
//! 1. `pre_run` prepares; if it fails, nothing else happens.
//! 2. `run` does the work.
//! 3. `post_run` tears down. It is called exactly once after `run`, whether `run`
//!    returned normally, returned an error, or panicked, and it is told about the failure.
//!
//! The error from `run` is returned unchanged once `post_run` has seen it.

use crate::constants::ExitCode;
use anyhow::anyhow;
use std::fmt;
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Failures raised by the lifecycle itself rather than by a command.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The command left `run` at its default.
    #[error("command '{0}' does not implement run()")]
    NotImplemented(&'static str),
}

/// The standard streams a command talks to.
pub struct CommandIo<'a> {
    /// Where the command reads input lists from.
    pub stdin: Box<dyn BufRead + 'a>,
    /// Regular output.
    pub stdout: Box<dyn Write + 'a>,
    /// Diagnostics.
    pub stderr: Box<dyn Write + 'a>,
}

impl CommandIo<'static> {
    /// The process's own standard streams.
    pub fn std() -> Self {
        Self {
            stdin: Box::new(io::stdin().lock()),
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
        }
    }
}

impl<'a> CommandIo<'a> {
    /// Streams supplied by the caller, typically in-memory buffers in tests.
    pub fn new(stdin: impl BufRead + 'a, stdout: impl Write + 'a, stderr: impl Write + 'a) -> Self {
        Self {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }
}

impl fmt::Debug for CommandIo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandIo").finish_non_exhaustive()
    }
}

/// A command driven by [`ConfCommand::launch`].
pub trait ConfCommand {
    /// The parsed arguments the command works on.
    type Args;

    /// Name used in lifecycle errors.
    fn name(&self) -> &'static str;

    /// Preparation. An error here skips `run` and `post_run`.
    fn pre_run(&mut self, _args: &Self::Args) -> anyhow::Result<()> {
        Ok(())
    }

    /// The work itself.
    fn run(&mut self, _args: &Self::Args) -> anyhow::Result<ExitCode> {
        Err(LifecycleError::NotImplemented(self.name()).into())
    }

    /// Teardown. `failure` is the error `run` produced, if any.
    fn post_run(&mut self, _args: &Self::Args, _failure: Option<&anyhow::Error>) {}

    /// Runs the three phases in order. See the module docs for the guarantees.
    fn launch(&mut self, args: &Self::Args) -> anyhow::Result<ExitCode> {
        self.pre_run(args)?;

        let outcome = {
            let mut guard = scopeguard::guard_on_unwind(&mut *self, |cmd| {
                let failure = anyhow!("command '{}' panicked", cmd.name());
                cmd.post_run(args, Some(&failure));
            });
            guard.run(args)
        };

        self.post_run(args, outcome.as_ref().err());
        outcome
    }
}
