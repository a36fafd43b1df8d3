// src/bin/confkit.rs

//! The `confkit` executable.

use colored::*;
use confkit::{
    cli::{build_command, dispatch},
    constants::{ExitCode, LOG_ENV_VAR},
    core::settings,
};
use env_logger::Env;

/// The main entry point of the `confkit` application.
/// It sets up logging and settings, parses arguments, dispatches to the chosen
/// subcommand, and performs centralized error handling.
fn main() {
    env_logger::Builder::from_env(Env::default().filter_or(LOG_ENV_VAR, "warn"))
        .format_timestamp(None)
        .init();

    if let Err(e) = settings::init() {
        eprintln!("\n{}: {}", "Error".red().bold(), e);
        std::process::exit(ExitCode::InternalError.code());
    }

    let command = match build_command() {
        Ok(command) => command,
        Err(e) => {
            eprintln!("\n{}: {}", "Error".red().bold(), e);
            std::process::exit(ExitCode::InternalError.code());
        }
    };

    // Usage and argument validation errors exit here with clap's code (2).
    let matches = command.get_matches();

    match dispatch(&matches) {
        Ok(code) => std::process::exit(code.code()),
        Err(e) => {
            eprintln!("\n{}: {}", "Error".red().bold(), e);
            std::process::exit(ExitCode::InternalError.code());
        }
    }
}
