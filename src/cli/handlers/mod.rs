// src/cli/handlers/mod.rs

//! One module per subcommand; each exposes `command()` and `handle()` for the registry.

pub mod check;
pub mod sort;
