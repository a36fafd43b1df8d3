//! # confkit
//!
//! Lazy, mode-aware references to Splunk-style `.conf` files, the factory that turns
//! command-line tokens into them, and the command lifecycle the `confkit` binary runs.

pub mod cli;
pub mod conf;
pub mod constants;
pub mod core;
