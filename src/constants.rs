// src/constants.rs

//! Names, tokens and exit codes shared across confkit.

/// The command-line token that stands for standard input or standard output.
pub const STD_STREAM_TOKEN: &str = "-";

/// Pseudo-name of a reference backed by standard input.
pub const STDIN_NAME: &str = "<stdin>";

/// Pseudo-name of a reference backed by standard output.
pub const STDOUT_NAME: &str = "<stdout>";

/// Name of the stanza holding entries that appear before the first `[stanza]` header.
pub const GLOBAL_STANZA: &str = "";

/// Prefix of the synthetic keys under which kept comment lines are stored.
pub const COMMENT_KEY_PREFIX: &str = "#-";

/// File extension recognized when walking a directory for configuration files.
pub const CONF_EXTENSION: &str = "conf";

/// The name of the confkit directory inside the user's configuration directory.
pub const APP_DIR_NAME: &str = "confkit";

/// The name of the settings file (inside the confkit configuration directory).
pub const SETTINGS_FILENAME: &str = "config.toml";

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV_VAR: &str = "CONFKIT_CONFIG";

/// Environment variable holding the `env_logger` filter.
pub const LOG_ENV_VAR: &str = "CONFKIT_LOG";

/// Registry group under which the built-in subcommands are published.
pub const COMMAND_GROUP: &str = "confkit.command";

/// Process exit codes surfaced by the subcommands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitCode {
    /// Everything went fine.
    Success = 0,
    /// An unexpected failure forced the command to abort.
    InternalError = 1,
    /// The command line could not be parsed or an argument failed validation.
    BadArgs = 2,
    /// `sort` rewrote at least one file.
    SortApplied = 9,
    /// At least one input failed validation or parsing.
    BadConfFile = 20,
}

impl ExitCode {
    /// The numeric code handed to `std::process::exit`.
    pub fn code(self) -> i32 {
        self as i32
    }
}
