use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaiError {
    #[error("{var} environment variable not set")]
    MissingApiKey { var: &'static str },

    #[error("flags: '{first}' and '{second}' are mutually exclusive")]
    MutuallyExclusive {
        first: &'static str,
        second: &'static str,
    },

    #[error("failed to read stdin: {0}")]
    Stdin(#[source] std::io::Error),

    #[error("failed to read build info")]
    BuildInfoUnavailable,

    #[error("found no prompt, set args or pipe in some string")]
    NoPrompt,

    #[error("unknown command: '{0}'")]
    UnknownCommand(String),

    #[error("{0}")]
    Flags(#[from] clap::Error),

    #[error("failed to load config file '{}': {message}", path.display())]
    ConfigFile { path: PathBuf, message: String },

    #[error(transparent)]
    Api(#[from] anyhow::Error),
}

impl ClaiError {
    /// Errors that should be followed by the usage text.
    pub fn wants_usage(&self) -> bool {
        matches!(self, Self::NoPrompt | Self::UnknownCommand(_))
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::FAILURE
    }
}
