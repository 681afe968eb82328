//! CLI error types.

use stamp_config::ConfigError;
use stamp_engine::StampError;

/// Errors reported by `stamp` subcommands.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Stamp(#[from] StampError),

    #[error("Invalid data file: {0}")]
    Data(#[from] serde_json::Error),
}
