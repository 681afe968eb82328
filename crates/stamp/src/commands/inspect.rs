//! `stamp inspect` command implementation.

use std::path::PathBuf;

use clap::Args;
use stamp_config::Config;
use stamp_engine::Stamper;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the inspect command.
#[derive(Args)]
pub(crate) struct InspectArgs {
    /// Template document (Flat OPC XML).
    template: PathBuf,

    /// Print the report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Path to configuration file (default: auto-discover stamp.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl InspectArgs {
    /// Execute the inspect command.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let config = Config::load(self.config.as_deref(), None)?;
        let template = std::fs::read(&self.template)?;
        let report = Stamper::from_config(&config).inspect(&template)?;

        let output = Output::stdout();
        if self.json {
            output.line(&serde_json::to_string_pretty(&report)?)?;
        } else {
            output.report(&report);
        }
        Ok(())
    }
}
