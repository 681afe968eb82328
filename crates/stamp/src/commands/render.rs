//! `stamp render` command implementation.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use clap::Args;
use serde_json::Value;
use stamp_config::{CliSettings, Config, OnUnresolved, UnhandledNodesSetting};
use stamp_engine::Stamper;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Template document (Flat OPC XML).
    template: PathBuf,

    /// JSON data file, or `-` for stdin.
    #[arg(short, long)]
    data: PathBuf,

    /// Output file (default: stdout).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover stamp.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Policy for expressions that cannot be resolved: fail, substitute or pass-through.
    #[arg(long)]
    on_unresolved: Option<OnUnresolved>,

    /// Text used in place of unresolved expressions (implies --on-unresolved substitute).
    #[arg(long)]
    default_text: Option<String>,

    /// Fail on elements the engine does not know instead of descending into them.
    #[arg(long)]
    strict: bool,

    /// Enable verbose output (log every directive and resolver).
    #[arg(short, long)]
    pub verbose: bool,
}

impl RenderArgs {
    /// Execute the render command.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let on_unresolved = self
            .on_unresolved
            .or_else(|| self.default_text.as_ref().map(|_| OnUnresolved::Substitute));
        if self.default_text.is_some() && on_unresolved != Some(OnUnresolved::Substitute) {
            output.warning("--default-text only applies to the substitute policy");
        }
        let cli_settings = CliSettings {
            on_unresolved,
            default_text: self.default_text.clone(),
            unhandled_nodes: self.strict.then_some(UnhandledNodesSetting::Strict),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &config.config_path {
            tracing::debug!(path = %path.display(), "Loaded configuration");
        }

        let context = read_data(&self.data)?;
        let stamper = Stamper::from_config(&config);
        let template = BufReader::new(File::open(&self.template)?);

        match &self.output {
            Some(path) => {
                let mut writer = BufWriter::new(File::create(path)?);
                stamper.stamp_to(template, &context, &mut writer)?;
                writer.flush()?;
                output.written(path);
            }
            None => {
                let stdout = io::stdout();
                let mut writer = BufWriter::new(stdout.lock());
                stamper.stamp_to(template, &context, &mut writer)?;
                writer.flush()?;
            }
        }
        Ok(())
    }
}

/// Read the JSON context from a file or stdin.
fn read_data(path: &Path) -> Result<Value, CliError> {
    let mut content = String::new();
    if path == Path::new("-") {
        io::stdin().read_to_string(&mut content)?;
    } else {
        File::open(path)?.read_to_string(&mut content)?;
    }
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_read_data_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, r#"{"name": "Homer", "kids": 3}"#).unwrap();
        assert_eq!(read_data(&path).unwrap(), json!({"name": "Homer", "kids": 3}));
    }

    #[test]
    fn test_read_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(read_data(&path), Err(CliError::Data(_))));
    }

    #[test]
    fn test_render_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.xml");
        let data = dir.path().join("data.json");
        let out = dir.path().join("out.xml");
        std::fs::write(
            &template,
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Hi ${name}</w:t></w:r></w:p></w:body></w:document>"#,
        )
        .unwrap();
        std::fs::write(&data, r#"{"name": "Lisa"}"#).unwrap();

        let args = RenderArgs {
            template,
            data,
            output: Some(out.clone()),
            config: Some(dir.path().join("missing.toml")),
            on_unresolved: None,
            default_text: None,
            strict: false,
            verbose: false,
        };
        assert!(matches!(args.execute(), Err(CliError::Config(_))));

        let config = dir.path().join("stamp.toml");
        std::fs::write(&config, "[resolution]\non_unresolved = \"fail\"\n").unwrap();
        let args = RenderArgs {
            template: dir.path().join("template.xml"),
            data: dir.path().join("data.json"),
            output: Some(out.clone()),
            config: Some(config),
            on_unresolved: Some(OnUnresolved::Fail),
            default_text: None,
            strict: false,
            verbose: false,
        };
        args.execute().unwrap();
        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains("Hi Lisa"));
    }
}
