//! Configuration management for stamp.
//!
//! Parses `stamp.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the unresolved-expression policy.
    pub on_unresolved: Option<OnUnresolved>,
    /// Override the substitution text.
    pub default_text: Option<String>,
    /// Override handling of unknown elements.
    pub unhandled_nodes: Option<UnhandledNodesSetting>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "stamp.toml";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Placeholder delimiters.
    pub placeholders: PlaceholderConfig,
    /// What happens when an expression cannot be resolved.
    pub resolution: ResolutionConfig,
    /// Value resolver settings.
    pub resolvers: ResolverConfig,
    /// Template clean-up passes run before stamping.
    pub preprocess: PreprocessConfig,
    /// Tree walk settings.
    pub processing: ProcessingConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Placeholder delimiter configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceholderConfig {
    /// Opening delimiter of variable placeholders.
    pub variable_prefix: String,
    /// Closing delimiter of variable placeholders.
    pub variable_suffix: String,
    /// Opening delimiter of inline directives.
    pub directive_prefix: String,
    /// Closing delimiter of inline directives.
    pub directive_suffix: String,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            variable_prefix: "${".to_owned(),
            variable_suffix: "}".to_owned(),
            directive_prefix: "#{".to_owned(),
            directive_suffix: "}".to_owned(),
        }
    }
}

/// Policy for expressions that fail to resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnUnresolved {
    /// Abort the stamping call.
    #[default]
    Fail,
    /// Replace with `default_text`.
    Substitute,
    /// Leave the expression text in place.
    PassThrough,
}

impl std::str::FromStr for OnUnresolved {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(Self::Fail),
            "substitute" => Ok(Self::Substitute),
            "pass-through" => Ok(Self::PassThrough),
            other => Err(ConfigError::Validation(format!(
                "unknown on_unresolved policy '{other}' (expected fail, substitute or pass-through)"
            ))),
        }
    }
}

/// Resolution policy configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolutionConfig {
    /// Policy for unresolved expressions.
    pub on_unresolved: OnUnresolved,
    /// Text used by the `substitute` policy.
    pub default_text: String,
}

/// Value resolver configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Text written for `null` values.
    pub null_text: String,
    /// `chrono` format for ISO dates.
    pub date_format: String,
    /// `chrono` format for RFC 3339 date-times.
    pub datetime_format: String,
    /// Render values no other resolver accepts as JSON.
    pub fallback_to_json: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            null_text: String::new(),
            date_format: "%Y-%m-%d".to_owned(),
            datetime_format: "%Y-%m-%d %H:%M".to_owned(),
            fallback_to_json: true,
        }
    }
}

/// Preprocessor configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreprocessConfig {
    /// Merge adjacent runs with identical formatting.
    pub merge_runs: bool,
    /// Strip spell-check markers.
    pub remove_proof_errors: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            merge_runs: true,
            remove_proof_errors: true,
        }
    }
}

/// Treatment of elements the walker does not know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnhandledNodesSetting {
    /// Descend into them.
    #[default]
    Lenient,
    /// Fail the stamping call.
    Strict,
}

/// Tree walk configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Treatment of unknown elements.
    pub unhandled_nodes: UnhandledNodesSetting,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `stamp.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading, allowing CLI arguments to take
    /// precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails, or
    /// the merged configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = std::env::current_dir()
            .ok()
            .and_then(|cwd| Self::discover_from(&cwd))
        {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(policy) = settings.on_unresolved {
            self.resolution.on_unresolved = policy;
        }
        if let Some(text) = &settings.default_text {
            self.resolution.default_text.clone_from(text);
        }
        if let Some(unhandled) = settings.unhandled_nodes {
            self.processing.unhandled_nodes = unhandled;
        }
    }

    /// Search for config file in `start` and its parents.
    fn discover_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.config_path = Some(path.to_path_buf());

        // Validate configuration after loading
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_placeholders()?;
        require_non_empty(&self.resolvers.date_format, "resolvers.date_format")?;
        require_non_empty(&self.resolvers.datetime_format, "resolvers.datetime_format")?;
        Ok(())
    }

    /// Validate placeholder delimiters.
    fn validate_placeholders(&self) -> Result<(), ConfigError> {
        let p = &self.placeholders;
        require_non_empty(&p.variable_prefix, "placeholders.variable_prefix")?;
        require_non_empty(&p.variable_suffix, "placeholders.variable_suffix")?;
        require_non_empty(&p.directive_prefix, "placeholders.directive_prefix")?;
        require_non_empty(&p.directive_suffix, "placeholders.directive_suffix")?;

        // Both forms are scanned over the same text, so identical openers would
        // make every placeholder ambiguous
        if p.variable_prefix == p.directive_prefix {
            return Err(ConfigError::Validation(
                "placeholders.variable_prefix and placeholders.directive_prefix must differ"
                    .to_owned(),
            ));
        }

        Ok(())
    }
}
