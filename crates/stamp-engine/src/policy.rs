//! Engine policies.

use stamp_config::{OnUnresolved, ResolutionConfig, UnhandledNodesSetting};

/// What happens when an expression cannot be resolved.
///
/// Applies to placeholders, inline directives and comment directives at every
/// nesting level. Structural errors ignore the policy and always fail.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResolutionPolicy {
    /// Abort the stamping call.
    #[default]
    FailFast,
    /// Replace the placeholder with this text.
    Substitute(String),
    /// Leave the placeholder text (or comment anchors) in place.
    PassThrough,
}

impl From<&ResolutionConfig> for ResolutionPolicy {
    fn from(config: &ResolutionConfig) -> Self {
        match config.on_unresolved {
            OnUnresolved::Fail => Self::FailFast,
            OnUnresolved::Substitute => Self::Substitute(config.default_text.clone()),
            OnUnresolved::PassThrough => Self::PassThrough,
        }
    }
}

/// Treatment of elements outside the known node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnhandledNodes {
    /// Descend into them as if they were transparent.
    #[default]
    Lenient,
    /// Fail with a structural error.
    Strict,
}

impl From<UnhandledNodesSetting> for UnhandledNodes {
    fn from(setting: UnhandledNodesSetting) -> Self {
        match setting {
            UnhandledNodesSetting::Lenient => Self::Lenient,
            UnhandledNodesSetting::Strict => Self::Strict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_config() {
        let config = ResolutionConfig {
            on_unresolved: OnUnresolved::Substitute,
            default_text: "N/A".to_owned(),
        };
        assert_eq!(
            ResolutionPolicy::from(&config),
            ResolutionPolicy::Substitute("N/A".to_owned())
        );
        assert_eq!(
            ResolutionPolicy::from(&ResolutionConfig::default()),
            ResolutionPolicy::FailFast
        );
    }

    #[test]
    fn test_unhandled_from_setting() {
        assert_eq!(
            UnhandledNodes::from(UnhandledNodesSetting::Strict),
            UnhandledNodes::Strict
        );
    }
}
