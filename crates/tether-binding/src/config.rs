#![forbid(unsafe_code)]

//! Context-wide binding defaults.
//!
//! [`BindingConfig`] supplies the policies used when a bind call passes no
//! strategy, plus a few switches that apply to every binding of a context.
//! With the `policy-config` feature the config can be loaded from TOML:
//!
//! ```toml
//! target_to_model = "convert"
//! model_to_target = "update"
//! collection_target_to_model = "on_request"
//! use_move_and_replace = false
//! multiple_problems_message = "Several fields need attention"
//! ```
//!
//! Missing keys keep their defaults; unknown keys are rejected.

#[cfg(feature = "policy-config")]
use std::path::Path;

#[cfg(feature = "policy-config")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "policy-config")]
use crate::error::ConfigError;
use crate::policy::{CollectionPolicy, UpdatePolicy};

/// Message of the multi-status built when several bindings report problems.
pub const MULTIPLE_PROBLEMS: &str = "Multiple problems have occurred";

/// Defaults applied by a [`DataBindingContext`](crate::DataBindingContext).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "policy-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default, deny_unknown_fields))]
pub struct BindingConfig {
    /// Policy of default target-to-model value strategies.
    pub target_to_model: UpdatePolicy,
    /// Policy of default model-to-target value strategies.
    pub model_to_target: UpdatePolicy,
    /// Policy of default target-to-model list and set strategies.
    pub collection_target_to_model: CollectionPolicy,
    /// Policy of default model-to-target list and set strategies.
    pub collection_model_to_target: CollectionPolicy,
    /// Whether default strategies may take converters from the registry.
    pub provide_default_converters: bool,
    /// Whether list strategies that do not say otherwise apply moves and
    /// replaces as such.
    pub use_move_and_replace: bool,
    /// Message of the merged aggregate status when several bindings fail.
    pub multiple_problems_message: String,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            target_to_model: UpdatePolicy::Update,
            model_to_target: UpdatePolicy::Update,
            collection_target_to_model: CollectionPolicy::Update,
            collection_model_to_target: CollectionPolicy::Update,
            provide_default_converters: true,
            use_move_and_replace: true,
            multiple_problems_message: MULTIPLE_PROBLEMS.to_string(),
        }
    }
}

impl BindingConfig {
    /// Set both default value policies.
    #[must_use]
    pub fn with_value_policies(
        mut self,
        target_to_model: UpdatePolicy,
        model_to_target: UpdatePolicy,
    ) -> Self {
        self.target_to_model = target_to_model;
        self.model_to_target = model_to_target;
        self
    }

    /// Set both default collection policies.
    #[must_use]
    pub fn with_collection_policies(
        mut self,
        target_to_model: CollectionPolicy,
        model_to_target: CollectionPolicy,
    ) -> Self {
        self.collection_target_to_model = target_to_model;
        self.collection_model_to_target = model_to_target;
        self
    }

    /// Allow or forbid registry converters in default strategies.
    #[must_use]
    pub fn with_default_converters(mut self, provide: bool) -> Self {
        self.provide_default_converters = provide;
        self
    }

    /// Default for list strategies that do not choose move/replace handling.
    #[must_use]
    pub fn with_move_and_replace(mut self, enabled: bool) -> Self {
        self.use_move_and_replace = enabled;
        self
    }

    /// Message used when several bindings report problems at once.
    #[must_use]
    pub fn with_multiple_problems_message(mut self, message: impl Into<String>) -> Self {
        self.multiple_problems_message = message.into();
        self
    }

    /// Parse a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML, unknown keys, or
    /// unknown policy names.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if its contents are invalid.
    #[cfg(feature = "policy-config")]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded binding config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_update_everything() {
        let config = BindingConfig::default();
        assert_eq!(config.target_to_model, UpdatePolicy::Update);
        assert_eq!(config.collection_model_to_target, CollectionPolicy::Update);
        assert!(config.provide_default_converters);
        assert!(config.use_move_and_replace);
        assert_eq!(config.multiple_problems_message, MULTIPLE_PROBLEMS);
    }

    #[test]
    fn builder_methods() {
        let config = BindingConfig::default()
            .with_value_policies(UpdatePolicy::Convert, UpdatePolicy::OnRequest)
            .with_collection_policies(CollectionPolicy::Never, CollectionPolicy::Update)
            .with_move_and_replace(false)
            .with_multiple_problems_message("Fix these");
        assert_eq!(config.target_to_model, UpdatePolicy::Convert);
        assert_eq!(config.model_to_target, UpdatePolicy::OnRequest);
        assert_eq!(config.collection_target_to_model, CollectionPolicy::Never);
        assert!(!config.use_move_and_replace);
        assert_eq!(config.multiple_problems_message, "Fix these");
    }

    #[cfg(feature = "policy-config")]
    mod toml_loading {
        use std::io::Write;

        use super::*;

        #[test]
        fn partial_file_keeps_defaults() {
            let config = BindingConfig::from_toml_str(
                r#"
                target_to_model = "convert"
                use_move_and_replace = false
                "#,
            )
            .unwrap();
            assert_eq!(config.target_to_model, UpdatePolicy::Convert);
            assert_eq!(config.model_to_target, UpdatePolicy::Update);
            assert!(!config.use_move_and_replace);
        }

        #[test]
        fn unknown_policy_is_a_parse_error() {
            let err = BindingConfig::from_toml_str(r#"model_to_target = "sometimes""#).unwrap_err();
            assert!(matches!(err, ConfigError::Parse(_)));
        }

        #[test]
        fn convert_is_not_a_collection_policy() {
            let toml = r#"collection_model_to_target = "convert""#;
            let err = BindingConfig::from_toml_str(toml).unwrap_err();
            assert!(matches!(err, ConfigError::Parse(_)));
        }

        #[test]
        fn unknown_key_is_rejected() {
            assert!(BindingConfig::from_toml_str("colour = 3").is_err());
        }

        #[test]
        fn loads_from_file() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "multiple_problems_message = \"Check the form\"").unwrap();
            let config = BindingConfig::from_path(file.path()).unwrap();
            assert_eq!(config.multiple_problems_message, "Check the form");
        }

        #[test]
        fn missing_file_is_an_io_error() {
            let dir = tempfile::tempdir().unwrap();
            let err = BindingConfig::from_path(dir.path().join("absent.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::Io(_)));
        }

        #[test]
        fn round_trips_through_toml() {
            let config = BindingConfig::default().with_move_and_replace(false);
            let text = toml::to_string(&config).unwrap();
            assert_eq!(BindingConfig::from_toml_str(&text).unwrap(), config);
        }
    }
}
