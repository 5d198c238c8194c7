#![forbid(unsafe_code)]

//! Error types.
//!
//! Only setup mistakes surface as `Err`: binding a disposed observable,
//! creating a context without a realm, or asking for a conversion that
//! cannot exist. Everything that goes wrong while values flow through a
//! binding is reported on the binding's validation status instead.

use std::error::Error as StdError;

use tether_core::{ObservableId, ValueType};
use thiserror::Error;

/// A setup error raised while creating a context or a binding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// The target observable was already disposed.
    #[error("cannot bind disposed target {0}")]
    TargetDisposed(ObservableId),
    /// The model observable was already disposed.
    #[error("cannot bind disposed model {0}")]
    ModelDisposed(ObservableId),
    /// The context was disposed and accepts no new bindings.
    #[error("data binding context is disposed")]
    ContextDisposed,
    /// No realm was supplied and the thread has no default realm.
    #[error("no realm given and no default realm is installed on this thread")]
    NoDefaultRealm,
    /// The types differ and no converter is registered for the pair.
    #[error("no converter from {from} to {to}")]
    MissingConverter { from: ValueType, to: ValueType },
    /// A converter's declared type does not match the observable it serves.
    #[error("converter expects {declared} but the observable holds {actual}")]
    ConverterTypeMismatch {
        declared: ValueType,
        actual: ValueType,
    },
}

/// A converter failed to convert a value.
///
/// The display text is the message given at construction and becomes the
/// message of the resulting error status.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConversionError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl ConversionError {
    /// A conversion error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// A conversion error wrapping an underlying error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The value had type `S` where a `D` was needed and no converter applied.
    #[must_use]
    pub fn incompatible<S: ?Sized + 'static, D: ?Sized + 'static>() -> Self {
        Self::new(format!(
            "cannot convert {} to {}",
            ValueType::of::<S>(),
            ValueType::of::<D>()
        ))
    }

    /// The message describing the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure to load a [`BindingConfig`](crate::config::BindingConfig).
#[cfg(feature = "policy-config")]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read binding config: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML or does not match the schema.
    #[error("failed to parse binding config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn conversion_error_displays_message_and_keeps_source() {
        let parse = "x1".parse::<i32>().unwrap_err();
        let err = ConversionError::with_source("'x1' is not a valid i32", parse);
        assert_eq!(err.to_string(), "'x1' is not a valid i32");
        assert!(err.source().is_some());
        assert!(ConversionError::new("plain").source().is_none());
    }

    #[test]
    fn incompatible_names_both_types() {
        let err = ConversionError::incompatible::<String, u8>();
        assert!(err.message().contains("String"));
        assert!(err.message().contains("u8"));
    }
}
