#![forbid(unsafe_code)]

//! Data binding between observable targets and models.
//!
//! A [`DataBindingContext`] binds a *target* observable (usually UI state)
//! to a *model* observable (usually domain state). Each direction is
//! described by an update strategy that validates, converts, and writes:
//!
//! ```text
//!            UpdateValueStrategy<T, M>
//!   target ─────────────────────────────▶ model
//!          ◀─────────────────────────────
//!            UpdateValueStrategy<M, T>
//! ```
//!
//! Every binding publishes the outcome of its latest propagation as an
//! observable [`Status`](tether_core::Status). [`AggregateValidationStatus`]
//! reduces the statuses of a whole context; [`ObservablesManager`] disposes
//! everything a view created in one call.
//!
//! # Quick Start
//!
//! ```
//! use tether_binding::{AggregateStrategy, AggregateValidationStatus, DataBindingContext};
//! use tether_core::{CurrentRealm, Severity, WritableValue};
//!
//! let realm = CurrentRealm::shared();
//! let ctx = DataBindingContext::with_realm(realm.clone());
//! let age_field = WritableValue::new(realm.clone(), String::new());
//! let age = WritableValue::new(realm, 30u8);
//!
//! ctx.bind_value(&age_field, &age, None, None).unwrap();
//! assert_eq!(age_field.get(), "30");
//!
//! let overall = AggregateValidationStatus::new(&ctx, AggregateStrategy::MaxSeverity);
//! age_field.set("300".into()).unwrap();
//! assert_eq!(age.get(), 30);
//! assert_eq!(overall.value().severity(), Severity::Error);
//! ```
//!
//! # Feature Flags
//!
//! - `policy-config` (default): load [`BindingConfig`] from TOML.

pub mod aggregate;
pub mod binding;
pub mod config;
pub mod context;
pub mod convert;
pub mod error;
pub mod manager;
pub mod policy;
pub mod status_map;
pub mod strategy;
pub mod validate;

pub use aggregate::{
    AggregateStrategy, AggregateValidationStatus, ValidationStatusProvider, status_max_severity,
    status_merged, status_merged_with,
};
pub use binding::{Binding, BindingHandle, BindingId, Direction};
pub use config::{BindingConfig, MULTIPLE_PROBLEMS};
pub use context::{DataBindingContext, DataBindingContextBuilder};
pub use convert::{ConversionRule, Converter, ConverterFn, ConverterRegistry, converter_fn};
#[cfg(feature = "policy-config")]
pub use error::ConfigError;
pub use error::{BindingError, ConversionError};
pub use manager::ObservablesManager;
pub use policy::{CollectionPolicy, UpdatePolicy};
pub use status_map::{StatusMapChange, ValidationStatusMap};
pub use strategy::{UpdateListStrategy, UpdateSetStrategy, UpdateValueStrategy};
pub use validate::{Validator, ValidatorFn, ValidatorRegistry, validator_fn};
