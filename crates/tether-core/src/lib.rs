#![forbid(unsafe_code)]

//! Core collaborators for tether data binding.
//!
//! This crate provides the contracts that the binding engine consumes, plus
//! single-threaded reference implementations of each:
//!
//! - [`Realm`]: a single-threaded execution context ([`CurrentRealm`],
//!   [`QueuedRealm`]) with a thread-local default.
//! - [`Status`]: a severity-ranked result, including the multi-status
//!   aggregation used to report validation outcomes.
//! - [`ObservableValue`], [`ObservableList`], [`ObservableSet`]: mutable,
//!   realm-confined containers with change notification, implemented by
//!   [`WritableValue`], [`WritableList`], and [`WritableSet`].
//! - [`ValueDiff`], [`ListDiff`], [`SetDiff`]: change descriptions.
//! - [`tracker`]: observable-creation tracking for bulk lifecycle management.

pub mod diff;
pub mod error;
pub mod observable;
pub mod realm;
pub mod status;
pub mod tracker;
pub mod value_type;

pub use diff::{ListDiff, ListDiffEntry, ListDiffVisitor, SetDiff, ValueDiff};
pub use error::ObservableError;
pub use observable::{
    Listeners, Observable, ObservableId, ObservableList, ObservableRef, ObservableSet,
    ObservableValue, Subscription, WritableList, WritableSet, WritableValue,
};
pub use realm::{CurrentRealm, QueuedRealm, Realm, RealmId, RealmRef, Task};
pub use status::{Severity, Status};
pub use value_type::ValueType;
