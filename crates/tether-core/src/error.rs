#![forbid(unsafe_code)]

//! Errors raised by observable mutation.

use thiserror::Error;

use crate::observable::ObservableId;
use crate::realm::RealmId;

/// Why an observable rejected a read or a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObservableError {
    /// The observable was accessed from outside its owning realm.
    #[error("observable {observable} accessed outside its realm {realm}")]
    RealmNotCurrent {
        observable: ObservableId,
        realm: RealmId,
    },
    /// The observable has been disposed.
    #[error("observable {0} is disposed")]
    Disposed(ObservableId),
    /// An index was outside the bounds of a list.
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    /// The observable does not accept writes.
    #[error("observable {0} is read-only")]
    ReadOnly(ObservableId),
    /// The observable rejected the value for a domain-specific reason.
    #[error("{0}")]
    Rejected(String),
}
