#![forbid(unsafe_code)]

//! Reducing many validation statuses to one.
//!
//! [`status_merged`] and [`status_max_severity`] are the two reductions.
//! [`AggregateValidationStatus`] applies one of them to a context's
//! [`ValidationStatusMap`] and keeps the result current.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tether_core::{Listeners, Status, Subscription, WritableValue};

use crate::binding::BindingHandle;
use crate::config::MULTIPLE_PROBLEMS;
use crate::context::DataBindingContext;
use crate::status_map::{StatusMapChange, ValidationStatusMap};

/// Anything that can report a current validation status.
pub trait ValidationStatusProvider {
    /// The status right now.
    fn current_status(&self) -> Status;
}

impl ValidationStatusProvider for Status {
    fn current_status(&self) -> Status {
        self.clone()
    }
}

impl ValidationStatusProvider for WritableValue<Status> {
    fn current_status(&self) -> Status {
        self.get()
    }
}

impl ValidationStatusProvider for BindingHandle {
    fn current_status(&self) -> Status {
        self.validation_status().get()
    }
}

/// Merge the non-OK statuses of `providers`.
///
/// One problem is returned as is; several are wrapped in a multi-status
/// with the message [`MULTIPLE_PROBLEMS`]; none yields OK.
#[must_use]
pub fn status_merged<P: ValidationStatusProvider>(providers: &[P]) -> Status {
    status_merged_with(providers, MULTIPLE_PROBLEMS)
}

/// [`status_merged`] with a custom multi-status message.
#[must_use]
pub fn status_merged_with<P: ValidationStatusProvider>(providers: &[P], message: &str) -> Status {
    let mut problems: Vec<Status> = providers
        .iter()
        .map(ValidationStatusProvider::current_status)
        .filter(|status| !status.is_ok())
        .collect();
    match problems.len() {
        0 => Status::ok(),
        1 => problems.remove(0),
        _ => {
            let mut merged = Status::multi(message);
            for problem in problems {
                merged.add(problem);
            }
            merged
        }
    }
}

/// The most severe status of `providers`; the first one wins on ties.
#[must_use]
pub fn status_max_severity<P: ValidationStatusProvider>(providers: &[P]) -> Status {
    let mut max = Status::ok();
    for status in providers.iter().map(ValidationStatusProvider::current_status) {
        if status.severity() > max.severity() {
            max = status;
        }
    }
    max
}

/// How [`AggregateValidationStatus`] reduces statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AggregateStrategy {
    /// See [`status_merged`].
    #[default]
    Merged,
    /// See [`status_max_severity`].
    MaxSeverity,
}

impl AggregateStrategy {
    fn reduce(self, statuses: &[Status], message: &str) -> Status {
        match self {
            Self::Merged => status_merged_with(statuses, message),
            Self::MaxSeverity => status_max_severity(statuses),
        }
    }
}

struct AggregateInner {
    map: ValidationStatusMap,
    strategy: AggregateStrategy,
    message: String,
    value: RefCell<Status>,
    listeners: Listeners<Status>,
    watch: RefCell<Option<Subscription>>,
}

impl AggregateInner {
    fn recompute(&self) {
        let next = self.strategy.reduce(&self.map.statuses(), &self.message);
        if *self.value.borrow() == next {
            return;
        }
        *self.value.borrow_mut() = next.clone();
        self.listeners.notify(&next);
    }
}

/// The reduced validation status of every binding in a context.
///
/// Cloning yields another handle to the same aggregate.
#[derive(Clone)]
pub struct AggregateValidationStatus {
    inner: Rc<AggregateInner>,
}

impl AggregateValidationStatus {
    /// Aggregate the bindings of `context` with `strategy`.
    ///
    /// Merged statuses use the context's configured multiple-problems message.
    #[must_use]
    pub fn new(context: &DataBindingContext, strategy: AggregateStrategy) -> Self {
        Self::from_map(
            context.validation_status_map(),
            strategy,
            &context.config().multiple_problems_message,
        )
    }

    /// Aggregate the entries of `map` with `strategy`.
    #[must_use]
    pub fn from_map(map: ValidationStatusMap, strategy: AggregateStrategy, message: &str) -> Self {
        let initial = strategy.reduce(&map.statuses(), message);
        let inner = Rc::new(AggregateInner {
            map,
            strategy,
            message: message.to_string(),
            value: RefCell::new(initial),
            listeners: Listeners::new(),
            watch: RefCell::new(None),
        });
        let weak = Rc::downgrade(&inner);
        let watch = inner.map.subscribe(move |_: &StatusMapChange| {
            if let Some(inner) = weak.upgrade() {
                inner.recompute();
            }
        });
        *inner.watch.borrow_mut() = Some(watch);
        Self { inner }
    }

    /// The current aggregate status.
    #[must_use]
    pub fn value(&self) -> Status {
        self.inner.value.borrow().clone()
    }

    /// The reduction in use.
    #[must_use]
    pub fn strategy(&self) -> AggregateStrategy {
        self.inner.strategy
    }

    /// Register a callback invoked with the new aggregate whenever it changes.
    pub fn subscribe(&self, callback: impl Fn(&Status) + 'static) -> Subscription {
        self.inner.listeners.add(Box::new(callback))
    }

    /// Stop following the status map.
    pub fn dispose(&self) {
        self.inner.watch.borrow_mut().take();
        self.inner.listeners.clear();
    }
}

impl fmt::Debug for AggregateValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateValidationStatus")
            .field("strategy", &self.inner.strategy)
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tether_core::Severity;

    use super::*;

    #[test]
    fn max_severity_keeps_first_of_equal_rank() {
        let statuses = [
            Status::ok(),
            Status::warning("w1"),
            Status::error("e1"),
            Status::warning("w2"),
            Status::error("e2"),
        ];
        let max = status_max_severity(&statuses);
        assert_eq!(max.message(), "e1");
    }

    #[test]
    fn merged_of_one_problem_is_that_problem() {
        let statuses = [Status::ok(), Status::warning("only"), Status::ok()];
        assert_eq!(status_merged(&statuses), Status::warning("only"));
    }

    #[test]
    fn merged_of_many_problems_is_a_multi_status() {
        let statuses = [Status::ok(), Status::error("a"), Status::error("b")];
        let merged = status_merged(&statuses);
        assert!(merged.is_multi());
        assert_eq!(merged.children().len(), 2);
        assert_eq!(merged.severity(), Severity::Error);
        assert_eq!(merged.message(), MULTIPLE_PROBLEMS);
    }

    #[test]
    fn nothing_wrong_is_ok() {
        assert!(status_merged::<Status>(&[]).is_ok());
        assert!(status_max_severity(&[Status::ok()]).is_ok());
    }
}
