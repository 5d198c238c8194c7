#![forbid(unsafe_code)]

//! Bulk disposal of observables and binding contexts.
//!
//! An [`ObservablesManager`] collects observables (explicitly, from the
//! endpoints of a context's bindings, or by tracking what a closure creates)
//! and disposes all of them at once, typically when a view closes.
//!
//! # Invariants
//!
//! 1. Contexts are disposed before observables.
//! 2. An excluded observable is never disposed by the manager, however it
//!    was collected.
//! 3. `dispose` is idempotent.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;

use tether_core::{ObservableId, ObservableRef, tracker};

use crate::context::DataBindingContext;

struct TrackedContext {
    context: DataBindingContext,
    targets: bool,
    models: bool,
}

/// Tracks observables and contexts for disposal.
#[derive(Default)]
pub struct ObservablesManager {
    observables: RefCell<Vec<ObservableRef>>,
    seen: RefCell<HashSet<ObservableId>>,
    excluded: RefCell<HashSet<ObservableId>>,
    contexts: RefCell<Vec<TrackedContext>>,
    disposed: Cell<bool>,
}

impl ObservablesManager {
    /// An empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispose `observable` along with everything else.
    pub fn add_observable(&self, observable: ObservableRef) {
        if self.seen.borrow_mut().insert(observable.id()) {
            self.observables.borrow_mut().push(observable);
        }
    }

    /// Never dispose `observable`, even if it gets collected.
    pub fn exclude_observable(&self, observable: &dyn tether_core::Observable) {
        self.excluded.borrow_mut().insert(observable.id());
    }

    /// Dispose `context` with the manager, and optionally the targets and/or
    /// models of its bindings as they are at disposal time.
    pub fn add_observables_from_context(
        &self,
        context: &DataBindingContext,
        targets: bool,
        models: bool,
    ) {
        self.contexts.borrow_mut().push(TrackedContext {
            context: context.clone(),
            targets,
            models,
        });
    }

    /// Run `f`, adding every observable it creates.
    pub fn run_and_collect<R>(&self, f: impl FnOnce() -> R) -> R {
        let (result, created) = tracker::run_and_collect(f);
        for observable in created {
            self.add_observable(observable);
        }
        result
    }

    /// Number of observables tracked directly (not counting context endpoints).
    #[must_use]
    pub fn len(&self) -> usize {
        self.observables.borrow().len()
    }

    /// Whether no observable is tracked directly.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observables.borrow().is_empty()
    }

    /// Dispose the tracked contexts, then every non-excluded observable.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let contexts = std::mem::take(&mut *self.contexts.borrow_mut());
        for tracked in &contexts {
            for binding in tracked.context.bindings() {
                if tracked.targets {
                    if let Some(target) = binding.target() {
                        self.add_observable(target);
                    }
                }
                if tracked.models {
                    if let Some(model) = binding.model() {
                        self.add_observable(model);
                    }
                }
            }
        }
        for tracked in &contexts {
            tracked.context.dispose();
        }

        let observables = std::mem::take(&mut *self.observables.borrow_mut());
        let excluded = self.excluded.borrow();
        let mut count = 0usize;
        for observable in observables {
            if !excluded.contains(&observable.id()) {
                observable.dispose();
                count += 1;
            }
        }
        tracing::debug!(
            contexts = contexts.len(),
            observables = count,
            "observables manager disposed"
        );
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

impl fmt::Debug for ObservablesManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservablesManager")
            .field("observables", &self.observables.borrow().len())
            .field("excluded", &self.excluded.borrow().len())
            .field("contexts", &self.contexts.borrow().len())
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use tether_core::{CurrentRealm, Observable, WritableValue};

    use super::*;

    #[test]
    fn collects_created_observables_but_not_context_internals() {
        let realm = CurrentRealm::shared();
        let manager = ObservablesManager::new();
        let (a, ctx) = manager.run_and_collect(|| {
            let ctx = DataBindingContext::with_realm(Rc::clone(&realm));
            let a = WritableValue::new(Rc::clone(&realm), 1);
            let b = WritableValue::new(Rc::clone(&realm), 2);
            ctx.bind_value(&a, &b, None, None).unwrap();
            (a, ctx)
        });
        assert_eq!(manager.len(), 2);
        manager.dispose();
        assert!(a.is_disposed());
        assert!(!ctx.is_disposed());
    }

    #[test]
    fn excluded_observables_survive() {
        let realm = CurrentRealm::shared();
        let manager = ObservablesManager::new();
        let keep = WritableValue::new(Rc::clone(&realm), 0);
        let drop_me = WritableValue::new(realm, 0);
        manager.add_observable(Rc::new(keep.clone()));
        manager.add_observable(Rc::new(drop_me.clone()));
        manager.exclude_observable(&keep);
        manager.dispose();
        manager.dispose();
        assert!(!keep.is_disposed());
        assert!(drop_me.is_disposed());
    }
}
