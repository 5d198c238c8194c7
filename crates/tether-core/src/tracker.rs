#![forbid(unsafe_code)]

//! Thread-local tracking of observable creation.
//!
//! [`run_and_collect`] records every observable created on this thread while
//! its closure runs, which lets a lifecycle manager dispose of everything a
//! view built without threading a registry through the construction code.
//! [`ignore`] suspends tracking, for bookkeeping observables that belong to
//! the framework rather than to the application.
//!
//! Collection scopes nest; an observable is recorded only by the innermost
//! active scope.

use std::cell::{Cell, RefCell};

use crate::observable::ObservableRef;

thread_local! {
    static COLLECTORS: RefCell<Vec<Vec<ObservableRef>>> = const { RefCell::new(Vec::new()) };
    static IGNORE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Run `f` and return its result together with the observables it created.
pub fn run_and_collect<R>(f: impl FnOnce() -> R) -> (R, Vec<ObservableRef>) {
    COLLECTORS.with(|c| c.borrow_mut().push(Vec::new()));
    let guard = PopCollector;
    let result = f();
    let collected = COLLECTORS.with(|c| {
        c.borrow_mut()
            .last_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    });
    drop(guard);
    (result, collected)
}

/// Run `f` with observable tracking suspended.
pub fn ignore<R>(f: impl FnOnce() -> R) -> R {
    IGNORE_DEPTH.with(|d| d.set(d.get() + 1));
    let _resume = ResumeTracking;
    f()
}

/// Whether tracking is currently suspended by [`ignore`].
#[must_use]
pub fn is_ignoring() -> bool {
    IGNORE_DEPTH.with(|d| d.get() > 0)
}

/// Whether a [`run_and_collect`] scope is active and tracking is not suspended.
#[must_use]
pub fn is_collecting() -> bool {
    !is_ignoring() && COLLECTORS.with(|c| !c.borrow().is_empty())
}

/// Record a newly created observable with the innermost collection scope.
///
/// `make` is only invoked when a scope is actually collecting.
pub fn observable_created(make: impl FnOnce() -> ObservableRef) {
    if !is_collecting() {
        return;
    }
    let observable = make();
    COLLECTORS.with(|c| {
        if let Some(top) = c.borrow_mut().last_mut() {
            top.push(observable);
        }
    });
}

struct PopCollector;

impl Drop for PopCollector {
    fn drop(&mut self) {
        COLLECTORS.with(|c| {
            c.borrow_mut().pop();
        });
    }
}

struct ResumeTracking;

impl Drop for ResumeTracking {
    fn drop(&mut self) {
        IGNORE_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}
