#![forbid(unsafe_code)]

//! Observable containers.
//!
//! The binding engine only talks to observables through the object-safe
//! contracts in this module:
//!
//! - [`Observable`]: identity, realm affinity, and disposal.
//! - [`ObservableValue`]: a single mutable value.
//! - [`ObservableList`]: an ordered, index-addressed collection.
//! - [`ObservableSet`]: an unordered collection without duplicates.
//!
//! [`WritableValue`], [`WritableList`], and [`WritableSet`] are the reference
//! implementations. They are cheap-to-clone handles over shared state
//! (`Rc<..>` inside), so cloning a handle never copies the contents.
//!
//! # Architecture
//!
//! Change listeners are stored as `Weak` callbacks. [`Subscription`] owns the
//! strong side; dropping it unregisters the callback, and dead entries are
//! pruned lazily during the next notification.
//!
//! # Invariants
//!
//! 1. Mutations are only accepted while the owning realm is current.
//! 2. A disposed observable rejects mutations and drops its listeners.
//! 3. Writing a value equal to the current one is a no-op (no version bump,
//!    no notification).
//! 4. Listeners are notified in registration order, after the new state is
//!    visible, with no internal borrow held.

mod list;
mod set;
mod value;

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::diff::{ListDiff, SetDiff, ValueDiff};
use crate::error::ObservableError;
use crate::realm::RealmRef;
use crate::value_type::ValueType;

pub use list::WritableList;
pub use set::WritableSet;
pub use value::WritableValue;

static OBSERVABLE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of an observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservableId(u64);

impl ObservableId {
    fn next() -> Self {
        Self(OBSERVABLE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identifier value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObservableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observable#{}", self.0)
    }
}

/// Shared handle to any observable.
pub type ObservableRef = Rc<dyn Observable>;

/// Identity, realm affinity, and lifecycle shared by every observable.
pub trait Observable: fmt::Debug {
    /// Identity of this observable.
    fn id(&self) -> ObservableId;

    /// The realm that owns this observable.
    fn realm(&self) -> RealmRef;

    /// Whether [`dispose`](Self::dispose) has been called.
    fn is_disposed(&self) -> bool;

    /// Release listeners and reject further mutation. Idempotent.
    fn dispose(&self);

    /// Register a callback invoked once when this observable is disposed.
    fn add_dispose_listener(&self, callback: Box<dyn Fn()>) -> Subscription;

    /// The declared type of the contents, if the observable declares one.
    fn value_type(&self) -> Option<ValueType> {
        None
    }
}

/// A single mutable value.
pub trait ObservableValue<T>: Observable {
    /// The current value.
    fn value(&self) -> T;

    /// Replace the current value.
    fn set_value(&self, value: T) -> Result<(), ObservableError>;

    /// Register a callback invoked after each change.
    fn add_change_listener(&self, callback: Box<dyn Fn(&ValueDiff<T>)>) -> Subscription;
}

/// An ordered, index-addressed collection.
pub trait ObservableList<T>: Observable {
    /// Snapshot of the elements.
    fn elements(&self) -> Vec<T>;

    /// Number of elements.
    fn len(&self) -> usize;

    /// Whether the list has no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `element` at `index` (`index <= len`).
    fn insert(&self, index: usize, element: T) -> Result<(), ObservableError>;

    /// Remove and return the element at `index`.
    fn remove(&self, index: usize) -> Result<T, ObservableError>;

    /// Move the element at `from` so it ends up at `to`.
    fn move_element(&self, from: usize, to: usize) -> Result<T, ObservableError>;

    /// Replace the element at `index`, returning the previous one.
    fn replace(&self, index: usize, element: T) -> Result<T, ObservableError>;

    /// Remove all elements.
    fn clear(&self) -> Result<(), ObservableError>;

    /// Register a callback invoked after each change.
    fn add_change_listener(&self, callback: Box<dyn Fn(&ListDiff<T>)>) -> Subscription;
}

/// An unordered collection without duplicates.
pub trait ObservableSet<T>: Observable {
    /// Snapshot of the elements in insertion order.
    fn elements(&self) -> Vec<T>;

    /// Number of elements.
    fn len(&self) -> usize;

    /// Whether the set has no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `element` is present.
    fn contains(&self, element: &T) -> bool;

    /// Add `element`; returns `false` when it was already present.
    fn insert(&self, element: T) -> Result<bool, ObservableError>;

    /// Remove `element`; returns `false` when it was absent.
    fn remove(&self, element: &T) -> Result<bool, ObservableError>;

    /// Remove all elements.
    fn clear(&self) -> Result<(), ObservableError>;

    /// Register a callback invoked after each change.
    fn add_change_listener(&self, callback: Box<dyn Fn(&SetDiff<T>)>) -> Subscription;
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// RAII guard for a registered listener.
///
/// Dropping the guard unregisters the listener.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    _guard: Option<Box<dyn Any>>,
}

impl Subscription {
    fn holding(guard: Box<dyn Any>) -> Self {
        Self {
            _guard: Some(guard),
        }
    }

    /// A subscription that holds nothing.
    pub fn empty() -> Self {
        Self { _guard: None }
    }

    /// Unregister the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self._guard.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Listener list
// ---------------------------------------------------------------------------

/// An ordered list of weakly held callbacks.
///
/// Used by the reference observables, and available to other crates that
/// publish their own change events.
pub struct Listeners<E: ?Sized> {
    entries: RefCell<Vec<Weak<dyn Fn(&E)>>>,
}

impl<E: ?Sized + 'static> Listeners<E> {
    /// Create an empty listener list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }

    /// Register `callback`; it stays registered while the returned guard lives.
    pub fn add(&self, callback: Box<dyn Fn(&E)>) -> Subscription {
        let strong: Rc<dyn Fn(&E)> = Rc::from(callback);
        self.entries.borrow_mut().push(Rc::downgrade(&strong));
        Subscription::holding(Box::new(strong))
    }

    /// Invoke every live listener in registration order.
    pub fn notify(&self, event: &E) {
        let live: Vec<Rc<dyn Fn(&E)>> = {
            let mut entries = self.entries.borrow_mut();
            entries.retain(|w| w.strong_count() > 0);
            entries.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in live {
            callback(event);
        }
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Number of registrations whose guard is still alive.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

impl<E: ?Sized + 'static> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ?Sized> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("registered", &self.entries.borrow().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Shared observable state
// ---------------------------------------------------------------------------

/// Identity, realm, and lifecycle state common to the reference observables.
pub(crate) struct ObservableCore {
    id: ObservableId,
    realm: RealmRef,
    version: Cell<u64>,
    disposed: Cell<bool>,
    read_only: Cell<bool>,
    dispose_listeners: Listeners<()>,
}

impl ObservableCore {
    pub(crate) fn new(realm: RealmRef) -> Self {
        Self {
            id: ObservableId::next(),
            realm,
            version: Cell::new(0),
            disposed: Cell::new(false),
            read_only: Cell::new(false),
            dispose_listeners: Listeners::new(),
        }
    }

    pub(crate) fn id(&self) -> ObservableId {
        self.id
    }

    pub(crate) fn realm(&self) -> RealmRef {
        Rc::clone(&self.realm)
    }

    pub(crate) fn version(&self) -> u64 {
        self.version.get()
    }

    pub(crate) fn bump(&self) {
        self.version.set(self.version.get() + 1);
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub(crate) fn set_read_only(&self, read_only: bool) {
        self.read_only.set(read_only);
    }

    /// Check that a mutation is allowed right now.
    pub(crate) fn check_writable(&self) -> Result<(), ObservableError> {
        if self.disposed.get() {
            return Err(ObservableError::Disposed(self.id));
        }
        if !self.realm.is_current() {
            return Err(ObservableError::RealmNotCurrent {
                observable: self.id,
                realm: self.realm.id(),
            });
        }
        if self.read_only.get() {
            return Err(ObservableError::ReadOnly(self.id));
        }
        Ok(())
    }

    /// Mark disposed and notify dispose listeners. Returns `false` if already disposed.
    pub(crate) fn dispose(&self) -> bool {
        if self.disposed.replace(true) {
            return false;
        }
        tracing::trace!(observable = %self.id, "observable disposed");
        self.dispose_listeners.notify(&());
        self.dispose_listeners.clear();
        true
    }

    pub(crate) fn add_dispose_listener(&self, callback: Box<dyn Fn()>) -> Subscription {
        self.dispose_listeners.add(Box::new(move |_: &()| callback()))
    }
}

impl fmt::Debug for ObservableCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableCore")
            .field("id", &self.id)
            .field("realm", &self.realm.id())
            .field("version", &self.version.get())
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listeners_notify_in_order_and_prune_dropped() {
        let listeners: Listeners<i32> = Listeners::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s1 = Rc::clone(&seen);
        let first = listeners.add(Box::new(move |v: &i32| s1.borrow_mut().push(("first", *v))));
        let s2 = Rc::clone(&seen);
        let _second = listeners.add(Box::new(move |v: &i32| s2.borrow_mut().push(("second", *v))));

        listeners.notify(&1);
        assert_eq!(*seen.borrow(), vec![("first", 1), ("second", 1)]);

        drop(first);
        assert_eq!(listeners.live_count(), 1);
        listeners.notify(&2);
        assert_eq!(seen.borrow().last(), Some(&("second", 2)));
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn listener_may_subscribe_during_notify() {
        let listeners: Rc<Listeners<()>> = Rc::new(Listeners::new());
        let held = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&listeners);
        let h = Rc::clone(&held);
        let _outer = listeners.add(Box::new(move |_: &()| {
            let sub = l.add(Box::new(|_: &()| {}));
            h.borrow_mut().push(sub);
        }));
        listeners.notify(&());
        assert_eq!(listeners.live_count(), 2);
    }

    #[test]
    fn empty_subscription_is_inert() {
        let sub = Subscription::empty();
        assert!(format!("{sub:?}").contains("active: false"));
        sub.unsubscribe();
    }
}
