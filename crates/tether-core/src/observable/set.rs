#![forbid(unsafe_code)]

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::{
    Listeners, Observable, ObservableCore, ObservableId, ObservableRef, ObservableSet, Subscription,
};
use crate::diff::SetDiff;
use crate::error::ObservableError;
use crate::realm::RealmRef;
use crate::tracker;
use crate::value_type::ValueType;

struct SetInner<T> {
    core: ObservableCore,
    elements: RefCell<Vec<T>>,
    listeners: Listeners<SetDiff<T>>,
}

/// A shared observable set.
///
/// Elements are compared with `PartialEq` and kept in insertion order, which
/// keeps snapshots and diffs deterministic.
pub struct WritableSet<T> {
    inner: Rc<SetInner<T>>,
}

impl<T> Clone for WritableSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> WritableSet<T> {
    /// Create an empty set owned by `realm`.
    pub fn new(realm: RealmRef) -> Self {
        Self::with_elements(realm, Vec::new())
    }

    /// Create a set owned by `realm`; duplicate elements are dropped.
    pub fn with_elements(realm: RealmRef, elements: impl IntoIterator<Item = T>) -> Self {
        let mut unique: Vec<T> = Vec::new();
        for element in elements {
            if !unique.contains(&element) {
                unique.push(element);
            }
        }
        let this = Self {
            inner: Rc::new(SetInner {
                core: ObservableCore::new(realm),
                elements: RefCell::new(unique),
                listeners: Listeners::new(),
            }),
        };
        tracker::observable_created(|| Rc::new(this.clone()) as ObservableRef);
        this
    }

    /// Replace the whole contents, reporting additions and removals.
    pub fn set_all(&self, elements: impl IntoIterator<Item = T>) -> Result<(), ObservableError> {
        self.inner.core.check_writable()?;
        let mut next: Vec<T> = Vec::new();
        for element in elements {
            if !next.contains(&element) {
                next.push(element);
            }
        }
        let diff = {
            let mut current = self.inner.elements.borrow_mut();
            let diff = SetDiff::compute(&current, &next);
            *current = next;
            diff
        };
        self.fire(diff);
        Ok(())
    }

    /// Register a change callback.
    pub fn subscribe(&self, callback: impl Fn(&SetDiff<T>) + 'static) -> Subscription {
        self.inner.listeners.add(Box::new(callback))
    }

    /// Number of changes applied so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.core.version()
    }

    /// Reject (or accept again) writes with [`ObservableError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.inner.core.set_read_only(read_only);
    }

    fn fire(&self, diff: SetDiff<T>) {
        if diff.is_empty() {
            return;
        }
        self.inner.core.bump();
        self.inner.listeners.notify(&diff);
    }
}

impl<T> fmt::Debug for WritableSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WritableSet")
            .field("core", &self.inner.core)
            .field("len", &self.inner.elements.borrow().len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable for WritableSet<T> {
    fn id(&self) -> ObservableId {
        self.inner.core.id()
    }

    fn realm(&self) -> RealmRef {
        self.inner.core.realm()
    }

    fn is_disposed(&self) -> bool {
        self.inner.core.is_disposed()
    }

    fn dispose(&self) {
        if self.inner.core.dispose() {
            self.inner.listeners.clear();
        }
    }

    fn add_dispose_listener(&self, callback: Box<dyn Fn()>) -> Subscription {
        self.inner.core.add_dispose_listener(callback)
    }

    fn value_type(&self) -> Option<ValueType> {
        Some(ValueType::of::<T>())
    }
}

impl<T: Clone + PartialEq + 'static> ObservableSet<T> for WritableSet<T> {
    fn elements(&self) -> Vec<T> {
        self.inner.elements.borrow().clone()
    }

    fn len(&self) -> usize {
        self.inner.elements.borrow().len()
    }

    fn contains(&self, element: &T) -> bool {
        self.inner.elements.borrow().contains(element)
    }

    fn insert(&self, element: T) -> Result<bool, ObservableError> {
        self.inner.core.check_writable()?;
        {
            let mut elements = self.inner.elements.borrow_mut();
            if elements.contains(&element) {
                return Ok(false);
            }
            elements.push(element.clone());
        }
        self.fire(SetDiff::new(vec![element], Vec::new()));
        Ok(true)
    }

    fn remove(&self, element: &T) -> Result<bool, ObservableError> {
        self.inner.core.check_writable()?;
        let removed = {
            let mut elements = self.inner.elements.borrow_mut();
            match elements.iter().position(|e| e == element) {
                Some(pos) => elements.remove(pos),
                None => return Ok(false),
            }
        };
        self.fire(SetDiff::new(Vec::new(), vec![removed]));
        Ok(true)
    }

    fn clear(&self) -> Result<(), ObservableError> {
        self.inner.core.check_writable()?;
        let removed = std::mem::take(&mut *self.inner.elements.borrow_mut());
        self.fire(SetDiff::new(Vec::new(), removed));
        Ok(())
    }

    fn add_change_listener(&self, callback: Box<dyn Fn(&SetDiff<T>)>) -> Subscription {
        self.inner.listeners.add(callback)
    }
}
