#![forbid(unsafe_code)]

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::{
    Listeners, Observable, ObservableCore, ObservableId, ObservableRef, ObservableValue,
    Subscription,
};
use crate::diff::ValueDiff;
use crate::error::ObservableError;
use crate::realm::RealmRef;
use crate::tracker;
use crate::value_type::ValueType;

struct ValueInner<T> {
    core: ObservableCore,
    value: RefCell<T>,
    listeners: Listeners<ValueDiff<T>>,
}

/// A shared, version-tracked mutable value.
///
/// # Example
///
/// ```
/// use tether_core::{CurrentRealm, WritableValue};
///
/// let name = WritableValue::new(CurrentRealm::shared(), String::from("Ada"));
/// let _sub = name.subscribe(|diff| println!("{} -> {}", diff.old_value, diff.new_value));
/// name.set("Grace".to_string()).unwrap();
/// assert_eq!(name.get(), "Grace");
/// ```
pub struct WritableValue<T> {
    inner: Rc<ValueInner<T>>,
}

impl<T> Clone for WritableValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> WritableValue<T> {
    /// Create a value owned by `realm`.
    pub fn new(realm: RealmRef, value: T) -> Self {
        let this = Self {
            inner: Rc::new(ValueInner {
                core: ObservableCore::new(realm),
                value: RefCell::new(value),
                listeners: Listeners::new(),
            }),
        };
        tracker::observable_created(|| Rc::new(this.clone()) as ObservableRef);
        this
    }

    /// Current value (cloned).
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replace the value, notifying listeners if it changed.
    pub fn set(&self, value: T) -> Result<(), ObservableError> {
        self.inner.core.check_writable()?;
        let old = {
            let mut slot = self.inner.value.borrow_mut();
            if *slot == value {
                return Ok(());
            }
            std::mem::replace(&mut *slot, value.clone())
        };
        self.inner.core.bump();
        self.inner.listeners.notify(&ValueDiff::new(old, value));
        Ok(())
    }

    /// Register a change callback.
    pub fn subscribe(&self, callback: impl Fn(&ValueDiff<T>) + 'static) -> Subscription {
        self.inner.listeners.add(Box::new(callback))
    }

    /// Number of changes applied so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.core.version()
    }

    /// Number of live change listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.live_count()
    }

    /// Reject (or accept again) writes with [`ObservableError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.inner.core.set_read_only(read_only);
    }
}

impl<T> fmt::Debug for WritableValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WritableValue")
            .field("core", &self.inner.core)
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable for WritableValue<T> {
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

impl<T: Clone + PartialEq + 'static> ObservableValue<T> for WritableValue<T> {
    fn value(&self) -> T {
        self.get()
    }

    fn set_value(&self, value: T) -> Result<(), ObservableError> {
        self.set(value)
    }

    fn add_change_listener(&self, callback: Box<dyn Fn(&ValueDiff<T>)>) -> Subscription {
        self.inner.listeners.add(callback)
    }
}
