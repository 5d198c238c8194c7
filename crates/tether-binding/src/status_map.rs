#![forbid(unsafe_code)]

//! Live map from each binding of a context to its current validation status.
//!
//! The map follows the context's binding list: a binding added to the list
//! gains an entry, a removed binding loses it, and every status change of a
//! member binding updates its entry. Listeners receive a [`StatusMapChange`]
//! after the entry is updated.
//!
//! Entries keep the order of the binding list.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tether_core::{
    ListDiff, ListDiffEntry, Listeners, ObservableList, Status, Subscription, ValueDiff,
    WritableList,
};

use crate::binding::{BindingHandle, BindingId};

/// One entry of the map changed.
#[derive(Debug, Clone)]
pub struct StatusMapChange {
    /// The binding whose entry changed.
    pub binding: BindingHandle,
    /// The status before the change; `None` when the entry was added.
    pub old: Option<Status>,
    /// The status after the change; `None` when the entry was removed.
    pub new: Option<Status>,
}

struct Entry {
    binding: BindingHandle,
    status: Status,
    _watch: Subscription,
}

struct MapInner {
    entries: RefCell<Vec<Entry>>,
    listeners: Listeners<StatusMapChange>,
    source: RefCell<Option<Subscription>>,
    disposed: Cell<bool>,
}

impl MapInner {
    fn watch(self: &Rc<Self>, binding: &BindingHandle) -> Entry {
        let id = binding.id();
        let weak = Rc::downgrade(self);
        let watch = binding
            .validation_status()
            .subscribe(move |diff: &ValueDiff<Status>| {
                if let Some(inner) = weak.upgrade() {
                    inner.status_changed(id, &diff.new_value);
                }
            });
        Entry {
            binding: binding.clone(),
            status: binding.validation_status().get(),
            _watch: watch,
        }
    }

    fn status_changed(&self, id: BindingId, status: &Status) {
        let change = {
            let mut entries = self.entries.borrow_mut();
            let Some(entry) = entries.iter_mut().find(|e| e.binding.id() == id) else {
                return;
            };
            let old = std::mem::replace(&mut entry.status, status.clone());
            StatusMapChange {
                binding: entry.binding.clone(),
                old: Some(old),
                new: Some(status.clone()),
            }
        };
        self.listeners.notify(&change);
    }

    fn bindings_changed(self: &Rc<Self>, diff: &ListDiff<BindingHandle>) {
        let mut changes = Vec::new();
        for entry in diff.entries() {
            match entry {
                ListDiffEntry::Add { index, element } => {
                    let added = self.watch(element);
                    let status = added.status.clone();
                    let mut entries = self.entries.borrow_mut();
                    let at = (*index).min(entries.len());
                    entries.insert(at, added);
                    changes.push(StatusMapChange {
                        binding: element.clone(),
                        old: None,
                        new: Some(status),
                    });
                }
                ListDiffEntry::Remove { element, .. } => {
                    let mut entries = self.entries.borrow_mut();
                    if let Some(pos) = entries.iter().position(|e| e.binding == *element) {
                        let removed = entries.remove(pos);
                        changes.push(StatusMapChange {
                            binding: removed.binding,
                            old: Some(removed.status),
                            new: None,
                        });
                    }
                }
            }
        }
        for change in &changes {
            self.listeners.notify(change);
        }
    }
}

/// Observable map from binding to validation status.
#[derive(Clone)]
pub struct ValidationStatusMap {
    inner: Rc<MapInner>,
}

impl ValidationStatusMap {
    /// Track `bindings` from now on, starting with its current contents.
    pub(crate) fn new(bindings: &WritableList<BindingHandle>) -> Self {
        let inner = Rc::new(MapInner {
            entries: RefCell::new(Vec::new()),
            listeners: Listeners::new(),
            source: RefCell::new(None),
            disposed: Cell::new(false),
        });
        let seeded: Vec<Entry> = bindings
            .elements()
            .iter()
            .map(|binding| inner.watch(binding))
            .collect();
        *inner.entries.borrow_mut() = seeded;

        let weak: Weak<MapInner> = Rc::downgrade(&inner);
        let source = bindings.subscribe(move |diff: &ListDiff<BindingHandle>| {
            if let Some(inner) = weak.upgrade() {
                inner.bindings_changed(diff);
            }
        });
        *inner.source.borrow_mut() = Some(source);
        Self { inner }
    }

    /// The status of binding `id`, if it is in the map.
    #[must_use]
    pub fn get(&self, id: BindingId) -> Option<Status> {
        self.inner
            .entries
            .borrow()
            .iter()
            .find(|e| e.binding.id() == id)
            .map(|e| e.status.clone())
    }

    /// Whether binding `id` is in the map.
    #[must_use]
    pub fn contains(&self, id: BindingId) -> bool {
        self.inner.entries.borrow().iter().any(|e| e.binding.id() == id)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    /// Whether the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }

    /// Snapshot of all entries in binding order.
    #[must_use]
    pub fn entries(&self) -> Vec<(BindingHandle, Status)> {
        self.inner
            .entries
            .borrow()
            .iter()
            .map(|e| (e.binding.clone(), e.status.clone()))
            .collect()
    }

    /// Snapshot of all statuses in binding order.
    #[must_use]
    pub fn statuses(&self) -> Vec<Status> {
        self.inner
            .entries
            .borrow()
            .iter()
            .map(|e| e.status.clone())
            .collect()
    }

    /// Register a callback invoked after each entry change.
    pub fn subscribe(&self, callback: impl Fn(&StatusMapChange) + 'static) -> Subscription {
        self.inner.listeners.add(Box::new(callback))
    }

    /// Whether the map has stopped tracking.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Stop tracking and drop every entry.
    pub(crate) fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.source.borrow_mut().take();
        self.inner.entries.borrow_mut().clear();
        self.inner.listeners.clear();
    }
}

impl fmt::Debug for ValidationStatusMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationStatusMap")
            .field("len", &self.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
