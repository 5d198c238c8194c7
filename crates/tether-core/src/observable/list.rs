#![forbid(unsafe_code)]

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::{
    Listeners, Observable, ObservableCore, ObservableId, ObservableList, ObservableRef,
    Subscription,
};
use crate::diff::{ListDiff, ListDiffEntry};
use crate::error::ObservableError;
use crate::realm::RealmRef;
use crate::tracker;
use crate::value_type::ValueType;

struct ListInner<T> {
    core: ObservableCore,
    elements: RefCell<Vec<T>>,
    listeners: Listeners<ListDiff<T>>,
}

/// A shared observable list.
///
/// Every mutation is reported as a [`ListDiff`]: a move is a remove followed
/// by an add of the same element, a replace is a remove followed by an add at
/// the same index.
pub struct WritableList<T> {
    inner: Rc<ListInner<T>>,
}

impl<T> Clone for WritableList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> WritableList<T> {
    /// Create an empty list owned by `realm`.
    pub fn new(realm: RealmRef) -> Self {
        Self::with_elements(realm, Vec::new())
    }

    /// Create a list owned by `realm` holding `elements`.
    pub fn with_elements(realm: RealmRef, elements: Vec<T>) -> Self {
        let this = Self {
            inner: Rc::new(ListInner {
                core: ObservableCore::new(realm),
                elements: RefCell::new(elements),
                listeners: Listeners::new(),
            }),
        };
        tracker::observable_created(|| Rc::new(this.clone()) as ObservableRef);
        this
    }

    /// Element at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.elements.borrow().get(index).cloned()
    }

    /// Append `element`.
    pub fn push(&self, element: T) -> Result<(), ObservableError> {
        let index = self.inner.elements.borrow().len();
        self.insert(index, element)
    }

    /// Replace the whole contents, reporting the minimal diff.
    pub fn set_all(&self, elements: Vec<T>) -> Result<(), ObservableError> {
        self.inner.core.check_writable()?;
        let diff = {
            let mut current = self.inner.elements.borrow_mut();
            let diff = ListDiff::compute(&current, &elements);
            *current = elements;
            diff
        };
        self.fire(diff);
        Ok(())
    }

    /// Register a change callback.
    pub fn subscribe(&self, callback: impl Fn(&ListDiff<T>) + 'static) -> Subscription {
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

    fn fire(&self, diff: ListDiff<T>) {
        if diff.is_empty() {
            return;
        }
        self.inner.core.bump();
        self.inner.listeners.notify(&diff);
    }

    fn check_index(&self, index: usize, len: usize) -> Result<(), ObservableError> {
        if index < len {
            Ok(())
        } else {
            Err(ObservableError::IndexOutOfBounds { index, len })
        }
    }
}

impl<T> fmt::Debug for WritableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WritableList")
            .field("core", &self.inner.core)
            .field("len", &self.inner.elements.borrow().len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable for WritableList<T> {
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

impl<T: Clone + PartialEq + 'static> ObservableList<T> for WritableList<T> {
    fn elements(&self) -> Vec<T> {
        self.inner.elements.borrow().clone()
    }

    fn len(&self) -> usize {
        self.inner.elements.borrow().len()
    }

    fn insert(&self, index: usize, element: T) -> Result<(), ObservableError> {
        self.inner.core.check_writable()?;
        {
            let mut elements = self.inner.elements.borrow_mut();
            let len = elements.len();
            if index > len {
                return Err(ObservableError::IndexOutOfBounds { index, len });
            }
            elements.insert(index, element.clone());
        }
        self.fire(ListDiff::new(vec![ListDiffEntry::Add { index, element }]));
        Ok(())
    }

    fn remove(&self, index: usize) -> Result<T, ObservableError> {
        self.inner.core.check_writable()?;
        let removed = {
            let mut elements = self.inner.elements.borrow_mut();
            self.check_index(index, elements.len())?;
            elements.remove(index)
        };
        self.fire(ListDiff::new(vec![ListDiffEntry::Remove {
            index,
            element: removed.clone(),
        }]));
        Ok(removed)
    }

    fn move_element(&self, from: usize, to: usize) -> Result<T, ObservableError> {
        self.inner.core.check_writable()?;
        let moved = {
            let mut elements = self.inner.elements.borrow_mut();
            let len = elements.len();
            self.check_index(from, len)?;
            self.check_index(to, len)?;
            let moved = elements.remove(from);
            elements.insert(to, moved.clone());
            moved
        };
        if from != to {
            self.fire(ListDiff::new(vec![
                ListDiffEntry::Remove {
                    index: from,
                    element: moved.clone(),
                },
                ListDiffEntry::Add {
                    index: to,
                    element: moved.clone(),
                },
            ]));
        }
        Ok(moved)
    }

    fn replace(&self, index: usize, element: T) -> Result<T, ObservableError> {
        self.inner.core.check_writable()?;
        let old = {
            let mut elements = self.inner.elements.borrow_mut();
            self.check_index(index, elements.len())?;
            std::mem::replace(&mut elements[index], element.clone())
        };
        if old != element {
            self.fire(ListDiff::new(vec![
                ListDiffEntry::Remove {
                    index,
                    element: old.clone(),
                },
                ListDiffEntry::Add { index, element },
            ]));
        }
        Ok(old)
    }

    fn clear(&self) -> Result<(), ObservableError> {
        self.inner.core.check_writable()?;
        let removed = std::mem::take(&mut *self.inner.elements.borrow_mut());
        let entries = removed
            .into_iter()
            .map(|element| ListDiffEntry::Remove { index: 0, element })
            .collect();
        self.fire(ListDiff::new(entries));
        Ok(())
    }

    fn add_change_listener(&self, callback: Box<dyn Fn(&ListDiff<T>)>) -> Subscription {
        self.inner.listeners.add(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realm::CurrentRealm;

    fn recording(list: &WritableList<char>) -> (Rc<RefCell<Vec<ListDiff<char>>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let sub = list.subscribe(move |d| s.borrow_mut().push(d.clone()));
        (seen, sub)
    }

    #[test]
    fn insert_and_remove_report_entries() {
        let list = WritableList::<char>::new(CurrentRealm::shared());
        let (seen, _sub) = recording(&list);
        list.push('a').unwrap();
        list.insert(0, 'b').unwrap();
        assert_eq!(list.elements(), vec!['b', 'a']);
        assert_eq!(list.remove(1).unwrap(), 'a');
        assert_eq!(seen.borrow().len(), 3);
        assert_eq!(
            seen.borrow()[1].entries(),
            &[ListDiffEntry::Add {
                index: 0,
                element: 'b'
            }]
        );
    }

    #[test]
    fn out_of_bounds_is_an_error() {
        let list = WritableList::with_elements(CurrentRealm::shared(), vec!['a']);
        assert_eq!(
            list.insert(3, 'z'),
            Err(ObservableError::IndexOutOfBounds { index: 3, len: 1 })
        );
        assert!(list.remove(1).is_err());
        assert!(list.move_element(0, 1).is_err());
    }

    #[test]
    fn move_reports_remove_then_add() {
        let list = WritableList::with_elements(CurrentRealm::shared(), vec!['a', 'b', 'c']);
        let (seen, _sub) = recording(&list);
        list.move_element(0, 2).unwrap();
        assert_eq!(list.elements(), vec!['b', 'c', 'a']);
        let mut replay = vec!['a', 'b', 'c'];
        seen.borrow()[0].apply_to(&mut replay);
        assert_eq!(replay, list.elements());
    }

    #[test]
    fn clear_and_set_all_diffs_replay() {
        let list = WritableList::with_elements(CurrentRealm::shared(), vec!['a', 'b', 'c']);
        let (seen, _sub) = recording(&list);
        list.set_all(vec!['c', 'x', 'a']).unwrap();
        list.clear().unwrap();
        assert!(list.is_empty());

        let mut replay = vec!['a', 'b', 'c'];
        for diff in seen.borrow().iter() {
            diff.apply_to(&mut replay);
        }
        assert!(replay.is_empty());
    }

    #[test]
    fn replace_with_equal_element_is_silent() {
        let list = WritableList::with_elements(CurrentRealm::shared(), vec![1, 2]);
        let fired = Rc::new(RefCell::new(0));
        let f = Rc::clone(&fired);
        let _sub = list.subscribe(move |_| *f.borrow_mut() += 1);
        assert_eq!(list.replace(0, 1).unwrap(), 1);
        assert_eq!(*fired.borrow(), 0);
        assert_eq!(list.replace(0, 9).unwrap(), 1);
        assert_eq!(*fired.borrow(), 1);
    }
}
