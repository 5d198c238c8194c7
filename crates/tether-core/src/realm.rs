#![forbid(unsafe_code)]

//! Single-threaded execution contexts.
//!
//! A [`Realm`] stands for one thread of control (typically a UI event loop).
//! Every observable belongs to exactly one realm and may only be mutated while
//! that realm is current. Work destined for another realm is handed off with
//! [`Realm::exec`], which runs the task inline when the realm is already
//! current and queues it otherwise.
//!
//! # Invariants
//!
//! 1. Tasks submitted to one realm run in submission order (FIFO).
//! 2. `exec` never blocks waiting on another realm.
//! 3. Realm identity is the [`RealmId`]; two handles to the same realm compare
//!    equal through [`same_realm`].
//!
//! # Default realm
//!
//! Each thread carries an optional default realm, installed with
//! [`run_with_default`]. Constructors that are not handed a realm explicitly
//! fall back to it.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A unit of work submitted to a realm.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Shared handle to a realm.
pub type RealmRef = Rc<dyn Realm>;

static REALM_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static DEFAULT_REALM: RefCell<Option<RealmRef>> = const { RefCell::new(None) };
}

/// Unique identifier of a realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RealmId(u64);

impl RealmId {
    /// Allocate a fresh identifier.
    #[must_use]
    pub fn next() -> Self {
        Self(REALM_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identifier value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RealmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "realm#{}", self.0)
    }
}

/// A single-threaded execution context.
pub trait Realm: fmt::Debug {
    /// Identity of this realm.
    fn id(&self) -> RealmId;

    /// Whether the calling code is currently running inside this realm.
    fn is_current(&self) -> bool;

    /// Queue `task` to run inside this realm at some later point.
    fn async_exec(&self, task: Task);

    /// Run `task` inside this realm: inline when current, queued otherwise.
    ///
    /// There is no guarantee the task has run by the time this returns.
    fn exec(&self, task: Task) {
        if self.is_current() {
            task();
        } else {
            self.async_exec(task);
        }
    }
}

/// Whether two realm handles refer to the same realm.
#[must_use]
pub fn same_realm(a: &dyn Realm, b: &dyn Realm) -> bool {
    a.id() == b.id()
}

/// The calling thread's default realm, if one is installed.
#[must_use]
pub fn default_realm() -> Option<RealmRef> {
    DEFAULT_REALM.with(|slot| slot.borrow().clone())
}

/// Run `f` with `realm` installed as this thread's default realm.
///
/// The previous default is restored afterwards, even if `f` panics.
pub fn run_with_default<R>(realm: RealmRef, f: impl FnOnce() -> R) -> R {
    let previous = DEFAULT_REALM.with(|slot| slot.replace(Some(realm)));
    let _restore = RestoreDefault(previous);
    f()
}

struct RestoreDefault(Option<RealmRef>);

impl Drop for RestoreDefault {
    fn drop(&mut self) {
        let previous = self.0.take();
        DEFAULT_REALM.with(|slot| {
            *slot.borrow_mut() = previous;
        });
    }
}

// ---------------------------------------------------------------------------
// CurrentRealm
// ---------------------------------------------------------------------------

/// A realm that is always current.
///
/// Suitable for headless use and tests where everything runs on one thread
/// with no event loop. `async_exec` runs the task immediately.
pub struct CurrentRealm {
    id: RealmId,
}

impl CurrentRealm {
    /// Create a new always-current realm.
    #[must_use]
    pub fn new() -> Self {
        Self { id: RealmId::next() }
    }

    /// Create a new always-current realm behind a shared handle.
    #[must_use]
    pub fn shared() -> RealmRef {
        Rc::new(Self::new())
    }
}

impl Default for CurrentRealm {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CurrentRealm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrentRealm").field("id", &self.id).finish()
    }
}

impl Realm for CurrentRealm {
    fn id(&self) -> RealmId {
        self.id
    }

    fn is_current(&self) -> bool {
        true
    }

    fn async_exec(&self, task: Task) {
        task();
    }
}

// ---------------------------------------------------------------------------
// QueuedRealm
// ---------------------------------------------------------------------------

/// A realm backed by a FIFO task queue.
///
/// The realm is current only while [`enter`](Self::enter) or
/// [`drain`](Self::drain) is running on it, which models an event loop that
/// owns a thread and dispatches posted work between events.
pub struct QueuedRealm {
    id: RealmId,
    queue: RefCell<VecDeque<Task>>,
    depth: Cell<usize>,
}

impl QueuedRealm {
    /// Create a new queued realm behind a shared handle.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            id: RealmId::next(),
            queue: RefCell::new(VecDeque::new()),
            depth: Cell::new(0),
        })
    }

    /// Run `f` with this realm current.
    pub fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        self.depth.set(self.depth.get() + 1);
        let _exit = ExitRealm(&self.depth);
        f()
    }

    /// Run queued tasks in submission order until the queue is empty.
    ///
    /// Tasks queued while draining are run in the same call. Returns the
    /// number of tasks run.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(task) = next else {
                break;
            };
            self.enter(task);
            ran += 1;
        }
        if ran > 0 {
            tracing::trace!(realm = %self.id, tasks = ran, "drained realm queue");
        }
        ran
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}

struct ExitRealm<'a>(&'a Cell<usize>);

impl Drop for ExitRealm<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

impl fmt::Debug for QueuedRealm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedRealm")
            .field("id", &self.id)
            .field("pending", &self.queue.borrow().len())
            .field("current", &self.is_current())
            .finish()
    }
}

impl Realm for QueuedRealm {
    fn id(&self) -> RealmId {
        self.id
    }

    fn is_current(&self) -> bool {
        self.depth.get() > 0
    }

    fn async_exec(&self, task: Task) {
        self.queue.borrow_mut().push_back(task);
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    #[test]
    fn current_realm_runs_inline() {
        let realm = CurrentRealm::new();
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        realm.exec(Box::new(move || r.set(true)));
        assert!(ran.get());
    }

    #[test]
    fn queued_realm_defers_until_drain() {
        let realm = QueuedRealm::new();
        let ran = Rc::new(Cell::new(0));
        let r = Rc::clone(&ran);
        realm.exec(Box::new(move || r.set(r.get() + 1)));
        assert_eq!(ran.get(), 0);
        assert_eq!(realm.pending(), 1);

        assert_eq!(realm.drain(), 1);
        assert_eq!(ran.get(), 1);
        assert_eq!(realm.pending(), 0);
    }

    #[test]
    fn queued_realm_exec_is_inline_when_current() {
        let realm = QueuedRealm::new();
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        realm.enter(|| realm.exec(Box::new(move || r.set(true))));
        assert!(ran.get());
        assert_eq!(realm.pending(), 0);
        assert!(!realm.is_current());
    }

    #[test]
    fn queued_realm_is_fifo() {
        let realm = QueuedRealm::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..4 {
            let o = Rc::clone(&order);
            realm.async_exec(Box::new(move || o.borrow_mut().push(i)));
        }
        realm.drain();
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn drain_runs_tasks_queued_during_drain() {
        let realm = QueuedRealm::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let inner_realm = Rc::clone(&realm);
        let o = Rc::clone(&order);
        realm.async_exec(Box::new(move || {
            o.borrow_mut().push("outer");
            let o2 = Rc::clone(&o);
            inner_realm.async_exec(Box::new(move || o2.borrow_mut().push("inner")));
        }));
        assert_eq!(realm.drain(), 2);
        assert_eq!(*order.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn default_realm_is_scoped() {
        assert!(default_realm().is_none());
        let outer = CurrentRealm::shared();
        let outer_id = outer.id();
        run_with_default(outer, || {
            assert_eq!(default_realm().map(|r| r.id()), Some(outer_id));
            let inner = CurrentRealm::shared();
            let inner_id = inner.id();
            run_with_default(inner, || {
                assert_eq!(default_realm().map(|r| r.id()), Some(inner_id));
            });
            assert_eq!(default_realm().map(|r| r.id()), Some(outer_id));
        });
        assert!(default_realm().is_none());
    }

    #[test]
    fn same_realm_compares_identity() {
        let a = QueuedRealm::new();
        let b = QueuedRealm::new();
        assert!(same_realm(&*a, &*a));
        assert!(!same_realm(&*a, &*b));
    }

    #[test]
    #[traced_test]
    fn drain_logs_task_count() {
        let realm = QueuedRealm::new();
        realm.async_exec(Box::new(|| {}));
        realm.async_exec(Box::new(|| {}));
        assert_eq!(realm.drain(), 2);
        assert!(logs_contain("drained realm queue"));
    }
}
