#![forbid(unsafe_code)]

//! Bindings: live synchronisation between a target and a model observable.
//!
//! A binding owns one [`UpdateValueStrategy`](crate::UpdateValueStrategy)
//! (or list/set strategy) per direction, the change listeners that trigger
//! propagation, and an observable validation status.
//!
//! # Lifecycle
//!
//! ```text
//! constructed --init--> initializing --post-init--> active --dispose--> disposed
//! ```
//!
//! Bindings are created by [`DataBindingContext`](crate::DataBindingContext)
//! and are active by the time the bind call returns.
//!
//! # Invariants
//!
//! 1. A propagation writes to exactly one endpoint, and the echo of that
//!    write is ignored by the binding's own listener on that endpoint.
//! 2. Steps that read the source run in the source's realm; the write runs
//!    in the destination's realm; the status is written in the context's
//!    validation realm.
//! 3. A disposed binding holds no endpoint references, no listeners, and is
//!    no longer part of its context. `dispose` is idempotent.
//! 4. A propagation queued on another realm before `dispose` writes nothing
//!    when it finally runs.
//! 5. Disposing either endpoint disposes the binding (asynchronously, on the
//!    validation realm).
//!
//! # Failure Modes
//!
//! Validation, conversion, and write failures never reach the caller; they
//! become the binding's validation status. The echo guards are plain flags
//! and are only sound because every endpoint is confined to its realm.

mod list;
mod set;
mod value;

pub(crate) use list::ListBinding;
pub(crate) use set::SetBinding;
pub(crate) use value::ValueBinding;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tether_core::{Observable, ObservableRef, Status, Subscription, WritableValue, tracker};

use crate::context::{DataBindingContext, WeakContext};
use crate::error::BindingError;

static BINDING_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    fn next() -> Self {
        Self(BINDING_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identifier value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding#{}", self.0)
    }
}

/// Direction of a propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// From the target (UI side) to the model.
    TargetToModel,
    /// From the model to the target.
    ModelToTarget,
}

/// The operations every binding supports.
///
/// The `update_*` and `validate_*` methods may complete asynchronously when
/// an endpoint lives in a realm that is not current; there is no guarantee
/// the destination or the status has changed by the time they return.
pub trait Binding: fmt::Debug {
    /// Identity of this binding.
    fn id(&self) -> BindingId;

    /// The target endpoint, until the binding is disposed.
    fn target(&self) -> Option<ObservableRef>;

    /// The model endpoint, until the binding is disposed.
    fn model(&self) -> Option<ObservableRef>;

    /// The observable holding the outcome of the latest propagation.
    fn validation_status(&self) -> WritableValue<Status>;

    /// Propagate the target into the model, honouring the target-to-model policy.
    fn update_target_to_model(&self);

    /// Propagate the model into the target, honouring the model-to-target policy.
    fn update_model_to_target(&self);

    /// Run the target-to-model validation steps without writing.
    fn validate_target_to_model(&self);

    /// Run the model-to-target validation steps without writing.
    fn validate_model_to_target(&self);

    /// Stop synchronising and leave the context. Idempotent.
    fn dispose(&self);

    /// Whether [`dispose`](Self::dispose) has been called.
    fn is_disposed(&self) -> bool;
}

/// A shared handle to a binding of any kind.
///
/// Handles compare equal when they refer to the same binding.
#[derive(Clone)]
pub struct BindingHandle {
    binding: Rc<dyn Binding>,
    membership: Membership,
}

impl BindingHandle {
    pub(crate) fn new(binding: Rc<dyn Binding>, membership: Membership) -> Self {
        Self {
            binding,
            membership,
        }
    }

    /// Forget the owning context without disposing the binding.
    pub(crate) fn leave_context(&self) {
        self.membership.borrow_mut().take();
    }

    #[cfg(test)]
    pub(crate) fn context(&self) -> Option<DataBindingContext> {
        self.membership.borrow().as_ref().and_then(WeakContext::upgrade)
    }
}

impl Deref for BindingHandle {
    type Target = dyn Binding;

    fn deref(&self) -> &Self::Target {
        &*self.binding
    }
}

impl PartialEq for BindingHandle {
    fn eq(&self, other: &Self) -> bool {
        self.binding.id() == other.binding.id()
    }
}

impl Eq for BindingHandle {}

impl fmt::Debug for BindingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.binding.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Shared binding state
// ---------------------------------------------------------------------------

/// The context a binding belongs to, shared with its handles.
pub(crate) type Membership = Rc<RefCell<Option<WeakContext>>>;

/// State common to every binding kind.
pub(crate) struct BindingCore {
    id: BindingId,
    kind: &'static str,
    context: Membership,
    disposed: Rc<Cell<bool>>,
    status: WritableValue<Status>,
    endpoint_guards: RefCell<Vec<Subscription>>,
}

impl BindingCore {
    /// Allocate the status observable in the context's validation realm.
    ///
    /// The allocation is hidden from observable tracking; it belongs to the
    /// binding, not to the application.
    pub(crate) fn new(kind: &'static str, context: &DataBindingContext) -> Self {
        let realm = context.validation_realm();
        let status = tracker::ignore(|| WritableValue::new(realm, Status::ok()));
        Self {
            id: BindingId::next(),
            kind,
            context: Rc::new(RefCell::new(None)),
            disposed: Rc::new(Cell::new(false)),
            status,
            endpoint_guards: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn id(&self) -> BindingId {
        self.id
    }

    pub(crate) fn status(&self) -> WritableValue<Status> {
        self.status.clone()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Flag checked by propagations that were queued before a dispose.
    pub(crate) fn disposed_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.disposed)
    }

    /// Mark disposed and leave the context. Returns `false` if already disposed.
    pub(crate) fn dispose(&self) -> bool {
        if self.disposed.replace(true) {
            return false;
        }
        self.endpoint_guards.borrow_mut().clear();
        let context = self.context.borrow_mut().take();
        if let Some(context) = context.and_then(|weak| weak.upgrade()) {
            context.detach(self.id);
        }
        self.status.dispose();
        tracing::debug!(binding = %self.id, kind = self.kind, "binding disposed");
        true
    }
}

impl fmt::Debug for BindingCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingCore")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

/// Hooks the shared initialisation sequence drives.
pub(crate) trait Lifecycle: Binding + 'static {
    fn core(&self) -> &BindingCore;

    /// Wire change listeners and run the initial propagation.
    fn post_init(self: &Rc<Self>);
}

/// Fail if either endpoint is already disposed.
pub(crate) fn check_endpoints(
    target: &dyn Observable,
    model: &dyn Observable,
) -> Result<(), BindingError> {
    if target.is_disposed() {
        return Err(BindingError::TargetDisposed(target.id()));
    }
    if model.is_disposed() {
        return Err(BindingError::ModelDisposed(model.id()));
    }
    Ok(())
}

/// Attach a freshly constructed binding to `context` and activate it.
pub(crate) fn init<B: Lifecycle>(binding: Rc<B>, context: &DataBindingContext) -> BindingHandle {
    let core = binding.core();
    *core.context.borrow_mut() = Some(context.downgrade());

    let endpoints = [binding.target(), binding.model()];
    for endpoint in endpoints.into_iter().flatten() {
        let weak = Rc::downgrade(&binding);
        let realm = context.validation_realm();
        let guard = endpoint.add_dispose_listener(Box::new(move || {
            if let Some(binding) = weak.upgrade() {
                tracing::debug!(binding = %binding.id(), "endpoint disposed");
                realm.async_exec(Box::new(move || binding.dispose()));
            }
        }));
        core.endpoint_guards.borrow_mut().push(guard);
    }

    let handle = BindingHandle::new(
        Rc::clone(&binding) as Rc<dyn Binding>,
        Rc::clone(&core.context),
    );
    context.add_binding(handle.clone());
    tracing::debug!(binding = %core.id, kind = core.kind, "binding initialized");
    binding.post_init();
    handle
}

/// Publish `status` as the binding's current validation status.
pub(crate) fn publish_status(cell: &WritableValue<Status>, status: Status, binding: BindingId) {
    if !status.is_ok() {
        tracing::debug!(
            binding = %binding,
            severity = %status.severity(),
            message = status.message(),
            "binding reported a problem"
        );
    }
    let target = cell.clone();
    cell.realm().exec(Box::new(move || {
        if let Err(err) = target.set(status) {
            tracing::trace!(binding = %binding, error = %err, "validation status not published");
        }
    }));
}

/// Raises an echo-suppression flag for the lifetime of the guard.
pub(crate) struct EchoGuard<'a>(&'a Cell<bool>);

impl<'a> EchoGuard<'a> {
    pub(crate) fn raise(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for EchoGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_ids_are_unique_and_display() {
        let a = BindingId::next();
        let b = BindingId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
        assert_eq!(format!("{a}"), format!("binding#{}", a.get()));
    }

    #[test]
    fn echo_guard_lowers_flag_on_drop() {
        let flag = Cell::new(false);
        {
            let _guard = EchoGuard::raise(&flag);
            assert!(flag.get());
        }
        assert!(!flag.get());
    }
}
