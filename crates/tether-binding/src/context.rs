#![forbid(unsafe_code)]

//! The registry and factory for bindings.
//!
//! A [`DataBindingContext`] creates bindings, keeps them in an observable
//! list in creation order, and derives a [`ValidationStatusMap`] from that
//! list. All bookkeeping happens on the context's validation realm.
//!
//! # Invariants
//!
//! 1. Every binding in [`bindings`](DataBindingContext::bindings) belongs to
//!    this context and appears exactly once.
//! 2. Removing a binding removes it from the list and the status map in the
//!    same realm turn.
//! 3. [`dispose`](DataBindingContext::dispose) disposes the bindings present
//!    when it was called, in creation order, then the list and the map.
//!
//! # Failure Modes
//!
//! Setup mistakes (disposed endpoints, missing realm, unconvertible types)
//! are returned as [`BindingError`]. Nothing that happens while data flows
//! is reported here; see each binding's validation status.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use tether_core::realm::default_realm;
use tether_core::{
    Observable, ObservableList, ObservableSet, ObservableValue, RealmRef, WritableList, tracker,
};

use crate::binding::{
    self, BindingHandle, BindingId, Direction, ListBinding, SetBinding, ValueBinding,
};
use crate::config::BindingConfig;
use crate::convert::ConverterRegistry;
use crate::error::BindingError;
use crate::policy::{CollectionPolicy, UpdatePolicy};
use crate::status_map::ValidationStatusMap;
use crate::strategy::{UpdateListStrategy, UpdateSetStrategy, UpdateValueStrategy};
use crate::validate::ValidatorRegistry;

struct ContextInner {
    realm: RealmRef,
    bindings: WritableList<BindingHandle>,
    status_map: ValidationStatusMap,
    config: BindingConfig,
    converters: &'static ConverterRegistry,
    validators: &'static ValidatorRegistry,
    disposed: Cell<bool>,
}

/// Creates and tracks bindings.
///
/// Cloning is cheap and yields another handle to the same context.
///
/// # Example
///
/// ```
/// use tether_binding::DataBindingContext;
/// use tether_core::{CurrentRealm, WritableValue};
///
/// let realm = CurrentRealm::shared();
/// let ctx = DataBindingContext::with_realm(realm.clone());
/// let name = WritableValue::new(realm.clone(), String::from("Ada"));
/// let label = WritableValue::new(realm, String::new());
///
/// ctx.bind_value(&label, &name, None, None).unwrap();
/// assert_eq!(label.get(), "Ada");
/// ```
#[derive(Clone)]
pub struct DataBindingContext {
    inner: Rc<ContextInner>,
}

/// Non-owning reference to a context, held by its bindings.
#[derive(Clone)]
pub(crate) struct WeakContext(Weak<ContextInner>);

impl WeakContext {
    pub(crate) fn upgrade(&self) -> Option<DataBindingContext> {
        self.0.upgrade().map(|inner| DataBindingContext { inner })
    }
}

/// Builder for [`DataBindingContext`].
#[derive(Debug, Default)]
pub struct DataBindingContextBuilder {
    realm: Option<RealmRef>,
    config: BindingConfig,
}

impl DataBindingContextBuilder {
    /// Use `realm` as the validation realm instead of the thread default.
    #[must_use]
    pub fn realm(mut self, realm: RealmRef) -> Self {
        self.realm = Some(realm);
        self
    }

    /// Use `config` for default strategies and aggregate messages.
    #[must_use]
    pub fn config(mut self, config: BindingConfig) -> Self {
        self.config = config;
        self
    }

    /// Create the context.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::NoDefaultRealm`] when no realm was given and
    /// the calling thread has no default realm.
    pub fn build(self) -> Result<DataBindingContext, BindingError> {
        let realm = self
            .realm
            .or_else(default_realm)
            .ok_or(BindingError::NoDefaultRealm)?;
        Ok(DataBindingContext::create(realm, self.config))
    }
}

impl DataBindingContext {
    /// A context on the calling thread's default realm.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::NoDefaultRealm`] when no default realm is
    /// installed.
    pub fn new() -> Result<Self, BindingError> {
        Self::builder().build()
    }

    /// A context whose validation realm is `realm`.
    #[must_use]
    pub fn with_realm(realm: RealmRef) -> Self {
        Self::create(realm, BindingConfig::default())
    }

    /// Start configuring a context.
    #[must_use]
    pub fn builder() -> DataBindingContextBuilder {
        DataBindingContextBuilder::default()
    }

    fn create(realm: RealmRef, config: BindingConfig) -> Self {
        let (bindings, status_map) = tracker::ignore(|| {
            let bindings = WritableList::new(Rc::clone(&realm));
            bindings.set_read_only(true);
            let status_map = ValidationStatusMap::new(&bindings);
            (bindings, status_map)
        });
        tracing::debug!(realm = %realm.id(), "data binding context created");
        Self {
            inner: Rc::new(ContextInner {
                realm,
                bindings,
                status_map,
                config,
                converters: ConverterRegistry::global(),
                validators: ValidatorRegistry::global(),
                disposed: Cell::new(false),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakContext {
        WeakContext(Rc::downgrade(&self.inner))
    }

    // -----------------------------------------------------------------------
    // Factories
    // -----------------------------------------------------------------------

    /// Bind two observable values.
    ///
    /// A `None` strategy is replaced by
    /// [`default_value_strategy`](Self::default_value_strategy). Unless its
    /// policy is `Never`, each strategy then gets a registry converter when
    /// the types differ and none was configured.
    ///
    /// # Errors
    ///
    /// Fails if the context or either endpoint is disposed, if no converter
    /// exists for differing types, or if a converter's declared types do not
    /// match the endpoints.
    pub fn bind_value<T, M>(
        &self,
        target: &(impl ObservableValue<T> + Clone + 'static),
        model: &(impl ObservableValue<M> + Clone + 'static),
        target_to_model: Option<UpdateValueStrategy<T, M>>,
        model_to_target: Option<UpdateValueStrategy<M, T>>,
    ) -> Result<BindingHandle, BindingError>
    where
        T: Clone + 'static,
        M: Clone + 'static,
    {
        self.check_bindable(target, model)?;
        let mut t2m = target_to_model
            .unwrap_or_else(|| self.default_value_strategy(Direction::TargetToModel));
        let mut m2t = model_to_target
            .unwrap_or_else(|| self.default_value_strategy(Direction::ModelToTarget));
        if t2m.policy() != UpdatePolicy::Never {
            t2m.fill_defaults(
                target.value_type(),
                model.value_type(),
                self.inner.converters,
                self.inner.validators,
            )?;
        }
        if m2t.policy() != UpdatePolicy::Never {
            m2t.fill_defaults(
                model.value_type(),
                target.value_type(),
                self.inner.converters,
                self.inner.validators,
            )?;
        }
        let target: Rc<dyn ObservableValue<T>> = Rc::new(target.clone());
        let model: Rc<dyn ObservableValue<M>> = Rc::new(model.clone());
        Ok(binding::init(
            ValueBinding::new(target, model, t2m, m2t, self),
            self,
        ))
    }

    /// Bind two observable lists.
    ///
    /// # Errors
    ///
    /// As for [`bind_value`](Self::bind_value).
    pub fn bind_list<T, M>(
        &self,
        target: &(impl ObservableList<T> + Clone + 'static),
        model: &(impl ObservableList<M> + Clone + 'static),
        target_to_model: Option<UpdateListStrategy<T, M>>,
        model_to_target: Option<UpdateListStrategy<M, T>>,
    ) -> Result<BindingHandle, BindingError>
    where
        T: Clone + PartialEq + 'static,
        M: Clone + PartialEq + 'static,
    {
        self.check_bindable(target, model)?;
        let move_and_replace = self.inner.config.use_move_and_replace;
        let mut t2m = target_to_model
            .unwrap_or_else(|| self.default_list_strategy(Direction::TargetToModel));
        let mut m2t = model_to_target
            .unwrap_or_else(|| self.default_list_strategy(Direction::ModelToTarget));
        if t2m.policy() != CollectionPolicy::Never {
            t2m.fill_defaults(
                target.value_type(),
                model.value_type(),
                self.inner.converters,
                move_and_replace,
            )?;
        }
        if m2t.policy() != CollectionPolicy::Never {
            m2t.fill_defaults(
                model.value_type(),
                target.value_type(),
                self.inner.converters,
                move_and_replace,
            )?;
        }
        let target: Rc<dyn ObservableList<T>> = Rc::new(target.clone());
        let model: Rc<dyn ObservableList<M>> = Rc::new(model.clone());
        Ok(binding::init(
            ListBinding::new(target, model, t2m, m2t, self),
            self,
        ))
    }

    /// Bind two observable sets.
    ///
    /// # Errors
    ///
    /// As for [`bind_value`](Self::bind_value).
    pub fn bind_set<T, M>(
        &self,
        target: &(impl ObservableSet<T> + Clone + 'static),
        model: &(impl ObservableSet<M> + Clone + 'static),
        target_to_model: Option<UpdateSetStrategy<T, M>>,
        model_to_target: Option<UpdateSetStrategy<M, T>>,
    ) -> Result<BindingHandle, BindingError>
    where
        T: Clone + 'static,
        M: Clone + 'static,
    {
        self.check_bindable(target, model)?;
        let mut t2m = target_to_model
            .unwrap_or_else(|| self.default_set_strategy(Direction::TargetToModel));
        let mut m2t = model_to_target
            .unwrap_or_else(|| self.default_set_strategy(Direction::ModelToTarget));
        if t2m.policy() != CollectionPolicy::Never {
            t2m.fill_defaults(target.value_type(), model.value_type(), self.inner.converters)?;
        }
        if m2t.policy() != CollectionPolicy::Never {
            m2t.fill_defaults(model.value_type(), target.value_type(), self.inner.converters)?;
        }
        let target: Rc<dyn ObservableSet<T>> = Rc::new(target.clone());
        let model: Rc<dyn ObservableSet<M>> = Rc::new(model.clone());
        Ok(binding::init(
            SetBinding::new(target, model, t2m, m2t, self),
            self,
        ))
    }

    fn check_bindable(
        &self,
        target: &dyn Observable,
        model: &dyn Observable,
    ) -> Result<(), BindingError> {
        if self.is_disposed() {
            return Err(BindingError::ContextDisposed);
        }
        binding::check_endpoints(target, model)
    }

    /// The value strategy used when a bind call passes `None`.
    #[must_use]
    pub fn default_value_strategy<S, D>(&self, direction: Direction) -> UpdateValueStrategy<S, D>
    where
        S: Clone + 'static,
        D: Clone + 'static,
    {
        let config = &self.inner.config;
        let policy = match direction {
            Direction::TargetToModel => config.target_to_model,
            Direction::ModelToTarget => config.model_to_target,
        };
        UpdateValueStrategy::new(policy).with_default_converter(config.provide_default_converters)
    }

    /// The list strategy used when a bind call passes `None`.
    #[must_use]
    pub fn default_list_strategy<S, D>(&self, direction: Direction) -> UpdateListStrategy<S, D>
    where
        S: Clone + 'static,
        D: Clone + 'static,
    {
        let config = &self.inner.config;
        UpdateListStrategy::new(self.collection_policy(direction))
            .with_default_converter(config.provide_default_converters)
    }

    /// The set strategy used when a bind call passes `None`.
    #[must_use]
    pub fn default_set_strategy<S, D>(&self, direction: Direction) -> UpdateSetStrategy<S, D>
    where
        S: Clone + 'static,
        D: Clone + 'static,
    {
        let config = &self.inner.config;
        UpdateSetStrategy::new(self.collection_policy(direction))
            .with_default_converter(config.provide_default_converters)
    }

    fn collection_policy(&self, direction: Direction) -> CollectionPolicy {
        match direction {
            Direction::TargetToModel => self.inner.config.collection_target_to_model,
            Direction::ModelToTarget => self.inner.config.collection_model_to_target,
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Snapshot of the bindings, in creation order.
    #[must_use]
    pub fn bindings(&self) -> Vec<BindingHandle> {
        self.inner.bindings.elements()
    }

    /// The live, read-only list of bindings.
    #[must_use]
    pub fn bindings_observable(&self) -> WritableList<BindingHandle> {
        self.inner.bindings.clone()
    }

    /// The live map from binding to validation status.
    #[must_use]
    pub fn validation_status_map(&self) -> ValidationStatusMap {
        self.inner.status_map.clone()
    }

    /// The realm all binding bookkeeping runs on.
    #[must_use]
    pub fn validation_realm(&self) -> RealmRef {
        Rc::clone(&self.inner.realm)
    }

    /// The configuration this context was created with.
    #[must_use]
    pub fn config(&self) -> &BindingConfig {
        &self.inner.config
    }

    // -----------------------------------------------------------------------
    // Bulk operations
    // -----------------------------------------------------------------------

    /// Push every target into its model, honouring each binding's policy.
    pub fn update_models(&self) {
        for binding in self.bindings() {
            binding.update_target_to_model();
        }
    }

    /// Push every model into its target, honouring each binding's policy.
    pub fn update_targets(&self) {
        for binding in self.bindings() {
            binding.update_model_to_target();
        }
    }

    /// Validate every target-to-model direction without writing.
    pub fn validate_models(&self) {
        for binding in self.bindings() {
            binding.validate_target_to_model();
        }
    }

    /// Validate every model-to-target direction without writing.
    pub fn validate_targets(&self) {
        for binding in self.bindings() {
            binding.validate_model_to_target();
        }
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Join `binding` on the validation realm; a context disposed in the
    /// meantime disposes it instead.
    pub(crate) fn add_binding(&self, binding: BindingHandle) {
        let context = self.clone();
        self.inner.realm.exec(Box::new(move || {
            if context.is_disposed() {
                tracing::debug!(binding = %binding.id(), "context disposed before join");
                binding.dispose();
                return;
            }
            edit(&context.inner.bindings, |list| list.push(binding));
        }));
    }

    pub(crate) fn detach(&self, id: BindingId) {
        let bindings = self.inner.bindings.clone();
        self.inner.realm.exec(Box::new(move || {
            edit(&bindings, |list| remove_by_id(list, id).map(drop));
        }));
    }

    /// Remove `binding` from this context without disposing it.
    ///
    /// Returns `false` if it was not a member. Must be called on the
    /// validation realm.
    pub fn remove_binding(&self, binding: &BindingHandle) -> bool {
        let mut removed = false;
        edit(&self.inner.bindings, |list| {
            removed = remove_by_id(list, binding.id())?;
            Ok(())
        });
        if removed {
            binding.leave_context();
        }
        removed
    }

    /// Dispose every binding, then the binding list and the status map.
    /// Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        let snapshot = self.bindings();
        tracing::debug!(bindings = snapshot.len(), "disposing data binding context");
        for binding in snapshot {
            binding.dispose();
        }
        self.inner.status_map.dispose();
        self.inner.bindings.dispose();
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl fmt::Debug for DataBindingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataBindingContext")
            .field("realm", &self.inner.realm.id())
            .field("bindings", &self.inner.bindings.len())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

/// Run `f` against the binding list with writes briefly allowed.
fn edit(
    bindings: &WritableList<BindingHandle>,
    f: impl FnOnce(&WritableList<BindingHandle>) -> Result<(), tether_core::ObservableError>,
) {
    bindings.set_read_only(false);
    let result = f(bindings);
    bindings.set_read_only(true);
    if let Err(err) = result {
        tracing::warn!(error = %err, "binding list update rejected");
    }
}

fn remove_by_id(
    list: &WritableList<BindingHandle>,
    id: BindingId,
) -> Result<bool, tether_core::ObservableError> {
    match list.elements().iter().position(|b| b.id() == id) {
        Some(index) => list.remove(index).map(|_| true),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use tether_core::{CurrentRealm, QueuedRealm, WritableValue};
    use tracing_test::traced_test;

    use super::*;

    #[test]
    fn new_requires_a_default_realm() {
        assert!(matches!(
            DataBindingContext::new(),
            Err(BindingError::NoDefaultRealm)
        ));
        let ctx = tether_core::realm::run_with_default(CurrentRealm::shared(), || {
            DataBindingContext::new()
        });
        assert!(ctx.is_ok());
    }

    #[test]
    fn bindings_list_is_read_only_from_outside() {
        let ctx = DataBindingContext::with_realm(CurrentRealm::shared());
        let list = ctx.bindings_observable();
        assert!(list.clear().is_err());
    }

    #[test]
    fn disposed_context_rejects_new_bindings() {
        let realm = CurrentRealm::shared();
        let ctx = DataBindingContext::with_realm(Rc::clone(&realm));
        ctx.dispose();
        let a = WritableValue::new(Rc::clone(&realm), 0);
        let b = WritableValue::new(realm, 0);
        assert_eq!(
            ctx.bind_value(&a, &b, None, None).unwrap_err(),
            BindingError::ContextDisposed
        );
    }

    #[test]
    fn membership_waits_for_the_validation_realm() {
        let queued = QueuedRealm::new();
        let ctx = DataBindingContext::with_realm(queued.clone());
        let realm = CurrentRealm::shared();
        let a = WritableValue::new(Rc::clone(&realm), 1);
        let b = WritableValue::new(realm, 1);
        let binding = ctx.bind_value(&a, &b, None, None).unwrap();
        assert!(ctx.bindings().is_empty());
        queued.drain();
        assert_eq!(ctx.bindings(), vec![binding]);
    }

    #[test]
    fn remove_binding_keeps_it_alive() {
        let realm = CurrentRealm::shared();
        let ctx = DataBindingContext::with_realm(Rc::clone(&realm));
        let a = WritableValue::new(Rc::clone(&realm), 1);
        let b = WritableValue::new(realm, 1);
        let binding = ctx.bind_value(&a, &b, None, None).unwrap();
        assert!(ctx.remove_binding(&binding));
        assert!(!ctx.remove_binding(&binding));
        assert!(!binding.is_disposed());
        a.set(5).unwrap();
        assert_eq!(b.get(), 5);
    }

    #[test]
    fn removed_binding_forgets_its_context() {
        let realm = CurrentRealm::shared();
        let ctx = DataBindingContext::with_realm(Rc::clone(&realm));
        let a = WritableValue::new(Rc::clone(&realm), 1);
        let b = WritableValue::new(realm, 1);
        let binding = ctx.bind_value(&a, &b, None, None).unwrap();
        assert!(binding.context().is_some());

        ctx.remove_binding(&binding);
        assert!(binding.context().is_none());
        assert!(ctx.bindings().is_empty());
    }

    #[test]
    fn dispose_before_the_queued_join_disposes_the_binding() {
        let queued = QueuedRealm::new();
        let ctx = DataBindingContext::with_realm(queued.clone());
        let realm = CurrentRealm::shared();
        let a = WritableValue::new(Rc::clone(&realm), 1);
        let b = WritableValue::new(realm, 1);
        let binding = ctx.bind_value(&a, &b, None, None).unwrap();

        ctx.dispose();
        assert!(!binding.is_disposed());
        queued.drain();

        assert!(binding.is_disposed());
        assert!(ctx.bindings().is_empty());
        a.set(9).unwrap();
        assert_eq!(b.get(), 1);
    }

    #[test]
    #[traced_test]
    fn logs_binding_lifecycle() {
        let realm = CurrentRealm::shared();
        let ctx = DataBindingContext::with_realm(Rc::clone(&realm));
        let a = WritableValue::new(Rc::clone(&realm), 1);
        let b = WritableValue::new(realm, 1);
        let binding = ctx.bind_value(&a, &b, None, None).unwrap();
        binding.dispose();
        assert!(logs_contain("binding initialized"));
        assert!(logs_contain("binding disposed"));
    }
}
