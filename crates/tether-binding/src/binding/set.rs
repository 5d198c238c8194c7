#![forbid(unsafe_code)]

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tether_core::{ObservableRef, ObservableSet, SetDiff, Status, Subscription, WritableValue};

use super::{Binding, BindingCore, BindingId, EchoGuard, Lifecycle, publish_status};
use crate::context::DataBindingContext;
use crate::policy::{CollectionPolicy, should_run};
use crate::strategy::{StatusCollector, UpdateSetStrategy};

/// Synchronises two observable sets.
pub(crate) struct SetBinding<T, M> {
    core: BindingCore,
    target: RefCell<Option<Rc<dyn ObservableSet<T>>>>,
    model: RefCell<Option<Rc<dyn ObservableSet<M>>>>,
    target_to_model: UpdateSetStrategy<T, M>,
    model_to_target: UpdateSetStrategy<M, T>,
    updating_target: Rc<Cell<bool>>,
    updating_model: Rc<Cell<bool>>,
    listeners: RefCell<Vec<Subscription>>,
}

impl<T: Clone + 'static, M: Clone + 'static> SetBinding<T, M> {
    pub(crate) fn new(
        target: Rc<dyn ObservableSet<T>>,
        model: Rc<dyn ObservableSet<M>>,
        target_to_model: UpdateSetStrategy<T, M>,
        model_to_target: UpdateSetStrategy<M, T>,
        context: &DataBindingContext,
    ) -> Rc<Self> {
        Rc::new(Self {
            core: BindingCore::new("set", context),
            target: RefCell::new(Some(target)),
            model: RefCell::new(Some(model)),
            target_to_model,
            model_to_target,
            updating_target: Rc::new(Cell::new(false)),
            updating_model: Rc::new(Cell::new(false)),
            listeners: RefCell::new(Vec::new()),
        })
    }

    fn endpoints(&self) -> Option<(Rc<dyn ObservableSet<T>>, Rc<dyn ObservableSet<M>>)> {
        let target = self.target.borrow().clone()?;
        let model = self.model.borrow().clone()?;
        Some((target, model))
    }

    fn run_target_to_model(&self, diff: Option<SetDiff<T>>, explicit: bool, validate_only: bool) {
        let Some((target, model)) = self.endpoints() else {
            return;
        };
        SetUpdate {
            source: target,
            destination: model,
            strategy: self.target_to_model.clone(),
            echo: Rc::clone(&self.updating_model),
            status: self.core.status(),
            disposed: self.core.disposed_flag(),
            binding: self.core.id(),
            explicit,
            validate_only,
        }
        .run(diff);
    }

    fn run_model_to_target(&self, diff: Option<SetDiff<M>>, explicit: bool, validate_only: bool) {
        let Some((target, model)) = self.endpoints() else {
            return;
        };
        SetUpdate {
            source: model,
            destination: target,
            strategy: self.model_to_target.clone(),
            echo: Rc::clone(&self.updating_target),
            status: self.core.status(),
            disposed: self.core.disposed_flag(),
            binding: self.core.id(),
            explicit,
            validate_only,
        }
        .run(diff);
    }
}

impl<T, M> fmt::Debug for SetBinding<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetBinding")
            .field("core", &self.core)
            .field("target_to_model", &self.target_to_model)
            .field("model_to_target", &self.model_to_target)
            .finish()
    }
}

impl<T: Clone + 'static, M: Clone + 'static> Binding for SetBinding<T, M> {
    fn id(&self) -> BindingId {
        self.core.id()
    }

    fn target(&self) -> Option<ObservableRef> {
        self.target
            .borrow()
            .clone()
            .map(|target| target as ObservableRef)
    }

    fn model(&self) -> Option<ObservableRef> {
        self.model.borrow().clone().map(|model| model as ObservableRef)
    }

    fn validation_status(&self) -> WritableValue<Status> {
        self.core.status()
    }

    fn update_target_to_model(&self) {
        self.run_target_to_model(None, true, false);
    }

    fn update_model_to_target(&self) {
        self.run_model_to_target(None, true, false);
    }

    fn validate_target_to_model(&self) {
        self.run_target_to_model(None, true, true);
    }

    fn validate_model_to_target(&self) {
        self.run_model_to_target(None, true, true);
    }

    fn dispose(&self) {
        if !self.core.dispose() {
            return;
        }
        self.listeners.borrow_mut().clear();
        self.target.borrow_mut().take();
        self.model.borrow_mut().take();
    }

    fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

impl<T: Clone + 'static, M: Clone + 'static> Lifecycle for SetBinding<T, M> {
    fn core(&self) -> &BindingCore {
        &self.core
    }

    fn post_init(self: &Rc<Self>) {
        let Some((target, model)) = self.endpoints() else {
            return;
        };
        let t2m = self.target_to_model.policy();
        let m2t = self.model_to_target.policy();

        if t2m == CollectionPolicy::Update {
            let weak = Rc::downgrade(self);
            let sub = target.add_change_listener(Box::new(move |diff: &SetDiff<T>| {
                if let Some(binding) = weak.upgrade() {
                    if !binding.updating_target.get() {
                        binding.run_target_to_model(Some(diff.clone()), false, false);
                    }
                }
            }));
            self.listeners.borrow_mut().push(sub);
        }
        if m2t == CollectionPolicy::Update {
            let weak = Rc::downgrade(self);
            let sub = model.add_change_listener(Box::new(move |diff: &SetDiff<M>| {
                if let Some(binding) = weak.upgrade() {
                    if !binding.updating_model.get() {
                        binding.run_model_to_target(Some(diff.clone()), false, false);
                    }
                }
            }));
            self.listeners.borrow_mut().push(sub);
            self.run_model_to_target(None, true, false);
        }
        if t2m == CollectionPolicy::Update {
            let validate_only = m2t != CollectionPolicy::Never;
            self.run_target_to_model(None, true, validate_only);
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

struct SetUpdate<S, D> {
    source: Rc<dyn ObservableSet<S>>,
    destination: Rc<dyn ObservableSet<D>>,
    strategy: UpdateSetStrategy<S, D>,
    echo: Rc<Cell<bool>>,
    status: WritableValue<Status>,
    disposed: Rc<Cell<bool>>,
    binding: BindingId,
    explicit: bool,
    validate_only: bool,
}

impl<S: Clone + 'static, D: Clone + 'static> SetUpdate<S, D> {
    fn run(self, diff: Option<SetDiff<S>>) {
        if !should_run(self.strategy.policy().into(), self.explicit) {
            return;
        }
        let realm = self.source.realm();
        realm.exec(Box::new(move || self.in_source_realm(diff)));
    }

    fn in_source_realm(self, diff: Option<SetDiff<S>>) {
        if self.disposed.get() {
            return;
        }
        let resync = diff.is_none();
        let diff = diff.unwrap_or_else(|| SetDiff::inserting(self.source.elements()));

        if self.validate_only {
            let mut collector = StatusCollector::accumulating();
            for element in diff.additions() {
                if let Err(err) = self.strategy.convert(element) {
                    collector.merge(Status::from_error(err));
                }
            }
            return publish_status(&self.status, collector.finish(), self.binding);
        }

        let realm = self.destination.realm();
        realm.exec(Box::new(move || {
            if self.disposed.get() {
                return;
            }
            let status = {
                let _echo = EchoGuard::raise(&self.echo);
                self.apply(&diff, resync)
            };
            publish_status(&self.status, status, self.binding);
        }));
    }

    /// Removals first, then additions; each element on its own.
    fn apply(&self, diff: &SetDiff<S>, resync: bool) -> Status {
        let mut collector = StatusCollector::accumulating();
        let destination = &*self.destination;
        if resync {
            if let Err(err) = destination.clear() {
                collector.merge(Status::from_error(err));
            }
        }
        for element in diff.removals() {
            let status = match self.strategy.convert(element) {
                Ok(converted) => self.strategy.do_remove(destination, converted),
                Err(err) => Status::from_error(err),
            };
            collector.merge(status);
        }
        for element in diff.additions() {
            let status = match self.strategy.convert(element) {
                Ok(converted) => self.strategy.do_add(destination, converted),
                Err(err) => Status::from_error(err),
            };
            collector.merge(status);
        }
        collector.finish()
    }
}

#[cfg(test)]
mod tests {
    use tether_core::{CurrentRealm, QueuedRealm, Severity, WritableSet};

    use crate::{ConversionError, converter_fn};

    use super::*;

    fn context() -> DataBindingContext {
        DataBindingContext::with_realm(CurrentRealm::shared())
    }

    #[test]
    fn model_contents_reach_target() {
        let realm = CurrentRealm::shared();
        let ctx = context();
        let target = WritableSet::with_elements(Rc::clone(&realm), ["stale"]);
        let model = WritableSet::with_elements(realm, ["a", "b"]);
        ctx.bind_set(&target, &model, None, None).unwrap();
        assert_eq!(target.elements(), vec!["a", "b"]);

        model.remove(&"a").unwrap();
        model.insert("c").unwrap();
        assert_eq!(target.elements(), vec!["b", "c"]);
    }

    #[test]
    fn failed_element_does_not_stop_the_rest() {
        let realm = CurrentRealm::shared();
        let ctx = context();
        let target = WritableSet::<String>::new(Rc::clone(&realm));
        let model = WritableSet::<i32>::new(realm);
        let m2t = UpdateSetStrategy::<i32, String>::default().with_converter(converter_fn(
            |v: &i32| {
                if *v < 0 {
                    Err(ConversionError::new("negative"))
                } else {
                    Ok(v.to_string())
                }
            },
        ));
        let t2m = UpdateSetStrategy::<String, i32>::never();
        let binding = ctx.bind_set(&target, &model, Some(t2m), Some(m2t)).unwrap();

        model.set_all([1, -2, 3]).unwrap();
        assert_eq!(target.elements(), vec!["1".to_string(), "3".to_string()]);
        let status = binding.validation_status().get();
        assert_eq!(status.severity(), Severity::Error);
        assert_eq!(status.children().len(), 1);
    }

    #[test]
    fn on_request_waits_for_explicit_update() {
        let realm = CurrentRealm::shared();
        let ctx = context();
        let target = WritableSet::<u8>::new(Rc::clone(&realm));
        let model = WritableSet::with_elements(realm, [1u8]);
        let binding = ctx
            .bind_set(
                &target,
                &model,
                Some(UpdateSetStrategy::never()),
                Some(UpdateSetStrategy::on_request()),
            )
            .unwrap();
        assert!(target.is_empty());
        model.insert(2).unwrap();
        assert!(target.is_empty());
        binding.update_model_to_target();
        assert_eq!(target.len(), 2);
    }

    #[test]
    fn disposed_binding_drops_queued_changes() {
        let ui = QueuedRealm::new();
        let data = CurrentRealm::shared();
        let ctx = DataBindingContext::with_realm(Rc::clone(&data));
        let target = WritableSet::<u8>::new(ui.clone());
        let model = WritableSet::with_elements(data, [1u8]);
        let binding = ctx.bind_set(&target, &model, None, None).unwrap();
        ui.drain();
        assert_eq!(target.elements(), vec![1]);

        model.insert(2).unwrap();
        binding.dispose();
        ui.drain();
        assert_eq!(target.elements(), vec![1]);
    }
}
