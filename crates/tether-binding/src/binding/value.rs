#![forbid(unsafe_code)]

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tether_core::{
    ObservableRef, ObservableValue, Status, Subscription, ValueDiff, WritableValue,
};

use super::{Binding, BindingCore, BindingId, EchoGuard, Lifecycle, publish_status};
use crate::context::DataBindingContext;
use crate::policy::{UpdatePolicy, should_run};
use crate::strategy::{StatusCollector, UpdateValueStrategy};

/// Synchronises two observable values.
pub(crate) struct ValueBinding<T, M> {
    core: BindingCore,
    target: RefCell<Option<Rc<dyn ObservableValue<T>>>>,
    model: RefCell<Option<Rc<dyn ObservableValue<M>>>>,
    target_to_model: UpdateValueStrategy<T, M>,
    model_to_target: UpdateValueStrategy<M, T>,
    updating_target: Rc<Cell<bool>>,
    updating_model: Rc<Cell<bool>>,
    listeners: RefCell<Vec<Subscription>>,
}

impl<T: Clone + 'static, M: Clone + 'static> ValueBinding<T, M> {
    pub(crate) fn new(
        target: Rc<dyn ObservableValue<T>>,
        model: Rc<dyn ObservableValue<M>>,
        target_to_model: UpdateValueStrategy<T, M>,
        model_to_target: UpdateValueStrategy<M, T>,
        context: &DataBindingContext,
    ) -> Rc<Self> {
        Rc::new(Self {
            core: BindingCore::new("value", context),
            target: RefCell::new(Some(target)),
            model: RefCell::new(Some(model)),
            target_to_model,
            model_to_target,
            updating_target: Rc::new(Cell::new(false)),
            updating_model: Rc::new(Cell::new(false)),
            listeners: RefCell::new(Vec::new()),
        })
    }

    fn endpoints(
        &self,
    ) -> Option<(Rc<dyn ObservableValue<T>>, Rc<dyn ObservableValue<M>>)> {
        let target = self.target.borrow().clone()?;
        let model = self.model.borrow().clone()?;
        Some((target, model))
    }

    fn run_target_to_model(&self, explicit: bool, validate_only: bool) {
        let Some((target, model)) = self.endpoints() else {
            return;
        };
        ValueUpdate {
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
        .run();
    }

    fn run_model_to_target(&self, explicit: bool, validate_only: bool) {
        let Some((target, model)) = self.endpoints() else {
            return;
        };
        ValueUpdate {
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
        .run();
    }
}

impl<T, M> fmt::Debug for ValueBinding<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueBinding")
            .field("core", &self.core)
            .field("target_to_model", &self.target_to_model)
            .field("model_to_target", &self.model_to_target)
            .finish()
    }
}

impl<T: Clone + 'static, M: Clone + 'static> Binding for ValueBinding<T, M> {
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
        self.run_target_to_model(true, false);
    }

    fn update_model_to_target(&self) {
        self.run_model_to_target(true, false);
    }

    fn validate_target_to_model(&self) {
        self.run_target_to_model(true, true);
    }

    fn validate_model_to_target(&self) {
        self.run_model_to_target(true, true);
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

impl<T: Clone + 'static, M: Clone + 'static> Lifecycle for ValueBinding<T, M> {
    fn core(&self) -> &BindingCore {
        &self.core
    }

    fn post_init(self: &Rc<Self>) {
        let Some((target, model)) = self.endpoints() else {
            return;
        };
        let t2m = self.target_to_model.policy();
        let m2t = self.model_to_target.policy();

        if t2m.is_automatic() {
            let weak = Rc::downgrade(self);
            let sub = target.add_change_listener(Box::new(move |_: &ValueDiff<T>| {
                if let Some(binding) = weak.upgrade() {
                    if !binding.updating_target.get() {
                        binding.run_target_to_model(false, false);
                    }
                }
            }));
            self.listeners.borrow_mut().push(sub);
        }
        if m2t.is_automatic() {
            let weak = Rc::downgrade(self);
            let sub = model.add_change_listener(Box::new(move |_: &ValueDiff<M>| {
                if let Some(binding) = weak.upgrade() {
                    if !binding.updating_model.get() {
                        binding.run_model_to_target(false, false);
                    }
                }
            }));
            self.listeners.borrow_mut().push(sub);
        }

        if m2t.is_automatic() {
            self.run_model_to_target(true, false);
        }
        if t2m.is_automatic() {
            if m2t == UpdatePolicy::Never {
                self.run_target_to_model(true, false);
            } else {
                self.run_target_to_model(true, true);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// One run of a value pipeline in one direction.
struct ValueUpdate<S, D> {
    source: Rc<dyn ObservableValue<S>>,
    destination: Rc<dyn ObservableValue<D>>,
    strategy: UpdateValueStrategy<S, D>,
    echo: Rc<Cell<bool>>,
    status: WritableValue<Status>,
    disposed: Rc<Cell<bool>>,
    binding: BindingId,
    explicit: bool,
    validate_only: bool,
}

impl<S: Clone + 'static, D: Clone + 'static> ValueUpdate<S, D> {
    fn run(self) {
        if !should_run(self.strategy.policy(), self.explicit) {
            return;
        }
        let realm = self.source.realm();
        realm.exec(Box::new(move || self.in_source_realm()));
    }

    /// Steps 1 to 4, on the source's realm.
    fn in_source_realm(self) {
        if self.disposed.get() {
            return;
        }
        let value = self.source.value();
        let mut collector = StatusCollector::aborting();

        if !collector.merge(self.strategy.validate_after_get(&value)) {
            return self.finish(collector);
        }
        let converted = match self.strategy.convert(&value) {
            Ok(converted) => converted,
            Err(err) => {
                collector.merge(Status::from_error(err));
                return self.finish(collector);
            }
        };
        if !collector.merge(self.strategy.validate_after_convert(&converted)) {
            return self.finish(collector);
        }
        if self.strategy.policy() == UpdatePolicy::Convert && !self.explicit {
            return self.finish(collector);
        }
        if !collector.merge(self.strategy.validate_before_set(&converted)) || self.validate_only {
            return self.finish(collector);
        }

        let realm = self.destination.realm();
        realm.exec(Box::new(move || {
            if self.disposed.get() {
                return;
            }
            let written = {
                let _echo = EchoGuard::raise(&self.echo);
                self.strategy.do_set(&*self.destination, converted)
            };
            collector.merge(written);
            self.finish(collector);
        }));
    }

    fn finish(&self, collector: StatusCollector) {
        publish_status(&self.status, collector.finish(), self.binding);
    }
}

#[cfg(test)]
mod tests {
    use tether_core::{CurrentRealm, Severity};

    use crate::validator_fn;

    use super::*;

    fn context() -> DataBindingContext {
        DataBindingContext::with_realm(CurrentRealm::shared())
    }

    #[test]
    fn initial_model_value_reaches_target() {
        let realm = CurrentRealm::shared();
        let ctx = context();
        let target = WritableValue::new(Rc::clone(&realm), String::new());
        let model = WritableValue::new(realm, 42i32);
        ctx.bind_value(&target, &model, None, None).unwrap();
        assert_eq!(target.get(), "42");
    }

    #[test]
    fn convert_policy_validates_without_writing() {
        let realm = CurrentRealm::shared();
        let ctx = context();
        let target = WritableValue::new(Rc::clone(&realm), 1i32);
        let model = WritableValue::new(realm, 1i32);
        let t2m = UpdateValueStrategy::new(UpdatePolicy::Convert).with_after_convert_validator(
            validator_fn(|v: &i32| {
                if *v > 10 { Status::warning("large") } else { Status::ok() }
            }),
        );
        let binding = ctx.bind_value(&target, &model, Some(t2m), None).unwrap();

        target.set(50).unwrap();
        assert_eq!(model.get(), 1);
        assert_eq!(binding.validation_status().get().severity(), Severity::Warning);

        binding.update_target_to_model();
        assert_eq!(model.get(), 50);
    }

    #[test]
    fn validate_only_leaves_destination_alone() {
        let realm = CurrentRealm::shared();
        let ctx = context();
        let target = WritableValue::new(Rc::clone(&realm), 0i32);
        let model = WritableValue::new(realm, 0i32);
        let binding = ctx
            .bind_value(
                &target,
                &model,
                Some(UpdateValueStrategy::on_request()),
                Some(UpdateValueStrategy::never()),
            )
            .unwrap();
        target.set(3).unwrap();
        binding.validate_target_to_model();
        assert_eq!(model.get(), 0);
        assert!(binding.validation_status().get().is_ok());
    }

    #[test]
    fn disposed_binding_stops_listening() {
        let realm = CurrentRealm::shared();
        let ctx = context();
        let target = WritableValue::new(Rc::clone(&realm), 0i32);
        let model = WritableValue::new(realm, 0i32);
        let binding = ctx.bind_value(&target, &model, None, None).unwrap();
        binding.dispose();
        assert!(binding.target().is_none());
        target.set(9).unwrap();
        assert_eq!(model.get(), 0);
        assert_eq!(target.listener_count(), 0);
    }
}
