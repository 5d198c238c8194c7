#![forbid(unsafe_code)]

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tether_core::{
    ListDiff, ListDiffEntry, ListDiffVisitor, ObservableList, ObservableRef, Status, Subscription,
    WritableValue,
};

use super::{Binding, BindingCore, BindingId, EchoGuard, Lifecycle, publish_status};
use crate::context::DataBindingContext;
use crate::policy::{CollectionPolicy, should_run};
use crate::strategy::{StatusCollector, UpdateListStrategy};

/// Synchronises two observable lists.
pub(crate) struct ListBinding<T, M> {
    core: BindingCore,
    target: RefCell<Option<Rc<dyn ObservableList<T>>>>,
    model: RefCell<Option<Rc<dyn ObservableList<M>>>>,
    target_to_model: UpdateListStrategy<T, M>,
    model_to_target: UpdateListStrategy<M, T>,
    updating_target: Rc<Cell<bool>>,
    updating_model: Rc<Cell<bool>>,
    target_alignment: Alignment,
    model_alignment: Alignment,
    listeners: RefCell<Vec<Subscription>>,
}

/// For each source position, whether that element is in the destination.
type Alignment = Rc<RefCell<Vec<bool>>>;

impl<T: Clone + PartialEq + 'static, M: Clone + PartialEq + 'static> ListBinding<T, M> {
    pub(crate) fn new(
        target: Rc<dyn ObservableList<T>>,
        model: Rc<dyn ObservableList<M>>,
        target_to_model: UpdateListStrategy<T, M>,
        model_to_target: UpdateListStrategy<M, T>,
        context: &DataBindingContext,
    ) -> Rc<Self> {
        Rc::new(Self {
            core: BindingCore::new("list", context),
            target: RefCell::new(Some(target)),
            model: RefCell::new(Some(model)),
            target_to_model,
            model_to_target,
            updating_target: Rc::new(Cell::new(false)),
            updating_model: Rc::new(Cell::new(false)),
            target_alignment: Rc::default(),
            model_alignment: Rc::default(),
            listeners: RefCell::new(Vec::new()),
        })
    }

    fn endpoints(&self) -> Option<(Rc<dyn ObservableList<T>>, Rc<dyn ObservableList<M>>)> {
        let target = self.target.borrow().clone()?;
        let model = self.model.borrow().clone()?;
        Some((target, model))
    }

    /// Propagate target to model. `diff` is `None` for a full resync.
    fn run_target_to_model(&self, diff: Option<ListDiff<T>>, explicit: bool, validate_only: bool) {
        let Some((target, model)) = self.endpoints() else {
            return;
        };
        ListUpdate {
            source: target,
            destination: model,
            strategy: self.target_to_model.clone(),
            echo: Rc::clone(&self.updating_model),
            alignment: Rc::clone(&self.model_alignment),
            reverse: Rc::clone(&self.target_alignment),
            status: self.core.status(),
            disposed: self.core.disposed_flag(),
            binding: self.core.id(),
            explicit,
            validate_only,
        }
        .run(diff);
    }

    fn run_model_to_target(&self, diff: Option<ListDiff<M>>, explicit: bool, validate_only: bool) {
        let Some((target, model)) = self.endpoints() else {
            return;
        };
        ListUpdate {
            source: model,
            destination: target,
            strategy: self.model_to_target.clone(),
            echo: Rc::clone(&self.updating_target),
            alignment: Rc::clone(&self.target_alignment),
            reverse: Rc::clone(&self.model_alignment),
            status: self.core.status(),
            disposed: self.core.disposed_flag(),
            binding: self.core.id(),
            explicit,
            validate_only,
        }
        .run(diff);
    }
}

impl<T, M> fmt::Debug for ListBinding<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListBinding")
            .field("core", &self.core)
            .field("target_to_model", &self.target_to_model)
            .field("model_to_target", &self.model_to_target)
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static, M: Clone + PartialEq + 'static> Binding for ListBinding<T, M> {
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

impl<T: Clone + PartialEq + 'static, M: Clone + PartialEq + 'static> Lifecycle
    for ListBinding<T, M>
{
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
            let sub = target.add_change_listener(Box::new(move |diff: &ListDiff<T>| {
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
            let sub = model.add_change_listener(Box::new(move |diff: &ListDiff<M>| {
                if let Some(binding) = weak.upgrade() {
                    if !binding.updating_model.get() {
                        binding.run_model_to_target(Some(diff.clone()), false, false);
                    }
                }
            }));
            self.listeners.borrow_mut().push(sub);
        }

        if m2t == CollectionPolicy::Update {
            self.run_model_to_target(None, true, false);
        }
        if t2m == CollectionPolicy::Update {
            if m2t == CollectionPolicy::Never {
                self.run_target_to_model(None, true, false);
            } else {
                self.run_target_to_model(None, true, true);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

struct ListUpdate<S, D> {
    source: Rc<dyn ObservableList<S>>,
    destination: Rc<dyn ObservableList<D>>,
    strategy: UpdateListStrategy<S, D>,
    echo: Rc<Cell<bool>>,
    alignment: Alignment,
    reverse: Alignment,
    status: WritableValue<Status>,
    disposed: Rc<Cell<bool>>,
    binding: BindingId,
    explicit: bool,
    validate_only: bool,
}

impl<S: Clone + PartialEq + 'static, D: Clone + PartialEq + 'static> ListUpdate<S, D> {
    fn run(self, diff: Option<ListDiff<S>>) {
        if !should_run(self.strategy.policy().into(), self.explicit) {
            return;
        }
        let realm = self.source.realm();
        realm.exec(Box::new(move || self.in_source_realm(diff)));
    }

    fn in_source_realm(self, diff: Option<ListDiff<S>>) {
        if self.disposed.get() {
            return;
        }
        let prior_len = diff.as_ref().map(|diff| length_before(self.source.len(), diff));
        let diff = diff.unwrap_or_else(|| ListDiff::inserting(self.source.elements()));

        if self.validate_only {
            let mut collector = StatusCollector::accumulating();
            for entry in diff.entries() {
                if let ListDiffEntry::Add { element, .. } = entry {
                    if let Err(err) = self.strategy.convert(element) {
                        collector.merge(Status::from_error(err));
                    }
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
                self.apply(&diff, prior_len)
            };
            publish_status(&self.status, status, self.binding);
        }));
    }

    /// Replay `diff` onto the destination.
    ///
    /// `prior_len` is the source length before an incremental `diff`; `None`
    /// means a resync, which clears the destination and the alignment first.
    fn apply(&self, diff: &ListDiff<S>, prior_len: Option<usize>) -> Status {
        let mut collector = StatusCollector::accumulating();
        let destination = &*self.destination;
        let kept = self.alignment.take();
        let present = match prior_len {
            None => match destination.clear() {
                Ok(()) => Vec::new(),
                Err(err) => {
                    collector.merge(Status::from_error(err));
                    vec![true; destination.len()]
                }
            },
            Some(len) if kept.len() == len => kept,
            Some(_) => vec![true; destination.len()],
        };
        let mut applier = ListApplier {
            strategy: &self.strategy,
            destination,
            present,
            collector,
        };
        if self.strategy.uses_move_and_replace() {
            diff.accept(&mut applier);
        } else {
            for entry in diff.entries() {
                match entry {
                    ListDiffEntry::Add { index, element } => applier.handle_add(*index, element),
                    ListDiffEntry::Remove { index, element } => {
                        applier.handle_remove(*index, element)
                    }
                }
            }
        }
        *self.alignment.borrow_mut() = applier.present;
        // Writing the destination shifts the other direction's source.
        self.reverse.borrow_mut().clear();
        applier.collector.finish()
    }
}

/// Source length before `diff` was applied, given the length after.
fn length_before<S>(len: usize, diff: &ListDiff<S>) -> usize {
    diff.entries().iter().fold(len, |len, entry| match entry {
        ListDiffEntry::Add { .. } => len.saturating_sub(1),
        ListDiffEntry::Remove { .. } => len + 1,
    })
}

/// Applies converted diff entries to the destination list.
///
/// `present` mirrors the source positions; an entry is `false` when its
/// element failed to convert or to be written, so source indices can be
/// translated into destination positions. It outlives a single diff, and
/// removing an absent element leaves the destination untouched.
struct ListApplier<'a, S, D> {
    strategy: &'a UpdateListStrategy<S, D>,
    destination: &'a dyn ObservableList<D>,
    present: Vec<bool>,
    collector: StatusCollector,
}

impl<S: Clone + 'static, D: Clone + 'static> ListApplier<'_, S, D> {
    /// Destination position of source position `index`.
    fn position(&self, index: usize) -> usize {
        self.present[..index.min(self.present.len())]
            .iter()
            .filter(|present| **present)
            .count()
    }

    fn record(&mut self, status: Status) -> bool {
        let ok = status.is_ok();
        self.collector.merge(status);
        ok
    }
}

impl<S: Clone + 'static, D: Clone + 'static> ListDiffVisitor<S> for ListApplier<'_, S, D> {
    fn handle_add(&mut self, index: usize, element: &S) {
        let at = self.position(index);
        let slot = index.min(self.present.len());
        let added = match self.strategy.convert(element) {
            Ok(converted) => {
                let status = self.strategy.do_add(self.destination, at, converted);
                self.record(status)
            }
            Err(err) => self.record(Status::from_error(err)),
        };
        self.present.insert(slot, added);
    }

    fn handle_remove(&mut self, index: usize, _element: &S) {
        if index >= self.present.len() {
            return;
        }
        if self.present.remove(index) {
            let at = self.position(index);
            let status = self.strategy.do_remove(self.destination, at);
            self.record(status);
        }
    }

    fn handle_move(&mut self, old_index: usize, new_index: usize, element: &S) {
        if !self.present.get(old_index).copied().unwrap_or(false) {
            self.handle_remove(old_index, element);
            self.handle_add(new_index, element);
            return;
        }
        let from = self.position(old_index);
        self.present.remove(old_index);
        let to = self.position(new_index);
        let moved = self.strategy.do_move(self.destination, from, to);
        let ok = self.record(moved);
        self.present.insert(new_index.min(self.present.len()), ok);
    }

    fn handle_replace(&mut self, index: usize, old_element: &S, new_element: &S) {
        if !self.present.get(index).copied().unwrap_or(false) {
            self.handle_remove(index, old_element);
            self.handle_add(index, new_element);
            return;
        }
        let at = self.position(index);
        let replaced = match self.strategy.convert(new_element) {
            Ok(converted) => {
                let status = self.strategy.do_replace(self.destination, at, converted);
                self.record(status)
            }
            Err(err) => self.record(Status::from_error(err)),
        };
        // The old element is still there; drop it so positions stay aligned.
        if !replaced && self.strategy.do_remove(self.destination, at).is_ok() {
            self.present[index] = false;
        }
    }
}
