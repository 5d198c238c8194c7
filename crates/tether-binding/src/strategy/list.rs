#![forbid(unsafe_code)]

use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

use tether_core::{ObservableError, ObservableList, Status, ValueType};

use super::value::check_declared;
use crate::convert::{Converter, ConverterRegistry, identity_cast};
use crate::error::{BindingError, ConversionError};
use crate::policy::CollectionPolicy;

type AddFn<D> = dyn Fn(&dyn ObservableList<D>, usize, D) -> Result<(), ObservableError>;
type RemoveFn<D> = dyn Fn(&dyn ObservableList<D>, usize) -> Result<(), ObservableError>;
type MoveFn<D> = dyn Fn(&dyn ObservableList<D>, usize, usize) -> Result<(), ObservableError>;

/// One direction of a list binding.
///
/// Elements are converted one at a time and applied with the add, remove,
/// move, and replace operations. Each operation can be replaced with a hook.
///
/// When [`uses_move_and_replace`](Self::uses_move_and_replace) is `false`,
/// moves and replaces reach the destination as a remove followed by an add,
/// so custom add/remove hooks see every change. Setting an add, remove, or
/// replace hook turns this off unless the flag was set explicitly.
pub struct UpdateListStrategy<S, D> {
    policy: CollectionPolicy,
    provide_default_converter: bool,
    use_move_and_replace: Option<bool>,
    converter: Option<Rc<dyn Converter<S, D>>>,
    add: Option<Rc<AddFn<D>>>,
    remove: Option<Rc<RemoveFn<D>>>,
    move_element: Option<Rc<MoveFn<D>>>,
    replace: Option<Rc<AddFn<D>>>,
}

impl<S, D> Clone for UpdateListStrategy<S, D> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy,
            provide_default_converter: self.provide_default_converter,
            use_move_and_replace: self.use_move_and_replace,
            converter: self.converter.clone(),
            add: self.add.clone(),
            remove: self.remove.clone(),
            move_element: self.move_element.clone(),
            replace: self.replace.clone(),
        }
    }
}

impl<S, D> fmt::Debug for UpdateListStrategy<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateListStrategy")
            .field("policy", &self.policy)
            .field("converter", &self.converter.is_some())
            .field("use_move_and_replace", &self.use_move_and_replace)
            .finish()
    }
}

impl<S: Clone + 'static, D: Clone + 'static> Default for UpdateListStrategy<S, D> {
    fn default() -> Self {
        Self::new(CollectionPolicy::Update)
    }
}

impl<S: Clone + 'static, D: Clone + 'static> UpdateListStrategy<S, D> {
    /// A strategy with `policy` and no hooks.
    #[must_use]
    pub fn new(policy: CollectionPolicy) -> Self {
        Self {
            policy,
            provide_default_converter: true,
            use_move_and_replace: None,
            converter: None,
            add: None,
            remove: None,
            move_element: None,
            replace: None,
        }
    }

    /// A strategy that never propagates.
    #[must_use]
    pub fn never() -> Self {
        Self::new(CollectionPolicy::Never)
    }

    /// A strategy that propagates only on explicit request.
    #[must_use]
    pub fn on_request() -> Self {
        Self::new(CollectionPolicy::OnRequest)
    }

    /// Whether a missing converter may be taken from the registry.
    #[must_use]
    pub fn with_default_converter(mut self, provide: bool) -> Self {
        self.provide_default_converter = provide;
        self
    }

    /// Apply moves and replaces as such (`true`) or as remove + add (`false`).
    ///
    /// When not set, the context's configured default applies, or `false`
    /// once an element hook is installed.
    #[must_use]
    pub fn with_move_and_replace(mut self, enabled: bool) -> Self {
        self.use_move_and_replace = Some(enabled);
        self
    }

    /// Convert elements with `converter`.
    #[must_use]
    pub fn with_converter(mut self, converter: impl Converter<S, D> + 'static) -> Self {
        self.converter = Some(Rc::new(converter));
        self
    }

    /// Insert into the destination with `hook`.
    #[must_use]
    pub fn with_add(
        mut self,
        hook: impl Fn(&dyn ObservableList<D>, usize, D) -> Result<(), ObservableError> + 'static,
    ) -> Self {
        self.add = Some(Rc::new(hook));
        self
    }

    /// Remove from the destination with `hook`.
    #[must_use]
    pub fn with_remove(
        mut self,
        hook: impl Fn(&dyn ObservableList<D>, usize) -> Result<(), ObservableError> + 'static,
    ) -> Self {
        self.remove = Some(Rc::new(hook));
        self
    }

    /// Move within the destination with `hook`.
    #[must_use]
    pub fn with_move<F>(mut self, hook: F) -> Self
    where
        F: Fn(&dyn ObservableList<D>, usize, usize) -> Result<(), ObservableError> + 'static,
    {
        self.move_element = Some(Rc::new(hook));
        self
    }

    /// Replace within the destination with `hook`.
    #[must_use]
    pub fn with_replace(
        mut self,
        hook: impl Fn(&dyn ObservableList<D>, usize, D) -> Result<(), ObservableError> + 'static,
    ) -> Self {
        self.replace = Some(Rc::new(hook));
        self
    }

    /// The update policy.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> CollectionPolicy {
        self.policy
    }

    /// Whether moves and replaces are applied as such.
    #[must_use]
    pub fn uses_move_and_replace(&self) -> bool {
        self.use_move_and_replace.unwrap_or_else(|| !self.has_element_hooks())
    }

    fn has_element_hooks(&self) -> bool {
        self.add.is_some() || self.remove.is_some() || self.replace.is_some()
    }

    /// Convert one element.
    pub fn convert(&self, element: &S) -> Result<D, ConversionError> {
        match &self.converter {
            Some(converter) => converter.convert(element),
            None => identity_cast(element),
        }
    }

    /// Insert `element` at `index`.
    pub fn do_add(&self, destination: &dyn ObservableList<D>, index: usize, element: D) -> Status {
        to_status(match &self.add {
            Some(hook) => hook(destination, index, element),
            None => destination.insert(index, element),
        })
    }

    /// Remove the element at `index`.
    pub fn do_remove(&self, destination: &dyn ObservableList<D>, index: usize) -> Status {
        to_status(match &self.remove {
            Some(hook) => hook(destination, index),
            None => destination.remove(index).map(drop),
        })
    }

    /// Move the element at `from` to `to`.
    pub fn do_move(&self, destination: &dyn ObservableList<D>, from: usize, to: usize) -> Status {
        to_status(match &self.move_element {
            Some(hook) => hook(destination, from, to),
            None => destination.move_element(from, to).map(drop),
        })
    }

    /// Replace the element at `index`.
    pub fn do_replace(
        &self,
        destination: &dyn ObservableList<D>,
        index: usize,
        element: D,
    ) -> Status {
        to_status(match &self.replace {
            Some(hook) => hook(destination, index, element),
            None => destination.replace(index, element).map(drop),
        })
    }

    pub(crate) fn fill_defaults(
        &mut self,
        source: Option<ValueType>,
        destination: Option<ValueType>,
        converters: &ConverterRegistry,
        use_move_and_replace: bool,
    ) -> Result<(), BindingError> {
        if self.use_move_and_replace.is_none() {
            self.use_move_and_replace = Some(use_move_and_replace && !self.has_element_hooks());
        }
        if self.converter.is_none()
            && self.provide_default_converter
            && TypeId::of::<S>() != TypeId::of::<D>()
        {
            self.converter = Some(converters.lookup::<S, D>().ok_or(
                BindingError::MissingConverter {
                    from: ValueType::of::<S>(),
                    to: ValueType::of::<D>(),
                },
            )?);
        }
        if let Some(converter) = &self.converter {
            check_declared(converter.from_type(), source)?;
            check_declared(converter.to_type(), destination)?;
        }
        Ok(())
    }
}

pub(super) fn to_status(result: Result<(), ObservableError>) -> Status {
    match result {
        Ok(()) => Status::ok(),
        Err(err) => Status::from_error(err),
    }
}
