#![forbid(unsafe_code)]

use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

use tether_core::{ObservableError, ObservableSet, Status, ValueType};

use super::list::to_status;
use super::value::check_declared;
use crate::convert::{Converter, ConverterRegistry, identity_cast};
use crate::error::{BindingError, ConversionError};
use crate::policy::CollectionPolicy;

type SetOpFn<D> = dyn Fn(&dyn ObservableSet<D>, D) -> Result<(), ObservableError>;

/// One direction of a set binding.
///
/// Removals are applied before additions; each element is converted and
/// applied on its own.
pub struct UpdateSetStrategy<S, D> {
    policy: CollectionPolicy,
    provide_default_converter: bool,
    converter: Option<Rc<dyn Converter<S, D>>>,
    add: Option<Rc<SetOpFn<D>>>,
    remove: Option<Rc<SetOpFn<D>>>,
}

impl<S, D> Clone for UpdateSetStrategy<S, D> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy,
            provide_default_converter: self.provide_default_converter,
            converter: self.converter.clone(),
            add: self.add.clone(),
            remove: self.remove.clone(),
        }
    }
}

impl<S, D> fmt::Debug for UpdateSetStrategy<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateSetStrategy")
            .field("policy", &self.policy)
            .field("converter", &self.converter.is_some())
            .finish()
    }
}

impl<S: Clone + 'static, D: Clone + 'static> Default for UpdateSetStrategy<S, D> {
    fn default() -> Self {
        Self::new(CollectionPolicy::Update)
    }
}

impl<S: Clone + 'static, D: Clone + 'static> UpdateSetStrategy<S, D> {
    /// A strategy with `policy` and no hooks.
    #[must_use]
    pub fn new(policy: CollectionPolicy) -> Self {
        Self {
            policy,
            provide_default_converter: true,
            converter: None,
            add: None,
            remove: None,
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

    /// Convert elements with `converter`.
    #[must_use]
    pub fn with_converter(mut self, converter: impl Converter<S, D> + 'static) -> Self {
        self.converter = Some(Rc::new(converter));
        self
    }

    /// Add to the destination with `hook`.
    #[must_use]
    pub fn with_add(
        mut self,
        hook: impl Fn(&dyn ObservableSet<D>, D) -> Result<(), ObservableError> + 'static,
    ) -> Self {
        self.add = Some(Rc::new(hook));
        self
    }

    /// Remove from the destination with `hook`.
    #[must_use]
    pub fn with_remove(
        mut self,
        hook: impl Fn(&dyn ObservableSet<D>, D) -> Result<(), ObservableError> + 'static,
    ) -> Self {
        self.remove = Some(Rc::new(hook));
        self
    }

    /// The update policy.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> CollectionPolicy {
        self.policy
    }

    /// Convert one element.
    pub fn convert(&self, element: &S) -> Result<D, ConversionError> {
        match &self.converter {
            Some(converter) => converter.convert(element),
            None => identity_cast(element),
        }
    }

    /// Add `element` to `destination`.
    pub fn do_add(&self, destination: &dyn ObservableSet<D>, element: D) -> Status {
        to_status(match &self.add {
            Some(hook) => hook(destination, element),
            None => destination.insert(element).map(drop),
        })
    }

    /// Remove `element` from `destination`.
    pub fn do_remove(&self, destination: &dyn ObservableSet<D>, element: D) -> Status {
        to_status(match &self.remove {
            Some(hook) => hook(destination, element),
            None => destination.remove(&element).map(drop),
        })
    }

    pub(crate) fn fill_defaults(
        &mut self,
        source: Option<ValueType>,
        destination: Option<ValueType>,
        converters: &ConverterRegistry,
    ) -> Result<(), BindingError> {
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

#[cfg(test)]
mod tests {
    use tether_core::{CurrentRealm, WritableSet};

    use super::*;

    #[test]
    fn default_operations_hit_the_set() {
        let set = WritableSet::with_elements(CurrentRealm::shared(), ["a".to_string()]);
        let strategy = UpdateSetStrategy::<String, String>::default();
        assert!(strategy.do_add(&set, "b".into()).is_ok());
        assert!(strategy.do_remove(&set, "a".into()).is_ok());
        assert_eq!(set.elements(), vec!["b".to_string()]);
    }

    #[test]
    fn disposed_destination_reports_error() {
        let set = WritableSet::<u8>::new(CurrentRealm::shared());
        tether_core::Observable::dispose(&set);
        let strategy = UpdateSetStrategy::<u8, u8>::default();
        assert!(!strategy.do_add(&set, 1).is_ok());
    }

    #[test]
    fn converter_from_registry() {
        let mut strategy = UpdateSetStrategy::<u8, u32>::default();
        strategy
            .fill_defaults(None, None, ConverterRegistry::global())
            .unwrap();
        assert_eq!(strategy.convert(&7).unwrap(), 7u32);
    }
}
