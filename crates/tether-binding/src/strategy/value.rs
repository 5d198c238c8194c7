#![forbid(unsafe_code)]

use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

use tether_core::{ObservableError, ObservableValue, Status, ValueType};

use crate::convert::{Converter, ConverterRegistry, identity_cast};
use crate::error::{BindingError, ConversionError};
use crate::policy::UpdatePolicy;
use crate::validate::{Validator, ValidatorRegistry};

type Setter<D> = dyn Fn(&dyn ObservableValue<D>, D) -> Result<(), ObservableError>;

/// One direction of a value binding, from a source of type `S` to a
/// destination of type `D`.
///
/// The pipeline runs five steps in order:
///
/// 1. [`validate_after_get`](Self::validate_after_get) on the raw source value
/// 2. [`convert`](Self::convert) to the destination type
/// 3. [`validate_after_convert`](Self::validate_after_convert)
/// 4. [`validate_before_set`](Self::validate_before_set)
/// 5. [`do_set`](Self::do_set) on the destination
///
/// The [`UpdatePolicy`] is fixed at construction.
///
/// # Example
///
/// ```
/// use tether_binding::{UpdatePolicy, UpdateValueStrategy, validator_fn};
/// use tether_core::Status;
///
/// let strategy = UpdateValueStrategy::<String, String>::new(UpdatePolicy::Update)
///     .with_after_get_validator(validator_fn(|v: &String| {
///         if v.is_empty() { Status::error("required") } else { Status::ok() }
///     }));
/// assert!(!strategy.validate_after_get(&String::new()).is_ok());
/// ```
pub struct UpdateValueStrategy<S, D> {
    policy: UpdatePolicy,
    provide_default_converter: bool,
    converter: Option<Rc<dyn Converter<S, D>>>,
    after_get: Option<Rc<dyn Validator<S>>>,
    after_convert: Option<Rc<dyn Validator<D>>>,
    before_set: Option<Rc<dyn Validator<D>>>,
    setter: Option<Rc<Setter<D>>>,
}

impl<S, D> Clone for UpdateValueStrategy<S, D> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy,
            provide_default_converter: self.provide_default_converter,
            converter: self.converter.clone(),
            after_get: self.after_get.clone(),
            after_convert: self.after_convert.clone(),
            before_set: self.before_set.clone(),
            setter: self.setter.clone(),
        }
    }
}

impl<S, D> fmt::Debug for UpdateValueStrategy<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateValueStrategy")
            .field("policy", &self.policy)
            .field("converter", &self.converter.is_some())
            .field("after_get", &self.after_get.is_some())
            .field("after_convert", &self.after_convert.is_some())
            .field("before_set", &self.before_set.is_some())
            .field("setter", &self.setter.is_some())
            .finish()
    }
}

impl<S: Clone + 'static, D: Clone + 'static> Default for UpdateValueStrategy<S, D> {
    fn default() -> Self {
        Self::new(UpdatePolicy::Update)
    }
}

impl<S: Clone + 'static, D: Clone + 'static> UpdateValueStrategy<S, D> {
    /// A strategy with `policy` and no hooks.
    #[must_use]
    pub fn new(policy: UpdatePolicy) -> Self {
        Self {
            policy,
            provide_default_converter: true,
            converter: None,
            after_get: None,
            after_convert: None,
            before_set: None,
            setter: None,
        }
    }

    /// A strategy that never propagates.
    #[must_use]
    pub fn never() -> Self {
        Self::new(UpdatePolicy::Never)
    }

    /// A strategy that propagates only on explicit request.
    #[must_use]
    pub fn on_request() -> Self {
        Self::new(UpdatePolicy::OnRequest)
    }

    /// Whether a missing converter (and its default validator) may be taken
    /// from the registries when the strategy is attached. Defaults to `true`.
    #[must_use]
    pub fn with_default_converter(mut self, provide: bool) -> Self {
        self.provide_default_converter = provide;
        self
    }

    /// Convert with `converter`.
    #[must_use]
    pub fn with_converter(mut self, converter: impl Converter<S, D> + 'static) -> Self {
        self.converter = Some(Rc::new(converter));
        self
    }

    /// Validate the raw source value.
    #[must_use]
    pub fn with_after_get_validator(mut self, validator: impl Validator<S> + 'static) -> Self {
        self.after_get = Some(Rc::new(validator));
        self
    }

    /// Validate the converted value.
    #[must_use]
    pub fn with_after_convert_validator(mut self, validator: impl Validator<D> + 'static) -> Self {
        self.after_convert = Some(Rc::new(validator));
        self
    }

    /// Validate the converted value right before it is written.
    #[must_use]
    pub fn with_before_set_validator(mut self, validator: impl Validator<D> + 'static) -> Self {
        self.before_set = Some(Rc::new(validator));
        self
    }

    /// Write to the destination with `setter` instead of `set_value`.
    #[must_use]
    pub fn with_setter(
        mut self,
        setter: impl Fn(&dyn ObservableValue<D>, D) -> Result<(), ObservableError> + 'static,
    ) -> Self {
        self.setter = Some(Rc::new(setter));
        self
    }

    /// The update policy.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> UpdatePolicy {
        self.policy
    }

    /// Whether a converter is configured.
    #[must_use]
    pub fn has_converter(&self) -> bool {
        self.converter.is_some()
    }

    /// Step 1: validate the raw source value. OK when no validator is set.
    pub fn validate_after_get(&self, value: &S) -> Status {
        self.after_get
            .as_ref()
            .map_or_else(Status::ok, |v| v.validate(value))
    }

    /// Step 2: convert, or pass the value through when `S` and `D` are the same type.
    pub fn convert(&self, value: &S) -> Result<D, ConversionError> {
        match &self.converter {
            Some(converter) => converter.convert(value),
            None => identity_cast(value),
        }
    }

    /// Step 3: validate the converted value.
    pub fn validate_after_convert(&self, value: &D) -> Status {
        self.after_convert
            .as_ref()
            .map_or_else(Status::ok, |v| v.validate(value))
    }

    /// Step 4: validate the converted value right before it is written.
    pub fn validate_before_set(&self, value: &D) -> Status {
        self.before_set
            .as_ref()
            .map_or_else(Status::ok, |v| v.validate(value))
    }

    /// Step 5: write `value` to `destination`. A rejected write becomes an
    /// error status.
    pub fn do_set(&self, destination: &dyn ObservableValue<D>, value: D) -> Status {
        let result = match &self.setter {
            Some(setter) => setter(destination, value),
            None => destination.set_value(value),
        };
        match result {
            Ok(()) => Status::ok(),
            Err(err) => Status::from_error(err),
        }
    }

    /// Complete the strategy for a concrete pair of endpoints.
    ///
    /// Supplies a registry converter (and its default after-get validator)
    /// when none was configured, then checks the converter's declared types
    /// against the endpoints.
    pub(crate) fn fill_defaults(
        &mut self,
        source: Option<ValueType>,
        destination: Option<ValueType>,
        converters: &ConverterRegistry,
        validators: &ValidatorRegistry,
    ) -> Result<(), BindingError> {
        if self.converter.is_none()
            && self.provide_default_converter
            && TypeId::of::<S>() != TypeId::of::<D>()
        {
            let Some(converter) = converters.lookup::<S, D>() else {
                return Err(BindingError::MissingConverter {
                    from: ValueType::of::<S>(),
                    to: ValueType::of::<D>(),
                });
            };
            self.converter = Some(converter);
            if self.after_get.is_none() {
                self.after_get = validators.lookup::<S, D>();
            }
        }
        if let Some(converter) = &self.converter {
            check_declared(converter.from_type(), source)?;
            check_declared(converter.to_type(), destination)?;
        }
        Ok(())
    }
}

pub(crate) fn check_declared(
    declared: Option<ValueType>,
    actual: Option<ValueType>,
) -> Result<(), BindingError> {
    match (declared, actual) {
        (Some(declared), Some(actual)) if !declared.is_assignable_from(actual) => {
            Err(BindingError::ConverterTypeMismatch { declared, actual })
        }
        _ => Ok(()),
    }
}
