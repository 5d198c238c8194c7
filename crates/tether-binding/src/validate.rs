#![forbid(unsafe_code)]

//! Validators and the built-in validator table.
//!
//! [`ValidatorRegistry`] supplies a default after-get validator for the
//! conversions that can fail on bad input (string parsing and numeric
//! narrowing), so the problem is reported before the converter runs.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::OnceLock;

use tether_core::{Status, ValueType};

/// Checks a value and reports the outcome as a [`Status`].
pub trait Validator<T> {
    /// Validate `value`.
    fn validate(&self, value: &T) -> Status;
}

/// A [`Validator`] backed by a closure. Built with [`validator_fn`].
pub struct ValidatorFn<T, F> {
    f: F,
    _type: PhantomData<fn(&T)>,
}

/// Wrap a closure as a [`Validator`].
pub fn validator_fn<T, F: Fn(&T) -> Status>(f: F) -> ValidatorFn<T, F> {
    ValidatorFn {
        f,
        _type: PhantomData,
    }
}

impl<T, F: Fn(&T) -> Status> Validator<T> for ValidatorFn<T, F> {
    fn validate(&self, value: &T) -> Status {
        (self.f)(value)
    }
}

impl<T, F> fmt::Debug for ValidatorFn<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorFn")
            .field("value", &std::any::type_name::<T>())
            .finish()
    }
}

struct Parses<D>(PhantomData<fn() -> D>);

impl<D: FromStr + 'static> Validator<String> for Parses<D> {
    fn validate(&self, value: &String) -> Status {
        if value.trim().parse::<D>().is_ok() {
            Status::ok()
        } else {
            Status::error(format!("'{value}' is not a valid {}", ValueType::of::<D>()))
        }
    }
}

struct InRange<S, D>(PhantomData<fn(S) -> D>);

impl<S: Copy + fmt::Display, D: TryFrom<S> + 'static> Validator<S> for InRange<S, D> {
    fn validate(&self, value: &S) -> Status {
        if D::try_from(*value).is_ok() {
            Status::ok()
        } else {
            Status::error(format!(
                "{value} is out of range for {}",
                ValueType::of::<D>()
            ))
        }
    }
}

fn parses<D: FromStr + 'static>() -> Box<dyn Any> {
    Box::new(Rc::new(Parses::<D>(PhantomData)) as Rc<dyn Validator<String>>)
}

fn in_range<S, D>() -> Box<dyn Any>
where
    S: Copy + fmt::Display + 'static,
    D: TryFrom<S> + 'static,
{
    Box::new(Rc::new(InRange::<S, D>(PhantomData)) as Rc<dyn Validator<S>>)
}

/// Default after-get validators keyed by `(source, destination)` type pair.
pub struct ValidatorRegistry {
    entries: HashMap<(TypeId, TypeId), fn() -> Box<dyn Any>>,
}

impl ValidatorRegistry {
    /// The process-wide table, built on first use.
    pub fn global() -> &'static Self {
        static REGISTRY: OnceLock<ValidatorRegistry> = OnceLock::new();
        REGISTRY.get_or_init(Self::builtin)
    }

    fn builtin() -> Self {
        let mut registry = Self {
            entries: HashMap::new(),
        };
        macro_rules! parse_targets {
            ($($ty:ty),+) => {
                $(registry.insert::<String, $ty>(parses::<$ty>);)+
            };
        }
        macro_rules! narrowing {
            ($($from:ty => [$($to:ty),+]),+) => {
                $($(registry.insert::<$from, $to>(in_range::<$from, $to>);)+)+
            };
        }
        parse_targets!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, bool);
        narrowing!(
            i64 => [i32, i16, i8, u32, u16, u8],
            i32 => [i16, i8, u16, u8],
            i16 => [i8, u8],
            u64 => [u32, u16, u8, i64],
            u32 => [u16, u8, i32],
            u16 => [u8]
        );
        registry
    }

    fn insert<S: 'static, D: 'static>(&mut self, factory: fn() -> Box<dyn Any>) {
        self.entries
            .insert((TypeId::of::<S>(), TypeId::of::<D>()), factory);
    }

    /// The default after-get validator for values headed from `S` to `D`.
    #[must_use]
    pub fn lookup<S: 'static, D: 'static>(&self) -> Option<Rc<dyn Validator<S>>> {
        let factory = self.entries.get(&(TypeId::of::<S>(), TypeId::of::<D>()))?;
        factory()
            .downcast::<Rc<dyn Validator<S>>>()
            .ok()
            .map(|validator| *validator)
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("pairs", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tether_core::Severity;

    use super::*;

    #[test]
    fn parse_validator_reports_bad_input() {
        let validator = ValidatorRegistry::global()
            .lookup::<String, i32>()
            .expect("registered");
        assert!(validator.validate(&"12".to_string()).is_ok());
        let status = validator.validate(&"twelve".to_string());
        assert_eq!(status.severity(), Severity::Error);
        assert_eq!(status.message(), "'twelve' is not a valid i32");
    }

    #[test]
    fn range_validator_matches_narrowing() {
        let validator = ValidatorRegistry::global()
            .lookup::<i32, u8>()
            .expect("registered");
        assert!(validator.validate(&255).is_ok());
        assert!(!validator.validate(&256).is_ok());
        assert!(!validator.validate(&-1).is_ok());
    }

    #[test]
    fn lossless_pairs_have_no_default_validator() {
        assert!(ValidatorRegistry::global().lookup::<i32, i64>().is_none());
        assert!(ValidatorRegistry::global().lookup::<String, String>().is_none());
    }

    #[test]
    fn closure_validator() {
        let positive = validator_fn(|v: &i32| {
            if *v > 0 {
                Status::ok()
            } else {
                Status::warning("not positive")
            }
        });
        assert!(positive.validate(&1).is_ok());
        assert_eq!(positive.validate(&0).severity(), Severity::Warning);
    }
}
