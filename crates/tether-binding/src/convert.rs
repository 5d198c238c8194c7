#![forbid(unsafe_code)]

//! Value converters and the built-in converter table.
//!
//! A [`Converter`] turns a source value into a destination value. Strategies
//! without an explicit converter fall back to [`ConverterRegistry`], a table
//! keyed by the `(source, destination)` type pair that is built once per
//! process and shared read-only afterwards.
//!
//! The table covers a closed set of [`ConversionRule`]s:
//!
//! | Rule | Pairs |
//! |------|-------|
//! | `Widening` | lossless integer and float widening (`i16 -> i64`, `u8 -> f32`, ...) |
//! | `Narrowing` | range-checked integer narrowing (`i64 -> i32`, ...) |
//! | `Parse` | `String` to numbers and `bool` |
//! | `Format` | numbers, `bool`, and `char` to `String` |
//! | `Boxing` / `Unboxing` | `T <-> Option<T>` for the same primitive types |
//!
//! Identical types need no entry: values are passed through unchanged.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::OnceLock;

use tether_core::ValueType;

use crate::error::ConversionError;

/// Converts a source value into a destination value.
pub trait Converter<S, D> {
    /// Convert `value`.
    fn convert(&self, value: &S) -> Result<D, ConversionError>;

    /// The source type this converter expects, if it declares one.
    fn from_type(&self) -> Option<ValueType> {
        None
    }

    /// The destination type this converter produces, if it declares one.
    fn to_type(&self) -> Option<ValueType> {
        None
    }
}

/// A [`Converter`] backed by a closure. Built with [`converter_fn`].
pub struct ConverterFn<S, D, F> {
    f: F,
    _types: PhantomData<fn(&S) -> D>,
}

/// Wrap a closure as a [`Converter`] that declares `S` and `D`.
pub fn converter_fn<S, D, F>(f: F) -> ConverterFn<S, D, F>
where
    S: 'static,
    D: 'static,
    F: Fn(&S) -> Result<D, ConversionError>,
{
    ConverterFn {
        f,
        _types: PhantomData,
    }
}

impl<S: 'static, D: 'static, F> Converter<S, D> for ConverterFn<S, D, F>
where
    F: Fn(&S) -> Result<D, ConversionError>,
{
    fn convert(&self, value: &S) -> Result<D, ConversionError> {
        (self.f)(value)
    }

    fn from_type(&self) -> Option<ValueType> {
        Some(ValueType::of::<S>())
    }

    fn to_type(&self) -> Option<ValueType> {
        Some(ValueType::of::<D>())
    }
}

impl<S, D, F> fmt::Debug for ConverterFn<S, D, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterFn")
            .field("from", &std::any::type_name::<S>())
            .field("to", &std::any::type_name::<D>())
            .finish()
    }
}

/// Pass `value` through unchanged when `S` and `D` are the same type.
pub(crate) fn identity_cast<S: Clone + 'static, D: 'static>(
    value: &S,
) -> Result<D, ConversionError> {
    let boxed: Box<dyn Any> = Box::new(value.clone());
    boxed
        .downcast::<D>()
        .map(|v| *v)
        .map_err(|_| ConversionError::incompatible::<S, D>())
}

/// The kind of relationship between a converter's source and destination types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionRule {
    /// Same type; the value is passed through.
    Identity,
    /// Lossless numeric widening.
    Widening,
    /// Numeric narrowing, checked when the value is converted.
    Narrowing,
    /// Parsing a `String`.
    Parse,
    /// Formatting into a `String`.
    Format,
    /// Wrapping into `Option<T>`.
    Boxing,
    /// Unwrapping an `Option<T>`; `None` fails.
    Unboxing,
}

// ---------------------------------------------------------------------------
// Built-in converters
// ---------------------------------------------------------------------------

struct Widen<S, D>(PhantomData<fn(S) -> D>);

impl<S: Copy + 'static, D: From<S> + 'static> Converter<S, D> for Widen<S, D> {
    fn convert(&self, value: &S) -> Result<D, ConversionError> {
        Ok(D::from(*value))
    }

    fn from_type(&self) -> Option<ValueType> {
        Some(ValueType::of::<S>())
    }

    fn to_type(&self) -> Option<ValueType> {
        Some(ValueType::of::<D>())
    }
}

struct Narrow<S, D>(PhantomData<fn(S) -> D>);

impl<S, D> Converter<S, D> for Narrow<S, D>
where
    S: Copy + fmt::Display + 'static,
    D: TryFrom<S> + 'static,
{
    fn convert(&self, value: &S) -> Result<D, ConversionError> {
        D::try_from(*value).map_err(|_| {
            ConversionError::new(format!(
                "{value} is out of range for {}",
                ValueType::of::<D>()
            ))
        })
    }

    fn from_type(&self) -> Option<ValueType> {
        Some(ValueType::of::<S>())
    }

    fn to_type(&self) -> Option<ValueType> {
        Some(ValueType::of::<D>())
    }
}

struct Parse<D>(PhantomData<fn() -> D>);

impl<D> Converter<String, D> for Parse<D>
where
    D: FromStr + 'static,
    D::Err: std::error::Error + Send + Sync + 'static,
{
    fn convert(&self, value: &String) -> Result<D, ConversionError> {
        value.trim().parse::<D>().map_err(|err| {
            ConversionError::with_source(
                format!("'{value}' is not a valid {}", ValueType::of::<D>()),
                err,
            )
        })
    }

    fn from_type(&self) -> Option<ValueType> {
        Some(ValueType::of::<String>())
    }

    fn to_type(&self) -> Option<ValueType> {
        Some(ValueType::of::<D>())
    }
}

struct Format<S>(PhantomData<fn(S)>);

impl<S: ToString + 'static> Converter<S, String> for Format<S> {
    fn convert(&self, value: &S) -> Result<String, ConversionError> {
        Ok(value.to_string())
    }

    fn from_type(&self) -> Option<ValueType> {
        Some(ValueType::of::<S>())
    }

    fn to_type(&self) -> Option<ValueType> {
        Some(ValueType::of::<String>())
    }
}

struct Boxing<T>(PhantomData<fn(T)>);

impl<T: Clone + 'static> Converter<T, Option<T>> for Boxing<T> {
    fn convert(&self, value: &T) -> Result<Option<T>, ConversionError> {
        Ok(Some(value.clone()))
    }

    fn from_type(&self) -> Option<ValueType> {
        Some(ValueType::of::<T>())
    }

    fn to_type(&self) -> Option<ValueType> {
        Some(ValueType::of::<Option<T>>())
    }
}

struct Unboxing<T>(PhantomData<fn(T)>);

impl<T: Clone + 'static> Converter<Option<T>, T> for Unboxing<T> {
    fn convert(&self, value: &Option<T>) -> Result<T, ConversionError> {
        value.clone().ok_or_else(|| {
            ConversionError::new(format!("no {} value present", ValueType::of::<T>()))
        })
    }

    fn from_type(&self) -> Option<ValueType> {
        Some(ValueType::of::<Option<T>>())
    }

    fn to_type(&self) -> Option<ValueType> {
        Some(ValueType::of::<T>())
    }
}

type Factory = fn() -> Box<dyn Any>;

fn widen<S: Copy + 'static, D: From<S> + 'static>() -> Box<dyn Any> {
    Box::new(Rc::new(Widen::<S, D>(PhantomData)) as Rc<dyn Converter<S, D>>)
}

fn narrow<S, D>() -> Box<dyn Any>
where
    S: Copy + fmt::Display + 'static,
    D: TryFrom<S> + 'static,
{
    Box::new(Rc::new(Narrow::<S, D>(PhantomData)) as Rc<dyn Converter<S, D>>)
}

fn parse<D>() -> Box<dyn Any>
where
    D: FromStr + 'static,
    D::Err: std::error::Error + Send + Sync + 'static,
{
    Box::new(Rc::new(Parse::<D>(PhantomData)) as Rc<dyn Converter<String, D>>)
}

fn format<S: ToString + 'static>() -> Box<dyn Any> {
    Box::new(Rc::new(Format::<S>(PhantomData)) as Rc<dyn Converter<S, String>>)
}

fn boxing<T: Clone + 'static>() -> Box<dyn Any> {
    Box::new(Rc::new(Boxing::<T>(PhantomData)) as Rc<dyn Converter<T, Option<T>>>)
}

fn unboxing<T: Clone + 'static>() -> Box<dyn Any> {
    Box::new(Rc::new(Unboxing::<T>(PhantomData)) as Rc<dyn Converter<Option<T>, T>>)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Entry {
    rule: ConversionRule,
    factory: Factory,
}

/// Built-in converters keyed by `(source, destination)` type pair.
pub struct ConverterRegistry {
    entries: HashMap<(TypeId, TypeId), Entry>,
}

macro_rules! register_pairs {
    ($registry:ident, $rule:ident, $make:ident; $($from:ty => [$($to:ty),+ $(,)?]),+ $(,)?) => {
        $($(
            $registry.insert::<$from, $to>(ConversionRule::$rule, $make::<$from, $to>);
        )+)+
    };
}

macro_rules! register_each {
    ($registry:ident; $($ty:ty),+ $(,)?) => {
        $(
            $registry.insert::<String, $ty>(ConversionRule::Parse, parse::<$ty>);
            $registry.insert::<$ty, String>(ConversionRule::Format, format::<$ty>);
            $registry.insert::<$ty, Option<$ty>>(ConversionRule::Boxing, boxing::<$ty>);
            $registry.insert::<Option<$ty>, $ty>(ConversionRule::Unboxing, unboxing::<$ty>);
        )+
    };
}

impl ConverterRegistry {
    /// The process-wide table, built on first use.
    pub fn global() -> &'static Self {
        static REGISTRY: OnceLock<ConverterRegistry> = OnceLock::new();
        REGISTRY.get_or_init(Self::builtin)
    }

    fn builtin() -> Self {
        let mut registry = Self {
            entries: HashMap::new(),
        };
        register_pairs!(registry, Widening, widen;
            i8 => [i16, i32, i64, f32, f64],
            i16 => [i32, i64, f32, f64],
            i32 => [i64, f64],
            u8 => [u16, u32, u64, i16, i32, i64, f32, f64],
            u16 => [u32, u64, i32, i64, f32, f64],
            u32 => [u64, i64, f64],
            f32 => [f64],
        );
        register_pairs!(registry, Narrowing, narrow;
            i64 => [i32, i16, i8, u32, u16, u8],
            i32 => [i16, i8, u16, u8],
            i16 => [i8, u8],
            u64 => [u32, u16, u8, i64],
            u32 => [u16, u8, i32],
            u16 => [u8],
        );
        register_each!(registry; i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, bool);
        registry.insert::<char, String>(ConversionRule::Format, format::<char>);
        registry.insert::<String, Option<String>>(ConversionRule::Boxing, boxing::<String>);
        registry.insert::<Option<String>, String>(ConversionRule::Unboxing, unboxing::<String>);
        tracing::trace!(pairs = registry.entries.len(), "converter registry built");
        registry
    }

    fn insert<S: 'static, D: 'static>(&mut self, rule: ConversionRule, factory: Factory) {
        self.entries
            .insert((TypeId::of::<S>(), TypeId::of::<D>()), Entry { rule, factory });
    }

    /// The rule relating `S` to `D`, if the pair is convertible.
    #[must_use]
    pub fn rule<S: 'static, D: 'static>(&self) -> Option<ConversionRule> {
        if TypeId::of::<S>() == TypeId::of::<D>() {
            return Some(ConversionRule::Identity);
        }
        self.entries
            .get(&(TypeId::of::<S>(), TypeId::of::<D>()))
            .map(|entry| entry.rule)
    }

    /// A fresh converter for `S -> D`, if one is registered.
    ///
    /// Identical types have no entry; see [`rule`](Self::rule).
    #[must_use]
    pub fn lookup<S: 'static, D: 'static>(&self) -> Option<Rc<dyn Converter<S, D>>> {
        let entry = self.entries.get(&(TypeId::of::<S>(), TypeId::of::<D>()))?;
        (entry.factory)()
            .downcast::<Rc<dyn Converter<S, D>>>()
            .ok()
            .map(|converter| *converter)
    }

    /// Number of registered pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("pairs", &self.entries.len())
            .finish()
    }
}
