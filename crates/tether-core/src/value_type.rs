#![forbid(unsafe_code)]

//! Runtime type tags for observable contents and converter endpoints.

use std::any::{TypeId, type_name};
use std::fmt;

/// A runtime description of a Rust type.
///
/// Observables and converters declare the type they carry so the binding
/// layer can check a converter against the endpoints it is wired between.
#[derive(Clone, Copy)]
pub struct ValueType {
    id: TypeId,
    name: &'static str,
}

impl ValueType {
    /// The tag for `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The underlying [`TypeId`].
    #[must_use]
    pub fn type_id(self) -> TypeId {
        self.id
    }

    /// The fully qualified type name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.name
    }

    /// Whether a value of type `other` can be handed to a slot declared as `self`.
    ///
    /// Types are nominal: only the identical type is assignable.
    #[must_use]
    pub fn is_assignable_from(self, other: ValueType) -> bool {
        self.id == other.id
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ValueType {}

impl std::hash::Hash for ValueType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_types_are_assignable() {
        assert!(ValueType::of::<i32>().is_assignable_from(ValueType::of::<i32>()));
        assert!(!ValueType::of::<i32>().is_assignable_from(ValueType::of::<i64>()));
    }

    #[test]
    fn name_is_type_name() {
        assert_eq!(ValueType::of::<String>().name(), type_name::<String>());
        assert_eq!(format!("{}", ValueType::of::<u8>()), "u8");
    }
}
