// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Type descriptors that define identity for cached identifiers.
//!
//! Identifiers may be composite values whose natural equality is unreliable, so cache keys
//! never compare identifiers directly. They ask the identifier's [`IdentifierType`] instead.

use std::{fmt, sync::Arc};

use crate::value::{Value, hash_str, mix};

/// Equality and hashing rules for one kind of identifier.
pub trait IdentifierType: Send + Sync + fmt::Debug {
    /// Returns the name of this type, e.g. `long` or `Person.id`.
    fn name(&self) -> &str;

    /// Returns `true` if `x` and `y` denote the same identifier.
    fn is_equal(&self, x: &Value, y: &Value) -> bool;

    /// Returns a hash consistent with [`is_equal`][Self::is_equal], stable across processes.
    fn hash_value(&self, value: &Value) -> u64;
}

/// A single-column identifier type using the value's own equality.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicType {
    name: &'static str,
}

impl BasicType {
    /// 64-bit integer identifiers.
    pub const LONG: Self = Self { name: "long" };
    /// Character identifiers.
    pub const STRING: Self = Self { name: "string" };
    /// Binary identifiers such as UUIDs in their raw form.
    pub const BINARY: Self = Self { name: "binary" };

    /// Creates a basic type with a custom name.
    #[must_use]
    pub const fn named(name: &'static str) -> Self {
        Self { name }
    }
}

impl IdentifierType for BasicType {
    fn name(&self) -> &str {
        self.name
    }

    fn is_equal(&self, x: &Value, y: &Value) -> bool {
        x == y
    }

    fn hash_value(&self, value: &Value) -> u64 {
        value.stable_hash()
    }
}

/// A multi-column identifier whose components are compared by their own types.
///
/// Values of a composite type are [`Value::Tuple`]s with one element per component.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tidemark_region::{BasicType, CompositeType, IdentifierType, Value};
///
/// let order_line = CompositeType::new(
///     "OrderLine.id",
///     vec![Arc::new(BasicType::LONG), Arc::new(BasicType::LONG)],
/// );
/// let a = Value::Tuple(vec![Value::from(7), Value::from(1)]);
/// let b = Value::Tuple(vec![Value::from(7), Value::from(1)]);
/// assert!(order_line.is_equal(&a, &b));
/// ```
#[derive(Clone, Debug)]
pub struct CompositeType {
    name: String,
    components: Vec<Arc<dyn IdentifierType>>,
}

impl CompositeType {
    /// Creates a composite type from its component types.
    pub fn new(name: impl Into<String>, components: Vec<Arc<dyn IdentifierType>>) -> Self {
        Self {
            name: name.into(),
            components,
        }
    }

    /// Returns the component types.
    #[must_use]
    pub fn components(&self) -> &[Arc<dyn IdentifierType>] {
        &self.components
    }
}

impl IdentifierType for CompositeType {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_equal(&self, x: &Value, y: &Value) -> bool {
        match (x, y) {
            (Value::Tuple(xs), Value::Tuple(ys)) => {
                xs.len() == self.components.len()
                    && ys.len() == self.components.len()
                    && self
                        .components
                        .iter()
                        .zip(xs.iter().zip(ys))
                        .all(|(ty, (x, y))| ty.is_equal(x, y))
            }
            _ => false,
        }
    }

    fn hash_value(&self, value: &Value) -> u64 {
        match value {
            Value::Tuple(items) => self
                .components
                .iter()
                .zip(items)
                .fold(hash_str(&self.name), |h, (ty, item)| mix(h, ty.hash_value(item))),
            other => other.stable_hash(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Text identifiers compared without regard to ASCII case.
    #[derive(Debug)]
    struct CaseInsensitive;

    impl IdentifierType for CaseInsensitive {
        fn name(&self) -> &str {
            "ci-string"
        }

        fn is_equal(&self, x: &Value, y: &Value) -> bool {
            match (x.as_text(), y.as_text()) {
                (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
                _ => x == y,
            }
        }

        fn hash_value(&self, value: &Value) -> u64 {
            value
                .as_text()
                .map_or_else(|| value.stable_hash(), |s| hash_str(&s.to_ascii_lowercase()))
        }
    }

    fn pair(a: &str, b: i64) -> Value {
        Value::Tuple(vec![Value::from(a), Value::from(b)])
    }

    #[test]
    fn composite_delegates_to_component_types() {
        let ty = CompositeType::new("Key", vec![Arc::new(CaseInsensitive), Arc::new(BasicType::LONG)]);

        assert!(ty.is_equal(&pair("ABC", 1), &pair("abc", 1)));
        assert_eq!(ty.hash_value(&pair("ABC", 1)), ty.hash_value(&pair("abc", 1)));
        assert!(!ty.is_equal(&pair("abc", 1), &pair("abc", 2)));
    }

    #[test]
    fn composite_rejects_arity_mismatch() {
        let ty = CompositeType::new("Key", vec![Arc::new(BasicType::LONG), Arc::new(BasicType::LONG)]);
        let short = Value::Tuple(vec![Value::from(1)]);
        assert!(!ty.is_equal(&short, &short));
        assert!(!ty.is_equal(&Value::from(1), &Value::from(1)));
    }

    #[test]
    fn basic_type_uses_value_equality() {
        assert!(BasicType::LONG.is_equal(&Value::from(5), &Value::from(5)));
        assert!(!BasicType::STRING.is_equal(&Value::from("a"), &Value::from("A")));
        assert_eq!(BasicType::named("uuid").name(), "uuid");
    }
}
