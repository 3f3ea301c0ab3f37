// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Disassembled values stored in and keyed by cache regions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A disassembled value as it travels through the cache.
///
/// Identifiers, bound query parameters, natural-id values and cached result rows are all
/// expressed with this type so that any backend can store them without knowing the
/// object model they came from.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer of any width up to 64 bits.
    Int(i64),
    /// Character data.
    Text(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// An ordered group of values, e.g. a composite identifier or a projected result row.
    Tuple(Vec<Self>),
}

impl Value {
    /// Returns a hash of this value that is stable across processes and restarts.
    ///
    /// Unlike [`std::hash::Hash`] with a randomly seeded hasher, the result only depends on the
    /// value itself.
    #[must_use]
    pub fn stable_hash(&self) -> u64 {
        match self {
            Self::Null => 0,
            Self::Bool(b) => u64::from(*b) + 1,
            #[expect(clippy::cast_sign_loss, reason = "bit-for-bit reinterpretation is intended")]
            Self::Int(i) => *i as u64,
            Self::Text(s) => hash_str(s),
            Self::Bytes(b) => hash_bytes(b),
            Self::Tuple(items) => items.iter().fold(17, |h, item| mix(h, item.stable_hash())),
        }
    }

    /// Returns the text content if this is a [`Value::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content if this is a [`Value::Int`].
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Combines two hashes with the non-commutative `31 * h + x` step.
///
/// Swapping the operands changes the result, so two fields cannot trade places without the
/// combined hash noticing.
#[must_use]
pub fn mix(h: u64, x: u64) -> u64 {
    h.wrapping_mul(31).wrapping_add(x)
}

/// Seedless string hash, stable across processes.
#[must_use]
pub fn hash_str(s: &str) -> u64 {
    hash_bytes(s.as_bytes())
}

/// Seedless byte hash, stable across processes.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    xxhash_rust::xxh3::xxh3_64(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_hash_is_deterministic() {
        let value = Value::Tuple(vec![Value::from(7), Value::from("x"), Value::Null]);
        assert_eq!(value.stable_hash(), value.clone().stable_hash());
    }

    #[test]
    fn mix_is_not_commutative() {
        let a = hash_str("Person");
        let b = hash_str("acme");
        assert_ne!(mix(mix(1, a), b), mix(mix(1, b), a));
    }

    #[test]
    fn tuple_order_matters_for_hash() {
        let ab = Value::Tuple(vec![Value::from(1), Value::from(2)]);
        let ba = Value::Tuple(vec![Value::from(2), Value::from(1)]);
        assert_ne!(ab.stable_hash(), ba.stable_hash());
    }

    #[test]
    fn option_converts_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".to_owned()));
    }

    #[test]
    fn display_renders_tuples() {
        let value = Value::Tuple(vec![Value::from(1), Value::from("a"), Value::Null]);
        assert_eq!(value.to_string(), "(1, 'a', null)");
    }
}
