// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Query parameter bindings and their query-key memento.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::value::{Value, hash_str, mix};

/// A bound value together with the name of the type it was bound as.
///
/// Two bindings of the same raw value under different types (say `1` bound as `long` versus
/// as `boolean`) produce different SQL and therefore different cache entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedValue {
    type_name: String,
    value: Value,
}

impl TypedValue {
    /// Creates a typed value.
    pub fn new(type_name: &str, value: impl Into<Value>) -> Self {
        Self {
            type_name: type_name.to_owned(),
            value: value.into(),
        }
    }

    /// Returns the bound type's name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the bound value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    fn stable_hash(&self) -> u64 {
        mix(hash_str(&self.type_name), self.value.stable_hash())
    }
}

/// How a parameter is addressed in the query text.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ParameterName {
    /// A `?1`-style positional parameter.
    Positional(u32),
    /// A `:name`-style named parameter.
    Named(String),
}

impl fmt::Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positional(position) => write!(f, "?{position}"),
            Self::Named(name) => write!(f, ":{name}"),
        }
    }
}

/// The parameter bindings of one query execution.
///
/// Bindings are kept sorted by parameter so the memento does not depend on the order in
/// which the caller bound them.
///
/// # Examples
///
/// ```
/// use tidemark_region::{QueryParameterBindings, TypedValue};
///
/// let a = QueryParameterBindings::new()
///     .bind_named("name", TypedValue::new("string", "Ada"))
///     .bind_named("age", TypedValue::new("int", 36));
/// let b = QueryParameterBindings::new()
///     .bind_named("age", TypedValue::new("int", 36))
///     .bind_named("name", TypedValue::new("string", "Ada"));
/// assert_eq!(a.query_key_memento(), b.query_key_memento());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParameterBindings {
    bindings: Vec<(ParameterName, TypedValue)>,
}

impl QueryParameterBindings {
    /// Creates an empty set of bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a positional parameter, replacing an earlier binding of the same position.
    #[must_use]
    pub fn bind_positional(self, position: u32, value: TypedValue) -> Self {
        self.bind(ParameterName::Positional(position), value)
    }

    /// Binds a named parameter, replacing an earlier binding of the same name.
    #[must_use]
    pub fn bind_named(self, name: impl Into<String>, value: TypedValue) -> Self {
        self.bind(ParameterName::Named(name.into()), value)
    }

    fn bind(mut self, name: ParameterName, value: TypedValue) -> Self {
        match self.bindings.binary_search_by(|(existing, _)| existing.cmp(&name)) {
            Ok(index) => self.bindings[index].1 = value,
            Err(index) => self.bindings.insert(index, (name, value)),
        }
        self
    }

    /// Returns the number of bound parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterates over the bindings in parameter order.
    pub fn iter(&self) -> impl Iterator<Item = (&ParameterName, &TypedValue)> {
        self.bindings.iter().map(|(name, value)| (name, value))
    }

    /// Captures the bindings for use in a [`QueryKey`][crate::QueryKey].
    #[must_use]
    pub fn query_key_memento(&self) -> BindingsMemento {
        BindingsMemento::new(self.bindings.clone())
    }
}

/// An immutable snapshot of query parameter bindings with a precomputed stable hash.
///
/// Serializes as the list of bindings; the hash is recomputed on deserialization.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(
    from = "Vec<(ParameterName, TypedValue)>",
    into = "Vec<(ParameterName, TypedValue)>"
)]
pub struct BindingsMemento {
    bindings: Arc<[(ParameterName, TypedValue)]>,
    hash: u64,
}

impl BindingsMemento {
    fn new(bindings: Vec<(ParameterName, TypedValue)>) -> Self {
        let hash = bindings.iter().fold(1, |h, (name, value)| {
            let name_hash = match name {
                ParameterName::Positional(position) => u64::from(*position),
                ParameterName::Named(name) => hash_str(name),
            };
            mix(mix(h, name_hash), value.stable_hash())
        });
        Self {
            bindings: bindings.into(),
            hash,
        }
    }

    /// Returns a memento for a query with no parameters.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Returns the precomputed hash.
    #[must_use]
    pub fn hash_code(&self) -> u64 {
        self.hash
    }

    /// Returns the captured bindings in parameter order.
    #[must_use]
    pub fn bindings(&self) -> &[(ParameterName, TypedValue)] {
        &self.bindings
    }
}

impl From<Vec<(ParameterName, TypedValue)>> for BindingsMemento {
    fn from(bindings: Vec<(ParameterName, TypedValue)>) -> Self {
        Self::new(bindings)
    }
}

impl From<BindingsMemento> for Vec<(ParameterName, TypedValue)> {
    fn from(memento: BindingsMemento) -> Self {
        memento.bindings.to_vec()
    }
}

impl PartialEq for BindingsMemento {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.bindings == other.bindings
    }
}

impl Eq for BindingsMemento {}
