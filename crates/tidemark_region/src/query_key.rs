// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The canonical identity of a cached query result.

use std::{
    collections::BTreeSet,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    parameters::{BindingsMemento, QueryParameterBindings},
    session::SessionContext,
    value::{hash_str, mix},
};

/// Row window of a query execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Limit {
    /// Index of the first row to return, if any.
    pub first_row: Option<u32>,
    /// Maximum number of rows to return, if any.
    pub max_rows: Option<u32>,
}

impl Limit {
    /// No row window.
    pub const NONE: Self = Self {
        first_row: None,
        max_rows: None,
    };

    /// Creates a row window.
    #[must_use]
    pub const fn new(first_row: u32, max_rows: u32) -> Self {
        Self {
            first_row: Some(first_row),
            max_rows: Some(max_rows),
        }
    }

    /// Creates a window that only caps the number of rows.
    #[must_use]
    pub const fn max_rows(max_rows: u32) -> Self {
        Self {
            first_row: None,
            max_rows: Some(max_rows),
        }
    }
}

/// The key of a cached query result.
///
/// Two executions share a cache entry only if they agree on the SQL text, every bound
/// parameter (value and type), the row window, the enabled filters and the tenant.
///
/// The hash is computed once, at construction, and deliberately leaves out the row window:
/// differently paginated variants of one query land in the same hash bucket and are told apart
/// by equality. Serialized keys carry no hash; it is rebuilt when a key is deserialized.
///
/// # Examples
///
/// ```
/// use tidemark_region::{BindingsMemento, Limit, QueryKey};
///
/// let page_one = QueryKey::new("select p from Person p", BindingsMemento::empty(), Limit::new(0, 10), [], None);
/// let page_two = QueryKey::new("select p from Person p", BindingsMemento::empty(), Limit::new(10, 10), [], None);
/// assert_ne!(page_one, page_two);
/// assert_eq!(page_one.hash_code(), page_two.hash_code());
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "QueryKeyRepr", into = "QueryKeyRepr")]
pub struct QueryKey {
    sql: Arc<str>,
    parameters: BindingsMemento,
    limit: Limit,
    enabled_filters: Arc<BTreeSet<String>>,
    tenant_id: Option<Arc<str>>,
    hash: u64,
}

#[derive(Serialize, Deserialize)]
struct QueryKeyRepr {
    sql: String,
    parameters: BindingsMemento,
    limit: Limit,
    enabled_filters: BTreeSet<String>,
    tenant_id: Option<String>,
}

impl From<QueryKeyRepr> for QueryKey {
    fn from(repr: QueryKeyRepr) -> Self {
        Self::new(
            &repr.sql,
            repr.parameters,
            repr.limit,
            repr.enabled_filters,
            repr.tenant_id.as_deref(),
        )
    }
}

impl From<QueryKey> for QueryKeyRepr {
    fn from(key: QueryKey) -> Self {
        Self {
            sql: key.sql.to_string(),
            parameters: key.parameters,
            limit: key.limit,
            enabled_filters: Arc::unwrap_or_clone(key.enabled_filters),
            tenant_id: key.tenant_id.as_deref().map(str::to_owned),
        }
    }
}

impl QueryKey {
    /// Builds the key for executing `sql` with `bindings` in `session`.
    ///
    /// The session's enabled filters and tenant are captured at call time.
    pub fn from_query(sql: &str, limit: Limit, bindings: &QueryParameterBindings, session: &dyn SessionContext) -> Self {
        Self::new(
            sql,
            bindings.query_key_memento(),
            limit,
            session.enabled_filter_names().iter().cloned(),
            session.tenant_identifier(),
        )
    }

    /// Builds a key from its parts.
    pub fn new(
        sql: &str,
        parameters: BindingsMemento,
        limit: Limit,
        enabled_filters: impl IntoIterator<Item = String>,
        tenant_id: Option<&str>,
    ) -> Self {
        let enabled_filters: BTreeSet<String> = enabled_filters.into_iter().collect();

        let mut hash: u64 = 13;
        hash = hash.wrapping_mul(37).wrapping_add(hash_str(sql));
        hash = hash.wrapping_mul(37).wrapping_add(parameters.hash_code());
        hash = hash
            .wrapping_mul(37)
            .wrapping_add(enabled_filters.iter().fold(0, |h, name| mix(h, hash_str(name))));
        hash = hash.wrapping_mul(37).wrapping_add(tenant_id.map_or(0, hash_str));

        Self {
            sql: Arc::from(sql),
            parameters,
            limit,
            enabled_filters: Arc::new(enabled_filters),
            tenant_id: tenant_id.map(Arc::from),
            hash,
        }
    }

    /// Returns the SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the captured parameter bindings.
    #[must_use]
    pub fn parameters(&self) -> &BindingsMemento {
        &self.parameters
    }

    /// Returns the row window.
    #[must_use]
    pub fn limit(&self) -> Limit {
        self.limit
    }

    /// Returns the filters that were enabled when the key was built.
    #[must_use]
    pub fn enabled_filters(&self) -> &BTreeSet<String> {
        &self.enabled_filters
    }

    /// Returns the tenant identifier, if any.
    #[must_use]
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Returns the precomputed, process-independent hash.
    #[must_use]
    pub fn hash_code(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.sql == other.sql
            && self.limit == other.limit
            && self.parameters == other.parameters
            && self.enabled_filters == other.enabled_filters
            && self.tenant_id == other.tenant_id
    }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryKey")
            .field("sql", &self.sql)
            .field("parameters", &self.parameters.bindings())
            .field("limit", &self.limit)
            .field("enabled_filters", &self.enabled_filters)
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sql: {}; parameters: ", self.sql)?;
        for (i, (name, value)) in self.parameters.bindings().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={}", value.value())?;
        }
        if let Some(first_row) = self.limit.first_row {
            write!(f, "; first row: {first_row}")?;
        }
        if let Some(max_rows) = self.limit.max_rows {
            write!(f, "; max rows: {max_rows}")?;
        }
        if !self.enabled_filters.is_empty() {
            write!(f, "; filters: {:?}", self.enabled_filters)?;
        }
        Ok(())
    }
}
