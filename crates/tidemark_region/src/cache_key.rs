// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Keys for entity, collection and natural-id data in domain-data regions.

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::{
    types::IdentifierType,
    value::{Value, hash_str, mix},
};

/// Which kind of domain data a [`CacheKey`] addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheKeyKind {
    /// Entity state, keyed by entity identifier.
    Entity,
    /// Collection state, keyed by owner identifier.
    Collection,
    /// Natural-id to identifier resolution, keyed by natural-id values.
    NaturalId,
}

/// A key into a domain-data region.
///
/// Several roles can share one physical region, so the key carries the owning role name and
/// tenant alongside the identifier. Identifier equality and hashing go through the identifier's
/// [`IdentifierType`], never the raw value's own equality.
///
/// The hash is computed once at construction as
/// `31 * (31 * type_hash(id) + hash(role)) + hash(tenant)`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tidemark_region::{BasicType, CacheKey, Value};
///
/// let person = CacheKey::entity(Value::from(1), Arc::new(BasicType::LONG), "Person", None);
/// let order = CacheKey::entity(Value::from(1), Arc::new(BasicType::LONG), "Order", None);
/// assert_ne!(person, order);
/// assert_ne!(person.hash_code(), order.hash_code());
/// ```
#[derive(Clone)]
pub struct CacheKey {
    kind: CacheKeyKind,
    id: Value,
    id_type: Arc<dyn IdentifierType>,
    role: Arc<str>,
    tenant_id: Option<Arc<str>>,
    hash: u64,
}

impl CacheKey {
    /// Creates a key for entity state.
    pub fn entity(id: Value, id_type: Arc<dyn IdentifierType>, entity_name: &str, tenant_id: Option<&str>) -> Self {
        Self::new(CacheKeyKind::Entity, id, id_type, entity_name, tenant_id)
    }

    /// Creates a key for collection state owned by the entity with identifier `id`.
    pub fn collection(id: Value, id_type: Arc<dyn IdentifierType>, role: &str, tenant_id: Option<&str>) -> Self {
        Self::new(CacheKeyKind::Collection, id, id_type, role, tenant_id)
    }

    /// Creates a key resolving natural-id `values` of `entity_name`.
    ///
    /// Multi-column natural ids are passed as a [`Value::Tuple`] with a matching
    /// [`CompositeType`][crate::CompositeType].
    pub fn natural_id(
        values: Value,
        values_type: Arc<dyn IdentifierType>,
        entity_name: &str,
        tenant_id: Option<&str>,
    ) -> Self {
        Self::new(CacheKeyKind::NaturalId, values, values_type, entity_name, tenant_id)
    }

    fn new(kind: CacheKeyKind, id: Value, id_type: Arc<dyn IdentifierType>, role: &str, tenant_id: Option<&str>) -> Self {
        let mut hash = mix(0, id_type.hash_value(&id));
        hash = mix(hash, hash_str(role));
        hash = mix(hash, tenant_id.map_or(0, hash_str));
        Self {
            kind,
            id,
            id_type,
            role: Arc::from(role),
            tenant_id: tenant_id.map(Arc::from),
            hash,
        }
    }

    /// Returns the kind of data addressed.
    #[must_use]
    pub fn kind(&self) -> CacheKeyKind {
        self.kind
    }

    /// Returns the raw identifier (or natural-id values).
    #[must_use]
    pub fn id(&self) -> &Value {
        &self.id
    }

    /// Returns the type descriptor of the identifier.
    #[must_use]
    pub fn id_type(&self) -> &Arc<dyn IdentifierType> {
        &self.id_type
    }

    /// Returns the entity name or collection role owning this key.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
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

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.kind == other.kind
            && self.role == other.role
            && self.tenant_id == other.tenant_id
            && self.id_type.is_equal(&self.id, &other.id)
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheKey")
            .field("kind", &self.kind)
            .field("role", &self.role)
            .field("id", &self.id)
            .field("id_type", &self.id_type.name())
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.role, self.id)?;
        if let Some(tenant) = &self.tenant_id {
            write!(f, "@{tenant}")?;
        }
        Ok(())
    }
}

/// Builds cache keys and extracts identifiers back out of them.
///
/// Backends that can store raw identifiers cheaply may supply their own factory; the
/// [`DefaultCacheKeysFactory`] wraps every identifier in a [`CacheKey`].
pub trait CacheKeysFactory: Send + Sync + fmt::Debug {
    /// Creates a key for entity state.
    fn create_entity_key(
        &self,
        id: Value,
        id_type: Arc<dyn IdentifierType>,
        entity_name: &str,
        tenant_id: Option<&str>,
    ) -> CacheKey {
        CacheKey::entity(id, id_type, entity_name, tenant_id)
    }

    /// Creates a key for collection state.
    fn create_collection_key(
        &self,
        id: Value,
        id_type: Arc<dyn IdentifierType>,
        role: &str,
        tenant_id: Option<&str>,
    ) -> CacheKey {
        CacheKey::collection(id, id_type, role, tenant_id)
    }

    /// Creates a key for natural-id resolution.
    fn create_natural_id_key(
        &self,
        values: Value,
        values_type: Arc<dyn IdentifierType>,
        entity_name: &str,
        tenant_id: Option<&str>,
    ) -> CacheKey {
        CacheKey::natural_id(values, values_type, entity_name, tenant_id)
    }

    /// Extracts the entity identifier from an entity key.
    fn entity_id<'a>(&self, key: &'a CacheKey) -> Option<&'a Value> {
        (key.kind() == CacheKeyKind::Entity).then(|| key.id())
    }

    /// Extracts the owner identifier from a collection key.
    fn collection_id<'a>(&self, key: &'a CacheKey) -> Option<&'a Value> {
        (key.kind() == CacheKeyKind::Collection).then(|| key.id())
    }

    /// Extracts the natural-id values from a natural-id key.
    fn natural_id_values<'a>(&self, key: &'a CacheKey) -> Option<&'a Value> {
        (key.kind() == CacheKeyKind::NaturalId).then(|| key.id())
    }
}

/// Cache keys factory producing plain [`CacheKey`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCacheKeysFactory;

impl CacheKeysFactory for DefaultCacheKeysFactory {}
