// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache settings and region configuration.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Unqualified name of the region holding query results when no explicit region is named.
pub const DEFAULT_QUERY_RESULTS_REGION_NAME: &str = "default-query-results-region";

/// Unqualified name of the region holding per-space update timestamps.
pub const DEFAULT_UPDATE_TIMESTAMPS_REGION_NAME: &str = "default-update-timestamps-region";

/// Prefix of the configuration keys understood by [`CacheSettings::from_config_values`].
pub const CONFIG_PREFIX: &str = "tidemark.cache.";

/// Settings handed to a region factory when it starts.
///
/// Settings can be assembled with the `with_*` methods, deserialized with serde, or parsed
/// from flat configuration values:
///
/// ```
/// use std::collections::BTreeMap;
/// use tidemark_region::CacheSettings;
///
/// let mut values = BTreeMap::new();
/// values.insert("tidemark.cache.use_query_cache".to_string(), "true".to_string());
/// values.insert("tidemark.cache.region_prefix".to_string(), "app".to_string());
///
/// let settings = CacheSettings::from_config_values(&values)?;
/// assert!(settings.use_query_cache);
/// assert_eq!(settings.region_prefix.as_deref(), Some("app"));
/// # Ok::<(), tidemark_region::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Whether entity, collection and natural-id data is cached.
    pub use_second_level_cache: bool,
    /// Whether query results are cached. Also decides whether update timestamps are tracked.
    pub use_query_cache: bool,
    /// Prefix prepended to every region name before it reaches the backend.
    pub region_prefix: Option<String>,
    /// Overrides the factory's default minimal-puts policy when set.
    pub minimal_puts: Option<bool>,
    /// Unqualified name of the default query results region.
    pub query_results_region: String,
    /// Unqualified name of the update timestamps region.
    pub timestamps_region: String,
    /// Backend-specific settings, passed through untouched.
    pub properties: BTreeMap<String, String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            use_second_level_cache: true,
            use_query_cache: false,
            region_prefix: None,
            minimal_puts: None,
            query_results_region: DEFAULT_QUERY_RESULTS_REGION_NAME.to_owned(),
            timestamps_region: DEFAULT_UPDATE_TIMESTAMPS_REGION_NAME.to_owned(),
            properties: BTreeMap::new(),
        }
    }
}

impl CacheSettings {
    /// Creates settings with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables query result caching.
    #[must_use]
    pub fn with_query_cache(mut self, enabled: bool) -> Self {
        self.use_query_cache = enabled;
        self
    }

    /// Enables or disables entity/collection caching.
    #[must_use]
    pub fn with_second_level_cache(mut self, enabled: bool) -> Self {
        self.use_second_level_cache = enabled;
        self
    }

    /// Sets the region name prefix.
    #[must_use]
    pub fn with_region_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.region_prefix = Some(prefix.into());
        self
    }

    /// Overrides the minimal-puts policy.
    #[must_use]
    pub fn with_minimal_puts(mut self, enabled: bool) -> Self {
        self.minimal_puts = Some(enabled);
        self
    }

    /// Sets a backend-specific property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Parses settings from flat configuration values.
    ///
    /// Keys under [`CONFIG_PREFIX`] set the matching field; any other key is kept in
    /// [`properties`][Self::properties] for the backend. Unknown keys under the prefix and
    /// unparsable values are rejected.
    pub fn from_config_values(values: &BTreeMap<String, String>) -> Result<Self> {
        let mut settings = Self::default();
        for (key, value) in values {
            let Some(name) = key.strip_prefix(CONFIG_PREFIX) else {
                settings.properties.insert(key.clone(), value.clone());
                continue;
            };
            match name {
                "use_second_level_cache" => settings.use_second_level_cache = parse_flag(key, value)?,
                "use_query_cache" => settings.use_query_cache = parse_flag(key, value)?,
                "use_minimal_puts" => settings.minimal_puts = Some(parse_flag(key, value)?),
                "region_prefix" => {
                    let prefix = value.trim();
                    settings.region_prefix = (!prefix.is_empty()).then(|| prefix.to_owned());
                }
                "query_results_region" => settings.query_results_region = parse_name(key, value)?,
                "timestamps_region" => settings.timestamps_region = parse_name(key, value)?,
                _ => return Err(Error::configuration(format!("unknown setting `{key}`"))),
            }
        }
        Ok(settings)
    }

    /// Returns the minimal-puts policy, falling back to `factory_default` when not overridden.
    #[must_use]
    pub fn minimal_puts_or(&self, factory_default: bool) -> bool {
        self.minimal_puts.unwrap_or(factory_default)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(Error::configuration(format!("`{key}` expects a boolean, got `{other}`"))),
    }
}

fn parse_name(key: &str, value: &str) -> Result<String> {
    let name = value.trim();
    if name.is_empty() {
        return Err(Error::configuration(format!("`{key}` must not be empty")));
    }
    Ok(name.to_owned())
}

/// Concurrency strategy requested for a cached entity, collection or natural-id role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessType {
    /// Data is never updated once cached.
    ReadOnly,
    /// Data is updated; the backend coordinates readers and writers with soft locks.
    ReadWrite,
    /// Data is updated rarely; concurrent writers may briefly expose stale state.
    NonstrictReadWrite,
    /// Data is updated inside backend transactions.
    Transactional,
}

impl AccessType {
    /// Returns the external name of this access type.
    #[must_use]
    pub fn external_name(self) -> &'static str {
        match self {
            Self::ReadOnly => "read-only",
            Self::ReadWrite => "read-write",
            Self::NonstrictReadWrite => "nonstrict-read-write",
            Self::Transactional => "transactional",
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.external_name())
    }
}

impl FromStr for AccessType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read-only" | "read_only" => Ok(Self::ReadOnly),
            "read-write" | "read_write" => Ok(Self::ReadWrite),
            "nonstrict-read-write" | "nonstrict_read_write" => Ok(Self::NonstrictReadWrite),
            "transactional" => Ok(Self::Transactional),
            other => Err(Error::configuration(format!("unknown access type `{other}`"))),
        }
    }
}

/// Caching configuration of one entity, collection or natural-id role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCachingConfig {
    /// Entity name or collection role.
    pub role: String,
    /// Requested access type.
    pub access_type: AccessType,
}

impl RoleCachingConfig {
    /// Creates a role configuration.
    pub fn new(role: impl Into<String>, access_type: AccessType) -> Self {
        Self {
            role: role.into(),
            access_type,
        }
    }
}

/// Everything needed to build one domain-data region.
///
/// Several roles may share one region; their keys are kept apart by
/// [`CacheKey`][crate::CacheKey].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainDataRegionConfig {
    /// Unqualified region name.
    pub region_name: String,
    /// Entity roles stored in the region.
    #[serde(default)]
    pub entities: Vec<RoleCachingConfig>,
    /// Collection roles stored in the region.
    #[serde(default)]
    pub collections: Vec<RoleCachingConfig>,
    /// Natural-id roles stored in the region.
    #[serde(default)]
    pub natural_ids: Vec<RoleCachingConfig>,
}

impl DomainDataRegionConfig {
    /// Creates an empty configuration for `region_name`.
    pub fn new(region_name: impl Into<String>) -> Self {
        Self {
            region_name: region_name.into(),
            entities: Vec::new(),
            collections: Vec::new(),
            natural_ids: Vec::new(),
        }
    }

    /// Adds an entity role.
    #[must_use]
    pub fn with_entity(mut self, role: impl Into<String>, access_type: AccessType) -> Self {
        self.entities.push(RoleCachingConfig::new(role, access_type));
        self
    }

    /// Adds a collection role.
    #[must_use]
    pub fn with_collection(mut self, role: impl Into<String>, access_type: AccessType) -> Self {
        self.collections.push(RoleCachingConfig::new(role, access_type));
        self
    }

    /// Adds a natural-id role.
    #[must_use]
    pub fn with_natural_id(mut self, role: impl Into<String>, access_type: AccessType) -> Self {
        self.natural_ids.push(RoleCachingConfig::new(role, access_type));
        self
    }

    /// Returns `true` if no role is stored in this region.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.collections.is_empty() && self.natural_ids.is_empty()
    }

    /// Returns every role name stored in this region.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.entities
            .iter()
            .chain(&self.collections)
            .chain(&self.natural_ids)
            .map(|config| config.role.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
    }

    #[test]
    fn defaults_match_standard_region_names() {
        let settings = CacheSettings::default();
        assert!(settings.use_second_level_cache);
        assert!(!settings.use_query_cache);
        assert_eq!(settings.query_results_region, DEFAULT_QUERY_RESULTS_REGION_NAME);
        assert_eq!(settings.timestamps_region, DEFAULT_UPDATE_TIMESTAMPS_REGION_NAME);
    }

    #[test]
    fn config_values_set_fields_and_keep_foreign_keys() {
        let settings = CacheSettings::from_config_values(&values(&[
            ("tidemark.cache.use_query_cache", "yes"),
            ("tidemark.cache.use_minimal_puts", "false"),
            ("tidemark.cache.timestamps_region", "ts"),
            ("backend.max_capacity", "100"),
        ]))
        .expect("valid settings");

        assert!(settings.use_query_cache);
        assert_eq!(settings.minimal_puts, Some(false));
        assert_eq!(settings.timestamps_region, "ts");
        assert_eq!(settings.properties.get("backend.max_capacity").map(String::as_str), Some("100"));
    }

    #[test]
    fn config_values_reject_bad_input() {
        CacheSettings::from_config_values(&values(&[("tidemark.cache.use_query_cache", "maybe")]))
            .expect_err("not a boolean");
        CacheSettings::from_config_values(&values(&[("tidemark.cache.bogus", "1")])).expect_err("unknown key");
        CacheSettings::from_config_values(&values(&[("tidemark.cache.query_results_region", " ")]))
            .expect_err("empty name");
    }

    #[test]
    fn blank_prefix_means_no_prefix() {
        let settings = CacheSettings::from_config_values(&values(&[("tidemark.cache.region_prefix", "  ")]))
            .expect("valid settings");
        assert_eq!(settings.region_prefix, None);
    }

    #[test]
    fn minimal_puts_override() {
        assert!(CacheSettings::new().minimal_puts_or(true));
        assert!(!CacheSettings::new().with_minimal_puts(false).minimal_puts_or(true));
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: CacheSettings =
            serde_json::from_str(r#"{ "use_query_cache": true, "region_prefix": "svc" }"#).expect("valid json");
        assert!(settings.use_query_cache);
        assert!(settings.use_second_level_cache);
        assert_eq!(settings.region_prefix.as_deref(), Some("svc"));
        assert_eq!(settings.query_results_region, DEFAULT_QUERY_RESULTS_REGION_NAME);
    }

    #[test]
    fn access_type_round_trips_through_external_name() {
        for access in [
            AccessType::ReadOnly,
            AccessType::ReadWrite,
            AccessType::NonstrictReadWrite,
            AccessType::Transactional,
        ] {
            assert_eq!(access.external_name().parse::<AccessType>().expect("known name"), access);
        }
        "sometimes".parse::<AccessType>().expect_err("unknown name");
    }

    #[test]
    fn region_config_lists_roles() {
        let config = DomainDataRegionConfig::new("people")
            .with_entity("Person", AccessType::ReadWrite)
            .with_collection("Person.addresses", AccessType::ReadWrite)
            .with_natural_id("Person", AccessType::ReadOnly);

        assert!(!config.is_empty());
        assert_eq!(config.roles().collect::<Vec<_>>(), ["Person", "Person.addresses", "Person"]);
        assert!(DomainDataRegionConfig::new("empty").is_empty());
    }
}
