//! Engine configuration.
//!
//! Every field has a serde default so partial JSON files load cleanly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use crate::error::ConfigError;

/// Storage namespace used by the persistent cache.
pub const DEFAULT_NAMESPACE: &str = "de.unimainz.imbei.dslib";

/// Resolver used for subjects without a dedicated registration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DefaultResolverKind {
    /// Groups keys into bounded batch requests
    #[default]
    Batched,
    /// One request per distinct key (backends without a batch endpoint)
    PerKey,
    /// No default; unregistered subjects are dropped
    None,
}

/// Cache store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct CacheConfig {
    /// Consult and fill the cache at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Keep the cache in session storage so it survives reloads
    #[serde(default)]
    pub persistent: bool,
    /// Entries older than this are dropped by the capacity sweep
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    /// Capacity that triggers the sweep
    #[validate(range(min = 1_usize))]
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Key prefix inside session storage
    #[validate(length(min = 1_u64))]
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Session storage file; defaults to the user data dir
    #[serde(default)]
    pub storage_path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            persistent: false,
            max_age_secs: default_max_age_secs(),
            max_items: default_max_items(),
            namespace: default_namespace(),
            storage_path: None,
        }
    }
}

/// Batched resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct BatchConfig {
    /// Resolve endpoint, relative to the transport base URL
    #[serde(default = "default_resolve_url")]
    pub resolve_url: String,
    /// Upper bound on keys per request
    #[validate(range(min = 1_usize))]
    #[serde(default = "default_max_ids_per_request")]
    pub max_ids_per_request: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            resolve_url: default_resolve_url(),
            max_ids_per_request: default_max_ids_per_request(),
        }
    }
}

/// Per-key resolver configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct PerKeyConfig {
    /// Base URL of the patient list service
    #[serde(default)]
    pub base_url: Option<String>,
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct TransportConfig {
    /// Prefix for relative request URLs
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-request timeout
    #[validate(range(min = 1_u64))]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Query parameters appended to every request
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { base_url: None, timeout_secs: default_timeout_secs(), params: BTreeMap::new() }
    }
}

/// Top-level configuration of a resolution engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub per_key: PerKeyConfig,
    #[serde(default)]
    pub default_resolver: DefaultResolverKind,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl EngineConfig {
    /// Validates every section and cross-section requirement.
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        validate_section("cache", &self.cache)?;
        validate_section("batch", &self.batch)?;
        validate_section("per_key", &self.per_key)?;
        validate_section("transport", &self.transport)?;

        if self.default_resolver == DefaultResolverKind::PerKey
            && self.per_key.base_url.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::MissingUrl { resolver: "per_key".to_string() });
        }
        Ok(())
    }
}

fn validate_section(field: &str, section: &impl Validate) -> Result<(), ConfigError> {
    section.validate().map_err(|e| ConfigError::ValidationError {
        field: field.to_string(),
        message: e.to_string(),
    })
}

const fn default_true() -> bool {
    true
}

const fn default_max_age_secs() -> u64 {
    12 * 60
}

const fn default_max_items() -> usize {
    1000
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_resolve_url() -> String {
    "resolveTempIds".to_string()
}

const fn default_max_ids_per_request() -> usize {
    20
}

const fn default_timeout_secs() -> u64 {
    10
}
