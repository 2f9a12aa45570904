//! Configuration for atlas-zones
//!
//! Layers, lowest priority first: built-in defaults, an optional TOML file,
//! `ATLAS_ZONES_*` environment variables. The CLI applies `--uri` on top.

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "atlas-zones.toml";

/// Environment prefix (`ATLAS_ZONES_URI`, `ATLAS_ZONES_DEMO__BATCH_SIZE`, ...)
pub const ENV_PREFIX: &str = "ATLAS_ZONES";

const URI_PLACEHOLDER: &str = "mongodb+srv://<user:password>@<cluster-url>";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Atlas connection string
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Application name reported to the server
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Server selection timeout
    #[serde(default = "default_server_selection_timeout")]
    pub server_selection_timeout_ms: u64,

    /// Zones, in assignment order
    #[serde(default = "default_zones")]
    pub zones: Vec<ZoneConfig>,

    #[serde(default)]
    pub collections: CollectionsConfig,

    #[serde(default)]
    pub demo: DemoConfig,

    #[serde(default)]
    pub atlas: AtlasConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_uri() -> String {
    URI_PLACEHOLDER.to_string()
}
fn default_app_name() -> String {
    "atlas-zones".to_string()
}
fn default_server_selection_timeout() -> u64 {
    5_000
}
fn default_log_level() -> String {
    "info".to_string()
}

fn default_zones() -> Vec<ZoneConfig> {
    vec![
        ZoneConfig {
            name: "region1".into(),
            shards: vec!["shard00".into()],
            countries: vec!["CN".into(), "TR".into()],
            database: "app_region1".into(),
        },
        ZoneConfig {
            name: "region2".into(),
            shards: vec!["shard01".into()],
            countries: vec!["AE".into(), "US".into(), "EU".into(), "GB".into()],
            database: "app_region2".into(),
        },
    ]
}

/// One data-residency zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub name: String,

    /// Shards this zone is expected to live on (display and cleanup)
    #[serde(default)]
    pub shards: Vec<String>,

    /// Country codes routed to this zone
    pub countries: Vec<String>,

    /// Regional database holding this zone's data
    pub database: String,
}

impl ZoneConfig {
    pub fn covers(&self, country: &str) -> bool {
        self.countries.iter().any(|c| c == country)
    }
}

/// Collection layout shared by every zone database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionsConfig {
    /// Replicated reference data, identical in every region
    #[serde(default = "default_common_collections")]
    pub common: Vec<String>,

    /// Per-tenant data, sharded by `{country, region}`
    #[serde(default = "default_tenant_collections")]
    pub tenant: Vec<String>,
}

fn default_common_collections() -> Vec<String> {
    vec!["users".into(), "products".into(), "categories".into()]
}
fn default_tenant_collections() -> Vec<String> {
    vec!["orders".into(), "transactions".into(), "logs".into()]
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            common: default_common_collections(),
            tenant: default_tenant_collections(),
        }
    }
}

/// Demo data volume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Tenant documents per zone, split evenly across its countries
    #[serde(default = "default_tenant_documents")]
    pub tenant_documents: usize,

    #[serde(default = "default_users")]
    pub users: usize,

    #[serde(default = "default_products")]
    pub products: usize,

    #[serde(default = "default_categories")]
    pub categories: usize,

    /// Max documents per insert_many
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Fixed RNG seed for reproducible data
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_tenant_documents() -> usize {
    1000
}
fn default_users() -> usize {
    50
}
fn default_products() -> usize {
    100
}
fn default_categories() -> usize {
    20
}
fn default_batch_size() -> usize {
    500
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            tenant_documents: default_tenant_documents(),
            users: default_users(),
            products: default_products(),
            categories: default_categories(),
            batch_size: default_batch_size(),
            seed: None,
        }
    }
}

/// Atlas project metadata, informational only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtlasConfig {
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,
    #[serde(default = "default_project_id")]
    pub project_id: String,
}

fn default_cluster_name() -> String {
    "<atlas-cluster-name>".to_string()
}
fn default_project_id() -> String {
    "<project-id>".to_string()
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            cluster_name: default_cluster_name(),
            project_id: default_project_id(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            app_name: default_app_name(),
            server_selection_timeout_ms: default_server_selection_timeout(),
            zones: default_zones(),
            collections: CollectionsConfig::default(),
            demo: DemoConfig::default(),
            atlas: AtlasConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, a TOML file and the environment.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check structural invariants of the zone table
    pub fn validate(&self) -> Result<()> {
        if self.zones.is_empty() {
            return Err(Error::InvalidConfig("at least one zone is required".into()));
        }

        let mut names = HashSet::new();
        let mut countries = HashSet::new();
        let mut databases = HashSet::new();
        for zone in &self.zones {
            if zone.name.trim().is_empty() {
                return Err(Error::InvalidConfig("zone name cannot be empty".into()));
            }
            if !names.insert(zone.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate zone name: {}",
                    zone.name
                )));
            }
            if zone.countries.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "zone {} has no countries",
                    zone.name
                )));
            }
            for country in &zone.countries {
                if !countries.insert(country.as_str()) {
                    return Err(Error::InvalidConfig(format!(
                        "country {} is mapped to more than one zone",
                        country
                    )));
                }
            }
            validate_database_name(&zone.database)?;
            if !databases.insert(zone.database.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "database {} is used by more than one zone",
                    zone.database
                )));
            }
        }

        if self.collections.common.is_empty() || self.collections.tenant.is_empty() {
            return Err(Error::InvalidConfig(
                "common and tenant collection lists must be non-empty".into(),
            ));
        }
        if let Some(name) = self
            .collections
            .common
            .iter()
            .find(|c| self.collections.tenant.contains(c))
        {
            return Err(Error::InvalidConfig(format!(
                "collection {} is both common and tenant",
                name
            )));
        }

        if self.demo.tenant_documents == 0 {
            return Err(Error::InvalidConfig(
                "demo.tenant_documents must be positive".into(),
            ));
        }
        if self.demo.batch_size == 0 {
            return Err(Error::InvalidConfig("demo.batch_size must be positive".into()));
        }

        Ok(())
    }

    /// Reject a missing or placeholder connection string
    pub fn ensure_uri(&self) -> Result<()> {
        let uri = self.uri.trim();
        if uri.is_empty() || uri.contains('<') || uri.contains('>') {
            return Err(Error::InvalidConfig(
                "connection string not configured: set --uri, MONGODB_URI or `uri` in the config file"
                    .into(),
            ));
        }
        if !(uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://")) {
            return Err(Error::InvalidConfig(format!(
                "connection string must start with mongodb:// or mongodb+srv://, got {}",
                redact_uri(uri)
            )));
        }
        Ok(())
    }

    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.server_selection_timeout_ms)
    }

    pub fn zone(&self, name: &str) -> Option<&ZoneConfig> {
        self.zones.iter().find(|z| z.name == name)
    }

    pub fn zone_for_country(&self, country: &str) -> Option<&ZoneConfig> {
        self.zones.iter().find(|z| z.covers(country))
    }
}

/// Database names accepted by the server
pub fn validate_database_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidConfig("database name cannot be empty".into()));
    }
    if name.len() >= 64 {
        return Err(Error::InvalidConfig(format!(
            "database name too long (max 63 bytes): {}",
            name
        )));
    }
    if name.chars().any(|c| matches!(c, '/' | '\\' | '.' | ' ' | '"' | '$' | '\0')) {
        return Err(Error::InvalidConfig(format!(
            "database name contains invalid characters: {}",
            name
        )));
    }
    Ok(())
}

/// Hide credentials in a connection string for logs
pub fn redact_uri(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &uri[..scheme_end], &uri[at + 1..])
        }
        _ => uri.to_string(),
    }
}
