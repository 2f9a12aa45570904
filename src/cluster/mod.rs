//! Cluster access
//!
//! Everything the crate asks of a sharded cluster goes through
//! [`ClusterAdmin`]. Two implementations exist:
//! - [`MongoCluster`]: a live cluster through the official driver
//! - [`InMemoryCluster`]: an in-process simulation for dry runs and tests

pub mod commands;
pub mod memory;
pub mod mongo;
pub mod placement;

pub use memory::InMemoryCluster;
pub use mongo::MongoCluster;
pub use placement::{assign_zones, ZoneAssignment};

use crate::common::{Error, Result};
use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shard id of the config shard on clusters that embed it
pub const CONFIG_SHARD: &str = "config";

/// Databases every deployment carries
pub const SYSTEM_DATABASES: &[&str] = &["admin", "config", "local"];

/// Operations issued against a sharded cluster
#[async_trait]
pub trait ClusterAdmin: Send + Sync {
    /// Run a command against the `admin` database
    async fn run_admin(&self, command: Document) -> Result<Document>;

    /// Run an aggregation against the `admin` database
    async fn aggregate_admin(&self, pipeline: Vec<Document>) -> Result<Vec<Document>>;

    async fn list_database_names(&self) -> Result<Vec<String>>;

    async fn list_collection_names(&self, db: &str) -> Result<Vec<String>>;

    /// Insert documents, returning how many were written
    async fn insert_many(&self, ns: &Namespace, docs: Vec<Document>) -> Result<u64>;

    /// Count documents, optionally restricted to `country ∈ countries`
    async fn count_documents(&self, ns: &Namespace, countries: Option<&[String]>) -> Result<u64>;

    /// String value of `field` in any one document of the collection
    async fn find_one_field(&self, ns: &Namespace, field: &str) -> Result<Option<String>>;

    async fn drop_database(&self, db: &str) -> Result<()>;
}

/// `database.collection`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace {
    pub db: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(db: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            collection: collection.into(),
        }
    }

    /// Split `db.collection`; the collection part may itself contain dots
    pub fn parse(ns: &str) -> Result<Self> {
        match ns.split_once('.') {
            Some((db, coll)) if !db.is_empty() && !coll.is_empty() => Ok(Self::new(db, coll)),
            _ => Err(Error::Other(format!("invalid namespace: {}", ns))),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.collection)
    }
}

/// One entry of a `listShards` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInfo {
    pub id: String,
    pub host: String,
    pub state: Option<i32>,
    /// Zones this shard belongs to
    pub tags: Vec<String>,
}

impl ShardInfo {
    pub fn is_config_shard(&self) -> bool {
        self.id == CONFIG_SHARD
    }
}

/// Parse the `shards` array of a `listShards` reply
pub fn parse_shards(reply: &Document) -> Result<Vec<ShardInfo>> {
    let shards = reply
        .get_array("shards")
        .map_err(|_| Error::UnexpectedReply("listShards reply has no shards array".into()))?;

    shards
        .iter()
        .map(|entry| {
            let doc = entry.as_document().ok_or_else(|| {
                Error::UnexpectedReply("listShards entry is not a document".into())
            })?;
            let id = doc
                .get_str("_id")
                .map_err(|_| Error::UnexpectedReply("listShards entry has no _id".into()))?;
            let tags = match doc.get("tags") {
                Some(Bson::Array(tags)) => tags
                    .iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect(),
                _ => Vec::new(),
            };
            Ok(ShardInfo {
                id: id.to_string(),
                host: doc.get_str("host").unwrap_or("Unknown").to_string(),
                state: doc.get_i32("state").ok(),
                tags,
            })
        })
        .collect()
}

/// Fetch the shard list
pub async fn list_shards(cluster: &dyn ClusterAdmin) -> Result<Vec<ShardInfo>> {
    let reply = cluster.run_admin(commands::list_shards()).await?;
    parse_shards(&reply)
}
