//! Connection check and cluster overview

use crate::cluster::{commands, list_shards, ClusterAdmin, ShardInfo, SYSTEM_DATABASES};
use crate::common::Result;
use mongodb::bson::{Bson, Document};
use serde::Serialize;
use std::fmt;

/// `msg` value of a `hello` reply from a mongos router
const MONGOS_MARKER: &str = "isdbgrid";

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    /// Primary host as reported by `hello`; routers do not report one
    pub primary: Option<String>,
    pub writable_primary: bool,
    pub mongos: bool,
    pub hosts: Vec<String>,
    pub max_wire_version: Option<i32>,
    pub shards: Vec<ShardInfo>,
    /// Set when the shard list could not be read
    pub warning: Option<String>,
}

impl fmt::Display for ConnectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "✓ Connected")?;
        writeln!(
            f,
            "  Primary: {}",
            self.primary.as_deref().unwrap_or("Unknown")
        )?;
        writeln!(f, "  Writable primary: {}", self.writable_primary)?;
        writeln!(f, "  Mongos: {}", self.mongos)?;
        if let Some(version) = self.max_wire_version {
            writeln!(f, "  Max wire version: {}", version)?;
        }
        if !self.hosts.is_empty() {
            writeln!(f, "  Hosts: {}", self.hosts.join(", "))?;
        }
        match &self.warning {
            Some(warning) => write!(f, "  ! {}", warning),
            None => write!(f, "  Shards: {}", self.shards.len()),
        }
    }
}

/// Ping the cluster and describe what answered
pub async fn test_connection(cluster: &dyn ClusterAdmin) -> Result<ConnectionReport> {
    cluster.run_admin(commands::ping()).await?;
    tracing::info!("Ping succeeded");

    let hello = cluster.run_admin(commands::hello()).await?;
    let mut report = describe_hello(&hello);

    match list_shards(cluster).await {
        Ok(shards) => report.shards = shards,
        Err(e) => {
            tracing::warn!(error = %e, "Could not list shards");
            report.warning = Some(format!("could not list shards: {}", e));
        }
    }
    Ok(report)
}

fn describe_hello(hello: &Document) -> ConnectionReport {
    let hosts = match hello.get("hosts") {
        Some(Bson::Array(hosts)) => hosts
            .iter()
            .filter_map(|h| h.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    ConnectionReport {
        primary: hello.get_str("primary").ok().map(str::to_string),
        writable_primary: hello
            .get_bool("isWritablePrimary")
            .or_else(|_| hello.get_bool("ismaster"))
            .unwrap_or(false),
        mongos: hello.get_str("msg").map(|m| m == MONGOS_MARKER).unwrap_or(false),
        hosts,
        max_wire_version: hello.get_i32("maxWireVersion").ok(),
        shards: Vec::new(),
        warning: None,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub collections: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterInfo {
    pub shards: Vec<ShardInfo>,
    pub databases: Vec<DatabaseInfo>,
}

impl fmt::Display for ClusterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cluster information:")?;
        writeln!(f, "  Shards ({}):", self.shards.len())?;
        for shard in &self.shards {
            write!(f, "    - {}: {}", shard.id, shard.host)?;
            if !shard.tags.is_empty() {
                write!(f, " [zones: {}]", shard.tags.join(", "))?;
            }
            writeln!(f)?;
        }
        write!(f, "  Databases ({}):", self.databases.len())?;
        for db in &self.databases {
            write!(f, "\n    - {}: {} collections", db.name, db.collections)?;
        }
        Ok(())
    }
}

/// Shards and user databases
pub async fn cluster_info(cluster: &dyn ClusterAdmin) -> Result<ClusterInfo> {
    let shards = list_shards(cluster).await?;

    let mut databases = Vec::new();
    for name in cluster.list_database_names().await? {
        if SYSTEM_DATABASES.contains(&name.as_str()) {
            continue;
        }
        let collections = cluster.list_collection_names(&name).await?.len();
        databases.push(DatabaseInfo { name, collections });
    }

    Ok(ClusterInfo { shards, databases })
}
