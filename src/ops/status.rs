//! Zone configuration status

use crate::cluster::{list_shards, ClusterAdmin, ShardInfo};
use crate::common::{Config, Result};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct ZoneStatus {
    pub zone: String,
    pub countries: Vec<String>,
    pub database: String,
    /// Shards named in the configuration
    pub configured_shards: Vec<String>,
    /// Cluster details of configured shards that exist
    pub shard_details: Vec<ShardInfo>,
    /// Shards the cluster actually tags with this zone
    pub assigned_shards: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoneStatusReport {
    pub zones: Vec<ZoneStatus>,
}

impl fmt::Display for ZoneStatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current zone configuration:")?;
        for zone in &self.zones {
            writeln!(f)?;
            writeln!(f, "Zone: {}", zone.zone.to_uppercase())?;
            writeln!(f, "  Countries: {}", zone.countries.join(", "))?;
            writeln!(f, "  Shards: {}", zone.configured_shards.join(", "))?;
            writeln!(f, "  Database: {}", zone.database)?;
            for shard in &zone.shard_details {
                writeln!(f, "    Shard {}: {}", shard.id, shard.host)?;
            }
            if zone.assigned_shards.is_empty() {
                writeln!(f, "  Assigned: none")?;
            } else {
                writeln!(f, "  Assigned: {}", zone.assigned_shards.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Configured zones joined with what the cluster reports
pub async fn zone_status(cluster: &dyn ClusterAdmin, config: &Config) -> Result<ZoneStatusReport> {
    let shards = list_shards(cluster).await?;

    let zones = config
        .zones
        .iter()
        .map(|zone| ZoneStatus {
            zone: zone.name.clone(),
            countries: zone.countries.clone(),
            database: zone.database.clone(),
            configured_shards: zone.shards.clone(),
            shard_details: shards
                .iter()
                .filter(|s| zone.shards.contains(&s.id))
                .cloned()
                .collect(),
            assigned_shards: shards
                .iter()
                .filter(|s| s.tags.contains(&zone.name))
                .map(|s| s.id.clone())
                .collect(),
        })
        .collect();

    Ok(ZoneStatusReport { zones })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::InMemoryCluster;
    use crate::ops::ZoneShardingManager;

    #[tokio::test]
    async fn test_status_before_and_after_setup() {
        let cluster = InMemoryCluster::new(&["shard00", "shard01"]);
        let config = Config::default();

        let before = zone_status(&cluster, &config).await.unwrap();
        assert_eq!(before.zones.len(), 2);
        assert!(before.zones.iter().all(|z| z.assigned_shards.is_empty()));
        assert_eq!(before.zones[0].shard_details[0].id, "shard00");

        ZoneShardingManager::new(&cluster, &config)
            .setup()
            .await
            .unwrap();

        let after = zone_status(&cluster, &config).await.unwrap();
        assert_eq!(after.zones[0].assigned_shards, vec!["shard00"]);
        assert_eq!(after.zones[1].assigned_shards, vec!["shard01"]);
        let text = after.to_string();
        assert!(text.contains("Zone: REGION1"));
        assert!(text.contains("Countries: AE, US, EU, GB"));
    }

    #[tokio::test]
    async fn test_status_with_atlas_shard_names() {
        let cluster = InMemoryCluster::new(&["atlas-x-shard-0", "atlas-x-shard-1"]);
        let config = Config::default();

        let report = zone_status(&cluster, &config).await.unwrap();
        // Configured names don't exist on this cluster
        assert!(report.zones.iter().all(|z| z.shard_details.is_empty()));
        assert!(report.to_string().contains("Assigned: none"));
    }
}
