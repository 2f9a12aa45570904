//! Demo reset
//!
//! Order matters: a shard cannot leave a zone that still owns key ranges, so
//! ranges are cleared first, then zone memberships, then the databases.

use crate::cluster::{commands, list_shards, ClusterAdmin, Namespace};
use crate::common::{Config, Result};
use crate::ops::{classify, StepOutcome, StepStatus, Tolerate};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub steps: Vec<StepOutcome>,
    pub dropped_databases: Vec<String>,
}

impl CleanupReport {
    pub fn failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Failed(_)))
            .count()
    }
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cleanup report:")?;
        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }
        for db in &self.dropped_databases {
            writeln!(f, "  ✓ Dropped database: {}", db)?;
        }
        write!(f, "  Failed steps: {}", self.failures())
    }
}

/// Remove zone ranges, zone memberships and demo databases
pub async fn cleanup_cluster(cluster: &dyn ClusterAdmin, config: &Config) -> Result<CleanupReport> {
    tracing::info!("Cleaning up zone configuration");
    let mut steps = Vec::new();

    for zone in &config.zones {
        for collection in &config.collections.tenant {
            let ns = Namespace::new(zone.database.as_str(), collection.as_str());
            for country in &zone.countries {
                let result = cluster
                    .run_admin(commands::update_zone_key_range(
                        &ns,
                        commands::country_range_min(country),
                        commands::country_range_max(country),
                        None,
                    ))
                    .await;
                steps.push(classify(
                    "updateZoneKeyRange",
                    &format!("{} {} -> none", ns, country),
                    result,
                    Tolerate::Absent,
                ));
            }
        }
    }

    // Configured shards plus whatever the cluster has actually tagged
    let shards = list_shards(cluster).await?;
    for zone in &config.zones {
        let mut members: BTreeSet<String> = zone
            .shards
            .iter()
            .filter(|id| shards.iter().any(|s| &s.id == *id))
            .cloned()
            .collect();
        members.extend(
            shards
                .iter()
                .filter(|s| s.tags.contains(&zone.name))
                .map(|s| s.id.clone()),
        );

        for shard in members {
            let result = cluster
                .run_admin(commands::remove_shard_from_zone(&shard, &zone.name))
                .await;
            steps.push(classify(
                "removeShardFromZone",
                &format!("{} -> {}", shard, zone.name),
                result,
                Tolerate::Absent,
            ));
        }
    }

    let mut dropped_databases = Vec::new();
    for zone in &config.zones {
        cluster.drop_database(&zone.database).await?;
        tracing::info!(database = %zone.database, "Dropped database");
        dropped_databases.push(zone.database.clone());
    }

    Ok(CleanupReport {
        steps,
        dropped_databases,
    })
}
