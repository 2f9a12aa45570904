//! Zone sharding setup
//!
//! Sequence, per run:
//! 1. `listShards`, check there are enough shards
//! 2. `addShardToZone` for each zone's assigned shard
//! 3. per zone database: `enableSharding`, `movePrimary`, then
//!    `shardCollection` + one `updateZoneKeyRange` per country for each
//!    tenant collection
//!
//! Steps are idempotent: re-running reports them as `already`.

use crate::cluster::{
    assign_zones, commands, list_shards, ClusterAdmin, Namespace, ShardInfo, ZoneAssignment,
};
use crate::common::{Config, Result};
use crate::ops::{classify, StepOutcome, StepStatus, Tolerate};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct SetupReport {
    pub shards: Vec<String>,
    pub assignments: Vec<ZoneAssignment>,
    pub steps: Vec<StepOutcome>,
}

impl SetupReport {
    pub fn failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Failed(_)))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }
}

impl fmt::Display for SetupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Zone sharding setup:")?;
        writeln!(f, "  Shards: {}", self.shards.join(", "))?;
        for a in &self.assignments {
            writeln!(
                f,
                "  Zone {}: {} -> {} (database {})",
                a.zone,
                a.countries.join(", "),
                a.shard,
                a.database
            )?;
        }
        writeln!(f, "  Steps:")?;
        for step in &self.steps {
            writeln!(f, "    {}", step)?;
        }
        if self.is_success() {
            write!(f, "  Setup completed")
        } else {
            write!(f, "  Setup finished with {} failed step(s)", self.failures())
        }
    }
}

/// Drives zone configuration on one cluster
pub struct ZoneShardingManager<'a> {
    cluster: &'a dyn ClusterAdmin,
    config: &'a Config,
}

impl<'a> ZoneShardingManager<'a> {
    pub fn new(cluster: &'a dyn ClusterAdmin, config: &'a Config) -> Self {
        Self { cluster, config }
    }

    /// Shards of the cluster
    pub async fn shards(&self) -> Result<Vec<ShardInfo>> {
        let shards = list_shards(self.cluster).await?;
        tracing::info!(
            shards = ?shards.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            "Found cluster shards"
        );
        Ok(shards)
    }

    /// Run the full setup sequence
    pub async fn setup(&self) -> Result<SetupReport> {
        tracing::info!("Setting up zone sharding");

        let shards = self.shards().await?;
        let assignments = assign_zones(&self.config.zones, &shards)?;

        let mut steps = Vec::new();
        for assignment in &assignments {
            steps.push(self.add_shard_to_zone(&assignment.shard, &assignment.zone).await);
        }
        for assignment in &assignments {
            self.setup_database(assignment, &mut steps).await;
        }

        let report = SetupReport {
            shards: shards.into_iter().map(|s| s.id).collect(),
            assignments,
            steps,
        };
        if report.is_success() {
            tracing::info!("Zone sharding setup completed");
        } else {
            tracing::warn!(failures = report.failures(), "Zone sharding setup incomplete");
        }
        Ok(report)
    }

    pub async fn add_shard_to_zone(&self, shard: &str, zone: &str) -> StepOutcome {
        let result = self
            .cluster
            .run_admin(commands::add_shard_to_zone(shard, zone))
            .await;
        classify(
            "addShardToZone",
            &format!("{} -> {}", shard, zone),
            result,
            Tolerate::AlreadyDone,
        )
    }

    pub async fn enable_sharding(&self, db: &str) -> StepOutcome {
        let result = self.cluster.run_admin(commands::enable_sharding(db)).await;
        classify("enableSharding", db, result, Tolerate::AlreadyDone)
    }

    pub async fn move_primary(&self, db: &str, shard: &str) -> StepOutcome {
        let result = self.cluster.run_admin(commands::move_primary(db, shard)).await;
        classify(
            "movePrimary",
            &format!("{} -> {}", db, shard),
            result,
            Tolerate::AlreadyDone,
        )
    }

    /// Shard `ns` on the tenant key, then pin each country's range to `zone`
    pub async fn shard_collection(
        &self,
        ns: &Namespace,
        zone: &str,
        countries: &[String],
    ) -> Vec<StepOutcome> {
        let result = self
            .cluster
            .run_admin(commands::shard_collection(ns, commands::tenant_shard_key()))
            .await;
        let sharded = classify("shardCollection", &ns.to_string(), result, Tolerate::AlreadyDone);
        let ready = sharded.status.is_ok();

        let mut steps = vec![sharded];
        if !ready {
            return steps;
        }
        for country in countries {
            let result = self
                .cluster
                .run_admin(commands::update_zone_key_range(
                    ns,
                    commands::country_range_min(country),
                    commands::country_range_max(country),
                    Some(zone),
                ))
                .await;
            steps.push(classify(
                "updateZoneKeyRange",
                &format!("{} {} -> {}", ns, country, zone),
                result,
                Tolerate::AlreadyDone,
            ));
        }
        steps
    }

    async fn setup_database(&self, assignment: &ZoneAssignment, steps: &mut Vec<StepOutcome>) {
        let db = &assignment.database;

        let enabled = self.enable_sharding(db).await;
        let ok = enabled.status.is_ok();
        steps.push(enabled);
        if !ok {
            self.skip_collections(db, "enableSharding failed", steps);
            return;
        }

        let moved = self.move_primary(db, &assignment.shard).await;
        let ok = moved.status.is_ok();
        steps.push(moved);
        if !ok {
            self.skip_collections(db, "movePrimary failed", steps);
            return;
        }

        for collection in &self.config.collections.tenant {
            let ns = Namespace::new(db.as_str(), collection.as_str());
            steps.extend(
                self.shard_collection(&ns, &assignment.zone, &assignment.countries)
                    .await,
            );
        }
    }

    fn skip_collections(&self, db: &str, reason: &str, steps: &mut Vec<StepOutcome>) {
        for collection in &self.config.collections.tenant {
            let ns = Namespace::new(db, collection.as_str());
            tracing::warn!(ns = %ns, reason, "Skipping collection");
            steps.push(StepOutcome::new(
                "shardCollection",
                ns.to_string(),
                StepStatus::Skipped(reason.to_string()),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::InMemoryCluster;
    use crate::common::Error;

    #[tokio::test]
    async fn test_setup_on_fresh_cluster() {
        let cluster = InMemoryCluster::atlas_like();
        let config = Config::default();
        let manager = ZoneShardingManager::new(&cluster, &config);

        let report = manager.setup().await.unwrap();
        assert!(report.is_success(), "{}", report);
        assert_eq!(report.shards, vec!["shard00", "shard01", "config"]);
        assert_eq!(report.assignments[0].shard, "shard00");
        assert_eq!(report.assignments[1].shard, "shard01");

        assert_eq!(cluster.shard_tags("shard00"), vec!["region1"]);
        assert_eq!(cluster.shard_tags("shard01"), vec!["region2"]);
        assert!(cluster.shard_tags("config").is_empty());
        assert_eq!(cluster.primary_of("app_region2").as_deref(), Some("shard01"));

        let orders = Namespace::new("app_region2", "orders");
        assert!(cluster.is_sharded(&orders));
        let ranges = cluster.zone_ranges(&orders);
        assert_eq!(ranges.len(), 4);
        assert!(ranges.iter().all(|(_, _, zone)| zone == "region2"));
    }

    #[tokio::test]
    async fn test_setup_twice_is_idempotent() {
        let cluster = InMemoryCluster::atlas_like();
        let config = Config::default();
        let manager = ZoneShardingManager::new(&cluster, &config);

        manager.setup().await.unwrap();
        let second = manager.setup().await.unwrap();
        assert!(second.is_success(), "{}", second);
        assert_eq!(
            cluster.zone_ranges(&Namespace::new("app_region1", "logs")).len(),
            2
        );
    }

    #[tokio::test]
    async fn test_setup_requires_two_shards() {
        let cluster = InMemoryCluster::new(&["shard00"]);
        let config = Config::default();
        let err = ZoneShardingManager::new(&cluster, &config)
            .setup()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientShards { available: 1, .. }));

        let empty = InMemoryCluster::new::<&str>(&[]);
        let err = ZoneShardingManager::new(&empty, &config)
            .setup()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoShards));
    }

    #[tokio::test]
    async fn test_move_primary_failure_skips_collections() {
        let cluster = InMemoryCluster::atlas_like();
        cluster.fail_command("movePrimary", "movePrimary is not allowed");
        let config = Config::default();

        let report = ZoneShardingManager::new(&cluster, &config)
            .setup()
            .await
            .unwrap();
        assert!(!report.is_success());
        let skipped = report
            .steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Skipped(_)))
            .count();
        assert_eq!(skipped, 2 * config.collections.tenant.len());
        assert!(!cluster.is_sharded(&Namespace::new("app_region1", "orders")));
        // Zones were still created
        assert_eq!(cluster.shard_tags("shard00"), vec!["region1"]);
    }

    #[tokio::test]
    async fn test_enable_sharding_failure_skips_database() {
        let cluster = InMemoryCluster::atlas_like();
        cluster.fail_command("enableSharding", "not authorized on app_region1");
        let config = Config::default();

        let report = ZoneShardingManager::new(&cluster, &config)
            .setup()
            .await
            .unwrap();
        assert_eq!(report.failures(), 2);
        let skipped: Vec<_> = report
            .steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Skipped(_)))
            .collect();
        assert_eq!(skipped.len(), 2 * config.collections.tenant.len());
        assert!(skipped.iter().all(|s| s.step == "shardCollection"));

        // Zone membership still ran; nothing past enableSharding did
        assert_eq!(cluster.shard_tags("shard01"), vec!["region2"]);
        let names = cluster.command_names();
        assert!(!names.iter().any(|n| n == "movePrimary" || n == "shardCollection"));
    }

    #[tokio::test]
    async fn test_zone_range_failures_do_not_abort() {
        let cluster = InMemoryCluster::atlas_like();
        cluster.fail_command("updateZoneKeyRange", "boom");
        let config = Config::default();

        let report = ZoneShardingManager::new(&cluster, &config)
            .setup()
            .await
            .unwrap();
        let countries: usize = config.zones.iter().map(|z| z.countries.len()).sum();
        assert_eq!(report.failures(), countries * config.collections.tenant.len());
        assert!(report
            .steps
            .iter()
            .filter(|s| s.step == "updateZoneKeyRange")
            .all(|s| matches!(&s.status, StepStatus::Failed(m) if m.contains("boom"))));

        // Every tenant collection was still sharded
        for zone in &config.zones {
            for collection in &config.collections.tenant {
                let ns = Namespace::new(zone.database.as_str(), collection.as_str());
                assert!(cluster.is_sharded(&ns), "{}", ns);
                assert!(cluster.zone_ranges(&ns).is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_already_errors_count_as_done() {
        let cluster = InMemoryCluster::atlas_like();
        let config = Config::default();
        let manager = ZoneShardingManager::new(&cluster, &config);
        manager.setup().await.unwrap();

        cluster.fail_command("enableSharding", "sharding already enabled for database");
        let report = manager.setup().await.unwrap();
        assert!(report.is_success(), "{}", report);
        assert!(report
            .steps
            .iter()
            .any(|s| s.step == "enableSharding" && s.status == StepStatus::Already));
    }

    #[tokio::test]
    async fn test_command_sequence() {
        let cluster = InMemoryCluster::atlas_like();
        let mut config = Config::default();
        config.collections.tenant = vec!["orders".into()];
        config.zones.truncate(1);
        config.zones[0].countries = vec!["CN".into()];

        ZoneShardingManager::new(&cluster, &config)
            .setup()
            .await
            .unwrap();
        assert_eq!(
            cluster.command_names(),
            vec![
                "listShards",
                "addShardToZone",
                "enableSharding",
                "movePrimary",
                "shardCollection",
                "updateZoneKeyRange",
            ]
        );
    }
}
