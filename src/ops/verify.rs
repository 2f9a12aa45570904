//! Verify data placement
//!
//! Counts what each zone database holds, then asks the cluster which shard
//! owns the documents of every tenant namespace. Documents owned by a shard
//! outside the zone are reported as misplaced.

use crate::cluster::{commands, list_shards, ClusterAdmin, Namespace};
use crate::common::{Config, Result};
use mongodb::bson::{Bson, Document};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct ZoneCounts {
    pub zone: String,
    pub database: String,
    /// Tenant collections, counting only documents of the zone's countries
    pub tenant: BTreeMap<String, u64>,
    /// Common collections, unfiltered
    pub common: BTreeMap<String, u64>,
    /// `region` of a sample tenant document, expected to be the zone name
    pub region_tag: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamespacePlacement {
    pub ns: String,
    pub zone: String,
    /// Shards tagged with the zone
    pub expected_shards: Vec<String>,
    /// shard → owned documents
    pub distribution: BTreeMap<String, u64>,
    pub misplaced: u64,
}

impl NamespacePlacement {
    pub fn total(&self) -> u64 {
        self.distribution.values().sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub counts: Vec<ZoneCounts>,
    pub placements: Vec<NamespacePlacement>,
    /// Set when the distribution could not be read
    pub warning: Option<String>,
}

impl VerifyReport {
    pub fn misplaced(&self) -> u64 {
        self.placements.iter().map(|p| p.misplaced).sum()
    }

    pub fn is_healthy(&self) -> bool {
        self.warning.is_none() && self.misplaced() == 0
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Data distribution:")?;
        for zone in &self.counts {
            writeln!(f)?;
            writeln!(f, "{} ({}):", zone.database, zone.zone)?;
            if let Some(tag) = &zone.region_tag {
                let mark = if *tag == zone.zone { "✓" } else { "✗" };
                writeln!(f, "  {} tenant documents tagged region {}", mark, tag)?;
            }
            for (collection, count) in &zone.tenant {
                writeln!(f, "  {}: {} documents", collection, count)?;
            }
            for (collection, count) in &zone.common {
                writeln!(f, "  {}: {} documents (common)", collection, count)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Shard placement:")?;
        if let Some(warning) = &self.warning {
            writeln!(f, "  ! {}", warning)?;
        }
        for p in &self.placements {
            let expected = if p.expected_shards.is_empty() {
                "none".to_string()
            } else {
                p.expected_shards.join(", ")
            };
            writeln!(f, "  {} (zone {}, expected on {}):", p.ns, p.zone, expected)?;
            for (shard, owned) in &p.distribution {
                writeln!(f, "    {}: {} documents", shard, owned)?;
            }
            if p.misplaced > 0 {
                writeln!(f, "    ✗ {} documents outside the zone", p.misplaced)?;
            }
        }
        write!(f, "Misplaced documents: {}", self.misplaced())
    }
}

/// Read numeric fields that the server may return as int32, int64 or double
fn as_count(value: Option<&Bson>) -> u64 {
    match value {
        Some(Bson::Int32(n)) => (*n).max(0) as u64,
        Some(Bson::Int64(n)) => (*n).max(0) as u64,
        Some(Bson::Double(n)) if *n > 0.0 => *n as u64,
        _ => 0,
    }
}

/// Parse `$shardedDataDistribution` rows into ns → shard → owned documents
pub fn parse_distribution(rows: &[Document]) -> BTreeMap<String, BTreeMap<String, u64>> {
    let mut out: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    for row in rows {
        let Ok(ns) = row.get_str("ns") else {
            continue;
        };
        let entry = out.entry(ns.to_string()).or_default();
        let Ok(shards) = row.get_array("shards") else {
            continue;
        };
        for shard in shards.iter().filter_map(Bson::as_document) {
            if let Ok(name) = shard.get_str("shardName") {
                *entry.entry(name.to_string()).or_default() +=
                    as_count(shard.get("numOwnedDocuments"));
            }
        }
    }
    out
}

/// Count zone data and check which shards own it
pub async fn verify_placement(cluster: &dyn ClusterAdmin, config: &Config) -> Result<VerifyReport> {
    tracing::info!("Verifying data distribution");

    let mut counts = Vec::new();
    for zone in &config.zones {
        let mut tenant = BTreeMap::new();
        let mut region_tag = None;
        for collection in &config.collections.tenant {
            let ns = Namespace::new(zone.database.as_str(), collection.as_str());
            let count = cluster.count_documents(&ns, Some(zone.countries.as_slice())).await?;
            tenant.insert(collection.clone(), count);
            if region_tag.is_none() {
                region_tag = cluster.find_one_field(&ns, "region").await?;
            }
        }
        let mut common = BTreeMap::new();
        for collection in &config.collections.common {
            let ns = Namespace::new(zone.database.as_str(), collection.as_str());
            common.insert(collection.clone(), cluster.count_documents(&ns, None).await?);
        }
        counts.push(ZoneCounts {
            zone: zone.name.clone(),
            database: zone.database.clone(),
            tenant,
            common,
            region_tag,
        });
    }

    let (mut distribution, warning) = match cluster
        .aggregate_admin(commands::sharded_data_distribution())
        .await
    {
        Ok(rows) => (parse_distribution(&rows), None),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read sharded data distribution");
            (
                BTreeMap::new(),
                Some(format!("could not read shard distribution: {}", e)),
            )
        }
    };

    let shards = list_shards(cluster).await?;
    let mut placements = Vec::new();
    for zone in &config.zones {
        let expected_shards: Vec<String> = shards
            .iter()
            .filter(|s| s.tags.contains(&zone.name))
            .map(|s| s.id.clone())
            .collect();

        for collection in &config.collections.tenant {
            let ns = Namespace::new(zone.database.as_str(), collection.as_str()).to_string();
            let owned = distribution.remove(&ns).unwrap_or_default();
            let misplaced: u64 = owned
                .iter()
                .filter(|(shard, _)| !expected_shards.contains(*shard))
                .map(|(_, n)| n)
                .sum();
            if misplaced > 0 {
                tracing::warn!(ns = %ns, misplaced, "Documents outside their zone");
            }
            placements.push(NamespacePlacement {
                ns,
                zone: zone.name.clone(),
                expected_shards: expected_shards.clone(),
                distribution: owned,
                misplaced,
            });
        }
    }

    Ok(VerifyReport {
        counts,
        placements,
        warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::InMemoryCluster;
    use crate::ops::{populate_cluster, ZoneShardingManager};
    use mongodb::bson::doc;

    fn small_config() -> Config {
        let mut config = Config::default();
        config.demo.tenant_documents = 8;
        config.demo.users = 3;
        config.demo.products = 2;
        config.demo.categories = 2;
        config.demo.seed = Some(5);
        config
    }

    #[test]
    fn test_parse_distribution_mixed_integer_types() {
        let rows = vec![
            doc! {
                "ns": "app_region1.orders",
                "shards": [
                    { "shardName": "shard00", "numOwnedDocuments": 7_i32 },
                    { "shardName": "shard01", "numOwnedDocuments": 3_i64 },
                ],
            },
            doc! { "ns": "app_region2.orders", "shards": [] },
            doc! { "shards": [] },
        ];
        let parsed = parse_distribution(&rows);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["app_region1.orders"]["shard00"], 7);
        assert_eq!(parsed["app_region1.orders"]["shard01"], 3);
        assert!(parsed["app_region2.orders"].is_empty());
    }

    #[tokio::test]
    async fn test_verify_after_setup_and_populate() {
        let cluster = InMemoryCluster::atlas_like();
        let config = small_config();
        ZoneShardingManager::new(&cluster, &config)
            .setup()
            .await
            .unwrap();
        populate_cluster(&cluster, &config).await.unwrap();

        let report = verify_placement(&cluster, &config).await.unwrap();
        assert!(report.is_healthy(), "{}", report);

        assert_eq!(report.counts[0].tenant["orders"], 8);
        assert_eq!(report.counts[1].tenant["logs"], 8);
        assert_eq!(report.counts[0].common["users"], 3);
        assert_eq!(report.counts[1].region_tag.as_deref(), Some("region2"));

        let orders = &report.placements[0];
        assert_eq!(orders.ns, "app_region1.orders");
        assert_eq!(orders.expected_shards, vec!["shard00"]);
        assert_eq!(orders.distribution.get("shard00"), Some(&8));
        assert_eq!(orders.total(), 8);
    }

    #[tokio::test]
    async fn test_documents_outside_zone_are_misplaced() {
        let cluster = InMemoryCluster::atlas_like();
        let config = small_config();
        ZoneShardingManager::new(&cluster, &config)
            .setup()
            .await
            .unwrap();

        // CN has no range in app_region2, so it follows the database primary
        let orders = Namespace::new("app_region2", "orders");
        cluster
            .insert_many(
                &orders,
                vec![
                    doc! { "country": "CN", "region": "region1" },
                    doc! { "country": "US", "region": "region2" },
                ],
            )
            .await
            .unwrap();
        cluster
            .run_admin(commands::move_primary("app_region2", "shard00"))
            .await
            .unwrap();

        let report = verify_placement(&cluster, &config).await.unwrap();
        let placement = report
            .placements
            .iter()
            .find(|p| p.ns == "app_region2.orders")
            .unwrap();
        assert_eq!(placement.expected_shards, vec!["shard01"]);
        assert_eq!(placement.misplaced, 1);
        assert!(!report.is_healthy());
        // Tenant counts only include the zone's own countries
        assert_eq!(report.counts[1].tenant["orders"], 1);
    }

    #[tokio::test]
    async fn test_distribution_failure_is_a_warning() {
        struct NoAggregation(InMemoryCluster);

        #[async_trait::async_trait]
        impl ClusterAdmin for NoAggregation {
            async fn run_admin(&self, command: Document) -> Result<Document> {
                self.0.run_admin(command).await
            }
            async fn aggregate_admin(&self, _pipeline: Vec<Document>) -> Result<Vec<Document>> {
                Err(crate::common::Error::Command {
                    command: "aggregate".into(),
                    code: 40324,
                    message: "Unrecognized pipeline stage name: '$shardedDataDistribution'"
                        .into(),
                })
            }
            async fn list_database_names(&self) -> Result<Vec<String>> {
                self.0.list_database_names().await
            }
            async fn list_collection_names(&self, db: &str) -> Result<Vec<String>> {
                self.0.list_collection_names(db).await
            }
            async fn insert_many(&self, ns: &Namespace, docs: Vec<Document>) -> Result<u64> {
                self.0.insert_many(ns, docs).await
            }
            async fn count_documents(
                &self,
                ns: &Namespace,
                countries: Option<&[String]>,
            ) -> Result<u64> {
                self.0.count_documents(ns, countries).await
            }
            async fn find_one_field(&self, ns: &Namespace, field: &str) -> Result<Option<String>> {
                self.0.find_one_field(ns, field).await
            }
            async fn drop_database(&self, db: &str) -> Result<()> {
                self.0.drop_database(db).await
            }
        }

        let cluster = NoAggregation(InMemoryCluster::atlas_like());
        let report = verify_placement(&cluster, &Config::default()).await.unwrap();
        assert!(report.warning.is_some());
        assert!(report.placements.iter().all(|p| p.distribution.is_empty()));
        assert!(report.to_string().contains("could not read shard distribution"));
    }
}
