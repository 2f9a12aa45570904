//! Demo data population
//!
//! Common data is generated once and written to every zone database.
//! Tenant data is generated per country, tagged with the zone as `region`.

use crate::cluster::{ClusterAdmin, Namespace};
use crate::common::{per_country_quota, Config, Result};
use crate::demo::generator::{GLOBAL_COUNTRY, GLOBAL_REGION};
use crate::demo::{to_documents, DataGenerator, DemoDocument, User};
use mongodb::bson::Document;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PopulateReport {
    /// database → collection → documents inserted
    pub inserted: BTreeMap<String, BTreeMap<String, u64>>,
}

impl PopulateReport {
    pub fn total(&self) -> u64 {
        self.inserted.values().flat_map(|c| c.values()).sum()
    }

    pub fn count(&self, db: &str, collection: &str) -> u64 {
        self.inserted
            .get(db)
            .and_then(|c| c.get(collection))
            .copied()
            .unwrap_or(0)
    }

    fn record(&mut self, ns: &Namespace, written: u64) {
        *self
            .inserted
            .entry(ns.db.clone())
            .or_default()
            .entry(ns.collection.clone())
            .or_default() += written;
    }
}

impl fmt::Display for PopulateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Population report:")?;
        for (db, collections) in &self.inserted {
            writeln!(f, "  {}:", db)?;
            for (collection, count) in collections {
                writeln!(f, "    - Inserted {} {}", count, collection)?;
            }
        }
        write!(f, "  Total documents: {}", self.total())
    }
}

/// Insert in chunks of `batch_size`; empty input sends nothing
async fn insert_batched(
    cluster: &dyn ClusterAdmin,
    ns: &Namespace,
    docs: Vec<Document>,
    batch_size: usize,
) -> Result<u64> {
    let mut written = 0;
    let mut docs = docs.into_iter().peekable();
    while docs.peek().is_some() {
        let batch: Vec<Document> = docs.by_ref().take(batch_size.max(1)).collect();
        written += cluster.insert_many(ns, batch).await?;
    }
    Ok(written)
}

/// Data generated for each position of the common collection list
const COMMON_ROLES: [&str; 3] = ["users", "products", "categories"];
/// Data generated for each position of the tenant collection list
const TENANT_ROLES: [&str; 3] = ["orders", "transactions", "logs"];

/// Describe where a configured collection list and the generated data
/// sets fail to line up
fn positional_mismatch(configured: &[String], roles: &[&str]) -> Option<String> {
    if configured.len() < roles.len() {
        Some(format!(
            "no collection configured for {} data",
            roles[configured.len()..].join(", ")
        ))
    } else if configured.len() > roles.len() {
        Some(format!(
            "no data generated for {}",
            configured[roles.len()..].join(", ")
        ))
    } else {
        None
    }
}

fn warn_on_mismatch(kind: &str, configured: &[String], roles: &[&str]) {
    if let Some(problem) = positional_mismatch(configured, roles) {
        tracing::warn!(kind, problem = %problem, "Collection list does not match generated data");
    }
}

/// Common data shared by every region
struct CommonData {
    users: Vec<User>,
    documents: Vec<(String, Vec<Document>)>,
}

fn generate_common(generator: &mut DataGenerator, config: &Config) -> Result<CommonData> {
    let demo = &config.demo;
    let users: Vec<User> = (0..demo.users)
        .map(|_| generator.user(GLOBAL_COUNTRY, GLOBAL_REGION))
        .collect();
    let products: Vec<_> = (0..demo.products).map(|_| generator.product()).collect();
    let categories: Vec<_> = (0..demo.categories).map(|_| generator.category()).collect();

    // Configured common collections are filled positionally, see COMMON_ROLES
    let sets = [
        to_documents(&users)?,
        to_documents(&products)?,
        to_documents(&categories)?,
    ];
    let documents = config
        .collections
        .common
        .iter()
        .cloned()
        .zip(sets)
        .collect();

    Ok(CommonData { users, documents })
}

/// Generate and insert all demo data
pub async fn populate_cluster(
    cluster: &dyn ClusterAdmin,
    config: &Config,
) -> Result<PopulateReport> {
    let mut generator = DataGenerator::from_seed(config.demo.seed);
    let batch_size = config.demo.batch_size;
    let mut report = PopulateReport::default();

    warn_on_mismatch("common", &config.collections.common, &COMMON_ROLES);
    warn_on_mismatch("tenant", &config.collections.tenant, &TENANT_ROLES);

    tracing::info!("Generating common data");
    let common = generate_common(&mut generator, config)?;
    for zone in &config.zones {
        for (collection, docs) in &common.documents {
            let ns = Namespace::new(zone.database.as_str(), collection.as_str());
            let written = insert_batched(cluster, &ns, docs.clone(), batch_size).await?;
            tracing::info!(ns = %ns, written, "Inserted common data");
            report.record(&ns, written);
        }
    }

    tracing::info!("Generating tenant data");
    // Tenant collections are filled positionally, see TENANT_ROLES
    let tenant = &config.collections.tenant;
    for zone in &config.zones {
        let quota = per_country_quota(config.demo.tenant_documents, zone.countries.len());
        let mut orders = Vec::new();
        let mut transactions = Vec::new();
        let mut logs = Vec::new();

        for country in &zone.countries {
            for _ in 0..quota {
                let user_id = generator.user_id_from(&common.users);
                let order = generator.order(&user_id, country, &zone.name);
                let transaction =
                    generator.transaction(&order.order_id, &user_id, country, &zone.name);
                let log = generator.log(&user_id, country, &zone.name);

                orders.push(order.to_document()?);
                transactions.push(transaction.to_document()?);
                logs.push(log.to_document()?);
            }
        }

        for (collection, docs) in tenant.iter().zip([orders, transactions, logs]) {
            let ns = Namespace::new(zone.database.as_str(), collection.as_str());
            let written = insert_batched(cluster, &ns, docs, batch_size).await?;
            tracing::info!(ns = %ns, written, "Inserted tenant data");
            report.record(&ns, written);
        }
    }

    tracing::info!(total = report.total(), "Sample data population completed");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::InMemoryCluster;

    fn small_config() -> Config {
        let mut config = Config::default();
        config.demo.tenant_documents = 10;
        config.demo.users = 5;
        config.demo.products = 4;
        config.demo.categories = 3;
        config.demo.batch_size = 3;
        config.demo.seed = Some(17);
        config
    }

    #[test]
    fn test_positional_mismatch() {
        fn names(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        assert!(
            positional_mismatch(&names(&["orders", "payments", "events"]), &TENANT_ROLES).is_none()
        );
        assert_eq!(
            positional_mismatch(&names(&["orders"]), &TENANT_ROLES).unwrap(),
            "no collection configured for transactions, logs data"
        );
        assert_eq!(
            positional_mismatch(&names(&["u", "p", "c", "reviews"]), &COMMON_ROLES).unwrap(),
            "no data generated for reviews"
        );
    }

    #[tokio::test]
    async fn test_extra_tenant_collection_stays_empty() {
        let cluster = InMemoryCluster::atlas_like();
        let mut config = small_config();
        config.collections.tenant.push("audits".into());

        let report = populate_cluster(&cluster, &config).await.unwrap();
        assert_eq!(report.count("app_region1", "logs"), 10);
        assert_eq!(report.count("app_region1", "audits"), 0);
        assert_eq!(
            cluster.document_count(&Namespace::new("app_region1", "audits")),
            0
        );
    }

    #[tokio::test]
    async fn test_populate_counts() {
        let cluster = InMemoryCluster::atlas_like();
        let config = small_config();

        let report = populate_cluster(&cluster, &config).await.unwrap();

        for db in ["app_region1", "app_region2"] {
            assert_eq!(report.count(db, "users"), 5);
            assert_eq!(report.count(db, "products"), 4);
            assert_eq!(report.count(db, "categories"), 3);
        }
        // region1: 10 / 2 countries = 5 each; region2: 10 / 4 = 2 each
        assert_eq!(report.count("app_region1", "orders"), 10);
        assert_eq!(report.count("app_region2", "orders"), 8);
        assert_eq!(report.count("app_region2", "logs"), 8);
        assert_eq!(report.total(), 2 * 12 + 3 * 10 + 3 * 8);

        let orders = Namespace::new("app_region2", "orders");
        assert_eq!(cluster.document_count(&orders), 8);
        let us = cluster
            .count_documents(&orders, Some(&["US".to_string()][..]))
            .await
            .unwrap();
        assert_eq!(us, 2);
    }

    #[tokio::test]
    async fn test_tenant_documents_carry_zone_and_known_user() {
        let cluster = InMemoryCluster::atlas_like();
        let config = small_config();
        populate_cluster(&cluster, &config).await.unwrap();

        let users = Namespace::new("app_region1", "users");
        let logs = Namespace::new("app_region1", "logs");
        let region = cluster.find_one_field(&logs, "region").await.unwrap();
        assert_eq!(region.as_deref(), Some("region1"));

        let user_country = cluster.find_one_field(&users, "country").await.unwrap();
        assert_eq!(user_country.as_deref(), Some(GLOBAL_COUNTRY));
    }

    #[tokio::test]
    async fn test_batches_respect_batch_size() {
        struct Recorder {
            inner: InMemoryCluster,
            batches: std::sync::Mutex<Vec<usize>>,
        }

        #[async_trait::async_trait]
        impl ClusterAdmin for Recorder {
            async fn run_admin(&self, command: Document) -> Result<Document> {
                self.inner.run_admin(command).await
            }
            async fn aggregate_admin(&self, pipeline: Vec<Document>) -> Result<Vec<Document>> {
                self.inner.aggregate_admin(pipeline).await
            }
            async fn list_database_names(&self) -> Result<Vec<String>> {
                self.inner.list_database_names().await
            }
            async fn list_collection_names(&self, db: &str) -> Result<Vec<String>> {
                self.inner.list_collection_names(db).await
            }
            async fn insert_many(&self, ns: &Namespace, docs: Vec<Document>) -> Result<u64> {
                self.batches.lock().unwrap().push(docs.len());
                self.inner.insert_many(ns, docs).await
            }
            async fn count_documents(
                &self,
                ns: &Namespace,
                countries: Option<&[String]>,
            ) -> Result<u64> {
                self.inner.count_documents(ns, countries).await
            }
            async fn find_one_field(&self, ns: &Namespace, field: &str) -> Result<Option<String>> {
                self.inner.find_one_field(ns, field).await
            }
            async fn drop_database(&self, db: &str) -> Result<()> {
                self.inner.drop_database(db).await
            }
        }

        let recorder = Recorder {
            inner: InMemoryCluster::atlas_like(),
            batches: std::sync::Mutex::new(Vec::new()),
        };
        let mut config = small_config();
        config.demo.categories = 0;

        populate_cluster(&recorder, &config).await.unwrap();
        let batches = recorder.batches.lock().unwrap();
        assert!(batches.iter().all(|&n| n > 0 && n <= 3));
    }

    #[tokio::test]
    async fn test_insert_failure_propagates() {
        let cluster = InMemoryCluster::atlas_like();
        cluster.fail_command("insert", "not authorized on app_region1 to execute command");
        let err = populate_cluster(&cluster, &small_config()).await.unwrap_err();
        assert!(err.to_string().contains("not authorized"));
    }
}
