//! Live cluster access through the MongoDB driver

use crate::cluster::{commands, ClusterAdmin, Namespace};
use crate::common::config::redact_uri;
use crate::common::{Config, Error, Result};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};

/// Connection to an Atlas (or any sharded) cluster via `mongos`
#[derive(Clone)]
pub struct MongoCluster {
    client: Client,
}

impl MongoCluster {
    /// Build a client from the configured URI.
    ///
    /// The driver connects lazily; the first command surfaces connection errors.
    pub async fn connect(config: &Config) -> Result<Self> {
        config.ensure_uri()?;

        let mut options = ClientOptions::parse(&config.uri).await?;
        options.app_name = Some(config.app_name.clone());
        options.server_selection_timeout = Some(config.server_selection_timeout());

        let client = Client::with_options(options)?;
        tracing::info!(uri = %redact_uri(&config.uri), "Cluster client created");

        Ok(Self { client })
    }

    /// Close pooled connections
    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }

    fn admin(&self) -> Database {
        self.client.database("admin")
    }

    fn collection(&self, ns: &Namespace) -> Collection<Document> {
        self.client.database(&ns.db).collection(&ns.collection)
    }
}

/// Surface server command failures with their code and message
fn command_error(command: &str, err: mongodb::error::Error) -> Error {
    match err.kind.as_ref() {
        ErrorKind::Command(e) => Error::Command {
            command: command.to_string(),
            code: e.code,
            message: e.message.clone(),
        },
        ErrorKind::ServerSelection { message, .. } => Error::ConnectionFailed(message.clone()),
        _ => Error::Mongo(err),
    }
}

#[async_trait]
impl ClusterAdmin for MongoCluster {
    async fn run_admin(&self, command: Document) -> Result<Document> {
        let name = commands::command_name(&command).to_string();
        tracing::debug!(command = %name, "Running admin command");
        self.admin()
            .run_command(command)
            .await
            .map_err(|e| command_error(&name, e))
    }

    async fn aggregate_admin(&self, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        let cursor = self
            .admin()
            .aggregate(pipeline)
            .await
            .map_err(|e| command_error("aggregate", e))?;
        let docs: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| command_error("getMore", e))?;
        Ok(docs)
    }

    async fn list_database_names(&self) -> Result<Vec<String>> {
        self.client
            .list_database_names()
            .await
            .map_err(|e| command_error("listDatabases", e))
    }

    async fn list_collection_names(&self, db: &str) -> Result<Vec<String>> {
        self.client
            .database(db)
            .list_collection_names()
            .await
            .map_err(|e| command_error("listCollections", e))
    }

    async fn insert_many(&self, ns: &Namespace, docs: Vec<Document>) -> Result<u64> {
        if docs.is_empty() {
            return Ok(0);
        }
        let result = self
            .collection(ns)
            .insert_many(docs)
            .await
            .map_err(|e| command_error("insert", e))?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn count_documents(&self, ns: &Namespace, countries: Option<&[String]>) -> Result<u64> {
        let filter = match countries {
            Some(codes) => doc! { "country": { "$in": codes.to_vec() } },
            None => Document::new(),
        };
        self.collection(ns)
            .count_documents(filter)
            .await
            .map_err(|e| command_error("count", e))
    }

    async fn find_one_field(&self, ns: &Namespace, field: &str) -> Result<Option<String>> {
        let found = self
            .collection(ns)
            .find_one(doc! { field: { "$exists": true } })
            .await
            .map_err(|e| command_error("find", e))?;
        Ok(found.and_then(|d| d.get_str(field).ok().map(str::to_string)))
    }

    async fn drop_database(&self, db: &str) -> Result<()> {
        self.client
            .database(db)
            .drop()
            .await
            .map_err(|e| command_error("dropDatabase", e))
    }
}
