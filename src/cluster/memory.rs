//! In-memory sharded cluster
//!
//! Simulates the part of a `mongos` this crate talks to: shard zone tags,
//! sharded namespaces, database primaries, zone key ranges and documents.
//! Documents of a sharded namespace are placed by matching their shard key
//! against the zone ranges; anything unmatched stays on the database primary.
//!
//! Every admin command is recorded, so dry runs can show exactly what a live
//! run would send.

use crate::cluster::{commands, ClusterAdmin, Namespace, CONFIG_SHARD, SYSTEM_DATABASES};
use crate::common::{Error, Result};
use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

// Server error codes used in simulated failures
const CODE_ILLEGAL_OPERATION: i32 = 20;
const CODE_NAMESPACE_NOT_FOUND: i32 = 26;
const CODE_COMMAND_NOT_FOUND: i32 = 59;
const CODE_SHARD_NOT_FOUND: i32 = 70;
const CODE_ALREADY_INITIALIZED: i32 = 23;
const CODE_NAMESPACE_NOT_SHARDED: i32 = 118;
const CODE_ZONE_NOT_FOUND: i32 = 219;
const CODE_INJECTED: i32 = 8000;

#[derive(Debug, Clone)]
struct SimShard {
    id: String,
    host: String,
    tags: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct SimRange {
    min: Vec<KeyPart>,
    max: Vec<KeyPart>,
    min_doc: Document,
    max_doc: Document,
    zone: String,
}

impl SimRange {
    fn contains(&self, key: &[KeyPart]) -> bool {
        compare_keys(&self.min, key) != Ordering::Greater
            && compare_keys(key, &self.max) == Ordering::Less
    }

    fn overlaps(&self, min: &[KeyPart], max: &[KeyPart]) -> bool {
        compare_keys(&self.min, max) == Ordering::Less
            && compare_keys(min, &self.max) == Ordering::Less
    }
}

/// One component of a shard key value, in BSON comparison order:
/// MinKey < null < numbers < strings < other types < MaxKey
#[derive(Debug, Clone)]
enum KeyPart {
    Min,
    Null,
    Number(f64),
    Value(String),
    Other(String),
    Max,
}

impl KeyPart {
    fn from_bson(value: Option<&Bson>) -> Self {
        match value {
            Some(Bson::MinKey) => KeyPart::Min,
            Some(Bson::MaxKey) => KeyPart::Max,
            // Missing fields index as null
            None | Some(Bson::Null) | Some(Bson::Undefined) => KeyPart::Null,
            Some(Bson::Int32(n)) => KeyPart::Number(f64::from(*n)),
            Some(Bson::Int64(n)) => KeyPart::Number(*n as f64),
            Some(Bson::Double(n)) => KeyPart::Number(*n),
            Some(Bson::String(s)) | Some(Bson::Symbol(s)) => KeyPart::Value(s.clone()),
            Some(other) => KeyPart::Other(other.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            KeyPart::Min => 0,
            KeyPart::Null => 1,
            KeyPart::Number(_) => 2,
            KeyPart::Value(_) => 3,
            KeyPart::Other(_) => 4,
            KeyPart::Max => 5,
        }
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank()).then_with(|| match (self, other) {
            (KeyPart::Number(a), KeyPart::Number(b)) => a.total_cmp(b),
            (KeyPart::Value(a), KeyPart::Value(b)) | (KeyPart::Other(a), KeyPart::Other(b)) => {
                a.cmp(b)
            }
            _ => Ordering::Equal,
        })
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPart {}

fn compare_keys(a: &[KeyPart], b: &[KeyPart]) -> Ordering {
    a.cmp(b)
}

#[derive(Debug, Default)]
struct State {
    shards: Vec<SimShard>,
    /// db → primary shard
    primaries: BTreeMap<String, String>,
    sharding_enabled: BTreeSet<String>,
    /// ns → shard key
    sharded: BTreeMap<Namespace, Document>,
    ranges: BTreeMap<Namespace, Vec<SimRange>>,
    documents: BTreeMap<Namespace, Vec<Document>>,
    /// command name → injected error message
    failures: BTreeMap<String, String>,
    log: Vec<Document>,
}

impl State {
    fn shard(&self, id: &str) -> Option<&SimShard> {
        self.shards.iter().find(|s| s.id == id)
    }

    fn shard_mut(&mut self, id: &str) -> Result<&mut SimShard> {
        self.shards.iter_mut().find(|s| s.id == id).ok_or_else(|| {
            sim_error(
                "shard",
                CODE_SHARD_NOT_FOUND,
                format!("Shard {} does not exist", id),
            )
        })
    }

    fn zone_exists(&self, zone: &str) -> bool {
        self.shards.iter().any(|s| s.tags.contains(zone))
    }

    fn default_primary(&self) -> Option<String> {
        self.shards
            .iter()
            .find(|s| s.id != CONFIG_SHARD)
            .or_else(|| self.shards.first())
            .map(|s| s.id.clone())
    }

    /// Create the database on first use, like the server does
    fn ensure_database(&mut self, db: &str) {
        if !self.primaries.contains_key(db) {
            if let Some(primary) = self.default_primary() {
                self.primaries.insert(db.to_string(), primary);
            }
        }
    }

    fn shard_key_of(&self, ns: &Namespace, doc: &Document) -> Option<Vec<KeyPart>> {
        let key = self.sharded.get(ns)?;
        Some(key.keys().map(|field| KeyPart::from_bson(doc.get(field))).collect())
    }

    /// Shard owning `doc` in `ns`
    fn owner(&self, ns: &Namespace, doc: &Document) -> Option<String> {
        let primary = self.primaries.get(&ns.db).cloned();
        let Some(key) = self.shard_key_of(ns, doc) else {
            return primary;
        };
        let zone = self
            .ranges
            .get(ns)
            .and_then(|ranges| ranges.iter().find(|r| r.contains(&key)))
            .map(|r| r.zone.as_str());
        match zone {
            Some(zone) => self
                .shards
                .iter()
                .find(|s| s.tags.contains(zone))
                .map(|s| s.id.clone())
                .or(primary),
            None => primary,
        }
    }
}

fn sim_error(command: &str, code: i32, message: impl Into<String>) -> Error {
    Error::Command {
        command: command.to_string(),
        code,
        message: message.into(),
    }
}

fn ok() -> Document {
    doc! { "ok": 1.0 }
}

/// In-process stand-in for a sharded cluster
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    state: Mutex<State>,
}

impl InMemoryCluster {
    /// Cluster with the given shard ids
    pub fn new<S: AsRef<str>>(shard_ids: &[S]) -> Self {
        let shards = shard_ids
            .iter()
            .map(|id| {
                let id = id.as_ref().to_string();
                SimShard {
                    host: format!("{id}/{id}-00.mongodb.net:27017,{id}-01.mongodb.net:27017"),
                    id,
                    tags: BTreeSet::new(),
                }
            })
            .collect();
        Self {
            state: Mutex::new(State {
                shards,
                ..Default::default()
            }),
        }
    }

    /// Two data shards plus an embedded config shard
    pub fn atlas_like() -> Self {
        Self::new(&["shard00", "shard01", CONFIG_SHARD])
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every future `command` fail with `message`
    pub fn fail_command(&self, command: &str, message: &str) {
        self.state()
            .failures
            .insert(command.to_string(), message.to_string());
    }

    /// Tag a shard with a zone directly
    pub fn tag_shard(&self, shard: &str, zone: &str) -> Result<()> {
        self.state().shard_mut(shard)?.tags.insert(zone.to_string());
        Ok(())
    }

    /// Admin commands received so far
    pub fn commands(&self) -> Vec<Document> {
        self.state().log.clone()
    }

    pub fn command_names(&self) -> Vec<String> {
        self.state()
            .log
            .iter()
            .map(|c| commands::command_name(c).to_string())
            .collect()
    }

    pub fn shard_tags(&self, shard: &str) -> Vec<String> {
        self.state()
            .shard(shard)
            .map(|s| s.tags.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn primary_of(&self, db: &str) -> Option<String> {
        self.state().primaries.get(db).cloned()
    }

    pub fn is_sharded(&self, ns: &Namespace) -> bool {
        self.state().sharded.contains_key(ns)
    }

    /// `(min, max, zone)` of each zone range on `ns`
    pub fn zone_ranges(&self, ns: &Namespace) -> Vec<(Document, Document, String)> {
        self.state()
            .ranges
            .get(ns)
            .map(|ranges| {
                ranges
                    .iter()
                    .map(|r| (r.min_doc.clone(), r.max_doc.clone(), r.zone.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn document_count(&self, ns: &Namespace) -> usize {
        self.state().documents.get(ns).map(Vec::len).unwrap_or(0)
    }

    fn execute(&self, command: &Document) -> Result<Document> {
        let name = commands::command_name(command).to_string();
        let mut state = self.state();
        state.log.push(command.clone());

        if let Some(message) = state.failures.get(&name) {
            return Err(sim_error(&name, CODE_INJECTED, message.clone()));
        }

        match name.as_str() {
            "ping" => Ok(ok()),
            "hello" | "isMaster" | "ismaster" => {
                let hosts: Vec<String> = state.shards.iter().map(|s| s.host.clone()).collect();
                Ok(doc! {
                    "isWritablePrimary": true,
                    "msg": "isdbgrid",
                    "hosts": hosts,
                    "maxWireVersion": 21,
                    "ok": 1.0,
                })
            }
            "listShards" => {
                let shards: Vec<Document> = state
                    .shards
                    .iter()
                    .map(|s| {
                        let mut entry = doc! { "_id": s.id.clone(), "host": s.host.clone(), "state": 1 };
                        if !s.tags.is_empty() {
                            let tags: Vec<String> = s.tags.iter().cloned().collect();
                            entry.insert("tags", tags);
                        }
                        entry
                    })
                    .collect();
                Ok(doc! { "shards": shards, "ok": 1.0 })
            }
            "addShardToZone" => {
                let shard = string_arg(command, &name, "addShardToZone")?;
                let zone = string_arg(command, &name, "zone")?;
                state.shard_mut(&shard)?.tags.insert(zone);
                Ok(ok())
            }
            "removeShardFromZone" => {
                let shard = string_arg(command, &name, "removeShardFromZone")?;
                let zone = string_arg(command, &name, "zone")?;
                let holders = state.shards.iter().filter(|s| s.tags.contains(&zone)).count();
                let tagged = state
                    .shard(&shard)
                    .map(|s| s.tags.contains(&zone))
                    .ok_or_else(|| {
                        sim_error(&name, CODE_SHARD_NOT_FOUND, format!("Shard {} does not exist", shard))
                    })?;
                let in_use = state
                    .ranges
                    .values()
                    .flatten()
                    .any(|r| r.zone == zone);
                if tagged && holders == 1 && in_use {
                    return Err(sim_error(
                        &name,
                        CODE_ILLEGAL_OPERATION,
                        format!(
                            "cannot remove {} from zone {}: it is the last shard of a zone with assigned ranges",
                            shard, zone
                        ),
                    ));
                }
                state.shard_mut(&shard)?.tags.remove(&zone);
                Ok(ok())
            }
            "enableSharding" => {
                let db = string_arg(command, &name, "enableSharding")?;
                state.ensure_database(&db);
                state.sharding_enabled.insert(db);
                Ok(ok())
            }
            "movePrimary" => {
                let db = string_arg(command, &name, "movePrimary")?;
                let to = string_arg(command, &name, "to")?;
                if state.shard(&to).is_none() {
                    return Err(sim_error(
                        &name,
                        CODE_SHARD_NOT_FOUND,
                        format!("Shard {} does not exist", to),
                    ));
                }
                match state.primaries.get(&db) {
                    None => Err(sim_error(
                        &name,
                        CODE_NAMESPACE_NOT_FOUND,
                        format!("Database {} not found", db),
                    )),
                    Some(current) if *current == to => Ok(doc! {
                        "ok": 1.0,
                        "note": "it is already the primary",
                    }),
                    Some(_) => {
                        state.primaries.insert(db, to.clone());
                        Ok(doc! { "primary": to, "ok": 1.0 })
                    }
                }
            }
            "shardCollection" => {
                let ns = Namespace::parse(&string_arg(command, &name, "shardCollection")?)?;
                let key = command.get_document("key").map_err(|_| {
                    sim_error(&name, CODE_ILLEGAL_OPERATION, "shardCollection requires a key")
                })?;
                match state.sharded.get(&ns) {
                    Some(existing) if existing == key => Ok(doc! { "collectionsharded": ns.to_string(), "ok": 1.0 }),
                    Some(_) => Err(sim_error(
                        &name,
                        CODE_ALREADY_INITIALIZED,
                        format!("collection {} already sharded with a different key", ns),
                    )),
                    None => {
                        state.ensure_database(&ns.db);
                        state.sharding_enabled.insert(ns.db.clone());
                        state.sharded.insert(ns.clone(), key.clone());
                        Ok(doc! { "collectionsharded": ns.to_string(), "ok": 1.0 })
                    }
                }
            }
            "updateZoneKeyRange" => {
                let ns = Namespace::parse(&string_arg(command, &name, "updateZoneKeyRange")?)?;
                let shard_key = state.sharded.get(&ns).cloned().ok_or_else(|| {
                    sim_error(
                        &name,
                        CODE_NAMESPACE_NOT_SHARDED,
                        format!("{} is not sharded", ns),
                    )
                })?;
                let min_doc = command.get_document("min").cloned().unwrap_or_default();
                let max_doc = command.get_document("max").cloned().unwrap_or_default();
                let min: Vec<KeyPart> =
                    shard_key.keys().map(|f| KeyPart::from_bson(min_doc.get(f))).collect();
                let max: Vec<KeyPart> =
                    shard_key.keys().map(|f| KeyPart::from_bson(max_doc.get(f))).collect();
                if compare_keys(&min, &max) != Ordering::Less {
                    return Err(sim_error(
                        &name,
                        CODE_ILLEGAL_OPERATION,
                        "min must be less than max",
                    ));
                }

                let zone = match command.get("zone") {
                    Some(Bson::String(z)) => Some(z.clone()),
                    _ => None,
                };
                if let Some(zone) = &zone {
                    if !state.zone_exists(zone) {
                        return Err(sim_error(
                            &name,
                            CODE_ZONE_NOT_FOUND,
                            format!("zone {} does not exist", zone),
                        ));
                    }
                }

                let ranges = state.ranges.entry(ns).or_default();
                ranges.retain(|r| !(r.min == min && r.max == max));
                if let Some(zone) = zone {
                    if ranges.iter().any(|r| r.overlaps(&min, &max)) {
                        return Err(sim_error(
                            &name,
                            CODE_ILLEGAL_OPERATION,
                            "zone range overlaps an existing range",
                        ));
                    }
                    ranges.push(SimRange {
                        min,
                        max,
                        min_doc,
                        max_doc,
                        zone,
                    });
                }
                Ok(ok())
            }
            other => Err(sim_error(
                other,
                CODE_COMMAND_NOT_FOUND,
                format!("no such command: '{}'", other),
            )),
        }
    }

    fn distribution(&self) -> Vec<Document> {
        let state = self.state();
        state
            .sharded
            .keys()
            .map(|ns| {
                let mut counts: BTreeMap<String, i64> = BTreeMap::new();
                for doc in state.documents.get(ns).into_iter().flatten() {
                    if let Some(owner) = state.owner(ns, doc) {
                        *counts.entry(owner).or_default() += 1;
                    }
                }
                let shards: Vec<Document> = counts
                    .into_iter()
                    .map(|(shard, owned)| {
                        doc! {
                            "shardName": shard,
                            "numOrphanedDocs": 0_i64,
                            "numOwnedDocuments": owned,
                            "ownedSizeBytes": 0_i64,
                            "orphanedSizeBytes": 0_i64,
                        }
                    })
                    .collect();
                doc! { "ns": ns.to_string(), "shards": shards }
            })
            .collect()
    }
}

fn string_arg(command: &Document, name: &str, field: &str) -> Result<String> {
    command
        .get_str(field)
        .map(str::to_string)
        .map_err(|_| sim_error(name, CODE_ILLEGAL_OPERATION, format!("{} must be a string", field)))
}

#[async_trait]
impl ClusterAdmin for InMemoryCluster {
    async fn run_admin(&self, command: Document) -> Result<Document> {
        self.execute(&command)
    }

    async fn aggregate_admin(&self, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        let first = pipeline.first().map(commands::command_name).unwrap_or("");
        if first == "$shardedDataDistribution" {
            Ok(self.distribution())
        } else {
            Err(sim_error(
                "aggregate",
                CODE_ILLEGAL_OPERATION,
                format!("unsupported pipeline stage: {}", first),
            ))
        }
    }

    async fn list_database_names(&self) -> Result<Vec<String>> {
        let state = self.state();
        let mut names: BTreeSet<String> =
            SYSTEM_DATABASES.iter().map(|s| s.to_string()).collect();
        names.extend(state.primaries.keys().cloned());
        names.extend(state.documents.keys().map(|ns| ns.db.clone()));
        Ok(names.into_iter().collect())
    }

    async fn list_collection_names(&self, db: &str) -> Result<Vec<String>> {
        let state = self.state();
        let names: BTreeSet<String> = state
            .documents
            .keys()
            .chain(state.sharded.keys())
            .filter(|ns| ns.db == db)
            .map(|ns| ns.collection.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn insert_many(&self, ns: &Namespace, docs: Vec<Document>) -> Result<u64> {
        let mut state = self.state();
        if let Some(message) = state.failures.get("insert") {
            return Err(sim_error("insert", CODE_INJECTED, message.clone()));
        }
        state.ensure_database(&ns.db);
        let written = docs.len() as u64;
        state.documents.entry(ns.clone()).or_default().extend(docs);
        Ok(written)
    }

    async fn count_documents(&self, ns: &Namespace, countries: Option<&[String]>) -> Result<u64> {
        let state = self.state();
        let count = state
            .documents
            .get(ns)
            .into_iter()
            .flatten()
            .filter(|doc| match countries {
                Some(codes) => doc
                    .get_str("country")
                    .map(|c| codes.iter().any(|code| code == c))
                    .unwrap_or(false),
                None => true,
            })
            .count();
        Ok(count as u64)
    }

    async fn find_one_field(&self, ns: &Namespace, field: &str) -> Result<Option<String>> {
        let state = self.state();
        Ok(state
            .documents
            .get(ns)
            .into_iter()
            .flatten()
            .find_map(|doc| doc.get_str(field).ok().map(str::to_string)))
    }

    async fn drop_database(&self, db: &str) -> Result<()> {
        let mut state = self.state();
        state.primaries.remove(db);
        state.sharding_enabled.remove(db);
        state.sharded.retain(|ns, _| ns.db != db);
        state.ranges.retain(|ns, _| ns.db != db);
        state.documents.retain(|ns, _| ns.db != db);
        Ok(())
    }
}
