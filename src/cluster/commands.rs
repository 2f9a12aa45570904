//! Admin command documents
//!
//! Field order matters to the server: the command name comes first.

use crate::cluster::Namespace;
use mongodb::bson::{doc, Bson, Document};

/// Shard key of every tenant collection
pub fn tenant_shard_key() -> Document {
    doc! { "country": 1, "region": 1 }
}

/// Lower bound of a country's zone range (inclusive)
pub fn country_range_min(country: &str) -> Document {
    doc! { "country": country, "region": Bson::MinKey }
}

/// Upper bound of a country's zone range (exclusive)
pub fn country_range_max(country: &str) -> Document {
    doc! { "country": country, "region": Bson::MaxKey }
}

/// Name of a command: its first key
pub fn command_name(command: &Document) -> &str {
    command.keys().next().map(String::as_str).unwrap_or("")
}

pub fn ping() -> Document {
    doc! { "ping": 1 }
}

pub fn hello() -> Document {
    doc! { "hello": 1 }
}

pub fn list_shards() -> Document {
    doc! { "listShards": 1 }
}

pub fn add_shard_to_zone(shard: &str, zone: &str) -> Document {
    doc! { "addShardToZone": shard, "zone": zone }
}

pub fn remove_shard_from_zone(shard: &str, zone: &str) -> Document {
    doc! { "removeShardFromZone": shard, "zone": zone }
}

pub fn enable_sharding(db: &str) -> Document {
    doc! { "enableSharding": db }
}

pub fn move_primary(db: &str, to: &str) -> Document {
    doc! { "movePrimary": db, "to": to }
}

pub fn shard_collection(ns: &Namespace, key: Document) -> Document {
    doc! { "shardCollection": ns.to_string(), "key": key }
}

/// Assign `[min, max)` to `zone`, or clear it with `None`
pub fn update_zone_key_range(
    ns: &Namespace,
    min: Document,
    max: Document,
    zone: Option<&str>,
) -> Document {
    let zone = match zone {
        Some(z) => Bson::String(z.to_string()),
        None => Bson::Null,
    };
    doc! {
        "updateZoneKeyRange": ns.to_string(),
        "min": min,
        "max": max,
        "zone": zone,
    }
}

/// Per-shard document counts of every sharded collection
pub fn sharded_data_distribution() -> Vec<Document> {
    vec![doc! { "$shardedDataDistribution": {} }]
}
