//! Zone placement
//!
//! Maps configured zones onto the shards a cluster actually has. Atlas names
//! shards itself, so the configured shard names are only used for display;
//! setup assigns zone *i* to the *i*-th data shard, reusing the last data
//! shard when zones outnumber shards.

use crate::cluster::ShardInfo;
use crate::common::{Error, Result, ZoneConfig};
use serde::{Deserialize, Serialize};

/// Zone sharding needs at least this many shards
pub const MIN_SHARDS: usize = 2;

/// One zone and the shard it is pinned to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneAssignment {
    pub zone: String,
    pub shard: String,
    pub database: String,
    pub countries: Vec<String>,
}

/// Shards that can host zone data (everything but the config shard)
pub fn data_shards(shards: &[ShardInfo]) -> Vec<String> {
    shards
        .iter()
        .filter(|s| !s.is_config_shard())
        .map(|s| s.id.clone())
        .collect()
}

/// Assign each zone to a data shard, in configuration order
pub fn assign_zones(zones: &[ZoneConfig], shards: &[ShardInfo]) -> Result<Vec<ZoneAssignment>> {
    if shards.is_empty() {
        return Err(Error::NoShards);
    }
    if shards.len() < MIN_SHARDS {
        return Err(Error::InsufficientShards {
            needed: MIN_SHARDS,
            available: shards.len(),
        });
    }

    let candidates = data_shards(shards);
    let last = candidates.last().ok_or(Error::NoShards)?;

    Ok(zones
        .iter()
        .enumerate()
        .map(|(idx, zone)| ZoneAssignment {
            zone: zone.name.clone(),
            shard: candidates.get(idx).unwrap_or(last).clone(),
            database: zone.database.clone(),
            countries: zone.countries.clone(),
        })
        .collect())
}
