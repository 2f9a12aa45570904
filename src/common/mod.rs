//! Common utilities and types shared across atlas-zones

pub mod config;
pub mod error;
pub mod utils;

pub use config::{AtlasConfig, CollectionsConfig, Config, DemoConfig, ZoneConfig};
pub use error::{Error, Result};
pub use utils::{banner, per_country_quota, round_cents, timestamp_now};
