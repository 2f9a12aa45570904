//! Ops commands for zone sharding
//!
//! Each operation is a linear sequence of cluster calls that returns a
//! report. Reports implement `Display` for the terminal and `Serialize` for
//! `--json`.

pub mod cleanup;
pub mod inspect;
pub mod populate;
pub mod setup;
pub mod status;
pub mod verify;

pub use cleanup::{cleanup_cluster, CleanupReport};
pub use inspect::{cluster_info, test_connection, ClusterInfo, ConnectionReport};
pub use populate::{populate_cluster, PopulateReport};
pub use setup::{SetupReport, ZoneShardingManager};
pub use status::{zone_status, ZoneStatus, ZoneStatusReport};
pub use verify::{verify_placement, VerifyReport};

use crate::common::{Error, Result};
use mongodb::bson::Document;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of one admin step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StepStatus {
    Applied,
    /// The server reported the target state already holds
    Already,
    Failed(String),
    Skipped(String),
}

impl StepStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, StepStatus::Applied | StepStatus::Already)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Applied => write!(f, "applied"),
            StepStatus::Already => write!(f, "already"),
            StepStatus::Failed(reason) => write!(f, "failed: {}", reason),
            StepStatus::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

/// One admin step and how it went
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: String,
    pub target: String,
    #[serde(flatten)]
    pub status: StepStatus,
}

impl StepOutcome {
    pub fn new(step: &str, target: impl Into<String>, status: StepStatus) -> Self {
        Self {
            step: step.to_string(),
            target: target.into(),
            status,
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = match self.status {
            StepStatus::Applied => "✓",
            StepStatus::Already => "=",
            StepStatus::Failed(_) => "✗",
            StepStatus::Skipped(_) => "-",
        };
        write!(f, "{} {} {} ({})", mark, self.step, self.target, self.status)
    }
}

/// Which server refusals count as "nothing to do"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tolerate {
    /// "already ..." / "duplicate ..."
    AlreadyDone,
    /// "not in zone" / "not found" / "does not exist"
    Absent,
}

/// Classify a step result and log it
pub fn classify(step: &str, target: &str, result: Result<Document>, tolerate: Tolerate) -> StepOutcome {
    let status = match result {
        Ok(_) => {
            tracing::info!(step, resource = target, "Step applied");
            StepStatus::Applied
        }
        Err(e) if tolerated(&e, tolerate) => {
            tracing::warn!(step, resource = target, error = %e, "Step already in effect");
            StepStatus::Already
        }
        Err(e) => {
            tracing::error!(step, resource = target, error = %e, "Step failed");
            StepStatus::Failed(e.to_string())
        }
    };
    StepOutcome::new(step, target, status)
}

fn tolerated(err: &Error, tolerate: Tolerate) -> bool {
    match tolerate {
        Tolerate::AlreadyDone => err.is_already_done(),
        Tolerate::Absent => err.is_absent(),
    }
}
