//! Error types for atlas-zones

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Driver Errors ===
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Command {command} failed ({code}): {message}")]
    Command {
        command: String,
        code: i32,
        message: String,
    },

    #[error("BSON encode error: {0}")]
    BsonEncode(#[from] mongodb::bson::ser::Error),

    #[error("Unexpected server reply: {0}")]
    UnexpectedReply(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // === Topology Errors ===
    #[error("No shards found in cluster")]
    NoShards,

    #[error("Insufficient shards: zone sharding needs {needed}, cluster has {available}")]
    InsufficientShards { needed: usize, available: usize },

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic ===
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Server message text, if this error came from the server
    pub fn server_message(&self) -> Option<String> {
        match self {
            Error::Command { message, .. } => Some(message.clone()),
            Error::Mongo(e) => Some(e.to_string()),
            _ => None,
        }
    }

    /// Did the server refuse because the requested state already holds?
    ///
    /// Covers "already sharded", "already enabled", "already the primary",
    /// duplicate zone membership and the like.
    pub fn is_already_done(&self) -> bool {
        self.server_message()
            .map(|m| {
                let m = m.to_lowercase();
                m.contains("already") || m.contains("duplicate")
            })
            .unwrap_or(false)
    }

    /// Did the server refuse because the thing to remove is not there?
    pub fn is_absent(&self) -> bool {
        self.server_message()
            .map(|m| {
                let m = m.to_lowercase();
                m.contains("not in zone")
                    || m.contains("not found")
                    || m.contains("does not exist")
                    || m.contains("ns not found")
                    || m.contains("not sharded")
            })
            .unwrap_or(false)
    }

    /// Is this a retryable error?
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ConnectionFailed(_) => true,
            Error::Mongo(e) => {
                e.contains_label(mongodb::error::RETRYABLE_WRITE_ERROR)
                    || matches!(
                        *e.kind,
                        mongodb::error::ErrorKind::ServerSelection { .. }
                            | mongodb::error::ErrorKind::Io(_)
                    )
            }
            _ => false,
        }
    }
}

// Implement From for common error types
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_error(message: &str) -> Error {
        Error::Command {
            command: "shardCollection".into(),
            code: 20,
            message: message.into(),
        }
    }

    #[test]
    fn test_already_done_classification() {
        assert!(command_error("collection already sharded").is_already_done());
        assert!(command_error("Duplicate key in zone").is_already_done());
        assert!(!command_error("unauthorized").is_already_done());
        assert!(!Error::NoShards.is_already_done());
    }

    #[test]
    fn test_absent_classification() {
        assert!(command_error("shard shard00 not in zone region1").is_absent());
        assert!(command_error("zone region9 not found").is_absent());
        assert!(command_error("app_region1.orders is not sharded").is_absent());
        assert!(!command_error("collection already sharded").is_absent());
    }

    #[test]
    fn test_retryable() {
        assert!(Error::ConnectionFailed("server selection timeout".into()).is_retryable());
        assert!(!Error::InvalidConfig("x".into()).is_retryable());
        assert!(!command_error("boom").is_retryable());
    }
}
