use thiserror::Error;

/// Failures of the apply side. All of them are fatal for the worker; they are
/// carried inside `anyhow::Error` so callers can `downcast_ref` to classify.
#[derive(Debug, Error)]
pub enum FollowerError {
    /// Initial connect, slot creation or stream start failed.
    #[error("connection failure: {0}")]
    Connection(String),

    /// The worker was started without a session configuration.
    #[error("configuration failure: {0}")]
    Configuration(String),

    /// A replication frame could not be decoded.
    #[error("malformed replication message: {0}")]
    Protocol(String),

    /// A replayed statement failed or returned an unexpected result class.
    #[error("failed to apply statement {statement:?}: {reason}")]
    Apply { statement: String, reason: String },
}

impl FollowerError {
    pub fn apply(statement: &str, reason: impl Into<String>) -> Self {
        FollowerError::Apply {
            statement: statement.to_string(),
            reason: reason.into(),
        }
    }
}

/// Why a captured DDL statement was not published. Rejections are local to
/// the capture step: the statement is dropped and capture continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("unlogged/temporary tables are not supported")]
    NotPermanent,
    #[error("partitioned tables are not supported")]
    Partitioned,
    #[error("partition tables are not supported")]
    PartitionOf,
    #[error("inherited tables are not supported")]
    Inherited,
    #[error("typed tables are not supported")]
    Typed,
    #[error("table element {0} is not supported")]
    TableElement(String),
    #[error("column {0} has no type name")]
    MissingTypeName(String),
}
