use thiserror::Error;

/// Errors surfaced by controllers and executors.
///
/// Every failure carries the name of the originating operation where one
/// exists, so callers keep the "which call failed" information without
/// string matching. A point lookup that finds nothing is *not* an error;
/// those return `Option`.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Driver, connectivity, or SQL failure, wrapped with the operation name.
    #[error("{op}: {message}")]
    Query { op: &'static str, message: String },

    /// The statement executed cleanly but affected zero rows where at
    /// least one was required (insert with explicit id, update, delete).
    #[error("{op}: statement affected no rows")]
    NoRowsAffected { op: &'static str },

    /// Row (de)serialization through serde failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Settings / connection-string resolution failed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Wrap a driver-level failure with the originating operation name.
    pub fn query(op: &'static str, cause: impl std::fmt::Display) -> Self {
        Self::Query {
            op,
            message: cause.to_string(),
        }
    }

    /// The originating operation, when the error carries one.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Query { op, .. } | Self::NoRowsAffected { op } => Some(op),
            Self::Serialization(_) | Self::Config(_) => None,
        }
    }
}
