use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    #[error("Index already exists: {0}")]
    IndexExists(String),

    #[error("Document already exists: {0}")]
    DocumentExists(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Backend error on {index}: {message}")]
    Backend { index: String, message: String },

    #[error("{} of {total} shards failed: {}", .failed.len(), ShardFailures(.failed))]
    Shards {
        failed: Vec<ShardError>,
        total: usize,
        /// Ids the healthy shards wrote when a write partly failed.
        committed: Vec<String>,
    },
}

impl Error {
    pub fn backend(index: impl Into<String>, err: impl fmt::Display) -> Self {
        Error::Backend { index: index.into(), message: err.to_string() }
    }

    /// Documents that were written despite the error. Empty unless a
    /// distributed write failed on only some of its shards.
    pub fn committed(&self) -> &[String] {
        match self {
            Error::Shards { committed, .. } => committed,
            _ => &[],
        }
    }
}

/// One shard's failure inside an aggregate `Error::Shards`.
#[derive(Debug)]
pub struct ShardError {
    pub shard: usize,
    pub error: Box<Error>,
}

struct ShardFailures<'a>(&'a [ShardError]);

impl fmt::Display for ShardFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 { f.write_str("; ")?; }
            write!(f, "shard {}: {}", e.shard, e.error)?;
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
