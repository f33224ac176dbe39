use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid file pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid ingest configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot read {}: {source}", .path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Discovery failed: {0}")]
    Discovery(String),

    #[error("Ingestion cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
