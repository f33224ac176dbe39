//! shardsearch-ingest
//!
//! Concurrent corpus ingestion: file discovery, pluggable parsing, batched
//! indexing into any `SearchIndex` and windowed throughput reporting.

pub mod cancel;
pub mod error;
pub mod pipeline;
pub mod reader;
pub mod stats;
pub mod walk;

pub use cancel::CancellationToken;
pub use error::{Error, Result};
pub use pipeline::{IngestOptions, IngestSummary, IngestionPipeline};
pub use reader::{DocumentReader, DocumentSink, JsonLinesReader, PlainTextReader};
pub use stats::{Sample, Stats};
