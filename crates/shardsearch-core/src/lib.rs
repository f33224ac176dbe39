#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! shardsearch-core
//!
//! Data model, index traits, error taxonomy and configuration shared by the
//! single-node text index, the sharded index and the ingestion pipeline.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result, ShardError};
pub use traits::{Autocompleter, SearchIndex};
pub use types::{
    Document, FieldDef, FieldKind, FieldValue, IndexOptions, Metadata, Paging, Query, SearchResults, Suggestion,
    SuggestionList, MIN_SCORE,
};
