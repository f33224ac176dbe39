//! shardsearch-text
//!
//! Tantivy-backed single-node index: create/drop, upsert, weighted
//! conjunctive search and a per-index suggestion dictionary.

pub mod tantivy_utils;
pub mod location;
pub mod index;
pub mod suggest;

pub use index::TantivyIndex;
pub use location::Location;
pub use suggest::TantivyAutocompleter;
