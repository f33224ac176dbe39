use crate::error::Result;
use crate::types::{Document, IndexOptions, Metadata, Query, SearchResults, Suggestion};

/// A weighted completion dictionary.
pub trait Autocompleter: Send + Sync {
    /// Inserts terms, replacing the score of terms already present.
    fn add_terms(&self, suggestions: &[Suggestion]) -> Result<()>;

    /// Up to `max` terms starting with `prefix`, best first. With `fuzzy`
    /// the prefix may also match within a small edit distance.
    fn suggest(&self, prefix: &str, max: usize, fuzzy: bool) -> Result<Vec<Suggestion>>;
}

/// The single-index contract. Implemented by one backend instance and by the
/// sharded index that fans out over many of them.
pub trait SearchIndex: Autocompleter {
    fn name(&self) -> &str;
    fn metadata(&self) -> &Metadata;

    fn create(&self) -> Result<()>;
    fn drop_index(&self) -> Result<()>;

    fn index(&self, docs: &[Document], opts: &IndexOptions) -> Result<()>;
    fn search(&self, query: &Query) -> Result<SearchResults>;

    fn get(&self, id: &str) -> Result<Option<Document>>;
    fn count(&self) -> Result<u64>;
}
