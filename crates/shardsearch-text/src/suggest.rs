use parking_lot::Mutex;
use tantivy::collector::{Count, DocSetCollector};
use tantivy::query::{FuzzyTermQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value, FAST, STORED, STRING};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::debug;

use shardsearch_core::types::completion_order;
use shardsearch_core::{Autocompleter, Error, Result, Suggestion};

use crate::location::Location;

const WRITER_HEAP_BYTES: usize = 15_000_000;
const MAX_FUZZY_DISTANCE: u8 = 2;

/// Suggestion dictionary kept in its own small tantivy index: one raw,
/// lowercased term per document plus its score.
pub struct TantivyAutocompleter {
	name: String,
	location: Location,
	writer: Mutex<IndexWriter>,
	reader: IndexReader,
	term_field: Field,
	score_field: Field,
	fuzzy_distance: u8,
}

impl TantivyAutocompleter {
	/// Opens the dictionary at `location`, creating it when absent.
	pub fn open(name: impl Into<String>, location: Location) -> Result<Self> {
		let name = name.into();
		let err = |e: tantivy::TantivyError| Error::backend(&name, e);
		let index = match &location {
			Location::Memory => Index::create_in_ram(dictionary_schema()),
			Location::Directory(dir) if location.holds_index() => Index::open_in_dir(dir).map_err(err)?,
			Location::Directory(dir) => {
				std::fs::create_dir_all(dir).map_err(|e| Error::backend(&name, e))?;
				Index::create_in_dir(dir, dictionary_schema()).map_err(err)?
			}
		};
		let schema = index.schema();
		let term_field = schema.get_field("term").map_err(err)?;
		let score_field = schema.get_field("score").map_err(err)?;
		let writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES).map_err(err)?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(err)?;
		Ok(Self { name, location, writer: Mutex::new(writer), reader, term_field, score_field, fuzzy_distance: 1 })
	}

	/// Maximum edit distance of fuzzy prefix matching (0..=2).
	pub fn with_fuzzy_distance(mut self, distance: u8) -> Result<Self> {
		if distance > MAX_FUZZY_DISTANCE {
			return Err(Error::InvalidConfig(format!("fuzzy distance {distance} exceeds {MAX_FUZZY_DISTANCE}")));
		}
		self.fuzzy_distance = distance;
		Ok(self)
	}

	pub fn name(&self) -> &str { &self.name }

	pub fn location(&self) -> &Location { &self.location }

	pub fn len(&self) -> u64 { self.reader.searcher().num_docs() }

	pub fn is_empty(&self) -> bool { self.len() == 0 }

	/// Removes a term; returns whether it was present.
	pub fn delete_term(&self, term: &str) -> Result<bool> {
		let key = normalize(term);
		let present = self.contains(&key)?;
		if present {
			let mut writer = self.writer.lock();
			writer.delete_term(Term::from_field_text(self.term_field, &key));
			self.commit(&mut writer)?;
		}
		Ok(present)
	}

	pub fn clear(&self) -> Result<()> {
		let mut writer = self.writer.lock();
		writer.delete_all_documents().map_err(|e| Error::backend(&self.name, e))?;
		self.commit(&mut writer)
	}

	fn contains(&self, key: &str) -> Result<bool> {
		let query = TermQuery::new(Term::from_field_text(self.term_field, key), IndexRecordOption::Basic);
		let hits = self.reader.searcher().search(&query, &Count).map_err(|e| Error::backend(&self.name, e))?;
		Ok(hits > 0)
	}

	fn commit(&self, writer: &mut IndexWriter) -> Result<()> {
		let committed = writer.commit().and_then(|_| self.reader.reload());
		if let Err(e) = committed {
			let _ = writer.rollback();
			return Err(Error::backend(&self.name, e));
		}
		Ok(())
	}
}

impl Autocompleter for TantivyAutocompleter {
	fn add_terms(&self, suggestions: &[Suggestion]) -> Result<()> {
		let mut writer = self.writer.lock();
		let mut added = 0usize;
		for s in suggestions {
			let key = normalize(&s.term);
			if key.is_empty() { continue; }
			writer.delete_term(Term::from_field_text(self.term_field, &key));
			let mut doc = TantivyDocument::default();
			doc.add_text(self.term_field, &key);
			doc.add_f64(self.score_field, s.score);
			if let Err(e) = writer.add_document(doc) {
				let _ = writer.rollback();
				return Err(Error::backend(&self.name, e));
			}
			added += 1;
		}
		if added == 0 { return Ok(()); }
		self.commit(&mut writer)?;
		debug!(dictionary = %self.name, added, "suggestions committed");
		Ok(())
	}

	fn suggest(&self, prefix: &str, max: usize, fuzzy: bool) -> Result<Vec<Suggestion>> {
		if max == 0 { return Ok(Vec::new()); }
		let prefix = normalize(prefix);
		let distance = if fuzzy { self.fuzzy_distance } else { 0 };
		let query = FuzzyTermQuery::new_prefix(Term::from_field_text(self.term_field, &prefix), distance, true);
		let searcher = self.reader.searcher();
		let err = |e: tantivy::TantivyError| Error::backend(&self.name, e);
		let addresses = searcher.search(&query, &DocSetCollector).map_err(err)?;
		let mut hits = Vec::with_capacity(addresses.len());
		for addr in addresses {
			let doc: TantivyDocument = searcher.doc(addr).map_err(err)?;
			let term = doc.get_first(self.term_field).and_then(|v| v.as_str()).unwrap_or_default().to_string();
			let score = doc.get_first(self.score_field).and_then(|v| v.as_f64()).unwrap_or_default();
			hits.push(Suggestion { term, score });
		}
		hits.sort_by(|a, b| completion_order(&prefix, a, b));
		hits.truncate(max);
		Ok(hits)
	}
}

fn dictionary_schema() -> Schema {
	let mut builder = Schema::builder();
	builder.add_text_field("term", STRING | STORED);
	builder.add_f64_field("score", FAST | STORED);
	builder.build()
}

fn normalize(term: &str) -> String { term.trim().to_lowercase() }

impl std::fmt::Debug for TantivyAutocompleter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TantivyAutocompleter").field("name", &self.name).field("location", &self.location).finish_non_exhaustive()
	}
}
