use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{DocAddress, DocId, Index, IndexReader, IndexWriter, ReloadPolicy, Score, Searcher, SegmentReader, TantivyDocument, Term};
use tracing::{debug, info};

use shardsearch_core::{
	Autocompleter, Document, Error, FieldValue, IndexOptions, Metadata, Query, Result, SearchIndex, SearchResults,
	Suggestion,
};

use crate::location::Location;
use crate::suggest::TantivyAutocompleter;
use crate::tantivy_utils::{build_schema, register_tokenizer, IndexFields, Mapped, SCORE_FIELD};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// One single-node index backed by tantivy, plus its suggestion dictionary.
///
/// The handle is shared by many workers: writes serialize on the writer
/// mutex and every write commits and reloads the reader before the mutex is
/// released, so a search issued after `index` returns sees the documents.
pub struct TantivyIndex {
	name: String,
	location: Location,
	metadata: Arc<Metadata>,
	state: RwLock<Option<OpenIndex>>,
	suggestions: TantivyAutocompleter,
}

struct OpenIndex {
	index: Index,
	writer: Mutex<IndexWriter>,
	reader: IndexReader,
	fields: IndexFields,
}

impl TantivyIndex {
	/// Handle for index `name` under `base`. An index already present on disk
	/// is opened; otherwise the index exists only after `create`.
	pub fn new(name: impl Into<String>, base: &Location, metadata: Arc<Metadata>) -> Result<Self> {
		let name = name.into();
		metadata.validate()?;
		let location = base.child(&name);
		let suggestions = TantivyAutocompleter::open(format!("{name}.sugg"), base.child(&format!("{name}.sugg")))?;
		let state = if location.holds_index() { Some(OpenIndex::open(&name, &location, &metadata)?) } else { None };
		Ok(Self { name, location, metadata, state: RwLock::new(state), suggestions })
	}

	/// Shard handles named `{name}0..{name}{n-1}`; shard `i` lives at
	/// `endpoints[i % endpoints.len()]`. All shards share one `Metadata`.
	pub fn shards(name: &str, endpoints: &[Location], n: usize, metadata: Metadata) -> Result<Vec<Self>> {
		if n == 0 { return Err(Error::InvalidConfig("shard count must be at least 1".into())); }
		if endpoints.is_empty() { return Err(Error::InvalidConfig("no shard endpoints configured".into())); }
		let metadata = Arc::new(metadata);
		(0..n).map(|i| Self::new(format!("{name}{i}"), &endpoints[i % endpoints.len()], Arc::clone(&metadata))).collect()
	}

	pub fn with_fuzzy_distance(mut self, distance: u8) -> Result<Self> {
		self.suggestions = self.suggestions.with_fuzzy_distance(distance)?;
		Ok(self)
	}

	pub fn location(&self) -> &Location { &self.location }

	pub fn suggestions(&self) -> &TantivyAutocompleter { &self.suggestions }

	pub fn exists(&self) -> bool { self.state.read().is_some() }

	fn with_open<T>(&self, f: impl FnOnce(&OpenIndex) -> Result<T>) -> Result<T> {
		let guard = self.state.read();
		let open = guard.as_ref().ok_or_else(|| Error::UnknownIndex(self.name.clone()))?;
		f(open)
	}

	fn backend(&self) -> impl Fn(tantivy::TantivyError) -> Error + '_ {
		move |e| Error::backend(&self.name, e)
	}
}

impl OpenIndex {
	fn create(name: &str, location: &Location, metadata: &Metadata) -> Result<Self> {
		let schema = build_schema(metadata);
		let index = match location {
			Location::Memory => Index::create_in_ram(schema),
			Location::Directory(dir) => {
				std::fs::create_dir_all(dir).map_err(|e| Error::backend(name, e))?;
				Index::create_in_dir(dir, schema).map_err(|e| Error::backend(name, e))?
			}
		};
		Self::from_index(name, index, metadata)
	}

	fn open(name: &str, location: &Location, metadata: &Metadata) -> Result<Self> {
		let dir = location.path().ok_or_else(|| Error::UnknownIndex(name.to_string()))?;
		let index = Index::open_in_dir(dir).map_err(|e| Error::backend(name, e))?;
		Self::from_index(name, index, metadata)
	}

	fn from_index(name: &str, index: Index, metadata: &Metadata) -> Result<Self> {
		let err = |e: tantivy::TantivyError| Error::backend(name, e);
		register_tokenizer(&index);
		let fields = IndexFields::resolve(name, &index.schema(), metadata)?;
		let writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES).map_err(err)?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(err)?;
		Ok(Self { index, writer: Mutex::new(writer), reader, fields })
	}

	fn find(&self, searcher: &Searcher, id: &str) -> tantivy::Result<Option<DocAddress>> {
		let query = TermQuery::new(Term::from_field_text(self.fields.id, id), IndexRecordOption::Basic);
		let top = searcher.search(&query, &TopDocs::with_limit(1))?;
		Ok(top.first().map(|(_, addr)| *addr))
	}

	fn load(&self, searcher: &Searcher, id: &str) -> tantivy::Result<Option<Document>> {
		match self.find(searcher, id)? {
			Some(addr) => {
				let stored: TantivyDocument = searcher.doc(addr)?;
				Ok(Some(self.to_document(&stored, None)))
			}
			None => Ok(None),
		}
	}

	fn to_tantivy(&self, doc: &Document) -> Result<TantivyDocument> {
		let mut out = TantivyDocument::default();
		out.add_text(self.fields.id, &doc.id);
		out.add_f64(self.fields.score, f64::from(doc.effective_score()));
		for (name, value) in &doc.properties {
			// properties outside the schema are not indexed
			match self.fields.by_name.get(name) {
				Some(Mapped::Text { field, .. }) => out.add_text(*field, value.to_string()),
				Some(Mapped::Numeric { field }) => {
					let n = value.as_f64().ok_or_else(|| {
						Error::InvalidDocument(format!("{}: field '{}' is not numeric: {}", doc.id, name, value))
					})?;
					out.add_f64(*field, n);
				}
				None => {}
			}
		}
		Ok(out)
	}

	/// Rebuilds a document from stored fields. `relevance` replaces the stored
	/// document score for search hits.
	fn to_document(&self, stored: &TantivyDocument, relevance: Option<f32>) -> Document {
		let id = stored.get_first(self.fields.id).and_then(|v| v.as_str()).unwrap_or_default();
		let stored_score = stored.get_first(self.fields.score).and_then(|v| v.as_f64()).unwrap_or_default() as f32;
		let mut doc = Document::new(id, relevance.unwrap_or(stored_score));
		for (name, mapped) in &self.fields.by_name {
			let value = match *mapped {
				Mapped::Text { field, .. } => stored.get_first(field).and_then(|v| v.as_str()).map(FieldValue::from),
				Mapped::Numeric { field } => stored.get_first(field).and_then(|v| v.as_f64()).map(FieldValue::Numeric),
			};
			if let Some(v) = value { doc.properties.insert(name.clone(), v); }
		}
		doc
	}
}

impl SearchIndex for TantivyIndex {
	fn name(&self) -> &str { &self.name }

	fn metadata(&self) -> &Metadata { &self.metadata }

	fn create(&self) -> Result<()> {
		let mut state = self.state.write();
		if state.is_some() || self.location.holds_index() {
			return Err(Error::IndexExists(self.name.clone()));
		}
		*state = Some(OpenIndex::create(&self.name, &self.location, &self.metadata)?);
		info!(index = %self.name, location = %self.location, "index created");
		Ok(())
	}

	fn drop_index(&self) -> Result<()> {
		let mut state = self.state.write();
		// the writer holds the directory lock, so it goes before the files
		drop(state.take());
		if let Some(dir) = self.location.path() {
			if dir.exists() { std::fs::remove_dir_all(dir).map_err(|e| Error::backend(&self.name, e))?; }
		}
		self.suggestions.clear()?;
		info!(index = %self.name, "index dropped");
		Ok(())
	}

	fn index(&self, docs: &[Document], opts: &IndexOptions) -> Result<()> {
		if docs.is_empty() { return Ok(()); }
		self.with_open(|open| {
			let mut writer = open.writer.lock();
			let searcher = open.reader.searcher();
			// one entry per id; later copies in the batch apply on top of earlier ones
			let mut staged: Vec<Document> = Vec::with_capacity(docs.len());
			let mut slots: HashMap<&str, usize> = HashMap::with_capacity(docs.len());
			for doc in docs {
				if doc.id.is_empty() { return Err(Error::InvalidDocument("document without id".into())); }
				if let Some(&slot) = slots.get(doc.id.as_str()) {
					if !opts.replace { return Err(Error::DocumentExists(doc.id.clone())); }
					if opts.partial { merge_over(&mut staged[slot], doc); } else { staged[slot] = doc.clone(); }
					continue;
				}
				let existing = if !opts.replace || opts.partial { open.load(&searcher, &doc.id).map_err(self.backend())? } else { None };
				let merged = match existing {
					Some(_) if !opts.replace => return Err(Error::DocumentExists(doc.id.clone())),
					Some(mut old) if opts.partial => {
						merge_over(&mut old, doc);
						old
					}
					_ => doc.clone(),
				};
				slots.insert(&doc.id, staged.len());
				staged.push(merged);
			}
			let mut batch = Vec::with_capacity(staged.len());
			for doc in &staged {
				batch.push((Term::from_field_text(open.fields.id, &doc.id), open.to_tantivy(doc)?));
			}
			let written = (|| -> tantivy::Result<()> {
				for (id, tdoc) in batch {
					writer.delete_term(id);
					writer.add_document(tdoc)?;
				}
				writer.commit()?;
				open.reader.reload()
			})();
			if let Err(e) = written {
				let _ = writer.rollback();
				return Err(self.backend()(e));
			}
			debug!(index = %self.name, docs = docs.len(), "batch committed");
			Ok(())
		})
	}

	fn search(&self, query: &Query) -> Result<SearchResults> {
		if query.index != self.name { return Err(Error::UnknownIndex(query.index.clone())); }
		self.with_open(|open| {
			let text_fields = open.fields.text_fields();
			let mut parser = QueryParser::for_index(&open.index, text_fields.iter().map(|(f, _)| *f).collect());
			parser.set_conjunction_by_default();
			for (field, weight) in &text_fields { parser.set_field_boost(*field, *weight); }
			let parsed = parser.parse_query(&query.text).map_err(|e| Error::InvalidQuery(e.to_string()))?;
			let searcher = open.reader.searcher();
			if query.paging.num == 0 {
				let total = searcher.search(&parsed, &Count).map_err(self.backend())?;
				return Ok(SearchResults { docs: Vec::new(), total });
			}
			// relevance = text score x document score
			let top = TopDocs::with_limit(query.paging.num).and_offset(query.paging.offset).tweak_score(
				|segment: &SegmentReader| {
					let doc_scores = segment.fast_fields().f64(SCORE_FIELD).ok();
					move |doc: DocId, score: Score| {
						let weight = doc_scores.as_ref().and_then(|c| c.first(doc)).unwrap_or(1.0);
						score * weight as f32
					}
				},
			);
			let (hits, total) = searcher.search(&parsed, &(top, Count)).map_err(self.backend())?;
			let mut docs = Vec::with_capacity(hits.len());
			for (relevance, addr) in hits {
				let stored: TantivyDocument = searcher.doc(addr).map_err(self.backend())?;
				docs.push(open.to_document(&stored, Some(relevance)));
			}
			Ok(SearchResults { docs, total })
		})
	}

	fn get(&self, id: &str) -> Result<Option<Document>> {
		self.with_open(|open| open.load(&open.reader.searcher(), id).map_err(self.backend()))
	}

	fn count(&self) -> Result<u64> {
		self.with_open(|open| Ok(open.reader.searcher().num_docs()))
	}
}

/// Partial update: new properties win, untouched ones are kept.
fn merge_over(stored: &mut Document, update: &Document) {
	stored.properties.extend(update.properties.clone());
	stored.score = update.score;
}

impl Autocompleter for TantivyIndex {
	fn add_terms(&self, suggestions: &[Suggestion]) -> Result<()> { self.suggestions.add_terms(suggestions) }

	fn suggest(&self, prefix: &str, max: usize, fuzzy: bool) -> Result<Vec<Suggestion>> {
		self.suggestions.suggest(prefix, max, fuzzy)
	}
}

impl std::fmt::Debug for TantivyIndex {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TantivyIndex").field("name", &self.name).field("location", &self.location).field("exists", &self.exists()).finish()
	}
}
