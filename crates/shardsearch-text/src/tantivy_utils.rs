use std::collections::HashMap;

use tantivy::schema::{
	Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, INDEXED, STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

use shardsearch_core::{Error, FieldKind, Metadata, Result};

pub const ID_FIELD: &str = "__id";
pub const SCORE_FIELD: &str = "__score";
pub const TOKENIZER: &str = "text_with_stopwords";

// Default English stop words of the engine being fronted.
const STOP_WORDS: [&str; 33] = [
	"a", "is", "the", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "it", "no",
	"not", "of", "on", "or", "such", "that", "their", "then", "there", "these", "they", "this", "to", "was",
	"will", "with",
];

/// Schema of a document index: the two reserved fields plus one tantivy field
/// per metadata field. Text fields are tokenized and stored, numeric fields
/// are indexed, stored and fast.
pub fn build_schema(metadata: &Metadata) -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field(ID_FIELD, STRING | STORED);
	schema_builder.add_f64_field(SCORE_FIELD, FAST | STORED);
	for def in &metadata.fields {
		match def.kind {
			FieldKind::Text { .. } => {
				let indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
				schema_builder.add_text_field(&def.name, TextOptions::default().set_indexing_options(indexing).set_stored());
			}
			FieldKind::Numeric => { schema_builder.add_f64_field(&def.name, INDEXED | STORED | FAST); }
		}
	}
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| (*s).to_string())))
		.build();
	index.tokenizers().register(TOKENIZER, tokenizer);
}

#[derive(Debug, Clone, Copy)]
pub enum Mapped {
	Text { field: Field, weight: f32 },
	Numeric { field: Field },
}

/// Tantivy field handles resolved from a schema built by `build_schema`.
#[derive(Debug, Clone)]
pub struct IndexFields {
	pub id: Field,
	pub score: Field,
	pub by_name: HashMap<String, Mapped>,
}

impl IndexFields {
	pub fn resolve(index_name: &str, schema: &Schema, metadata: &Metadata) -> Result<Self> {
		let lookup = |name: &str| schema.get_field(name).map_err(|e| Error::backend(index_name, e));
		let mut by_name = HashMap::new();
		for def in &metadata.fields {
			let field = lookup(&def.name)?;
			let mapped = match def.kind {
				FieldKind::Text { weight } => Mapped::Text { field, weight },
				FieldKind::Numeric => Mapped::Numeric { field },
			};
			by_name.insert(def.name.clone(), mapped);
		}
		Ok(Self { id: lookup(ID_FIELD)?, score: lookup(SCORE_FIELD)?, by_name })
	}

	/// Default query fields with their boosts.
	pub fn text_fields(&self) -> Vec<(Field, f32)> {
		let mut out: Vec<(Field, f32)> = self.by_name.values().filter_map(|m| match *m {
			Mapped::Text { field, weight } => Some((field, weight)),
			Mapped::Numeric { .. } => None,
		}).collect();
		out.sort_by_key(|(f, _)| f.field_id());
		out
	}
}
