//! Domain types shared by single-node indices, the sharded index and the
//! ingestion pipeline.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

pub type DocId = String;
pub type Properties = BTreeMap<String, FieldValue>;

/// Smallest relevance score a document may carry. A zero score would erase
/// the document from score-weighted ranking, so it is lifted to this value
/// before indexing.
pub const MIN_SCORE: f32 = 1e-7;

/// Names used internally by index backends; user fields may not take them.
pub const RESERVED_FIELDS: [&str; 2] = ["__id", "__score"];

/// A scalar property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Numeric(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value. Text is parsed, booleans map to 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Numeric(n) => Some(*n),
            FieldValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Converts a JSON scalar; arrays, objects and null have no field value.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(FieldValue::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(FieldValue::Numeric),
            serde_json::Value::String(s) => Some(FieldValue::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Numeric(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self { FieldValue::Text(s.to_string()) }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self { FieldValue::Text(s) }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self { FieldValue::Numeric(n) }
}

impl From<f32> for FieldValue {
    fn from(n: f32) -> Self { FieldValue::Numeric(f64::from(n)) }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self { FieldValue::Numeric(n as f64) }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self { FieldValue::Numeric(f64::from(n)) }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self { FieldValue::Bool(b) }
}

/// A unit of indexing.
///
/// - `id`: unique within an index; an empty id marks a malformed record
/// - `score`: document relevance, multiplied into the engine's ranking
/// - `properties`: field name → scalar value, interpreted through `Metadata`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub score: f32,
    #[serde(default)]
    pub properties: Properties,
}

impl Document {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self { id: id.into(), score, properties: Properties::new() }
    }

    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> { self.properties.get(name) }

    /// Score as it should be stored: never zero, negative or NaN.
    pub fn effective_score(&self) -> f32 {
        if self.score.is_finite() && self.score > 0.0 { self.score } else { MIN_SCORE }
    }

    pub fn normalize_score(&mut self) { self.score = self.effective_score(); }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Text {
        #[serde(default = "default_weight")]
        weight: f32,
    },
    Numeric,
}

fn default_weight() -> f32 { 1.0 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn text(name: impl Into<String>, weight: f32) -> Self {
        Self { name: name.into(), kind: FieldKind::Text { weight } }
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: FieldKind::Numeric }
    }
}

/// Index schema: an ordered list of field definitions. Every shard of a
/// distributed index is created from the same `Metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl Metadata {
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn add_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn text_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| matches!(f.kind, FieldKind::Text { .. }))
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for f in &self.fields {
            if f.name.is_empty() {
                return Err(Error::InvalidConfig("field with empty name".into()));
            }
            if RESERVED_FIELDS.contains(&f.name.as_str()) {
                return Err(Error::InvalidConfig(format!("field name '{}' is reserved", f.name)));
            }
            if !seen.insert(f.name.as_str()) {
                return Err(Error::InvalidConfig(format!("duplicate field '{}'", f.name)));
            }
            if let FieldKind::Text { weight } = f.kind {
                if !(weight.is_finite() && weight > 0.0) {
                    return Err(Error::InvalidConfig(format!("field '{}' has invalid weight {}", f.name, weight)));
                }
            }
        }
        Ok(())
    }
}

/// A weighted completion term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub term: String,
    pub score: f64,
}

impl Suggestion {
    pub fn new(term: impl Into<String>, score: f64) -> Self {
        Self { term: term.into(), score }
    }

    /// True when the term literally starts with `prefix` (case-insensitive).
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.term.to_lowercase().starts_with(&prefix.to_lowercase())
    }
}

/// Descending score, then ascending term.
pub fn by_score_desc(a: &Suggestion, b: &Suggestion) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.term.cmp(&b.term))
}

/// Completion order for `prefix`: literal prefix matches ahead of fuzzy-only
/// ones, then descending score, then ascending term. Under this order a fuzzy
/// top-k always contains the exact top-k.
pub fn completion_order(prefix: &str, a: &Suggestion, b: &Suggestion) -> Ordering {
    b.matches_prefix(prefix)
        .cmp(&a.matches_prefix(prefix))
        .then_with(|| by_score_desc(a, b))
}

pub trait SuggestionList {
    fn sort_by_score(&mut self);
}

impl SuggestionList for Vec<Suggestion> {
    fn sort_by_score(&mut self) { self.sort_by(by_score_desc); }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub offset: usize,
    pub num: usize,
}

impl Default for Paging {
    fn default() -> Self { Self { offset: 0, num: 10 } }
}

/// A full-text query addressed to one index by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub index: String,
    pub text: String,
    #[serde(default)]
    pub paging: Paging,
}

impl Query {
    pub fn new(index: impl Into<String>, text: impl Into<String>) -> Self {
        Self { index: index.into(), text: text.into(), paging: Paging::default() }
    }

    #[must_use]
    pub fn limit(mut self, offset: usize, num: usize) -> Self {
        self.paging = Paging { offset, num };
        self
    }

    /// Same text and paging, addressed to another index.
    pub fn for_index(&self, index: impl Into<String>) -> Self {
        Self { index: index.into(), text: self.text.clone(), paging: self.paging }
    }
}

/// Options passed through to `SearchIndex::index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    /// Overwrite a document that already has the same id.
    pub replace: bool,
    /// When replacing, keep stored fields the new document does not set.
    pub partial: bool,
}

impl Default for IndexOptions {
    fn default() -> Self { Self { replace: true, partial: false } }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub docs: Vec<Document>,
    pub total: usize,
}

impl SearchResults {
    pub fn ids(&self) -> Vec<&str> { self.docs.iter().map(|d| d.id.as_str()).collect() }
}
