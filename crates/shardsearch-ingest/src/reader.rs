//! Pluggable document readers.
//!
//! A reader turns one input file into documents and hands them to the
//! pipeline through a `DocumentSink`. Bad records are skipped (and counted);
//! a reader only returns an error when it cannot continue at all.

use std::cell::Cell;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::Result;
use crossbeam_channel::Sender;
use tracing::warn;

use shardsearch_core::{Document, FieldKind, FieldValue, SearchIndex};

use crate::cancel::CancellationToken;

/// The pipeline stopped accepting documents (cancelled or shutting down).
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("document sink closed")]
pub struct SinkClosed;

/// Write end handed to a reader for one file. The reader cannot close the
/// underlying channel; it only stops sending.
pub struct DocumentSink<'a> {
    source: &'a Path,
    tx: &'a Sender<Document>,
    cancel: &'a CancellationToken,
    sent: Cell<usize>,
    skipped: Cell<usize>,
    closed: Cell<bool>,
}

impl<'a> DocumentSink<'a> {
    pub fn new(source: &'a Path, tx: &'a Sender<Document>, cancel: &'a CancellationToken) -> Self {
        Self { source, tx, cancel, sent: Cell::new(0), skipped: Cell::new(0), closed: Cell::new(false) }
    }

    /// Path of the file being read.
    pub fn source(&self) -> &Path { self.source }

    /// Blocks while the document queue is full.
    pub fn send(&self, doc: Document) -> std::result::Result<(), SinkClosed> {
        if self.cancel.send(self.tx, doc).is_err() {
            self.closed.set(true);
            return Err(SinkClosed);
        }
        self.sent.set(self.sent.get() + 1);
        Ok(())
    }

    /// Records a malformed record that was dropped.
    pub fn skip(&self) { self.skipped.set(self.skipped.get() + 1); }

    pub fn sent(&self) -> usize { self.sent.get() }

    pub fn skipped(&self) -> usize { self.skipped.get() }

    pub fn is_closed(&self) -> bool { self.closed.get() }
}

pub trait DocumentReader: Send + Sync {
    /// Parses `source` and sends at most `max_docs` documents (`None` means
    /// no limit). `index` gives access to the target schema.
    fn read(&self, source: &mut dyn Read, sink: &DocumentSink, max_docs: Option<usize>, index: &dyn SearchIndex) -> Result<()>;
}

fn limit_reached(sink: &DocumentSink, max_docs: Option<usize>) -> bool {
    max_docs.is_some_and(|max| sink.sent() >= max)
}

/// One JSON object per line: `id`, optional `score` (default 1.0), and any
/// other scalar keys as fields. Values of numeric schema fields are coerced
/// to numbers; text fields accept any scalar.
#[derive(Debug, Clone, Default)]
pub struct JsonLinesReader;

impl JsonLinesReader {
    pub fn new() -> Self { Self }

    fn parse(line: &str, index: &dyn SearchIndex) -> Option<Document> {
        let value: serde_json::Value = serde_json::from_str(line).ok()?;
        let object = value.as_object()?;
        let id = match object.get("id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let score = match object.get("score") {
            Some(v) => v.as_f64()? as f32,
            None => 1.0,
        };
        let mut doc = Document::new(id, score);
        for (key, raw) in object {
            if key == "id" || key == "score" { continue; }
            let Some(value) = FieldValue::from_json(raw) else { continue };
            let value = match index.metadata().field(key).map(|f| f.kind) {
                Some(FieldKind::Numeric) => FieldValue::Numeric(value.as_f64()?),
                Some(FieldKind::Text { .. }) => FieldValue::Text(value.to_string()),
                None => value,
            };
            doc.properties.insert(key.clone(), value);
        }
        Some(doc)
    }
}

impl DocumentReader for JsonLinesReader {
    fn read(&self, source: &mut dyn Read, sink: &DocumentSink, max_docs: Option<usize>, index: &dyn SearchIndex) -> Result<()> {
        let reader = BufReader::new(source);
        for (lineno, line) in reader.split(b'\n').enumerate() {
            if limit_reached(sink, max_docs) { break; }
            let bytes = line?;
            let Ok(line) = std::str::from_utf8(&bytes) else {
                warn!(file = %sink.source().display(), line = lineno + 1, "skipping record that is not UTF-8");
                sink.skip();
                continue;
            };
            let line = line.trim();
            if line.is_empty() { continue; }
            match Self::parse(line, index) {
                Some(doc) => sink.send(doc)?,
                None => {
                    warn!(file = %sink.source().display(), line = lineno + 1, "skipping malformed record");
                    sink.skip();
                }
            }
        }
        Ok(())
    }
}

/// Whole file as one document: id is the file stem, the content goes to
/// `field`. Invalid UTF-8 is replaced rather than rejected.
#[derive(Debug, Clone)]
pub struct PlainTextReader {
    field: String,
}

impl PlainTextReader {
    pub fn new(field: impl Into<String>) -> Self { Self { field: field.into() } }
}

impl Default for PlainTextReader {
    fn default() -> Self { Self::new("body") }
}

impl DocumentReader for PlainTextReader {
    fn read(&self, source: &mut dyn Read, sink: &DocumentSink, max_docs: Option<usize>, _index: &dyn SearchIndex) -> Result<()> {
        if limit_reached(sink, max_docs) { return Ok(()); }
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        let content = String::from_utf8_lossy(&bytes);
        let content = content.trim();
        if content.is_empty() {
            sink.skip();
            return Ok(());
        }
        let id = sink.source().file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        sink.send(Document::new(id, 1.0).set(self.field.as_str(), content))?;
        Ok(())
    }
}
