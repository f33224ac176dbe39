use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use glob::Pattern;
use tracing::{debug, info, warn};

use shardsearch_core::config::{IngestConfig, WalkErrorPolicy};
use shardsearch_core::{Document, IndexOptions, SearchIndex, Suggestion};

use crate::cancel::{CancellationToken, Interrupted};
use crate::error::{Error, Result};
use crate::reader::{DocumentReader, DocumentSink};
use crate::stats::{report, Progress, Sample, Stats};
use crate::walk::{check_root, compile_pattern, discover};

/// Capacity of the discovered-file queue.
pub const FILE_QUEUE: usize = 100;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Glob matched against file names (not paths).
    pub pattern: String,
    /// Parse threads.
    pub workers: usize,
    /// Index threads.
    pub conns: usize,
    /// Batch size and document queue capacity.
    pub chunk: usize,
    pub max_docs_per_file: Option<usize>,
    pub walk_errors: WalkErrorPolicy,
    pub index_options: IndexOptions,
    /// Text field whose lowercased value becomes a suggestion.
    pub suggest_field: Option<String>,
    pub stats_interval: Duration,
    pub progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self { Self::from(&IngestConfig::default()) }
}

impl From<&IngestConfig> for IngestOptions {
    fn from(cfg: &IngestConfig) -> Self {
        Self {
            pattern: cfg.pattern.clone(),
            workers: cfg.workers,
            conns: cfg.conns,
            chunk: cfg.chunk,
            max_docs_per_file: cfg.max_docs(),
            walk_errors: cfg.walk_errors,
            index_options: cfg.index_options,
            suggest_field: cfg.suggest_field.clone(),
            stats_interval: Duration::from_millis(200),
            progress: false,
        }
    }
}

impl IngestOptions {
    pub fn validate(&self) -> Result<()> {
        for (key, v) in [("workers", self.workers), ("conns", self.conns), ("chunk", self.chunk)] {
            if v == 0 { return Err(Error::InvalidConfig(format!("{key} must be at least 1"))); }
        }
        if self.stats_interval.is_zero() {
            return Err(Error::InvalidConfig("stats interval must be positive".into()));
        }
        Ok(())
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestSummary {
    /// Files handed to a reader.
    pub files: u64,
    /// Files that could not be opened or read to the end.
    pub files_skipped: u64,
    pub docs_indexed: u64,
    /// Malformed records and documents without an id.
    pub docs_skipped: u64,
    /// Documents in batches the index rejected.
    pub docs_failed: u64,
    pub suggestions: u64,
    pub elapsed: Duration,
    pub last_stats: Option<Stats>,
}

#[derive(Default)]
struct Counters {
    files: AtomicU64,
    files_skipped: AtomicU64,
    docs_indexed: AtomicU64,
    docs_skipped: AtomicU64,
    docs_failed: AtomicU64,
    suggestions: AtomicU64,
}

impl Counters {
    fn add(counter: &AtomicU64, n: usize) { counter.fetch_add(n as u64, Ordering::Relaxed); }
}

#[derive(Clone, Copy)]
enum Source<'p> {
    Dir(&'p Path),
    File(&'p Path),
}

/// What the discovery stage feeds into the file queue.
enum Feed<'p> {
    Tree(&'p Path, Pattern),
    Single(&'p Path),
}

/// Discover → parse → index → report, overlapped through bounded channels.
///
/// Every stage blocks when its output queue is full, so a slow index
/// throttles parsing and discovery. Each channel closes when the last thread
/// feeding it exits, which is how a finished stage shuts down the next one.
pub struct IngestionPipeline<'a> {
    index: &'a dyn SearchIndex,
    reader: &'a dyn DocumentReader,
    options: IngestOptions,
    cancel: CancellationToken,
    stats_out: Option<Sender<Stats>>,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(index: &'a dyn SearchIndex, reader: &'a dyn DocumentReader, options: IngestOptions) -> Self {
        Self { index, reader, options, cancel: CancellationToken::new(), stats_out: None }
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Every emitted `Stats` is also sent here. A bounded channel that is not
    /// drained throttles reporting.
    #[must_use]
    pub fn with_stats(mut self, tx: Sender<Stats>) -> Self {
        self.stats_out = Some(tx);
        self
    }

    pub fn cancellation(&self) -> CancellationToken { self.cancel.clone() }

    pub fn options(&self) -> &IngestOptions { &self.options }

    /// Ingests every file under `root` whose name matches the pattern.
    pub fn run_dir(&self, root: &Path) -> Result<IngestSummary> { self.run(Source::Dir(root)) }

    /// Ingests one file, ignoring the pattern.
    pub fn ingest_file(&self, path: &Path) -> Result<IngestSummary> { self.run(Source::File(path)) }

    fn run(&self, source: Source<'_>) -> Result<IngestSummary> {
        let opts = &self.options;
        opts.validate()?;
        let feed = match source {
            Source::Dir(root) => {
                let pattern = compile_pattern(&opts.pattern)?;
                check_root(root)?;
                Feed::Tree(root, pattern)
            }
            Source::File(path) => {
                check_root(path)?;
                Feed::Single(path)
            }
        };
        if self.cancel.is_cancelled() { return Err(Error::Cancelled); }

        let (file_tx, file_rx) = bounded::<PathBuf>(FILE_QUEUE);
        let (doc_tx, doc_rx) = bounded::<Document>(opts.chunk);
        let (sample_tx, sample_rx) = bounded::<Sample>(opts.chunk * opts.conns);
        let counters = Counters::default();
        let progress = Progress::new(opts.progress);
        let started = Instant::now();
        info!(index = %self.index.name(), workers = opts.workers, conns = opts.conns, chunk = opts.chunk, "ingestion started");

        let (discovered, last_stats) = thread::scope(|s| {
            let counters = &counters;
            let progress = &progress;
            let discoverer = s.spawn(move || {
                let res = match feed {
                    Feed::Tree(root, pattern) => discover(root, &pattern, opts.walk_errors, &file_tx, &self.cancel),
                    Feed::Single(path) => match self.cancel.send(&file_tx, path.to_path_buf()) {
                        Ok(()) | Err(Interrupted::Disconnected) => Ok(1),
                        Err(Interrupted::Cancelled) => Err(Error::Cancelled),
                    },
                };
                if let Err(e) = &res {
                    if !matches!(e, Error::Cancelled) { warn!(error = %e, "discovery aborted"); }
                    self.cancel.cancel();
                }
                res
            });
            for _ in 0..opts.workers {
                let (file_rx, doc_tx) = (file_rx.clone(), doc_tx.clone());
                s.spawn(move || self.parse_worker(&file_rx, &doc_tx, counters));
            }
            drop((file_rx, doc_tx));
            for _ in 0..opts.conns {
                let (doc_rx, sample_tx) = (doc_rx.clone(), sample_tx.clone());
                s.spawn(move || self.index_worker(&doc_rx, &sample_tx, counters));
            }
            drop((doc_rx, sample_tx));
            let reporter = s.spawn(move || report(sample_rx, self.stats_out.clone(), progress, opts.stats_interval, &self.cancel));

            let discovered = discoverer.join().unwrap_or_else(|_| Err(Error::Discovery("discovery thread panicked".into())));
            (discovered, reporter.join().ok().flatten())
        });

        let total = last_stats.map_or(0, |s| s.total_docs);
        progress.finish(total);
        let files_found = discovered?;
        if self.cancel.is_cancelled() { return Err(Error::Cancelled); }

        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let summary = IngestSummary {
            files: load(&counters.files),
            files_skipped: load(&counters.files_skipped),
            docs_indexed: load(&counters.docs_indexed),
            docs_skipped: load(&counters.docs_skipped),
            docs_failed: load(&counters.docs_failed),
            suggestions: load(&counters.suggestions),
            elapsed: started.elapsed(),
            last_stats,
        };
        info!(
            files = files_found,
            docs = summary.docs_indexed,
            skipped = summary.docs_skipped,
            failed = summary.docs_failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "ingestion finished"
        );
        Ok(summary)
    }

    fn parse_worker(&self, files: &Receiver<PathBuf>, docs: &Sender<Document>, counters: &Counters) {
        while let Ok(path) = self.cancel.recv(files) {
            Counters::add(&counters.files, 1);
            let mut file = match File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "cannot open file, skipping");
                    Counters::add(&counters.files_skipped, 1);
                    continue;
                }
            };
            let sink = DocumentSink::new(&path, docs, &self.cancel);
            let res = self.reader.read(&mut file, &sink, self.options.max_docs_per_file, self.index);
            Counters::add(&counters.docs_skipped, sink.skipped());
            match res {
                Ok(()) => debug!(file = %path.display(), docs = sink.sent(), "file parsed"),
                Err(_) if sink.is_closed() => break,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "failed to read file, skipping the rest");
                    Counters::add(&counters.files_skipped, 1);
                }
            }
        }
    }

    fn index_worker(&self, docs: &Receiver<Document>, samples: &Sender<Sample>, counters: &Counters) {
        let chunk = self.options.chunk;
        let mut batch: Vec<Document> = Vec::with_capacity(chunk);
        let mut terms: Vec<Suggestion> = Vec::new();
        while let Ok(first) = self.cancel.recv(docs) {
            let mut candidates = Vec::new();
            let mut next = Some(first);
            while let Some(doc) = next.take() {
                self.accept(doc, &mut batch, &mut candidates, counters);
                if batch.len() < chunk { next = docs.try_recv().ok(); }
            }
            if batch.is_empty() { continue; }

            let n = batch.len();
            let started = Instant::now();
            let outcome = self.index.index(&batch, &self.options.index_options);
            let latency = started.elapsed();
            let written = match outcome {
                Ok(()) => {
                    terms.extend(candidates.into_iter().map(|(_, s)| s));
                    n
                }
                Err(e) => {
                    // a sharded index may have kept the part its healthy shards own
                    let committed: HashSet<&str> = e.committed().iter().map(String::as_str).collect();
                    let kept = batch.iter().filter(|d| committed.contains(d.id.as_str())).count();
                    warn!(index = %self.index.name(), docs = n, committed = kept, error = %e, "index batch failed");
                    Counters::add(&counters.docs_failed, n - kept);
                    terms.extend(candidates.into_iter().filter(|(id, _)| committed.contains(id.as_str())).map(|(_, s)| s));
                    kept
                }
            };
            batch.clear();
            if written > 0 {
                Counters::add(&counters.docs_indexed, written);
                if self.cancel.send(samples, Sample { docs: written, latency }).is_err() { break; }
            }
            if terms.len() >= chunk { self.flush_terms(&mut terms, counters); }
        }
        self.flush_terms(&mut terms, counters);
    }

    /// Drops id-less documents, collects the suggestion of documents with a
    /// positive score and lifts zero scores before batching.
    fn accept(&self, mut doc: Document, batch: &mut Vec<Document>, candidates: &mut Vec<(String, Suggestion)>, counters: &Counters) {
        if doc.id.is_empty() {
            Counters::add(&counters.docs_skipped, 1);
            return;
        }
        if doc.score > 0.0 {
            if let Some(term) = self.suggestion_text(&doc) {
                candidates.push((doc.id.clone(), Suggestion::new(term, f64::from(doc.score))));
            }
        }
        doc.normalize_score();
        batch.push(doc);
    }

    fn suggestion_text(&self, doc: &Document) -> Option<String> {
        let field = self.options.suggest_field.as_deref()?;
        let text = doc.get(field)?.as_text()?.trim().to_lowercase();
        (!text.is_empty()).then_some(text)
    }

    fn flush_terms(&self, terms: &mut Vec<Suggestion>, counters: &Counters) {
        if terms.is_empty() { return; }
        match self.index.add_terms(terms) {
            Ok(()) => Counters::add(&counters.suggestions, terms.len()),
            Err(e) => warn!(index = %self.index.name(), terms = terms.len(), error = %e, "adding suggestions failed"),
        }
        terms.clear();
    }
}
