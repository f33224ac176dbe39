use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use shardsearch_cluster::DistributedIndex;
use shardsearch_core::{
    Autocompleter, Document, Error, FieldDef, IndexOptions, Metadata, Query, Result, SearchIndex, SearchResults,
    Suggestion,
};
use shardsearch_text::{Location, TantivyIndex};

fn metadata() -> Metadata {
    Metadata::new().add_field(FieldDef::text("title", 1.0))
}

fn distributed(n: usize) -> DistributedIndex {
    let shards = TantivyIndex::shards("idx", &[Location::Memory], n, metadata()).expect("shards");
    let dist = DistributedIndex::from_shards("idx", shards).expect("distributed");
    dist.create().expect("create");
    dist
}

/// A shard whose backend is unreachable. Counts the calls it receives.
struct Unreachable {
    name: String,
    metadata: Metadata,
    calls: Arc<AtomicUsize>,
}

impl Unreachable {
    fn boxed(name: &str, calls: &Arc<AtomicUsize>) -> Box<dyn SearchIndex> {
        Box::new(Self { name: name.to_string(), metadata: metadata(), calls: Arc::clone(calls) })
    }

    fn fail<T>(&self) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::backend(&self.name, "connection refused"))
    }
}

impl Autocompleter for Unreachable {
    fn add_terms(&self, _: &[Suggestion]) -> Result<()> { self.fail() }
    fn suggest(&self, _: &str, _: usize, _: bool) -> Result<Vec<Suggestion>> { self.fail() }
}

impl SearchIndex for Unreachable {
    fn name(&self) -> &str { &self.name }
    fn metadata(&self) -> &Metadata { &self.metadata }
    fn create(&self) -> Result<()> { self.fail() }
    fn drop_index(&self) -> Result<()> { self.fail() }
    fn index(&self, _: &[Document], _: &IndexOptions) -> Result<()> { self.fail() }
    fn search(&self, _: &Query) -> Result<SearchResults> { self.fail() }
    fn get(&self, _: &str) -> Result<Option<Document>> { self.fail() }
    fn count(&self) -> Result<u64> { self.fail() }
}

fn half_broken(calls: &Arc<AtomicUsize>) -> DistributedIndex {
    let healthy = TantivyIndex::new("idx0", &Location::Memory, Arc::new(metadata())).unwrap();
    healthy.create().unwrap();
    DistributedIndex::new("idx", vec![Box::new(healthy) as Box<dyn SearchIndex>, Unreachable::boxed("idx1", calls)]).unwrap()
}

#[test]
fn two_shard_hello_scenario() {
    let dist = distributed(2);
    let docs = vec![
        Document::new("doc1", 0.1).set("title", "hello world"),
        Document::new("doc2", 1.0).set("title", "foo bar hello"),
    ];
    dist.index(&docs, &IndexOptions::default()).expect("index");

    let res = dist.search(&Query::new("idx", "hello world")).expect("search");
    assert_eq!(res.ids(), ["doc1"]);

    let res = dist.search(&Query::new("idx", "hello")).expect("search");
    eprintln!("q='hello' -> {:?} (total {})", res.ids(), res.total);
    assert_eq!(res.ids(), ["doc2", "doc1"]);
    assert_eq!(res.total, 2);
}

#[test]
fn hundred_suggestions_top_ten() {
    let dist = distributed(2);
    let terms: Vec<_> = (0..100).map(|i| Suggestion::new(format!("suggestion {i}"), f64::from(i))).collect();
    dist.add_terms(&terms).expect("add terms");

    let top = dist.suggest("sugg", 10, false).expect("suggest");
    let scores: Vec<f64> = top.iter().map(|s| s.score).collect();
    assert_eq!(scores, (90..100).rev().map(f64::from).collect::<Vec<_>>());

    let fuzzy = dist.suggest("sugg", 10, true).unwrap();
    for s in &top { assert!(fuzzy.contains(s)); }
    assert!(dist.suggest("sugg", 0, true).unwrap().is_empty());
}

#[test]
fn fuzzy_suggestions_across_shards() {
    let dist = distributed(3);
    dist.add_terms(&[Suggestion::new("hello world", 1.0), Suggestion::new("hello", 2.0), Suggestion::new("jello world", 3.0)]).unwrap();
    let exact = dist.suggest("hel", 10, false).unwrap();
    let fuzzy = dist.suggest("hel", 10, true).unwrap();
    assert_eq!(exact.len(), 2);
    assert_eq!(fuzzy.len(), 3);
    assert_eq!(fuzzy[..2], exact[..]);
    assert_eq!(fuzzy[2].term, "jello world");
}

#[test]
fn prefix_is_normalized_before_merging() {
    let dist = distributed(3);
    let mut terms = Vec::new();
    for i in 0..15 {
        terms.push(Suggestion::new(format!("hello w{i}"), f64::from(2 * i)));
        terms.push(Suggestion::new(format!("hellox{i}"), f64::from(2 * i + 1)));
    }
    dist.add_terms(&terms).unwrap();

    let exact = dist.suggest("Hello ", 30, false).unwrap();
    eprintln!("'Hello ' -> {:?}", exact.iter().map(|s| s.score).collect::<Vec<_>>());
    assert_eq!(exact.len(), 30);
    assert!(exact.windows(2).all(|w| w[0].score > w[1].score));
    assert_eq!(exact, dist.suggest("hello", 30, false).unwrap());

    let fuzzy = dist.suggest("Hello ", 40, true).unwrap();
    assert_eq!(fuzzy[..30], exact[..]);
}

#[test]
fn raising_max_keeps_the_top_of_the_list() {
    let dist = distributed(3);
    let terms: Vec<_> = (0..60).map(|i| Suggestion::new(format!("topic {i}"), f64::from(i % 9))).collect();
    dist.add_terms(&terms).unwrap();

    for fuzzy in [false, true] {
        let wide = dist.suggest("topic", 60, fuzzy).unwrap();
        assert_eq!(wide.len(), 60);
        for k in [1, 7, 20, 45] {
            let narrow = dist.suggest("topic", k, fuzzy).unwrap();
            assert_eq!(narrow, wide[..k], "k={k} fuzzy={fuzzy}");
        }
    }
}

#[test]
fn reindexing_deduplicates_by_id() {
    let dist = distributed(3);
    let docs: Vec<_> = (0..50).map(|i| Document::new(format!("d{i}"), 1.0).set("title", "common")).collect();
    dist.index(&docs, &IndexOptions::default()).unwrap();
    dist.index(&docs[..20], &IndexOptions::default()).unwrap();
    assert_eq!(dist.count().unwrap(), 50);

    let per_shard: u64 = (0..3).map(|i| dist.shard(i).unwrap().count().unwrap()).sum();
    assert_eq!(per_shard, 50);
    for doc in &docs {
        let owner = dist.router().shard_for(&doc.id);
        assert!(dist.shard(owner).unwrap().get(&doc.id).unwrap().is_some());
        assert_eq!(dist.get(&doc.id).unwrap().map(|d| d.id), Some(doc.id.clone()));
    }
    assert!(dist.get("missing").unwrap().is_none());
}

#[test]
fn pages_slice_the_merged_order() {
    let dist = distributed(3);
    let docs: Vec<_> = (0..30).map(|i| Document::new(format!("d{i}"), 1.0 + i as f32).set("title", "common words")).collect();
    dist.index(&docs, &IndexOptions::default()).unwrap();

    let all = dist.search(&Query::new("idx", "common").limit(0, 30)).unwrap();
    assert_eq!(all.total, 30);
    assert_eq!(all.docs.len(), 30);
    assert!(all.docs.windows(2).all(|w| w[0].score >= w[1].score));

    let page = dist.search(&Query::new("idx", "common").limit(5, 10)).unwrap();
    assert_eq!(page.total, 30);
    assert_eq!(page.ids(), all.ids()[5..15]);

    let counted = dist.search(&Query::new("idx", "common").limit(0, 0)).unwrap();
    assert_eq!(counted.total, 30);
    assert!(counted.docs.is_empty());

    assert!(matches!(dist.search(&Query::new("idx0", "common")), Err(Error::UnknownIndex(_))));
}

#[test]
fn failing_shard_is_reported_and_healthy_shard_keeps_writes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dist = half_broken(&calls);
    let docs: Vec<_> = (0..20).map(|i| Document::new(format!("d{i}"), 1.0).set("title", "common")).collect();
    let on_healthy = docs.iter().filter(|d| dist.router().shard_for(&d.id) == 0).count();
    assert!(on_healthy > 0 && on_healthy < docs.len());

    let err = dist.index(&docs, &IndexOptions::default()).unwrap_err();
    match err {
        Error::Shards { ref failed, total, ref committed } => {
            assert_eq!(total, 2);
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].shard, 1);
            assert_eq!(committed.len(), on_healthy);
            assert!(committed.iter().all(|id| dist.router().shard_for(id) == 0));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(dist.shard(0).unwrap().count().unwrap(), on_healthy as u64);

    // reads never return a partial answer
    assert!(matches!(dist.search(&Query::new("idx", "common")), Err(Error::Shards { .. })));
    assert!(matches!(dist.suggest("c", 5, false), Err(Error::Shards { .. })));
    assert!(matches!(dist.count(), Err(Error::Shards { .. })));
}

#[test]
fn create_reports_first_failure_and_drop_attempts_every_shard() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dist = half_broken(&calls);
    // idx0 already exists, idx1 is unreachable: shard order decides
    assert!(matches!(dist.create(), Err(Error::IndexExists(ref n)) if n == "idx0"));

    let before = calls.load(Ordering::SeqCst);
    assert!(matches!(dist.drop_index(), Err(Error::Backend { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), before + 1);
    assert!(matches!(dist.shard(0).unwrap().count(), Err(Error::UnknownIndex(_))));
}

#[test]
fn construction_checks() {
    assert!(matches!(DistributedIndex::new("idx", Vec::new()), Err(Error::InvalidConfig(_))));
    let a = TantivyIndex::new("idx0", &Location::Memory, Arc::new(metadata())).unwrap();
    let b = TantivyIndex::new("idx1", &Location::Memory, Arc::new(metadata().add_field(FieldDef::numeric("year")))).unwrap();
    assert!(matches!(DistributedIndex::from_shards("idx", vec![a, b]), Err(Error::InvalidConfig(_))));
}
