use std::sync::Arc;

use shardsearch_core::{Autocompleter, Document, Error, FieldDef, IndexOptions, Metadata, Query, SearchIndex, Suggestion};
use shardsearch_text::{Location, TantivyIndex};

fn metadata() -> Arc<Metadata> {
    Arc::new(Metadata::new().add_field(FieldDef::text("title", 1.0)).add_field(FieldDef::numeric("year")))
}

fn hello_docs() -> Vec<Document> {
    vec![
        Document::new("doc1", 0.1).set("title", "hello world"),
        Document::new("doc2", 1.0).set("title", "foo bar hello"),
    ]
}

fn created(name: &str, base: &Location) -> TantivyIndex {
    let idx = TantivyIndex::new(name, base, metadata()).expect("index handle");
    idx.create().expect("create");
    idx
}

#[test]
fn text_full_flow() {
    let idx = created("idx", &Location::Memory);
    idx.index(&hello_docs(), &IndexOptions::default()).expect("index");

    let both = idx.search(&Query::new("idx", "hello")).expect("search");
    eprintln!("q='hello' -> {:?}", both.ids());
    assert_eq!(both.ids(), ["doc2", "doc1"]);
    assert_eq!(both.total, 2);
    assert!(both.docs[0].score >= both.docs[1].score);

    let one = idx.search(&Query::new("idx", "hello world")).expect("search");
    assert_eq!(one.ids(), ["doc1"]);
    assert_eq!(one.total, 1);
    assert_eq!(one.docs[0].get("title").and_then(|v| v.as_text()), Some("hello world"));
}

#[test]
fn paging_and_count_only() {
    let idx = created("idx", &Location::Memory);
    let docs: Vec<_> = (0..25).map(|i| Document::new(format!("d{i}"), 1.0 + i as f32).set("title", "common words here")).collect();
    idx.index(&docs, &IndexOptions::default()).expect("index");

    let page = idx.search(&Query::new("idx", "common").limit(20, 10)).expect("search");
    assert_eq!(page.total, 25);
    assert_eq!(page.docs.len(), 5);

    let counted = idx.search(&Query::new("idx", "common").limit(0, 0)).expect("count only");
    assert!(counted.docs.is_empty());
    assert_eq!(counted.total, 25);
}

#[test]
fn reindexing_same_id_upserts() {
    let idx = created("idx", &Location::Memory);
    idx.index(&hello_docs(), &IndexOptions::default()).unwrap();
    idx.index(&[Document::new("doc1", 0.5).set("title", "goodbye")], &IndexOptions::default()).unwrap();
    assert_eq!(idx.count().unwrap(), 2);
    assert_eq!(idx.search(&Query::new("idx", "hello")).unwrap().ids(), ["doc2"]);

    let strict = IndexOptions { replace: false, partial: false };
    let err = idx.index(&[Document::new("doc2", 1.0)], &strict).unwrap_err();
    assert!(matches!(err, Error::DocumentExists(ref id) if id == "doc2"));

    let partial = IndexOptions { replace: true, partial: true };
    idx.index(&[Document::new("doc2", 2.0).set("year", 1999)], &partial).unwrap();
    let doc2 = idx.get("doc2").unwrap().expect("doc2 stored");
    assert_eq!(doc2.get("title").and_then(|v| v.as_text()), Some("foo bar hello"));
    assert_eq!(doc2.get("year").and_then(|v| v.as_f64()), Some(1999.0));
    assert_eq!(doc2.score, 2.0);
}

#[test]
fn repeated_ids_within_one_batch() {
    let idx = created("idx", &Location::Memory);
    let twice = [Document::new("a", 1.0).set("title", "first"), Document::new("a", 1.0).set("title", "second")];

    let strict = IndexOptions { replace: false, partial: false };
    let err = idx.index(&twice, &strict).unwrap_err();
    assert!(matches!(err, Error::DocumentExists(ref id) if id == "a"));
    assert_eq!(idx.count().unwrap(), 0);

    idx.index(&twice, &IndexOptions::default()).unwrap();
    assert_eq!(idx.count().unwrap(), 1);
    assert_eq!(idx.get("a").unwrap().expect("a").get("title").and_then(|v| v.as_text()), Some("second"));

    // each partial copy lands on top of the previous one
    let partial = IndexOptions { replace: true, partial: true };
    let updates = [Document::new("a", 2.0).set("year", 2001), Document::new("a", 3.0).set("title", "third")];
    idx.index(&updates, &partial).unwrap();
    let a = idx.get("a").unwrap().expect("a");
    assert_eq!(a.get("title").and_then(|v| v.as_text()), Some("third"));
    assert_eq!(a.get("year").and_then(|v| v.as_f64()), Some(2001.0));
    assert_eq!(a.score, 3.0);

    let fresh = [Document::new("b", 1.0).set("title", "bee"), Document::new("b", 1.0).set("year", 1990)];
    idx.index(&fresh, &partial).unwrap();
    let b = idx.get("b").unwrap().expect("b");
    assert_eq!(b.get("title").and_then(|v| v.as_text()), Some("bee"));
    assert_eq!(b.get("year").and_then(|v| v.as_f64()), Some(1990.0));
}

#[test]
fn invalid_documents_and_queries() {
    let idx = created("idx", &Location::Memory);
    let err = idx.index(&[Document::new("", 1.0)], &IndexOptions::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidDocument(_)));
    let err = idx.index(&[Document::new("x", 1.0).set("year", "soon")], &IndexOptions::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidDocument(_)));
    assert_eq!(idx.count().unwrap(), 0);

    let err = idx.search(&Query::new("other", "hello")).unwrap_err();
    assert!(matches!(err, Error::UnknownIndex(_)));
    let err = idx.search(&Query::new("idx", "nosuchfield:hello")).unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));
}

#[test]
fn zero_score_documents_stay_searchable() {
    let idx = created("idx", &Location::Memory);
    idx.index(&[Document::new("z", 0.0).set("title", "zero score")], &IndexOptions::default()).unwrap();
    let res = idx.search(&Query::new("idx", "zero")).unwrap();
    assert_eq!(res.ids(), ["z"]);
    assert!(res.docs[0].score > 0.0);
}

#[test]
fn create_drop_lifecycle_on_disk() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let base = Location::Directory(tmp.path().to_path_buf());

    let idx = created("books", &base);
    assert!(matches!(idx.create(), Err(Error::IndexExists(_))));
    idx.index(&hello_docs(), &IndexOptions::default()).unwrap();
    idx.add_terms(&[Suggestion::new("hello world", 1.0)]).unwrap();
    assert!(tmp.path().join("books").join("meta.json").is_file());
    drop(idx);

    // reopening finds the committed index
    let reopened = TantivyIndex::new("books", &base, metadata()).unwrap();
    assert!(reopened.exists());
    assert_eq!(reopened.count().unwrap(), 2);
    assert_eq!(reopened.suggest("hel", 5, false).unwrap().len(), 1);

    reopened.drop_index().unwrap();
    assert!(!tmp.path().join("books").exists());
    assert!(matches!(reopened.count(), Err(Error::UnknownIndex(_))));
    assert!(reopened.suggest("hel", 5, false).unwrap().is_empty());
    // dropping twice is tolerated
    reopened.drop_index().unwrap();

    reopened.create().unwrap();
    assert_eq!(reopened.count().unwrap(), 0);
}

#[test]
fn shards_are_named_and_spread_over_endpoints() {
    let tmp = tempfile::tempdir().unwrap();
    let endpoints = vec![Location::Directory(tmp.path().join("a")), Location::Directory(tmp.path().join("b"))];
    let shards = TantivyIndex::shards("idx", &endpoints, 3, (*metadata()).clone()).unwrap();
    let names: Vec<_> = shards.iter().map(|s| s.name().to_string()).collect();
    assert_eq!(names, ["idx0", "idx1", "idx2"]);
    assert_eq!(shards[2].location(), &Location::Directory(tmp.path().join("a").join("idx2")));
    assert_eq!(shards[1].location(), &Location::Directory(tmp.path().join("b").join("idx1")));
    assert!(TantivyIndex::shards("idx", &endpoints, 0, Metadata::new()).is_err());
}

#[test]
fn autocompleter_scenario() {
    let idx = created("idx", &Location::Memory);
    idx.add_terms(&[Suggestion::new("hello world", 1.0), Suggestion::new("hello", 2.0), Suggestion::new("jello world", 3.0)]).unwrap();
    assert_eq!(idx.suggest("hel", 10, false).unwrap().len(), 2);
    assert_eq!(idx.suggest("hel", 10, true).unwrap().len(), 3);
}

#[test]
fn raising_max_keeps_the_top_of_the_list() {
    let idx = created("idx", &Location::Memory);
    // duplicate scores so ties are exercised too
    let terms: Vec<Suggestion> = (0..40).map(|i| Suggestion::new(format!("hello w{i}"), f64::from(i % 7))).collect();
    idx.add_terms(&terms).unwrap();
    idx.add_terms(&[Suggestion::new("jello w1", 50.0)]).unwrap();

    for fuzzy in [false, true] {
        let wide = idx.suggest("hello", 41, fuzzy).unwrap();
        for k in [1, 5, 13, 30] {
            let narrow = idx.suggest("hello", k, fuzzy).unwrap();
            assert_eq!(narrow, wide[..k], "k={k} fuzzy={fuzzy}");
        }
    }
}
