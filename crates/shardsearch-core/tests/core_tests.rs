use std::fs;
use tempfile::TempDir;

use shardsearch_core::config::{resolve_with_base, Config, WalkErrorPolicy};
use shardsearch_core::FieldKind;

#[test]
fn load_from_dir_merges_file_over_defaults() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        r#"
[shards]
name = "wiki"
endpoints = ["memory"]
count = 4

[[schema.fields]]
name = "title"
type = "text"
weight = 2.0

[[schema.fields]]
name = "score"
type = "numeric"

[ingest]
pattern = "*.jsonl"
chunk = 50
walk_errors = "skip"
replace = false
"#,
    )
    .unwrap();

    let settings = Config::load_from(tmp.path()).expect("load").settings().expect("settings");
    assert_eq!(settings.shards.name, "wiki");
    assert_eq!(settings.shards.count, 4);
    assert_eq!(settings.schema.fields.len(), 2);
    assert_eq!(settings.schema.fields[0].kind, FieldKind::Text { weight: 2.0 });
    assert_eq!(settings.ingest.pattern, "*.jsonl");
    assert_eq!(settings.ingest.chunk, 50);
    // untouched keys keep their defaults
    assert_eq!(settings.ingest.workers, 4);
    assert_eq!(settings.ingest.walk_errors, WalkErrorPolicy::Skip);
    assert!(!settings.ingest.index_options.replace);
    assert_eq!(settings.ingest.max_docs(), None);
    assert_eq!(settings.suggest.fuzzy_distance, 1);
}

#[test]
fn zero_shard_count_is_rejected_at_load() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[shards]\ncount = 0\n").unwrap();
    let err = Config::load_from(tmp.path()).err().expect("must fail");
    assert!(err.to_string().contains("shards.count"), "{err}");
}

#[test]
fn typed_get_reads_nested_keys() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[ingest]\nmax_docs_per_file = 25\n").unwrap();
    let config = Config::load_from(tmp.path()).expect("load");
    let n: usize = config.get("ingest.max_docs_per_file").expect("key");
    assert_eq!(n, 25);
    assert_eq!(config.settings().unwrap().ingest.max_docs(), Some(25));
}

#[test]
fn relative_paths_resolve_against_base() {
    let tmp = TempDir::new().unwrap();
    assert_eq!(resolve_with_base(tmp.path(), "shards/a"), tmp.path().join("shards/a"));
    assert_eq!(resolve_with_base(tmp.path(), "/abs/b"), std::path::PathBuf::from("/abs/b"));
}
