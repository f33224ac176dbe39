use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shardsearch_cluster::DistributedIndex;
use shardsearch_core::config::{Config, Settings, WalkErrorPolicy};
use shardsearch_core::{Autocompleter, Query, SearchIndex};
use shardsearch_ingest::{DocumentReader, IngestOptions, IngestionPipeline, JsonLinesReader, PlainTextReader};
use shardsearch_text::{Location, TantivyIndex};

/// Sharded full-text search and autocomplete over tantivy indices
#[derive(Parser, Debug)]
#[command(name = "shardsearch", version, about, long_about = None)]
struct Args {
    /// Directory holding config.toml
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Distributed index name (overrides shards.name)
    #[arg(long)]
    index: Option<String>,

    /// Log filter, e.g. `info` or `shardsearch_ingest=debug` (overrides RUST_LOG)
    #[arg(long)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create every shard of the index
    Create,
    /// Drop every shard of the index
    Drop,
    /// Ingest a directory tree (or a single file) into the index
    Ingest(IngestArgs),
    /// Full-text search across all shards
    Search {
        query: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(short, long, default_value_t = 10)]
        num: usize,
    },
    /// Autocomplete a prefix
    Suggest {
        prefix: String,
        #[arg(short, long, default_value_t = 10)]
        max: usize,
        #[arg(long)]
        fuzzy: bool,
    },
}

#[derive(clap::Args, Debug)]
struct IngestArgs {
    /// Root directory, or a file with --file
    path: PathBuf,
    /// Treat PATH as a single file and ignore the pattern
    #[arg(long)]
    file: bool,
    #[arg(long, value_enum, default_value_t = Format::Jsonl)]
    format: Format,
    /// Field that receives the file content with --format text
    #[arg(long, default_value = "body")]
    text_field: String,
    #[arg(long)]
    pattern: Option<String>,
    #[arg(long)]
    workers: Option<usize>,
    #[arg(long)]
    conns: Option<usize>,
    #[arg(long)]
    chunk: Option<usize>,
    #[arg(long)]
    max_docs_per_file: Option<usize>,
    #[arg(long)]
    suggest_field: Option<String>,
    /// Log and skip unreadable directory entries instead of aborting
    #[arg(long)]
    skip_walk_errors: bool,
    /// Create the index before ingesting
    #[arg(long)]
    create: bool,
    #[arg(long)]
    no_progress: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    /// One JSON object per line
    Jsonl,
    /// One document per file
    Text,
}

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn open_index(settings: &Settings, name: &str) -> anyhow::Result<DistributedIndex> {
    let endpoints: Vec<Location> = settings.shards.endpoints.iter().map(|e| e.parse::<Location>().unwrap_or_else(|never| match never {})).collect();
    if endpoints.contains(&Location::Memory) {
        warn!("in-memory shards do not outlive this process");
    }
    let shards = TantivyIndex::shards(name, &endpoints, settings.shards.count, settings.schema.clone())?
        .into_iter()
        .map(|s| s.with_fuzzy_distance(settings.suggest.fuzzy_distance))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DistributedIndex::from_shards(name, shards)?)
}

fn ingest_options(settings: &Settings, args: &IngestArgs) -> IngestOptions {
    let mut opts = IngestOptions::from(&settings.ingest);
    if let Some(p) = &args.pattern { opts.pattern = p.clone(); }
    if let Some(n) = args.workers { opts.workers = n; }
    if let Some(n) = args.conns { opts.conns = n; }
    if let Some(n) = args.chunk { opts.chunk = n; }
    if let Some(n) = args.max_docs_per_file { opts.max_docs_per_file = (n > 0).then_some(n); }
    if args.suggest_field.is_some() { opts.suggest_field = args.suggest_field.clone(); }
    if args.skip_walk_errors { opts.walk_errors = WalkErrorPolicy::Skip; }
    opts.progress = !args.no_progress;
    opts
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log.as_deref());

    let config = Config::load_from(&args.config_dir).context("loading configuration")?;
    let settings = config.settings()?;
    let name = args.index.clone().unwrap_or_else(|| settings.shards.name.clone());
    let index = open_index(&settings, &name).context("opening shards")?;
    info!(index = %name, shards = index.shard_count(), "index ready");

    match args.command {
        Command::Create => {
            index.create().context("create failed")?;
            println!("Created {} ({} shards)", name, index.shard_count());
        }
        Command::Drop => {
            index.drop_index().context("drop failed")?;
            println!("Dropped {}", name);
        }
        Command::Ingest(ingest) => {
            if ingest.create { index.create().context("create failed")?; }
            let reader: Box<dyn DocumentReader> = match ingest.format {
                Format::Jsonl => Box::new(JsonLinesReader::new()),
                Format::Text => Box::new(PlainTextReader::new(ingest.text_field.clone())),
            };
            let pipeline = IngestionPipeline::new(&index, reader.as_ref(), ingest_options(&settings, &ingest));
            let summary = (if ingest.file { pipeline.ingest_file(&ingest.path) } else { pipeline.run_dir(&ingest.path) })
                .with_context(|| format!("ingest of {} failed", ingest.path.display()))?;
            println!(
                "Indexed {} documents from {} files in {:.2?} ({} skipped, {} failed, {} suggestions)",
                summary.docs_indexed, summary.files, summary.elapsed, summary.docs_skipped, summary.docs_failed, summary.suggestions
            );
            if let Some(stats) = summary.last_stats {
                println!("Last window: {:.0} docs/s, {:.2?} per index call", stats.window_rate, stats.window_latency);
            }
        }
        Command::Search { query, offset, num } => {
            let results = index.search(&Query::new(&name, &query).limit(offset, num)).context("search failed")?;
            println!("{} hits for '{}'", results.total, query);
            for (i, doc) in results.docs.iter().enumerate() {
                let fields: Vec<String> = doc.properties.iter().map(|(k, v)| format!("{k}={v}")).collect();
                println!("{:>3}. {} [{:.4}] {}", offset + i + 1, doc.id, doc.score, fields.join(" "));
            }
        }
        Command::Suggest { prefix, max, fuzzy } => {
            for s in index.suggest(&prefix, max, fuzzy).context("suggest failed")? {
                println!("{:.3}\t{}", s.score, s.term);
            }
        }
    }
    Ok(())
}
