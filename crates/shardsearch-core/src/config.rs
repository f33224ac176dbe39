//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`APP_SHARDS__COUNT=4` sets `shards.count`). Provides
//! helpers to expand `~` and `${VAR}` and to resolve relative paths against a
//! known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::types::{IndexOptions, Metadata};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> { Self::load_from(Path::new(".")) }

    /// Loads `config.toml` and its environment overlay from `dir`.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))
    }
}

/// Typed view of the whole configuration tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub shards: ShardsConfig,
    pub schema: Metadata,
    pub ingest: IngestConfig,
    pub suggest: SuggestConfig,
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.shards.count == 0 {
            anyhow::bail!("shards.count must be at least 1");
        }
        if self.shards.endpoints.is_empty() {
            anyhow::bail!("shards.endpoints must list at least one endpoint");
        }
        if self.shards.name.is_empty() {
            anyhow::bail!("shards.name must not be empty");
        }
        for (key, v) in [("workers", self.ingest.workers), ("conns", self.ingest.conns), ("chunk", self.ingest.chunk)] {
            if v == 0 { anyhow::bail!("ingest.{} must be at least 1", key); }
        }
        if self.suggest.fuzzy_distance > 2 {
            anyhow::bail!("suggest.fuzzy_distance must be 0, 1 or 2 (got {})", self.suggest.fuzzy_distance);
        }
        self.schema.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardsConfig {
    pub name: String,
    /// Storage locations; shard `i` lives at `endpoints[i % endpoints.len()]`.
    pub endpoints: Vec<String>,
    pub count: usize,
}

impl Default for ShardsConfig {
    fn default() -> Self {
        Self { name: "idx".to_string(), endpoints: vec!["memory".to_string()], count: 2 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalkErrorPolicy {
    #[default]
    Abort,
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub pattern: String,
    pub workers: usize,
    pub conns: usize,
    pub chunk: usize,
    /// 0 means unlimited.
    pub max_docs_per_file: usize,
    pub walk_errors: WalkErrorPolicy,
    pub suggest_field: Option<String>,
    #[serde(flatten)]
    pub index_options: IndexOptions,
}

impl IngestConfig {
    pub fn max_docs(&self) -> Option<usize> {
        (self.max_docs_per_file > 0).then_some(self.max_docs_per_file)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            pattern: "*".to_string(),
            workers: 4,
            conns: 8,
            chunk: 100,
            max_docs_per_file: 0,
            walk_errors: WalkErrorPolicy::Abort,
            suggest_field: None,
            index_options: IndexOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestConfig {
    pub fuzzy_distance: u8,
}

impl Default for SuggestConfig {
    fn default() -> Self { Self { fuzzy_distance: 1 } }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
