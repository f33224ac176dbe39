use rayon::prelude::*;
use tracing::{debug, info, warn};

use shardsearch_core::{
	Autocompleter, Document, Error, IndexOptions, Metadata, Paging, Query, Result, SearchIndex, SearchResults,
	ShardError, Suggestion,
};

use crate::merge::{merge_ranked, Rank};
use crate::router::ShardRouter;

/// A search index spread over N independently owned shards.
///
/// Documents live on `shard_for(id)` and suggestions on
/// `shard_for(lowercase term)`. Reads fan out to every shard in parallel and
/// merge the per-shard answers; writes go only to the shards that own the
/// data. The struct holds nothing beyond the shard list and the router.
pub struct DistributedIndex {
	name: String,
	metadata: Metadata,
	router: ShardRouter,
	shards: Vec<Box<dyn SearchIndex>>,
}

impl DistributedIndex {
	/// All shards must share one schema.
	pub fn new(name: impl Into<String>, shards: Vec<Box<dyn SearchIndex>>) -> Result<Self> {
		let name = name.into();
		let router = ShardRouter::new(shards.len())?;
		let metadata = shards[0].metadata().clone();
		if let Some(odd) = shards.iter().find(|s| s.metadata() != &metadata) {
			return Err(Error::InvalidConfig(format!("shard {} of {} has a different schema", odd.name(), name)));
		}
		Ok(Self { name, metadata, router, shards })
	}

	/// Boxes concrete shard handles.
	pub fn from_shards<S: SearchIndex + 'static>(name: impl Into<String>, shards: Vec<S>) -> Result<Self> {
		Self::new(name, shards.into_iter().map(|s| Box::new(s) as Box<dyn SearchIndex>).collect())
	}

	pub fn router(&self) -> &ShardRouter { &self.router }

	pub fn shard_count(&self) -> usize { self.shards.len() }

	pub fn shard(&self, i: usize) -> Option<&dyn SearchIndex> { self.shards.get(i).map(AsRef::as_ref) }

	/// Runs `op` on every shard concurrently; results come back in shard order.
	fn fan_out<T, F>(&self, op: F) -> Vec<Result<T>>
	where
		T: Send,
		F: Fn(usize, &dyn SearchIndex) -> Result<T> + Sync,
	{
		self.shards.par_iter().enumerate().map(|(i, shard)| op(i, shard.as_ref())).collect()
	}

	/// All shard values, or every failure folded into `Error::Shards`.
	fn gather<T>(&self, results: Vec<Result<T>>) -> Result<Vec<T>> {
		let total = results.len();
		let mut values = Vec::with_capacity(total);
		let mut failed = Vec::new();
		for (shard, r) in results.into_iter().enumerate() {
			match r {
				Ok(v) => values.push(v),
				Err(e) => {
					warn!(index = %self.name, shard, error = %e, "shard operation failed");
					failed.push(ShardError { shard, error: Box::new(e) });
				}
			}
		}
		if failed.is_empty() { Ok(values) } else { Err(Error::Shards { failed, total, committed: Vec::new() }) }
	}
}

impl SearchIndex for DistributedIndex {
	fn name(&self) -> &str { &self.name }

	fn metadata(&self) -> &Metadata { &self.metadata }

	/// No rollback: shards created before a failure stay created.
	fn create(&self) -> Result<()> {
		self.fan_out(|_, shard| shard.create()).into_iter().collect::<Result<Vec<()>>>()?;
		info!(index = %self.name, shards = self.shards.len(), "distributed index created");
		Ok(())
	}

	/// Every shard is attempted even after one fails.
	fn drop_index(&self) -> Result<()> {
		let results = self.fan_out(|_, shard| shard.drop_index());
		let first = results.into_iter().enumerate().find_map(|(i, r)| r.err().map(|e| (i, e)));
		match first {
			Some((shard, e)) => {
				warn!(index = %self.name, shard, error = %e, "drop failed");
				Err(e)
			}
			None => {
				info!(index = %self.name, "distributed index dropped");
				Ok(())
			}
		}
	}

	fn index(&self, docs: &[Document], opts: &IndexOptions) -> Result<()> {
		let parts = self.router.partition(docs, |d| d.id.clone());
		let results = self.fan_out(|i, shard| {
			if parts[i].is_empty() { return Ok(()); }
			shard.index(&parts[i], opts)
		});
		if let Err(Error::Shards { failed, total, .. }) = self.gather(results) {
			let committed = parts
				.iter()
				.enumerate()
				.filter(|(i, _)| !failed.iter().any(|f| f.shard == *i))
				.flat_map(|(_, part)| part.iter().map(|d| d.id.clone()))
				.collect();
			return Err(Error::Shards { failed, total, committed });
		}
		debug!(index = %self.name, docs = docs.len(), "batch distributed");
		Ok(())
	}

	fn search(&self, query: &Query) -> Result<SearchResults> {
		if query.index != self.name { return Err(Error::UnknownIndex(query.index.clone())); }
		let Paging { offset, num } = query.paging;
		let per_shard = offset.saturating_add(num);
		let results = self.fan_out(|_, shard| {
			let mut q = query.for_index(shard.name());
			q.paging = Paging { offset: 0, num: per_shard };
			shard.search(&q)
		});
		let answers = self.gather(results)?;
		let total = answers.iter().map(|r| r.total).sum();
		let lists = answers.into_iter().map(|r| r.docs).collect();
		let docs = merge_ranked(lists, per_shard, |d: &Document| Rank::score(f64::from(d.score)))
			.into_iter()
			.skip(offset)
			.collect();
		Ok(SearchResults { docs, total })
	}

	fn get(&self, id: &str) -> Result<Option<Document>> {
		self.shards[self.router.shard_for(id)].get(id)
	}

	fn count(&self) -> Result<u64> {
		let counts = self.gather(self.fan_out(|_, shard| shard.count()))?;
		Ok(counts.into_iter().sum())
	}
}

impl Autocompleter for DistributedIndex {
	fn add_terms(&self, suggestions: &[Suggestion]) -> Result<()> {
		let parts = self.router.partition(suggestions, |s| s.term.trim().to_lowercase());
		let results = self.fan_out(|i, shard| {
			if parts[i].is_empty() { return Ok(()); }
			shard.add_terms(&parts[i])
		});
		self.gather(results)?;
		Ok(())
	}

	fn suggest(&self, prefix: &str, max: usize, fuzzy: bool) -> Result<Vec<Suggestion>> {
		if max == 0 { return Ok(Vec::new()); }
		// shards rank against the normalized prefix, so the merge must too
		let prefix = prefix.trim().to_lowercase();
		let lists = self.gather(self.fan_out(|_, shard| shard.suggest(&prefix, max, fuzzy)))?;
		Ok(merge_ranked(lists, max, |s: &Suggestion| Rank { tier: u8::from(s.matches_prefix(&prefix)), score: s.score }))
	}
}

impl std::fmt::Debug for DistributedIndex {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let names: Vec<&str> = self.shards.iter().map(|s| s.name()).collect();
		f.debug_struct("DistributedIndex").field("name", &self.name).field("shards", &names).finish()
	}
}
