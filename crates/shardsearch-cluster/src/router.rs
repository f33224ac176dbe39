use std::hash::Hasher;

use twox_hash::XxHash64;

use shardsearch_core::{Error, Result};

/// Deterministic key-to-shard assignment.
///
/// A key's shard is `XxHash64(seed 0, key bytes) % n`. The hash is seeded
/// explicitly, so the assignment for a given `n` survives restarts and is the
/// same on every client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRouter {
	n: usize,
}

impl ShardRouter {
	pub fn new(n: usize) -> Result<Self> {
		if n == 0 {
			return Err(Error::InvalidConfig("shard count must be at least 1".into()));
		}
		Ok(Self { n })
	}

	pub fn shard_count(&self) -> usize { self.n }

	pub fn shard_for(&self, key: &str) -> usize {
		let mut hasher = XxHash64::with_seed(0);
		hasher.write(key.as_bytes());
		(hasher.finish() % self.n as u64) as usize
	}

	/// Groups items per shard; each group keeps the input order. The result
	/// always has `n` entries, some possibly empty.
	pub fn partition<T: Clone, K: AsRef<str>>(&self, items: &[T], key: impl Fn(&T) -> K) -> Vec<Vec<T>> {
		let mut parts = vec![Vec::new(); self.n];
		for item in items {
			parts[self.shard_for(key(item).as_ref())].push(item.clone());
		}
		parts
	}
}
