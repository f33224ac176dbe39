//! K-way merge of per-shard result lists.
//!
//! Every shard returns its hits best-first. The merge repeatedly takes the
//! best head among all shards, so the combined list is ordered by rank with
//! ties going to the lower shard index and then to the earlier position
//! inside that shard.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Sort key of a merged item; larger ranks come first.
#[derive(Debug, Clone, Copy)]
pub struct Rank {
	pub tier: u8,
	pub score: f64,
}

impl Rank {
	pub fn score(score: f64) -> Self { Self { tier: 0, score } }
}

impl PartialEq for Rank {
	fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Rank {}

impl PartialOrd for Rank {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Rank {
	fn cmp(&self, other: &Self) -> Ordering {
		self.tier.cmp(&other.tier).then_with(|| self.score.total_cmp(&other.score))
	}
}

#[derive(Debug, PartialEq, Eq)]
struct Head {
	rank: Rank,
	shard: usize,
	pos: usize,
}

impl PartialOrd for Head {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Head {
	// max-heap: best rank, then lowest shard, then lowest position
	fn cmp(&self, other: &Self) -> Ordering {
		self.rank
			.cmp(&other.rank)
			.then_with(|| other.shard.cmp(&self.shard))
			.then_with(|| other.pos.cmp(&self.pos))
	}
}

/// Merges best-first `lists` into one best-first list of at most `limit`
/// items.
pub fn merge_ranked<T>(lists: Vec<Vec<T>>, limit: usize, rank: impl Fn(&T) -> Rank) -> Vec<T> {
	let mut iters: Vec<_> = lists.into_iter().map(|l| l.into_iter().peekable()).collect();
	let mut heap = BinaryHeap::with_capacity(iters.len());
	for (shard, it) in iters.iter_mut().enumerate() {
		if let Some(item) = it.peek() {
			heap.push(Head { rank: rank(item), shard, pos: 0 });
		}
	}
	let mut out = Vec::with_capacity(limit.min(64));
	while out.len() < limit {
		let Some(Head { shard, pos, .. }) = heap.pop() else { break };
		let Some(item) = iters[shard].next() else { continue };
		out.push(item);
		if let Some(next) = iters[shard].peek() {
			heap.push(Head { rank: rank(next), shard, pos: pos + 1 });
		}
	}
	out
}
