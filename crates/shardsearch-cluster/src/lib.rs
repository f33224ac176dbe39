//! shardsearch-cluster
//!
//! Client-side sharding over any `SearchIndex`: deterministic routing, fan-out
//! writes and fan-out-with-merge reads.

pub mod distributed;
pub mod merge;
pub mod router;

pub use distributed::DistributedIndex;
pub use router::ShardRouter;
