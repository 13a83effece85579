//! Cache Module
//!
//! Provides fixed-capacity in-memory caching with LRU eviction.

mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use lru::RecencyList;
pub use stats::CacheStats;
pub use store::EvictionCache;
