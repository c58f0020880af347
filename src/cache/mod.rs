//! Short-lived in-memory caching of program responses.

pub mod response_cache;

pub use response_cache::{CacheKey, CacheStats, ResponseCache, DEFAULT_CACHE_TTL};
