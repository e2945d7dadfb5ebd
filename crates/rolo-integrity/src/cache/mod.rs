//! In-process caching: the raw [`CacheStore`] and the entity-aware
//! [`CacheManager`] built on it.

mod key;
mod manager;
mod store;

use serde::Serialize;

pub use key::{CacheKey, Cacheable, DependencyTag, KeyPattern};
pub use manager::{CacheManager, Validator};
pub use store::CacheStore;

/// Snapshot of cache occupancy and lookup counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
  pub size:      usize,
  pub hits:      u64,
  pub misses:    u64,
  /// `None` until the first lookup.
  pub hit_rate:  Option<f64>,
  pub miss_rate: Option<f64>,
}

impl CacheStats {
  pub fn new(size: usize, hits: u64, misses: u64) -> Self {
    let lookups = hits + misses;
    let rate = |n: u64| (lookups > 0).then(|| n as f64 / lookups as f64);
    Self {
      size,
      hits,
      misses,
      hit_rate: rate(hits),
      miss_rate: rate(misses),
    }
  }
}
