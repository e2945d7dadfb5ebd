//! [`CacheStore`]: the in-process key/value map behind the cache manager.
//!
//! Entries expire lazily on lookup. [`CacheStore::purge_expired`] and
//! [`CacheStore::spawn_sweeper`] exist only to bound memory held by keys
//! nobody reads again.

use std::{
  any::Any,
  collections::{HashMap, HashSet},
  sync::{
    Arc, PoisonError, RwLock,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

use tokio::{task::JoinHandle, time::Instant};
use tracing::debug;

use super::{
  CacheStats,
  key::{CacheKey, DependencyTag, KeyPattern},
};

struct CacheEntry {
  data:       Arc<dyn Any + Send + Sync>,
  written_at: Instant,
  ttl:        Duration,
  tags:       HashSet<DependencyTag>,
}

impl CacheEntry {
  fn is_expired(&self, now: Instant) -> bool { now.duration_since(self.written_at) >= self.ttl }
}

/// Entries plus the reverse index from tag to keys. Both live under one lock
/// so the index never names a key that is absent from `entries`.
#[derive(Default)]
struct Inner {
  entries: HashMap<CacheKey, CacheEntry>,
  by_tag:  HashMap<DependencyTag, HashSet<CacheKey>>,
}

impl Inner {
  fn insert(&mut self, key: CacheKey, entry: CacheEntry) {
    self.remove(&key);
    for tag in &entry.tags {
      self.by_tag.entry(*tag).or_default().insert(key.clone());
    }
    self.entries.insert(key, entry);
  }

  fn remove(&mut self, key: &CacheKey) -> bool {
    let Some(entry) = self.entries.remove(key) else {
      return false;
    };
    for tag in &entry.tags {
      if let Some(keys) = self.by_tag.get_mut(tag) {
        keys.remove(key);
        if keys.is_empty() {
          self.by_tag.remove(tag);
        }
      }
    }
    true
  }

  fn remove_where(&mut self, mut predicate: impl FnMut(&CacheKey, &CacheEntry) -> bool) -> usize {
    let doomed: Vec<CacheKey> = self
      .entries
      .iter()
      .filter(|(key, entry)| predicate(key, entry))
      .map(|(key, _)| key.clone())
      .collect();
    doomed.iter().filter(|key| self.remove(key)).count()
  }
}

/// A shared, process-wide cache. Construct one per process and hand out
/// `Arc<CacheStore>`; every method takes `&self`.
pub struct CacheStore {
  inner:       RwLock<Inner>,
  default_ttl: Duration,
  hits:        AtomicU64,
  misses:      AtomicU64,
}

impl CacheStore {
  pub fn new(default_ttl: Duration) -> Self {
    Self {
      inner: RwLock::new(Inner::default()),
      default_ttl,
      hits: AtomicU64::new(0),
      misses: AtomicU64::new(0),
    }
  }

  pub fn default_ttl(&self) -> Duration { self.default_ttl }

  // Poisoned locks are recovered; entries are disposable.
  fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
    self.inner.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
    self.inner.write().unwrap_or_else(PoisonError::into_inner)
  }

  /// Insert or overwrite `key`. `ttl: None` uses the store default.
  pub fn set<T>(&self, key: CacheKey, data: T, ttl: Option<Duration>, tags: Vec<DependencyTag>)
  where
    T: Send + Sync + 'static,
  {
    let entry = CacheEntry {
      data:       Arc::new(data),
      written_at: Instant::now(),
      ttl:        ttl.unwrap_or(self.default_ttl),
      tags:       tags.into_iter().collect(),
    };
    debug!(%key, ttl_ms = entry.ttl.as_millis() as u64, "cache set");
    self.write().insert(key, entry);
  }

  /// The live value under `key`, if it holds a `T`. An expired entry is
  /// removed and reported absent; a value of another type is a miss.
  pub fn get<T>(&self, key: &CacheKey) -> Option<T>
  where
    T: Clone + 'static,
  {
    let now = Instant::now();
    let (found, expired) = {
      let inner = self.read();
      match inner.entries.get(key) {
        Some(entry) if entry.is_expired(now) => (None, true),
        Some(entry) => (entry.data.downcast_ref::<T>().cloned(), false),
        None => (None, false),
      }
    };

    if expired {
      let mut inner = self.write();
      // Re-check: a writer may have refreshed the entry in between.
      if inner.entries.get(key).is_some_and(|e| e.is_expired(now)) {
        inner.remove(key);
        debug!(%key, "cache entry expired");
      }
    }

    match found {
      Some(value) => {
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(value)
      }
      None => {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
      }
    }
  }

  /// Remove `key`. Returns whether anything was removed.
  pub fn invalidate(&self, key: &CacheKey) -> bool { self.write().remove(key) }

  /// Remove every key matching `pattern`. Returns the number removed.
  pub fn invalidate_by_pattern(&self, pattern: &KeyPattern) -> usize {
    let removed = self.write().remove_where(|key, _| pattern.matches(key));
    if removed > 0 {
      debug!(?pattern, removed, "cache invalidated by pattern");
    }
    removed
  }

  /// Remove every entry carrying `tag`. Returns the number removed.
  pub fn invalidate_by_tag(&self, tag: &DependencyTag) -> usize {
    let mut inner = self.write();
    let keys = inner.by_tag.remove(tag).unwrap_or_default();
    let removed = keys.iter().filter(|key| inner.remove(key)).count();
    if removed > 0 {
      debug!(%tag, removed, "cache invalidated by dependency tag");
    }
    removed
  }

  pub fn clear(&self) {
    let mut inner = self.write();
    inner.entries.clear();
    inner.by_tag.clear();
  }

  /// Number of stored entries, expired ones included until they are purged.
  pub fn len(&self) -> usize { self.read().entries.len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// Drop every expired entry. Returns the number removed.
  pub fn purge_expired(&self) -> usize {
    let now = Instant::now();
    self.write().remove_where(|_, entry| entry.is_expired(now))
  }

  /// Counters plus the number of entries still live. Expired entries that
  /// have not been purged are excluded, unlike [`CacheStore::len`].
  pub fn stats(&self) -> CacheStats {
    let now = Instant::now();
    let live = self
      .read()
      .entries
      .values()
      .filter(|entry| !entry.is_expired(now))
      .count();
    CacheStats::new(
      live,
      self.hits.load(Ordering::Relaxed),
      self.misses.load(Ordering::Relaxed),
    )
  }

  /// Purge expired entries every `interval` until the store is dropped.
  pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
    let store = Arc::downgrade(self);
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      ticker.tick().await;
      loop {
        ticker.tick().await;
        let Some(store) = store.upgrade() else { break };
        let purged = store.purge_expired();
        if purged > 0 {
          debug!(purged, "cache sweep");
        }
      }
    })
  }
}
