//! [`CacheManager`]: read-through caching with validation, and invalidation
//! rules that follow the CRM entity graph.

use std::{collections::BTreeSet, future::Future, sync::Arc, time::Duration};

use rolo_core::{Entity, EntityType};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
  CacheStats, CacheStore,
  key::{CacheKey, Cacheable, DependencyTag, KeyPattern},
};
use crate::{Error, PerformanceMonitor, Result};

/// A caller-supplied accuracy predicate. `false` means "do not trust this".
pub type Validator<'a, T> = &'a (dyn Fn(&T) -> bool + Send + Sync);

/// Entity types whose list queries may filter on, or embed, an entity of the
/// given type.
fn related_types(entity_type: EntityType) -> &'static [EntityType] {
  use EntityType::*;
  match entity_type {
    Contact => &[Company, Deal, Activity],
    Company => &[Contact, Deal],
    Deal => &[Contact, Company, Activity],
    Activity => &[Contact, Deal],
    User => &[Deal, Activity],
  }
}

/// Read-through cache front that records timings and applies invalidation cascades.
pub struct CacheManager {
  cache:   Arc<CacheStore>,
  monitor: Arc<PerformanceMonitor>,
}

impl CacheManager {
  pub fn new(cache: Arc<CacheStore>, monitor: Arc<PerformanceMonitor>) -> Self {
    Self { cache, monitor }
  }

  pub fn store(&self) -> &Arc<CacheStore> { &self.cache }

  // ─── Reads ─────────────────────────────────────────────────────────────────

  /// Return the cached value under `key`, or fetch, validate and cache it.
  ///
  /// A cached value that fails `validate` is discarded and refetched. A
  /// fetched value that fails `validate` is an error and is never cached.
  pub async fn get_cached_data<T, F, Fut>(
    &self,
    key: CacheKey,
    fetch: F,
    ttl: Option<Duration>,
    validate: Option<Validator<'_, T>>,
  ) -> Result<T>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    self
      .monitor
      .measure(
        "cache.get_cached_data",
        self.read_through(key, fetch, ttl, validate, Vec::new()),
      )
      .await
  }

  /// Read one entity through the cache. The result always has the requested
  /// type and id; `validate`, if given, must also accept it.
  pub async fn get_with_accuracy_check<F, Fut>(
    &self,
    entity_type: EntityType,
    id: Uuid,
    fetch: F,
    validate: Option<Validator<'_, Entity>>,
  ) -> Result<Entity>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<Entity>>>,
  {
    let check: Validator<'_, Entity> = &|entity: &Entity| {
      entity.entity_type() == entity_type
        && entity.id() == id
        && validate.is_none_or(|v| v(entity))
    };
    let fetch = move || async move { fetch().await?.ok_or(Error::NotFound { entity_type, id }) };

    self
      .monitor
      .measure(
        "cache.get_with_accuracy_check",
        self.read_through(CacheKey::entity(entity_type, id), fetch, None, Some(check), Vec::new()),
      )
      .await
  }

  /// Read a set of entities through the cache. The result contains exactly
  /// the requested ids, each of the requested type; a partial batch fails.
  pub async fn get_batch_with_accuracy_check<F, Fut>(
    &self,
    entity_type: EntityType,
    ids: &[Uuid],
    fetch: F,
    validate: Option<Validator<'_, Vec<Entity>>>,
  ) -> Result<Vec<Entity>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<Entity>>>,
  {
    let requested: BTreeSet<Uuid> = ids.iter().copied().collect();
    let check: Validator<'_, Vec<Entity>> = &|batch: &Vec<Entity>| {
      let returned: BTreeSet<Uuid> = batch.iter().map(Entity::id).collect();
      batch.len() == requested.len()
        && returned == requested
        && batch.iter().all(|e| e.entity_type() == entity_type)
        && validate.is_none_or(|v| v(batch))
    };
    // Tag every requested id, so the entry dies with any of them even if the
    // fetch came back short.
    let tags = requested
      .iter()
      .map(|id| DependencyTag::Entity(entity_type, *id))
      .collect();

    self
      .monitor
      .measure(
        "cache.get_batch_with_accuracy_check",
        self.read_through(CacheKey::batch(entity_type, ids), fetch, None, Some(check), tags),
      )
      .await
  }

  async fn read_through<T, F, Fut>(
    &self,
    key: CacheKey,
    fetch: F,
    ttl: Option<Duration>,
    validate: Option<Validator<'_, T>>,
    extra_tags: Vec<DependencyTag>,
  ) -> Result<T>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    if let Some(cached) = self.cache.get::<T>(&key) {
      if validate.is_none_or(|v| v(&cached)) {
        debug!(%key, "cache hit");
        return Ok(cached);
      }
      debug!(%key, "cached value failed validation; refetching");
      self.cache.invalidate(&key);
    } else {
      debug!(%key, "cache miss");
    }

    let fresh = fetch().await?;
    if let Some(v) = validate
      && !v(&fresh)
    {
      warn!(%key, "fetched data failed validation");
      return Err(Error::ValidationFailed(format!(
        "data fetched for {key} failed its accuracy check"
      )));
    }

    let mut tags = fresh.dependency_tags();
    tags.extend(extra_tags);
    self.cache.set(key, fresh.clone(), ttl, tags);
    Ok(fresh)
  }

  // ─── Invalidation ──────────────────────────────────────────────────────────

  /// Drop everything that could reflect the entity `(entity_type, id)`:
  /// its own key, every entry tagged with it, list queries over its type and
  /// over related types, and every dashboard and analytics view.
  ///
  /// Returns the number of entries removed.
  pub fn invalidate_entity_cache(&self, entity_type: EntityType, id: Uuid) -> usize {
    let mut removed = usize::from(self.cache.invalidate(&CacheKey::entity(entity_type, id)));
    removed += self.cache.invalidate_by_tag(&DependencyTag::Entity(entity_type, id));
    removed += self.cache.invalidate_by_pattern(&KeyPattern::Lists(entity_type));
    for related in related_types(entity_type) {
      removed += self.cache.invalidate_by_pattern(&KeyPattern::Lists(*related));
    }
    removed += self.cache.invalidate_by_pattern(&KeyPattern::Dashboards);
    removed += self.cache.invalidate_by_pattern(&KeyPattern::Analytics);

    debug!(%entity_type, %id, removed, "entity cache invalidated");
    removed
  }

  /// Drop every entry whose key embeds `organization_id` or whose content is
  /// tagged with it.
  pub fn invalidate_organization_cache(&self, organization_id: Uuid) -> usize {
    let removed = self
      .cache
      .invalidate_by_pattern(&KeyPattern::Organization(organization_id))
      + self
        .cache
        .invalidate_by_tag(&DependencyTag::Organization(organization_id));
    debug!(%organization_id, removed, "organization cache invalidated");
    removed
  }

  pub fn get_cache_stats(&self) -> CacheStats { self.cache.stats() }

  pub fn clear(&self) { self.cache.clear() }
}
