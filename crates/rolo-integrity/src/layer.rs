//! [`DataLayer`]: the assembled subsystem, constructed once at startup and
//! shared behind an `Arc`.

use std::{sync::Arc, time::Duration};

use rolo_core::{
  Entity, EntityType,
  filter::EntityFilter,
  rules,
  store::{EntityStore, WriteOp},
};
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::{
  CacheKey, CacheManager, CacheStore, ConcurrencyController, ConflictStrategy, Error,
  IntegrityConfig, IntegrityValidator, PerformanceMonitor, Reports, Result,
};

/// The store with its cache, validator, controller and reports wired together.
pub struct DataLayer<S> {
  store:            Arc<S>,
  cache:            Arc<CacheManager>,
  monitor:          Arc<PerformanceMonitor>,
  validator:        IntegrityValidator<S>,
  concurrency:      ConcurrencyController<S>,
  reports:          Reports<S>,
  default_strategy: ConflictStrategy,
  sweep_interval:   Option<Duration>,
}

impl<S: EntityStore> DataLayer<S> {
  pub fn new(store: S, config: &IntegrityConfig) -> Self {
    let store = Arc::new(store);
    let monitor = Arc::new(PerformanceMonitor::new(config.monitor.slow_threshold()));
    let cache = Arc::new(CacheManager::new(
      Arc::new(CacheStore::new(config.cache.default_ttl())),
      monitor.clone(),
    ));
    Self {
      validator: IntegrityValidator::new(
        store.clone(),
        monitor.clone(),
        config.validation_concurrency,
      ),
      concurrency: ConcurrencyController::new(store.clone(), cache.clone(), monitor.clone()),
      reports: Reports::new(store.clone(), cache.clone()),
      default_strategy: config.concurrency.default_strategy(),
      sweep_interval: config.cache.sweep_interval(),
      store,
      cache,
      monitor,
    }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn cache(&self) -> &CacheManager { &self.cache }

  pub fn monitor(&self) -> &PerformanceMonitor { &self.monitor }

  pub fn validator(&self) -> &IntegrityValidator<S> { &self.validator }

  pub fn concurrency(&self) -> &ConcurrencyController<S> { &self.concurrency }

  pub fn reports(&self) -> &Reports<S> { &self.reports }

  /// The strategy used when a caller does not name one.
  pub fn default_strategy(&self) -> &ConflictStrategy { &self.default_strategy }

  /// Start the background expiry sweep, unless it is disabled.
  pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
    self
      .sweep_interval
      .map(|interval| self.cache.store().spawn_sweeper(interval))
  }

  /// Read one entity through the cache, checked against the requested id.
  pub async fn get_entity(&self, entity_type: EntityType, id: Uuid) -> Result<Entity> {
    self
      .cache
      .get_with_accuracy_check(
        entity_type,
        id,
        || async move {
          self
            .store
            .find_by_id(entity_type, id)
            .await
            .map_err(Error::database)
        },
        None,
      )
      .await
  }

  /// Read several entities through the cache. Fails unless every requested
  /// id resolves; duplicates in `ids` are ignored.
  pub async fn get_entities(&self, entity_type: EntityType, ids: &[Uuid]) -> Result<Vec<Entity>> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
      if !unique.contains(id) {
        unique.push(*id);
      }
    }
    let requested = unique.as_slice();

    self
      .cache
      .get_batch_with_accuracy_check(
        entity_type,
        requested,
        || async move {
          let mut found = Vec::with_capacity(requested.len());
          for id in requested {
            if let Some(entity) = self
              .store
              .find_by_id(entity_type, *id)
              .await
              .map_err(Error::database)?
            {
              found.push(entity);
            }
          }
          Ok(found)
        },
        None,
      )
      .await
  }

  /// Run `filter` through the cache. Entries are dropped when an entity of
  /// the listed type, or of a related type, is invalidated.
  pub async fn list_entities(&self, filter: &EntityFilter) -> Result<Vec<Entity>> {
    let key = CacheKey::list(filter)
      .map_err(|e| Error::ValidationFailed(format!("unusable filter: {e}")))?;
    self
      .cache
      .get_cached_data(
        key,
        || async { self.store.find_many(filter).await.map_err(Error::database) },
        None,
        None,
      )
      .await
  }

  /// Insert `entities` into one organization, all or nothing, then drop
  /// that organization's cache.
  pub async fn bulk_import(&self, organization_id: Uuid, entities: Vec<Entity>) -> Result<Vec<Entity>> {
    let mut problems = Vec::new();
    for entity in &entities {
      let (ty, id) = (entity.entity_type(), entity.id());
      if entity.organization_id() != organization_id {
        problems.push(format!(
          "{ty} {id} belongs to organization {}, not {organization_id}",
          entity.organization_id()
        ));
      }
      problems.extend(field_problems(entity).into_iter().map(|p| format!("{ty} {id}: {p}")));
    }
    if !problems.is_empty() {
      return Err(Error::ValidationFailed(problems.join("; ")));
    }
    if entities.is_empty() {
      return Ok(Vec::new());
    }

    let ops = entities.into_iter().map(WriteOp::Insert).collect();
    let written = self.store.transaction(ops).await.map_err(Error::database)?;
    let evicted = self.cache.invalidate_organization_cache(organization_id);
    info!(%organization_id, imported = written.len(), evicted, "bulk import committed");
    Ok(written)
  }
}

/// Field-level problems that would make a new row untrustworthy.
fn field_problems(entity: &Entity) -> Vec<String> {
  let mut problems = Vec::new();
  match entity {
    Entity::Contact(c) => {
      if !rules::is_valid_email(&c.email) {
        problems.push(format!("email {:?} is not a valid address", c.email));
      }
    }
    Entity::Company(c) => {
      if c.name.trim().is_empty() {
        problems.push("name must not be blank".to_owned());
      }
    }
    Entity::Deal(d) => {
      if d.stage().is_none() {
        problems.push(format!("unknown stage {:?}", d.stage));
      }
      if !rules::is_valid_probability(d.probability) {
        problems.push(format!("probability {} is out of range", d.probability));
      }
      if !rules::is_valid_amount(d.amount) {
        problems.push("amount must not be negative".to_owned());
      }
    }
    Entity::Activity(_) | Entity::User(_) => {}
  }
  problems
}
