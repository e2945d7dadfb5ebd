//! [`ConcurrencyController`]: version-checked updates with an explicit
//! conflict strategy.
//!
//! No lock is held across the read-modify-write window. The store's
//! conditional update is the only arbiter; a lost race is either retried
//! against the newer version or reported as [`Error::Conflict`].

use std::{sync::Arc, time::Duration};

use rolo_core::{
  Entity, EntityType,
  patch::EntityPatch,
  store::{EntityStore, Precondition, UpdateOutcome},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{CacheManager, Error, PerformanceMonitor, Result};

// ─── Strategy ────────────────────────────────────────────────────────────────

/// Delay before the n-th retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
  None,
  Fixed { delay_ms: u64 },
  /// `base_ms * 2^(attempt-1)`, capped at `max_ms`.
  Exponential { base_ms: u64, max_ms: u64 },
}

impl Backoff {
  /// `attempt` counts from 1.
  pub fn delay(&self, attempt: u32) -> Duration {
    match *self {
      Self::None => Duration::ZERO,
      Self::Fixed { delay_ms } => Duration::from_millis(delay_ms),
      Self::Exponential { base_ms, max_ms } => {
        let factor = 1_u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
  pub max_retries: u32,
  pub backoff:     Backoff,
}

/// What to do when the stored version is not the one the caller read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ConflictStrategy {
  /// Report the conflict immediately.
  FailFast,
  /// Apply the patch whatever the stored version.
  LastWriterWins,
  /// Re-read the latest version and re-apply the patch's fields to it, up to
  /// `max_retries` times.
  Retry(RetryPolicy),
}

// ─── Controller ──────────────────────────────────────────────────────────────

/// Version-checked updates under a [`ConflictStrategy`].
pub struct ConcurrencyController<S> {
  store:   Arc<S>,
  cache:   Arc<CacheManager>,
  monitor: Arc<PerformanceMonitor>,
}

impl<S: EntityStore> ConcurrencyController<S> {
  pub fn new(store: Arc<S>, cache: Arc<CacheManager>, monitor: Arc<PerformanceMonitor>) -> Self {
    Self { store, cache, monitor }
  }

  /// Apply `patch` to the entity if it is still at `expected_version`,
  /// resolving a mismatch according to `strategy`. On success the entity's
  /// cache entries are invalidated and the stored entity is returned.
  ///
  /// The patch is validated before anything is written.
  pub async fn safe_update(
    &self,
    entity_type: EntityType,
    id: Uuid,
    expected_version: u64,
    patch: &EntityPatch,
    strategy: &ConflictStrategy,
  ) -> Result<Entity> {
    self
      .monitor
      .measure(
        "concurrency.safe_update",
        self.update_loop(entity_type, id, expected_version, patch, strategy),
      )
      .await
  }

  async fn update_loop(
    &self,
    entity_type: EntityType,
    id: Uuid,
    expected_version: u64,
    patch: &EntityPatch,
    strategy: &ConflictStrategy,
  ) -> Result<Entity> {
    if patch.entity_type() != entity_type {
      return Err(Error::ValidationFailed(format!(
        "a {} patch cannot be applied to a {entity_type}",
        patch.entity_type()
      )));
    }
    patch
      .validate()
      .map_err(|e| Error::ValidationFailed(e.to_string()))?;

    let mut expected = expected_version;
    let mut retries = 0_u32;
    loop {
      let precondition = match strategy {
        ConflictStrategy::LastWriterWins => Precondition::Any,
        _ => Precondition::Version(expected),
      };

      let outcome = self
        .store
        .update(entity_type, id, patch, precondition)
        .await
        .map_err(Error::database)?;

      let current = match outcome {
        UpdateOutcome::Updated(entity) => {
          if retries > 0 {
            warn!(%entity_type, %id, retries, "conflict resolved by retry");
          }
          self.cache.invalidate_entity_cache(entity_type, id);
          return Ok(entity);
        }
        UpdateOutcome::NotFound => return Err(Error::NotFound { entity_type, id }),
        UpdateOutcome::VersionMismatch { current } => current,
      };

      let policy = match strategy {
        ConflictStrategy::Retry(policy) if retries < policy.max_retries => policy,
        _ => {
          return Err(Error::Conflict {
            entity_type,
            id,
            expected,
            current,
            attempts: retries + 1,
          });
        }
      };

      retries += 1;
      tokio::time::sleep(policy.backoff.delay(retries)).await;

      let Some(latest) = self
        .store
        .find_by_id(entity_type, id)
        .await
        .map_err(Error::database)?
      else {
        return Err(Error::NotFound { entity_type, id });
      };
      debug!(
        %entity_type, %id,
        stale = expected,
        latest = latest.version(),
        retries,
        "version mismatch; re-applying patch to latest version"
      );
      expected = latest.version();
    }
  }
}

#[cfg(test)]
mod tests {
  use rolo_core::{
    entity::DealStage,
    patch::{ContactPatch, DealPatch},
  };
  use rolo_store_sqlite::SqliteStore;

  use super::*;
  use crate::{CacheKey, CacheStore, fixtures};

  struct Harness {
    store:      Arc<SqliteStore>,
    cache:      Arc<CacheManager>,
    controller: ConcurrencyController<SqliteStore>,
  }

  async fn harness() -> Harness {
    let store = Arc::new(fixtures::store().await);
    let monitor = Arc::new(PerformanceMonitor::default());
    let cache = Arc::new(CacheManager::new(
      Arc::new(CacheStore::new(Duration::from_secs(300))),
      monitor.clone(),
    ));
    let controller = ConcurrencyController::new(store.clone(), cache.clone(), monitor);
    Harness {
      store,
      cache,
      controller,
    }
  }

  async fn seeded_deal(h: &Harness) -> Entity {
    let org = Uuid::new_v4();
    h.store.insert(fixtures::deal(org, None).into()).await.unwrap()
  }

  fn stage(stage: DealStage) -> EntityPatch {
    EntityPatch::Deal(DealPatch {
      stage: Some(stage),
      ..Default::default()
    })
  }

  fn retry(max_retries: u32) -> ConflictStrategy {
    ConflictStrategy::Retry(RetryPolicy {
      max_retries,
      backoff: Backoff::None,
    })
  }

  #[test]
  fn exponential_backoff_is_capped() {
    let b = Backoff::Exponential { base_ms: 10, max_ms: 50 };
    assert_eq!(b.delay(1), Duration::from_millis(10));
    assert_eq!(b.delay(2), Duration::from_millis(20));
    assert_eq!(b.delay(3), Duration::from_millis(40));
    assert_eq!(b.delay(4), Duration::from_millis(50));
    assert_eq!(b.delay(80), Duration::from_millis(50));
  }

  #[test]
  fn strategy_json_shape() {
    let parsed: ConflictStrategy = serde_json::from_str(
      r#"{ "strategy": "retry", "max_retries": 2, "backoff": { "kind": "fixed", "delay_ms": 5 } }"#,
    )
    .unwrap();
    assert_eq!(
      parsed,
      ConflictStrategy::Retry(RetryPolicy {
        max_retries: 2,
        backoff:     Backoff::Fixed { delay_ms: 5 },
      })
    );
    let parsed: ConflictStrategy = serde_json::from_str(r#"{ "strategy": "fail_fast" }"#).unwrap();
    assert_eq!(parsed, ConflictStrategy::FailFast);
  }

  #[tokio::test]
  async fn matching_version_updates_and_invalidates() {
    let h = harness().await;
    let deal = seeded_deal(&h).await;
    let key = CacheKey::entity(EntityType::Deal, deal.id());
    h.cache.store().set(key.clone(), deal.clone(), None, vec![]);

    let updated = h
      .controller
      .safe_update(EntityType::Deal, deal.id(), 1, &stage(DealStage::Proposal), &ConflictStrategy::FailFast)
      .await
      .unwrap();
    assert_eq!(updated.version(), 2);
    assert!(h.cache.store().get::<Entity>(&key).is_none());
  }

  #[tokio::test]
  async fn invalid_patch_is_rejected_before_writing() {
    let h = harness().await;
    let deal = seeded_deal(&h).await;
    let bad = EntityPatch::Deal(DealPatch {
      probability: Some(150),
      ..Default::default()
    });

    let err = h
      .controller
      .safe_update(EntityType::Deal, deal.id(), 1, &bad, &retry(3))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::ValidationFailed(_)));

    let wrong_type = EntityPatch::Contact(ContactPatch {
      first_name: Some("Ada".into()),
      ..Default::default()
    });
    let err = h
      .controller
      .safe_update(EntityType::Deal, deal.id(), 1, &wrong_type, &retry(3))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::ValidationFailed(_)));

    let stored = h.store.find_by_id(EntityType::Deal, deal.id()).await.unwrap().unwrap();
    assert_eq!(stored.version(), 1);
  }

  #[tokio::test]
  async fn missing_entity_is_not_found() {
    let h = harness().await;
    let err = h
      .controller
      .safe_update(EntityType::Deal, Uuid::new_v4(), 1, &stage(DealStage::Won), &retry(3))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
  }

  #[tokio::test]
  async fn stale_version_fails_fast() {
    let h = harness().await;
    let deal = seeded_deal(&h).await;
    h.controller
      .safe_update(EntityType::Deal, deal.id(), 1, &stage(DealStage::Qualified), &retry(0))
      .await
      .unwrap();

    let err = h
      .controller
      .safe_update(EntityType::Deal, deal.id(), 1, &stage(DealStage::Lost), &ConflictStrategy::FailFast)
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      Error::Conflict { expected: 1, current: 2, attempts: 1, .. }
    ));
  }

  #[tokio::test]
  async fn retry_reapplies_patch_to_latest_version() {
    let h = harness().await;
    let deal = seeded_deal(&h).await;
    let title = EntityPatch::Deal(DealPatch {
      title: Some("Renewal".into()),
      ..Default::default()
    });
    h.controller
      .safe_update(EntityType::Deal, deal.id(), 1, &title, &ConflictStrategy::FailFast)
      .await
      .unwrap();

    let updated = h
      .controller
      .safe_update(EntityType::Deal, deal.id(), 1, &stage(DealStage::Won), &retry(2))
      .await
      .unwrap();
    let Entity::Deal(d) = updated else { panic!("expected deal") };
    assert_eq!(d.version, 3);
    assert_eq!(d.stage, "won");
    // The concurrent writer's field survives the merge.
    assert_eq!(d.title, "Renewal");
  }

  #[tokio::test]
  async fn last_writer_wins_ignores_version() {
    let h = harness().await;
    let deal = seeded_deal(&h).await;
    let updated = h
      .controller
      .safe_update(EntityType::Deal, deal.id(), 99, &stage(DealStage::Lost), &ConflictStrategy::LastWriterWins)
      .await
      .unwrap();
    assert_eq!(updated.version(), 2);
  }

  #[tokio::test]
  async fn concurrent_stale_updates_never_both_win_blindly() {
    let h = harness().await;
    let deal = seeded_deal(&h).await;
    let id = deal.id();

    let (won, lost) = (stage(DealStage::Won), stage(DealStage::Lost));
    let fail_fast = ConflictStrategy::FailFast;
    let (a, b) = tokio::join!(
      h.controller.safe_update(EntityType::Deal, id, 1, &won, &fail_fast),
      h.controller.safe_update(EntityType::Deal, id, 1, &lost, &fail_fast),
    );
    let (winner, loser) = match (a, b) {
      (Ok(w), Err(l)) | (Err(l), Ok(w)) => (w, l),
      other => panic!("exactly one update should win: {other:?}"),
    };
    assert_eq!(winner.version(), 2);
    assert!(matches!(loser, Error::Conflict { current: 2, .. }));

    // With retries both land, one after the other.
    let (negotiation, proposal) = (stage(DealStage::Negotiation), stage(DealStage::Proposal));
    let retrying = retry(3);
    let (a, b) = tokio::join!(
      h.controller.safe_update(EntityType::Deal, id, 2, &negotiation, &retrying),
      h.controller.safe_update(EntityType::Deal, id, 2, &proposal, &retrying),
    );
    let mut versions = [a.unwrap().version(), b.unwrap().version()];
    versions.sort_unstable();
    assert_eq!(versions, [3, 4]);
  }

  #[tokio::test(start_paused = true)]
  async fn exhausted_retries_surface_conflict_after_backoff() {
    let store = Arc::new(fixtures::ContendedStore::new(fixtures::store().await));
    let monitor = Arc::new(PerformanceMonitor::default());
    let cache = Arc::new(CacheManager::new(
      Arc::new(CacheStore::new(Duration::from_secs(300))),
      monitor.clone(),
    ));
    let controller = ConcurrencyController::new(store.clone(), cache, monitor);
    let deal = store
      .insert(fixtures::deal(Uuid::new_v4(), None).into())
      .await
      .unwrap();

    let strategy = ConflictStrategy::Retry(RetryPolicy {
      max_retries: 2,
      backoff:     Backoff::Fixed { delay_ms: 50 },
    });
    let started = tokio::time::Instant::now();
    let err = controller
      .safe_update(EntityType::Deal, deal.id(), 1, &stage(DealStage::Won), &strategy)
      .await
      .unwrap_err();

    assert!(matches!(err, Error::Conflict { attempts: 3, .. }), "{err:?}");
    assert!(started.elapsed() >= Duration::from_millis(100));
  }
}
