//! The `EntityStore` trait and supporting write types.
//!
//! The trait is implemented by storage backends (e.g. `rolo-store-sqlite`).
//! Higher layers (`rolo-integrity`, `rolo-api`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{Entity, EntityType, filter::EntityFilter, patch::EntityPatch};

// ─── Write types ─────────────────────────────────────────────────────────────

/// Condition an update must satisfy before it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
  /// Apply regardless of the stored version.
  Any,
  /// Apply only if the stored version equals this value.
  Version(u64),
}

/// Result of a conditional update. A failed precondition is an outcome, not
/// an error; callers decide whether to retry.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
  Updated(Entity),
  VersionMismatch { current: u64 },
  NotFound,
}

/// One write inside [`EntityStore::transaction`].
#[derive(Debug, Clone)]
pub enum WriteOp {
  Insert(Entity),
  Update {
    entity_type:  EntityType,
    id:           Uuid,
    patch:        EntityPatch,
    precondition: Precondition,
  },
  Delete {
    entity_type: EntityType,
    id:          Uuid,
  },
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the relational store holding CRM entities.
///
/// Updates are single-row and atomic: the precondition check and the write
/// happen together, so two writers racing on the same version cannot both
/// succeed. Every successful update increments the entity's `version`.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait EntityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Retrieve an entity by type and id. Returns `None` if not found.
  fn find_by_id(
    &self,
    entity_type: EntityType,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + '_;

  /// Return every entity matching `filter`, ordered by creation time.
  fn find_many<'a>(
    &'a self,
    filter: &'a EntityFilter,
  ) -> impl Future<Output = Result<Vec<Entity>, Self::Error>> + Send + 'a;

  /// Persist a new entity. The stored copy starts at version 1.
  fn insert(
    &self,
    entity: Entity,
  ) -> impl Future<Output = Result<Entity, Self::Error>> + Send + '_;

  /// Apply `patch` to the entity if `precondition` holds.
  fn update<'a>(
    &'a self,
    entity_type: EntityType,
    id: Uuid,
    patch: &'a EntityPatch,
    precondition: Precondition,
  ) -> impl Future<Output = Result<UpdateOutcome, Self::Error>> + Send + 'a;

  /// Remove an entity. Returns `false` if it did not exist.
  fn delete(
    &self,
    entity_type: EntityType,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Execute `ops` all-or-nothing. Returns the written entities in order
  /// (deletes contribute nothing). A failed update precondition or a missing
  /// row aborts and rolls back the whole batch.
  fn transaction(
    &self,
    ops: Vec<WriteOp>,
  ) -> impl Future<Output = Result<Vec<Entity>, Self::Error>> + Send + '_;
}
