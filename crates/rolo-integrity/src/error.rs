//! Error types for `rolo-integrity`.

use rolo_core::EntityType;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{entity_type} not found: {id}")]
  NotFound {
    entity_type: EntityType,
    id:          Uuid,
  },

  /// Structural or referential integrity violated, or a patch rejected
  /// before it reached the store.
  #[error("validation failed: {0}")]
  ValidationFailed(String),

  /// An optimistic-lock mismatch that the chosen strategy did not resolve.
  #[error(
    "conflict on {entity_type} {id}: expected version {expected}, found {current} \
     after {attempts} attempt(s)"
  )]
  Conflict {
    entity_type: EntityType,
    id:          Uuid,
    expected:    u64,
    current:     u64,
    attempts:    u32,
  },

  #[error("database error: {0}")]
  Database(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap an opaque entity-store failure.
  pub fn database<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Database(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
