//! Error types for `rolo-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown entity type: {0:?}")]
  UnknownEntityType(String),

  #[error("unknown deal stage: {0:?}")]
  UnknownStage(String),

  #[error("unknown activity type: {0:?}")]
  UnknownActivityType(String),

  #[error("patch for {patch} cannot be applied to a {target}")]
  PatchTypeMismatch {
    patch:  crate::EntityType,
    target: crate::EntityType,
  },

  #[error("invalid patch: {}", .0.join("; "))]
  InvalidPatch(Vec<String>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
