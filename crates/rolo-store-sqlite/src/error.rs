//! Error type for `rolo-store-sqlite`.

use rolo_core::EntityType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] rolo_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A transaction referenced a row that does not exist.
  #[error("{entity_type} not found: {id}")]
  NotFound {
    entity_type: EntityType,
    id:          uuid::Uuid,
  },

  /// A transaction's update precondition did not hold.
  #[error("{entity_type} {id} is at version {current}, expected {expected}")]
  VersionMismatch {
    entity_type: EntityType,
    id:          uuid::Uuid,
    expected:    u64,
    current:     u64,
  },
}

impl Error {
  /// Recover a store error that was boxed to cross the connection thread.
  pub(crate) fn from_call(err: tokio_rusqlite::Error) -> Self {
    match err {
      tokio_rusqlite::Error::Other(boxed) => match boxed.downcast::<Error>() {
        Ok(inner) => *inner,
        Err(other) => Error::Database(tokio_rusqlite::Error::Other(other)),
      },
      tokio_rusqlite::Error::Rusqlite(e) => Error::Sqlite(e),
      other => Error::Database(other),
    }
  }

  /// Box a store error so it can be returned from inside `Connection::call`.
  pub(crate) fn into_call(self) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Other(Box::new(self))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
