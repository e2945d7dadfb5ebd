//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Integrity(#[from] rolo_integrity::Error),
}

impl From<rolo_core::Error> for ApiError {
  fn from(err: rolo_core::Error) -> Self { Self::BadRequest(err.to_string()) }
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    use rolo_integrity::Error as E;
    match self {
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Integrity(E::NotFound { .. }) => StatusCode::NOT_FOUND,
      Self::Integrity(E::ValidationFailed(_)) => StatusCode::UNPROCESSABLE_ENTITY,
      Self::Integrity(E::Conflict { .. }) => StatusCode::CONFLICT,
      Self::Integrity(E::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
