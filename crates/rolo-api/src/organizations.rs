//! Handlers for `/organizations/{org}` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/organizations/{org}/dashboard` | Cached |
//! | `GET`  | `/organizations/{org}/pipeline` | Cached |
//! | `POST` | `/organizations/{org}/import` | Body: array of entities; all or nothing |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use rolo_core::{Entity, store::EntityStore};
use rolo_integrity::{Dashboard, DataLayer, Pipeline};
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /organizations/{org}/dashboard`
pub async fn dashboard<S: EntityStore>(
  State(layer): State<Arc<DataLayer<S>>>,
  Path(organization_id): Path<Uuid>,
) -> Result<Json<Dashboard>, ApiError> {
  Ok(Json(layer.reports().dashboard(organization_id).await?))
}

/// `GET /organizations/{org}/pipeline`
pub async fn pipeline<S: EntityStore>(
  State(layer): State<Arc<DataLayer<S>>>,
  Path(organization_id): Path<Uuid>,
) -> Result<Json<Pipeline>, ApiError> {
  Ok(Json(layer.reports().pipeline(organization_id).await?))
}

/// `POST /organizations/{org}/import`
pub async fn import<S: EntityStore>(
  State(layer): State<Arc<DataLayer<S>>>,
  Path(organization_id): Path<Uuid>,
  Json(entities): Json<Vec<Entity>>,
) -> Result<impl IntoResponse, ApiError> {
  let written = layer.bulk_import(organization_id, entities).await?;
  Ok((StatusCode::CREATED, Json(written)))
}
