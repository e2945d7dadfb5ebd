//! Handlers for entity reads and updates.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/{entity_type}/{id}` | 404 if not found |
//! | `GET`   | `/{entity_type}?ids=a,b` | 422 unless every id resolves |
//! | `GET`   | `/{entity_type}?organization_id=o&limit=&offset=` | Cached list |
//! | `PATCH` | `/{entity_type}/{id}` | Body: `{"expected_version":1,"patch":{..},"strategy":{..}}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use rolo_core::{
  Entity, EntityType,
  filter::{EntityFilter, Page},
  patch::EntityPatch,
  store::EntityStore,
};
use rolo_integrity::{ConflictStrategy, DataLayer};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /{entity_type}/{id}`
pub async fn get_one<S: EntityStore>(
  State(layer): State<Arc<DataLayer<S>>>,
  Path((segment, id)): Path<(String, Uuid)>,
) -> Result<Json<Entity>, ApiError> {
  let entity_type = EntityType::from_segment(&segment)?;
  Ok(Json(layer.get_entity(entity_type, id).await?))
}

// ─── Get many ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ManyParams {
  /// Comma-separated ids. Takes precedence over the list parameters.
  pub ids:             Option<String>,
  pub organization_id: Option<Uuid>,
  pub limit:           Option<usize>,
  pub offset:          Option<usize>,
}

fn parse_ids(raw: &str) -> Result<Vec<Uuid>, ApiError> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(|s| Uuid::parse_str(s).map_err(|e| ApiError::BadRequest(format!("invalid id {s:?}: {e}"))))
    .collect()
}

/// `GET /{entity_type}?ids=<id>,<id>` or
/// `GET /{entity_type}?organization_id=<org>&limit=<n>&offset=<n>`
pub async fn get_many<S: EntityStore>(
  State(layer): State<Arc<DataLayer<S>>>,
  Path(segment): Path<String>,
  Query(params): Query<ManyParams>,
) -> Result<Json<Vec<Entity>>, ApiError> {
  let entity_type = EntityType::from_segment(&segment)?;

  if let Some(raw) = params.ids.as_deref() {
    let ids = parse_ids(raw)?;
    if ids.is_empty() {
      return Err(ApiError::BadRequest("`ids` must name at least one id".into()));
    }
    return Ok(Json(layer.get_entities(entity_type, &ids).await?));
  }

  let Some(organization_id) = params.organization_id else {
    return Err(ApiError::BadRequest(
      "either `ids` or `organization_id` is required".into(),
    ));
  };
  let filter = EntityFilter::all_in_organization(entity_type, organization_id).with_page(Page {
    limit:  params.limit,
    offset: params.offset,
  });
  Ok(Json(layer.list_entities(&filter).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub expected_version: u64,
  pub patch:            EntityPatch,
  /// Falls back to the configured default strategy.
  pub strategy:         Option<ConflictStrategy>,
}

/// `PATCH /{entity_type}/{id}`
pub async fn update<S: EntityStore>(
  State(layer): State<Arc<DataLayer<S>>>,
  Path((segment, id)): Path<(String, Uuid)>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Entity>, ApiError> {
  let entity_type = EntityType::from_segment(&segment)?;
  let strategy = body
    .strategy
    .as_ref()
    .unwrap_or_else(|| layer.default_strategy());
  let entity = layer
    .concurrency()
    .safe_update(entity_type, id, body.expected_version, &body.patch, strategy)
    .await?;
  Ok(Json(entity))
}
