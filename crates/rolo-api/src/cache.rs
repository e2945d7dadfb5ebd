//! Handlers for `/cache` endpoints and `/metrics`.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use rolo_core::{EntityType, store::EntityStore};
use rolo_integrity::{CacheStats, DataLayer, OperationMetrics};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct Evicted {
  pub evicted: usize,
}

#[derive(Debug, Deserialize)]
pub struct InvalidateBody {
  pub entity_type: EntityType,
  pub id:          Uuid,
}

/// `POST /cache/invalidate`. Body: `{"entity_type":"deal","id":"..."}`
pub async fn invalidate_entity<S: EntityStore>(
  State(layer): State<Arc<DataLayer<S>>>,
  Json(body): Json<InvalidateBody>,
) -> Json<Evicted> {
  Json(Evicted {
    evicted: layer.cache().invalidate_entity_cache(body.entity_type, body.id),
  })
}

/// `DELETE /cache/organizations/{org}`
pub async fn invalidate_organization<S: EntityStore>(
  State(layer): State<Arc<DataLayer<S>>>,
  Path(organization_id): Path<Uuid>,
) -> Json<Evicted> {
  Json(Evicted {
    evicted: layer.cache().invalidate_organization_cache(organization_id),
  })
}

/// `GET /cache/stats`
pub async fn stats<S: EntityStore>(State(layer): State<Arc<DataLayer<S>>>) -> Json<CacheStats> {
  Json(layer.cache().get_cache_stats())
}

/// `GET /metrics`
pub async fn metrics<S: EntityStore>(
  State(layer): State<Arc<DataLayer<S>>>,
) -> Json<BTreeMap<String, OperationMetrics>> {
  Json(layer.monitor().get_metrics())
}

/// `DELETE /metrics`
pub async fn reset_metrics<S: EntityStore>(State(layer): State<Arc<DataLayer<S>>>) -> StatusCode {
  layer.monitor().reset_metrics();
  StatusCode::NO_CONTENT
}
