//! Handlers for `/integrity` endpoints.
//!
//! A check that finds problems still answers 200; the problems are in the
//! body's `errors` and `warnings`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use rolo_core::{EntityType, store::EntityStore};
use rolo_integrity::{DataLayer, IntegrityCheckResult};
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /integrity/{contacts|deals|companies}/{id}`
pub async fn check_entity<S: EntityStore>(
  State(layer): State<Arc<DataLayer<S>>>,
  Path((segment, id)): Path<(String, Uuid)>,
) -> Result<Json<IntegrityCheckResult>, ApiError> {
  let validator = layer.validator();
  let result = match EntityType::from_segment(&segment)? {
    EntityType::Contact => validator.validate_contact(id).await?,
    EntityType::Deal => validator.validate_deal(id).await?,
    EntityType::Company => validator.validate_company(id).await?,
    other => {
      return Err(ApiError::BadRequest(format!(
        "no integrity check for {}",
        other.collection()
      )));
    }
  };
  Ok(Json(result))
}

/// `GET /integrity/organizations/{org}`
pub async fn check_organization<S: EntityStore>(
  State(layer): State<Arc<DataLayer<S>>>,
  Path(organization_id): Path<Uuid>,
) -> Result<Json<Vec<IntegrityCheckResult>>, ApiError> {
  Ok(Json(layer.validator().validate_organization(organization_id).await?))
}
