//! JSON REST API for the Rolo data layer.
//!
//! Exposes an axum [`Router`] backed by a [`DataLayer`] over any
//! [`rolo_core::store::EntityStore`]. Auth, TLS, and transport concerns are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", rolo_api::api_router(layer.clone()))
//! ```

pub mod cache;
pub mod entities;
pub mod error;
pub mod integrity;
pub mod organizations;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use rolo_core::store::EntityStore;
use rolo_integrity::DataLayer;

pub use error::ApiError;

/// Build a fully-materialised API router for `layer`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(layer: Arc<DataLayer<S>>) -> Router<()>
where
  S: EntityStore + 'static,
{
  Router::new()
    // Integrity checks
    .route("/integrity/organizations/{org}", get(integrity::check_organization::<S>))
    .route("/integrity/{entity_type}/{id}", get(integrity::check_entity::<S>))
    // Cache administration
    .route("/cache/invalidate", post(cache::invalidate_entity::<S>))
    .route("/cache/organizations/{org}", delete(cache::invalidate_organization::<S>))
    .route("/cache/stats", get(cache::stats::<S>))
    .route("/metrics", get(cache::metrics::<S>).delete(cache::reset_metrics::<S>))
    // Organization views
    .route("/organizations/{org}/dashboard", get(organizations::dashboard::<S>))
    .route("/organizations/{org}/pipeline", get(organizations::pipeline::<S>))
    .route("/organizations/{org}/import", post(organizations::import::<S>))
    // Entities
    .route("/{entity_type}", get(entities::get_many::<S>))
    .route(
      "/{entity_type}/{id}",
      get(entities::get_one::<S>).patch(entities::update::<S>),
    )
    .with_state(layer)
}
