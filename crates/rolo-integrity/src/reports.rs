//! Per-organization aggregates: the dashboard and pipeline analytics.
//!
//! Both derive from every entity type, which is why entity invalidation
//! always drops dashboard and analytics keys.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rolo_core::{
  Entity, EntityType,
  entity::{Deal, DealStage},
  filter::EntityFilter,
  store::EntityStore,
};
use serde::Serialize;
use strum::IntoEnumIterator;
use uuid::Uuid;

use crate::{CacheKey, CacheManager, Cacheable, DependencyTag, Error, Result};

pub const PIPELINE_VIEW: &str = "pipeline";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
  pub organization_id:      Uuid,
  pub contacts:             usize,
  pub companies:            usize,
  pub deals:                usize,
  pub open_deals:           usize,
  pub open_pipeline_amount: f64,
  pub activities:           usize,
  pub open_activities:      usize,
  pub overdue_activities:   usize,
  pub generated_at:         DateTime<Utc>,
}

impl Cacheable for Dashboard {
  fn dependency_tags(&self) -> Vec<DependencyTag> {
    vec![DependencyTag::Organization(self.organization_id)]
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSummary {
  pub stage:           DealStage,
  pub deals:           usize,
  pub amount:          f64,
  /// Sum of `amount * probability / 100`.
  pub weighted_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pipeline {
  pub organization_id:    Uuid,
  /// One row per known stage, in pipeline order.
  pub stages:             Vec<StageSummary>,
  /// Deals whose stored stage is not a known stage.
  pub unrecognized_stage: usize,
  pub generated_at:       DateTime<Utc>,
}

impl Cacheable for Pipeline {
  fn dependency_tags(&self) -> Vec<DependencyTag> {
    vec![DependencyTag::Organization(self.organization_id)]
  }
}

/// Group deals by stage. Deals with an unknown stage are only counted.
pub fn summarize_pipeline(organization_id: Uuid, deals: &[Deal]) -> Pipeline {
  let mut stages: Vec<StageSummary> = DealStage::iter()
    .map(|stage| StageSummary {
      stage,
      deals: 0,
      amount: 0.0,
      weighted_amount: 0.0,
    })
    .collect();
  let mut unrecognized_stage = 0;

  for deal in deals {
    let Some(row) = deal
      .stage()
      .and_then(|stage| stages.iter_mut().find(|row| row.stage == stage))
    else {
      unrecognized_stage += 1;
      continue;
    };
    let amount = deal.amount.unwrap_or(0.0);
    row.deals += 1;
    row.amount += amount;
    row.weighted_amount += amount * deal.probability as f64 / 100.0;
  }

  Pipeline {
    organization_id,
    stages,
    unrecognized_stage,
    generated_at: Utc::now(),
  }
}

pub struct Reports<S> {
  store: Arc<S>,
  cache: Arc<CacheManager>,
}

impl<S: EntityStore> Reports<S> {
  pub fn new(store: Arc<S>, cache: Arc<CacheManager>) -> Self { Self { store, cache } }

  async fn all(&self, entity_type: EntityType, organization_id: Uuid) -> Result<Vec<Entity>> {
    self
      .store
      .find_many(&EntityFilter::all_in_organization(entity_type, organization_id))
      .await
      .map_err(Error::database)
  }

  async fn deals(&self, organization_id: Uuid) -> Result<Vec<Deal>> {
    Ok(
      self
        .all(EntityType::Deal, organization_id)
        .await?
        .into_iter()
        .filter_map(|e| Deal::try_from(e).ok())
        .collect(),
    )
  }

  pub async fn dashboard(&self, organization_id: Uuid) -> Result<Dashboard> {
    self
      .cache
      .get_cached_data(
        CacheKey::dashboard(organization_id),
        || self.compute_dashboard(organization_id),
        None,
        None,
      )
      .await
  }

  pub async fn pipeline(&self, organization_id: Uuid) -> Result<Pipeline> {
    self
      .cache
      .get_cached_data(
        CacheKey::analytics(organization_id, PIPELINE_VIEW),
        || async move { Ok(summarize_pipeline(organization_id, &self.deals(organization_id).await?)) },
        None,
        None,
      )
      .await
  }

  async fn compute_dashboard(&self, organization_id: Uuid) -> Result<Dashboard> {
    let now = Utc::now();
    let contacts = self.all(EntityType::Contact, organization_id).await?.len();
    let companies = self.all(EntityType::Company, organization_id).await?.len();
    let deals = self.deals(organization_id).await?;
    let activities = self.all(EntityType::Activity, organization_id).await?;

    let open: Vec<&Deal> = deals
      .iter()
      .filter(|d| d.stage().is_some_and(|s| !s.is_closed()))
      .collect();
    let open_activities: Vec<_> = activities
      .iter()
      .filter_map(|e| match e {
        Entity::Activity(a) if !a.completed => Some(a),
        _ => None,
      })
      .collect();

    Ok(Dashboard {
      organization_id,
      contacts,
      companies,
      deals: deals.len(),
      open_deals: open.len(),
      open_pipeline_amount: open.iter().filter_map(|d| d.amount).sum(),
      activities: activities.len(),
      open_activities: open_activities.len(),
      overdue_activities: open_activities
        .iter()
        .filter(|a| a.due_date.is_some_and(|due| due < now))
        .count(),
      generated_at: now,
    })
  }
}
