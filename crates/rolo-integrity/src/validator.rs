//! [`IntegrityValidator`]: read-only consistency checks over the entity graph.
//!
//! Data problems never surface as `Err`. They land in
//! [`IntegrityCheckResult::errors`] (the record cannot be trusted) or
//! [`IntegrityCheckResult::warnings`] (suspicious but survivable). `Err` is
//! reserved for the store itself failing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::{StreamExt, stream};
use rolo_core::{
  Entity, EntityType,
  entity::{Company, Deal, DealStage},
  filter::{ActivityFilter, CompanyFilter, ContactFilter, DealFilter, EntityFilter},
  rules,
  store::EntityStore,
};
use serde::Serialize;
use strum::IntoEnumIterator;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{Error, PerformanceMonitor, Result};

// ─── Result ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityCheckResult {
  pub is_valid:    bool,
  pub errors:      Vec<String>,
  pub warnings:    Vec<String>,
  pub checked_at:  DateTime<Utc>,
  pub entity_type: EntityType,
  pub entity_id:   Option<Uuid>,
}

impl IntegrityCheckResult {
  /// A result for a check that could not run to completion.
  pub fn failed(entity_type: EntityType, entity_id: Uuid, reason: impl Into<String>) -> Self {
    Self {
      is_valid: false,
      errors: vec![reason.into()],
      warnings: Vec::new(),
      checked_at: Utc::now(),
      entity_type,
      entity_id: Some(entity_id),
    }
  }
}

#[derive(Default)]
struct Findings {
  errors:   Vec<String>,
  warnings: Vec<String>,
}

impl Findings {
  fn error(&mut self, msg: impl Into<String>) { self.errors.push(msg.into()); }

  fn warn(&mut self, msg: impl Into<String>) { self.warnings.push(msg.into()); }

  fn finish(self, entity_type: EntityType, entity_id: Uuid) -> IntegrityCheckResult {
    IntegrityCheckResult {
      is_valid: self.errors.is_empty(),
      errors: self.errors,
      warnings: self.warnings,
      checked_at: Utc::now(),
      entity_type,
      entity_id: Some(entity_id),
    }
  }
}

fn cross_org(
  subject: EntityType,
  subject_org: Uuid,
  target: EntityType,
  target_id: Uuid,
  target_org: Uuid,
) -> String {
  format!(
    "cross-organization reference: {subject} belongs to organization {subject_org} but \
     {target} {target_id} belongs to organization {target_org}"
  )
}

// ─── Validator ───────────────────────────────────────────────────────────────

/// Checks references and field rules for stored entities.
pub struct IntegrityValidator<S> {
  store:       Arc<S>,
  monitor:     Arc<PerformanceMonitor>,
  concurrency: usize,
}

impl<S: EntityStore> IntegrityValidator<S> {
  /// `concurrency` bounds in-flight validations during an organization scan.
  pub fn new(store: Arc<S>, monitor: Arc<PerformanceMonitor>, concurrency: usize) -> Self {
    Self {
      store,
      monitor,
      concurrency: concurrency.max(1),
    }
  }

  async fn find(&self, entity_type: EntityType, id: Uuid) -> Result<Option<Entity>> {
    self
      .store
      .find_by_id(entity_type, id)
      .await
      .map_err(Error::database)
  }

  async fn find_many(&self, filter: EntityFilter) -> Result<Vec<Entity>> {
    self.store.find_many(&filter).await.map_err(Error::database)
  }

  /// Resolve `target_id` and report a missing target or a tenant mismatch
  /// as errors against `subject`.
  async fn check_reference(
    &self,
    findings: &mut Findings,
    subject: EntityType,
    subject_org: Uuid,
    target: EntityType,
    target_id: Uuid,
  ) -> Result<()> {
    match self.find(target, target_id).await? {
      None => findings.error(format!(
        "{target} reference exists but {target} not found: {target_id}"
      )),
      Some(found) if found.organization_id() != subject_org => findings.error(cross_org(
        subject,
        subject_org,
        target,
        target_id,
        found.organization_id(),
      )),
      Some(_) => {}
    }
    Ok(())
  }

  /// References held by `entity`, other than `skip`, whose targets are gone.
  async fn dangling_references(
    &self,
    entity: &Entity,
    skip: (EntityType, Uuid),
  ) -> Result<Vec<(EntityType, Uuid)>> {
    let mut dangling = Vec::new();
    for reference in entity.references() {
      if reference != skip && self.find(reference.0, reference.1).await?.is_none() {
        dangling.push(reference);
      }
    }
    Ok(dangling)
  }

  /// Warn about rows pointing at `subject` whose other references dangle, and
  /// fail on rows pointing at it from another organization.
  async fn check_referrers(
    &self,
    findings: &mut Findings,
    subject: EntityType,
    subject_id: Uuid,
    subject_org: Uuid,
    referrers: Vec<Entity>,
  ) -> Result<()> {
    for referrer in referrers {
      let (ty, id) = (referrer.entity_type(), referrer.id());
      if referrer.organization_id() != subject_org {
        findings.error(format!(
          "tenant isolation breach: {ty} {id} in organization {} references {subject} in \
           organization {subject_org}",
          referrer.organization_id()
        ));
        continue;
      }
      for (target, target_id) in self.dangling_references(&referrer, (subject, subject_id)).await? {
        findings.warn(format!(
          "orphaned {ty} {id}: its {target} reference {target_id} does not resolve"
        ));
      }
    }
    Ok(())
  }

  // ─── Contact ───────────────────────────────────────────────────────────────

  pub async fn validate_contact(&self, id: Uuid) -> Result<IntegrityCheckResult> {
    let mut findings = Findings::default();
    let contact = match self.find(EntityType::Contact, id).await? {
      Some(Entity::Contact(c)) => c,
      _ => {
        findings.error(format!("contact not found: {id}"));
        return Ok(findings.finish(EntityType::Contact, id));
      }
    };
    let org = contact.organization_id;

    if !rules::is_valid_email(&contact.email) {
      findings.error(format!("email {:?} is not a valid address", contact.email));
    }

    if let Some(company_id) = contact.company_id {
      self
        .check_reference(&mut findings, EntityType::Contact, org, EntityType::Company, company_id)
        .await?;
    }

    let same_email = self
      .find_many(EntityFilter::Contact(ContactFilter {
        organization_id: Some(org),
        email: Some(contact.email.clone()),
        ..Default::default()
      }))
      .await?;
    let others = same_email.iter().filter(|e| e.id() != id).count();
    if others > 0 {
      findings.warn(format!(
        "email {:?} is shared with {others} other contact(s) in the organization",
        contact.email
      ));
    }

    let mut referrers = self
      .find_many(EntityFilter::Deal(DealFilter {
        contact_id: Some(id),
        ..Default::default()
      }))
      .await?;
    referrers.extend(
      self
        .find_many(EntityFilter::Activity(ActivityFilter {
          contact_id: Some(id),
          ..Default::default()
        }))
        .await?,
    );
    self
      .check_referrers(&mut findings, EntityType::Contact, id, org, referrers)
      .await?;

    Ok(findings.finish(EntityType::Contact, id))
  }

  // ─── Deal ──────────────────────────────────────────────────────────────────

  pub async fn validate_deal(&self, id: Uuid) -> Result<IntegrityCheckResult> {
    let mut findings = Findings::default();
    let deal: Deal = match self.find(EntityType::Deal, id).await? {
      Some(Entity::Deal(d)) => d,
      _ => {
        findings.error(format!("deal not found: {id}"));
        return Ok(findings.finish(EntityType::Deal, id));
      }
    };
    let org = deal.organization_id;

    let stage = deal.stage();
    if stage.is_none() {
      let allowed: Vec<String> = DealStage::iter().map(|s| s.to_string()).collect();
      findings.error(format!(
        "stage {:?} is not one of {}",
        deal.stage,
        allowed.join(", ")
      ));
    }
    if !rules::is_valid_probability(deal.probability) {
      findings.error(format!(
        "probability {} is outside [{}, {}]",
        deal.probability,
        rules::MIN_PROBABILITY,
        rules::MAX_PROBABILITY
      ));
    }
    if !rules::is_valid_amount(deal.amount) {
      findings.error("amount must not be negative");
    }

    if let Some(contact_id) = deal.contact_id {
      self
        .check_reference(&mut findings, EntityType::Deal, org, EntityType::Contact, contact_id)
        .await?;
    }
    if let Some(company_id) = deal.company_id {
      self
        .check_reference(&mut findings, EntityType::Deal, org, EntityType::Company, company_id)
        .await?;
    }
    match deal.owner_id {
      Some(owner_id) => {
        self
          .check_reference(&mut findings, EntityType::Deal, org, EntityType::User, owner_id)
          .await?
      }
      None => findings.error("deal has no owner"),
    }

    match stage {
      Some(DealStage::Won) if deal.probability != 100 => findings.warn(format!(
        "stage is won but probability is {} (expected 100)",
        deal.probability
      )),
      Some(DealStage::Lost) if deal.probability != 0 => findings.warn(format!(
        "stage is lost but probability is {} (expected 0)",
        deal.probability
      )),
      _ => {}
    }

    Ok(findings.finish(EntityType::Deal, id))
  }

  // ─── Company ───────────────────────────────────────────────────────────────

  pub async fn validate_company(&self, id: Uuid) -> Result<IntegrityCheckResult> {
    let mut findings = Findings::default();
    let company: Company = match self.find(EntityType::Company, id).await? {
      Some(Entity::Company(c)) => c,
      _ => {
        findings.error(format!("company not found: {id}"));
        return Ok(findings.finish(EntityType::Company, id));
      }
    };
    let org = company.organization_id;

    if let Some(domain) = &company.domain
      && !rules::is_valid_domain(domain)
    {
      findings.warn(format!("domain {domain:?} is not a valid hostname"));
    }

    let same_name = self
      .find_many(EntityFilter::Company(CompanyFilter {
        organization_id: Some(org),
        name: Some(company.name.clone()),
        ..Default::default()
      }))
      .await?;
    let others = same_name.iter().filter(|e| e.id() != id).count();
    if others > 0 {
      findings.warn(format!(
        "name {:?} is shared with {others} other compan(ies) in the organization",
        company.name
      ));
    }

    // Referrers are looked up across every tenant.
    let mut referrers = self
      .find_many(EntityFilter::Contact(ContactFilter {
        company_id: Some(id),
        ..Default::default()
      }))
      .await?;
    referrers.extend(
      self
        .find_many(EntityFilter::Deal(DealFilter {
          company_id: Some(id),
          ..Default::default()
        }))
        .await?,
    );
    self
      .check_referrers(&mut findings, EntityType::Company, id, org, referrers)
      .await?;

    Ok(findings.finish(EntityType::Company, id))
  }

  // ─── Organization ──────────────────────────────────────────────────────────

  async fn validate_one(&self, entity_type: EntityType, id: Uuid) -> Result<IntegrityCheckResult> {
    match entity_type {
      EntityType::Contact => self.validate_contact(id).await,
      EntityType::Company => self.validate_company(id).await,
      EntityType::Deal => self.validate_deal(id).await,
      EntityType::Activity | EntityType::User => Ok(Findings::default().finish(entity_type, id)),
    }
  }

  /// Validate every contact, company and deal in the organization, with at
  /// most `concurrency` checks in flight. Yields one result per entity, in
  /// load order. A check that errors becomes an invalid result.
  pub async fn validate_organization(&self, organization_id: Uuid) -> Result<Vec<IntegrityCheckResult>> {
    self
      .monitor
      .measure("integrity.validate_organization", async {
        let mut targets = Vec::new();
        for entity_type in [EntityType::Contact, EntityType::Company, EntityType::Deal] {
          let entities = self
            .find_many(EntityFilter::all_in_organization(entity_type, organization_id))
            .await?;
          targets.extend(entities.iter().map(|e| (entity_type, e.id())));
        }
        debug!(%organization_id, entities = targets.len(), "validating organization");

        let results: Vec<IntegrityCheckResult> = stream::iter(targets)
          .map(|(entity_type, id)| async move {
            self
              .validate_one(entity_type, id)
              .await
              .unwrap_or_else(|e| {
                IntegrityCheckResult::failed(entity_type, id, format!("validation could not complete: {e}"))
              })
          })
          .buffered(self.concurrency)
          .collect()
          .await;

        let invalid = results.iter().filter(|r| !r.is_valid).count();
        info!(%organization_id, checked = results.len(), invalid, "organization validated");
        Ok::<_, Error>(results)
      })
      .await
  }
}
