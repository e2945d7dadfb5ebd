//! Query filters for [`EntityStore::find_many`](crate::store::EntityStore::find_many).
//!
//! Each entity type has its own filter struct carrying only the fields that
//! make sense for it. [`EntityFilter`] is the tagged union handed to the store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  EntityType,
  entity::{ActivityType, DealStage},
};

/// Limit/offset pagination. Both unset means "everything".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Page {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

// ─── Per-type filters ────────────────────────────────────────────────────────
//
// `organization_id: None` spans every tenant. Only integrity scans that must
// detect cross-tenant references should leave it unset.

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactFilter {
  pub organization_id: Option<Uuid>,
  pub company_id:      Option<Uuid>,
  /// Exact (case-insensitive) email match.
  pub email:           Option<String>,
  #[serde(default)]
  pub page:            Page,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyFilter {
  pub organization_id: Option<Uuid>,
  /// Exact (case-insensitive) name match.
  pub name:            Option<String>,
  pub domain:          Option<String>,
  #[serde(default)]
  pub page:            Page,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DealFilter {
  pub organization_id: Option<Uuid>,
  pub stage:           Option<DealStage>,
  pub contact_id:      Option<Uuid>,
  pub company_id:      Option<Uuid>,
  pub owner_id:        Option<Uuid>,
  #[serde(default)]
  pub page:            Page,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityFilter {
  pub organization_id: Option<Uuid>,
  pub kind:            Option<ActivityType>,
  pub contact_id:      Option<Uuid>,
  pub deal_id:         Option<Uuid>,
  pub user_id:         Option<Uuid>,
  pub completed:       Option<bool>,
  #[serde(default)]
  pub page:            Page,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserFilter {
  pub organization_id: Option<Uuid>,
  #[serde(default)]
  pub page:            Page,
}

// ─── Union ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "lowercase")]
pub enum EntityFilter {
  Contact(ContactFilter),
  Company(CompanyFilter),
  Deal(DealFilter),
  Activity(ActivityFilter),
  User(UserFilter),
}

impl EntityFilter {
  pub fn entity_type(&self) -> EntityType {
    match self {
      Self::Contact(_) => EntityType::Contact,
      Self::Company(_) => EntityType::Company,
      Self::Deal(_) => EntityType::Deal,
      Self::Activity(_) => EntityType::Activity,
      Self::User(_) => EntityType::User,
    }
  }

  pub fn organization_id(&self) -> Option<Uuid> {
    match self {
      Self::Contact(f) => f.organization_id,
      Self::Company(f) => f.organization_id,
      Self::Deal(f) => f.organization_id,
      Self::Activity(f) => f.organization_id,
      Self::User(f) => f.organization_id,
    }
  }

  pub fn page(&self) -> Page {
    match self {
      Self::Contact(f) => f.page,
      Self::Company(f) => f.page,
      Self::Deal(f) => f.page,
      Self::Activity(f) => f.page,
      Self::User(f) => f.page,
    }
  }

  pub fn with_page(mut self, page: Page) -> Self {
    match &mut self {
      Self::Contact(f) => f.page = page,
      Self::Company(f) => f.page = page,
      Self::Deal(f) => f.page = page,
      Self::Activity(f) => f.page = page,
      Self::User(f) => f.page = page,
    }
    self
  }

  /// An unpaginated filter returning every entity of `entity_type` in one
  /// organization.
  pub fn all_in_organization(entity_type: EntityType, organization_id: Uuid) -> Self {
    let org = Some(organization_id);
    match entity_type {
      EntityType::Contact => Self::Contact(ContactFilter { organization_id: org, ..Default::default() }),
      EntityType::Company => Self::Company(CompanyFilter { organization_id: org, ..Default::default() }),
      EntityType::Deal => Self::Deal(DealFilter { organization_id: org, ..Default::default() }),
      EntityType::Activity => Self::Activity(ActivityFilter { organization_id: org, ..Default::default() }),
      EntityType::User => Self::User(UserFilter { organization_id: org, ..Default::default() }),
    }
  }

  /// A stable textual form used for hashing into cache keys. Two filters
  /// that select the same rows in the same order produce the same string.
  pub fn canonical(&self) -> crate::Result<String> {
    Ok(serde_json::to_string(self)?)
  }
}

impl From<ContactFilter> for EntityFilter {
  fn from(f: ContactFilter) -> Self { Self::Contact(f) }
}

impl From<CompanyFilter> for EntityFilter {
  fn from(f: CompanyFilter) -> Self { Self::Company(f) }
}

impl From<DealFilter> for EntityFilter {
  fn from(f: DealFilter) -> Self { Self::Deal(f) }
}

impl From<ActivityFilter> for EntityFilter {
  fn from(f: ActivityFilter) -> Self { Self::Activity(f) }
}

impl From<UserFilter> for EntityFilter {
  fn from(f: UserFilter) -> Self { Self::User(f) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn canonical_form_distinguishes_query_shapes() {
    let org = Uuid::new_v4();
    let first = EntityFilter::from(DealFilter {
      organization_id: Some(org),
      page: Page { limit: Some(20), offset: Some(0) },
      ..Default::default()
    });
    let second = EntityFilter::from(DealFilter {
      organization_id: Some(org),
      page: Page { limit: Some(20), offset: Some(20) },
      ..Default::default()
    });
    assert_ne!(first.canonical().unwrap(), second.canonical().unwrap());
    assert_eq!(first.canonical().unwrap(), first.clone().canonical().unwrap());
  }

  #[test]
  fn all_in_organization_matches_type() {
    let org = Uuid::new_v4();
    let filter = EntityFilter::all_in_organization(EntityType::Activity, org);
    assert_eq!(filter.entity_type(), EntityType::Activity);
    assert_eq!(filter.organization_id(), Some(org));
    assert_eq!(filter.page(), Page::default());

    let page = Page { limit: Some(10), offset: Some(30) };
    let paged = filter.clone().with_page(page);
    assert_eq!(paged.page(), page);
    assert_eq!(paged.organization_id(), Some(org));
    assert_ne!(paged.canonical().unwrap(), filter.canonical().unwrap());
  }
}
