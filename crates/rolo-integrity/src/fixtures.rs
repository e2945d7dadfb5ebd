//! Test builders and `EntityStore` doubles.

use chrono::Utc;
use rolo_core::{
  Entity, EntityType,
  entity::{Activity, ActivityType, Company, Contact, Deal, User},
  filter::EntityFilter,
  patch::EntityPatch,
  store::{EntityStore, Precondition, UpdateOutcome, WriteOp},
};
use rolo_store_sqlite::SqliteStore;
use uuid::Uuid;

pub async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

// ─── Builders ────────────────────────────────────────────────────────────────

pub fn contact(org: Uuid, email: &str) -> Contact {
  let now = Utc::now();
  Contact {
    id:              Uuid::new_v4(),
    organization_id: org,
    first_name:      "Ada".into(),
    last_name:       "Lovelace".into(),
    email:           email.into(),
    phone:           None,
    job_title:       None,
    company_id:      None,
    version:         0,
    created_at:      now,
    updated_at:      now,
  }
}

pub fn company(org: Uuid, name: &str) -> Company {
  let now = Utc::now();
  Company {
    id:              Uuid::new_v4(),
    organization_id: org,
    name:            name.into(),
    domain:          None,
    version:         0,
    created_at:      now,
    updated_at:      now,
  }
}

pub fn deal(org: Uuid, owner_id: Option<Uuid>) -> Deal {
  let now = Utc::now();
  Deal {
    id: Uuid::new_v4(),
    organization_id: org,
    title: "Expansion".into(),
    amount: Some(1_000.0),
    stage: "lead".into(),
    probability: 10,
    contact_id: None,
    company_id: None,
    owner_id,
    version: 0,
    created_at: now,
    updated_at: now,
  }
}

pub fn user(org: Uuid) -> User {
  let now = Utc::now();
  User {
    id:              Uuid::new_v4(),
    organization_id: org,
    name:            "Rep".into(),
    email:           "rep@example.com".into(),
    version:         0,
    created_at:      now,
    updated_at:      now,
  }
}

pub fn activity(org: Uuid, user_id: Uuid) -> Activity {
  let now = Utc::now();
  Activity {
    id: Uuid::new_v4(),
    organization_id: org,
    kind: ActivityType::Call,
    subject: "Intro call".into(),
    due_date: None,
    completed: false,
    contact_id: None,
    deal_id: None,
    user_id,
    version: 0,
    created_at: now,
    updated_at: now,
  }
}

// ─── Doubles ─────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum DoubleError {
  #[error(transparent)]
  Store(#[from] rolo_store_sqlite::Error),

  #[error("injected failure reading {0}")]
  Injected(Uuid),
}

/// Delegates to SQLite, except that reading one chosen id always fails.
pub struct FailingStore {
  inner:   SqliteStore,
  fail_on: Uuid,
}

impl FailingStore {
  pub fn new(inner: SqliteStore, fail_on: Uuid) -> Self { Self { inner, fail_on } }
}

impl EntityStore for FailingStore {
  type Error = DoubleError;

  async fn find_by_id(&self, entity_type: EntityType, id: Uuid) -> Result<Option<Entity>, DoubleError> {
    if id == self.fail_on {
      return Err(DoubleError::Injected(id));
    }
    Ok(self.inner.find_by_id(entity_type, id).await?)
  }

  async fn find_many(&self, filter: &EntityFilter) -> Result<Vec<Entity>, DoubleError> {
    Ok(self.inner.find_many(filter).await?)
  }

  async fn insert(&self, entity: Entity) -> Result<Entity, DoubleError> {
    Ok(self.inner.insert(entity).await?)
  }

  async fn update(
    &self,
    entity_type: EntityType,
    id: Uuid,
    patch: &EntityPatch,
    precondition: Precondition,
  ) -> Result<UpdateOutcome, DoubleError> {
    Ok(self.inner.update(entity_type, id, patch, precondition).await?)
  }

  async fn delete(&self, entity_type: EntityType, id: Uuid) -> Result<bool, DoubleError> {
    Ok(self.inner.delete(entity_type, id).await?)
  }

  async fn transaction(&self, ops: Vec<WriteOp>) -> Result<Vec<Entity>, DoubleError> {
    Ok(self.inner.transaction(ops).await?)
  }
}

/// Delegates to SQLite, except that every update loses a race: another
/// writer is always one version ahead.
pub struct ContendedStore {
  inner: SqliteStore,
}

impl ContendedStore {
  pub fn new(inner: SqliteStore) -> Self { Self { inner } }
}

impl EntityStore for ContendedStore {
  type Error = rolo_store_sqlite::Error;

  async fn find_by_id(
    &self,
    entity_type: EntityType,
    id: Uuid,
  ) -> rolo_store_sqlite::Result<Option<Entity>> {
    self.inner.find_by_id(entity_type, id).await
  }

  async fn find_many(&self, filter: &EntityFilter) -> rolo_store_sqlite::Result<Vec<Entity>> {
    self.inner.find_many(filter).await
  }

  async fn insert(&self, entity: Entity) -> rolo_store_sqlite::Result<Entity> {
    self.inner.insert(entity).await
  }

  async fn update(
    &self,
    entity_type: EntityType,
    id: Uuid,
    _patch: &EntityPatch,
    _precondition: Precondition,
  ) -> rolo_store_sqlite::Result<UpdateOutcome> {
    Ok(match self.inner.find_by_id(entity_type, id).await? {
      Some(entity) => UpdateOutcome::VersionMismatch {
        current: entity.version() + 1,
      },
      None => UpdateOutcome::NotFound,
    })
  }

  async fn delete(&self, entity_type: EntityType, id: Uuid) -> rolo_store_sqlite::Result<bool> {
    self.inner.delete(entity_type, id).await
  }

  async fn transaction(&self, ops: Vec<WriteOp>) -> rolo_store_sqlite::Result<Vec<Entity>> {
    self.inner.transaction(ops).await
  }
}
