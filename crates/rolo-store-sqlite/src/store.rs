//! [`SqliteStore`]: the SQLite implementation of [`EntityStore`].

use std::path::Path;

use chrono::Utc;
use rolo_core::{
  Entity, EntityType,
  filter::EntityFilter,
  patch::EntityPatch,
  store::{EntityStore, Precondition, UpdateOutcome, WriteOp},
};
use rusqlite::{Connection, types::Value};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    encode_uuid, entity_from_row, entity_values, insert_sql, select_sql, table,
    update_sql,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Rolo entity store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Synchronous helpers (run on the connection thread) ──────────────────────

fn select_one(conn: &Connection, entity_type: EntityType, id: Uuid) -> Result<Option<Entity>> {
  let sql = format!("{} WHERE id = ?1", select_sql(entity_type));
  let mut stmt = conn.prepare(&sql)?;
  let mut rows = stmt.query(rusqlite::params![encode_uuid(id)])?;
  match rows.next()? {
    Some(row) => Ok(Some(entity_from_row(entity_type, row)?)),
    None => Ok(None),
  }
}

fn insert_one(conn: &Connection, entity: &Entity) -> Result<()> {
  conn.execute(
    &insert_sql(entity.entity_type()),
    rusqlite::params_from_iter(entity_values(entity)),
  )?;
  Ok(())
}

fn update_one(
  conn: &Connection,
  entity_type: EntityType,
  id: Uuid,
  patch: &EntityPatch,
  precondition: Precondition,
) -> Result<UpdateOutcome> {
  let Some(mut current) = select_one(conn, entity_type, id)? else {
    return Ok(UpdateOutcome::NotFound);
  };
  let previous = current.version();
  if let Precondition::Version(expected) = precondition
    && expected != previous
  {
    return Ok(UpdateOutcome::VersionMismatch { current: previous });
  }

  patch.apply_to(&mut current)?;
  let next = current.bumped(Utc::now());

  let mut params = entity_values(&next);
  params.push(Value::Integer(previous as i64));
  let changed = conn.execute(
    &update_sql(entity_type),
    rusqlite::params_from_iter(params),
  )?;

  // The guarded UPDATE matched nothing: the row moved under us.
  if changed == 0 {
    let current = select_one(conn, entity_type, id)?;
    return Ok(match current {
      Some(e) => UpdateOutcome::VersionMismatch { current: e.version() },
      None => UpdateOutcome::NotFound,
    });
  }
  Ok(UpdateOutcome::Updated(next))
}

fn delete_one(conn: &Connection, entity_type: EntityType, id: Uuid) -> Result<bool> {
  let changed = conn.execute(
    &format!("DELETE FROM {} WHERE id = ?1", table(entity_type)),
    rusqlite::params![encode_uuid(id)],
  )?;
  Ok(changed > 0)
}

/// Translate a filter into `WHERE`/`LIMIT` SQL plus positional parameters.
fn filter_sql(filter: &EntityFilter) -> (String, Vec<Value>) {
  let mut conds: Vec<String> = Vec::new();
  let mut params: Vec<Value> = Vec::new();

  let mut push = |cond: &str, value: Value| {
    params.push(value);
    conds.push(cond.replace('?', &format!("?{}", params.len())));
  };
  let uuid = |id: Uuid| Value::Text(encode_uuid(id));

  if let Some(org) = filter.organization_id() {
    push("organization_id = ?", uuid(org));
  }

  match filter {
    EntityFilter::Contact(f) => {
      if let Some(id) = f.company_id {
        push("company_id = ?", uuid(id));
      }
      if let Some(email) = &f.email {
        push("lower(email) = lower(?)", Value::Text(email.clone()));
      }
    }
    EntityFilter::Company(f) => {
      if let Some(name) = &f.name {
        push("lower(name) = lower(?)", Value::Text(name.clone()));
      }
      if let Some(domain) = &f.domain {
        push("lower(domain) = lower(?)", Value::Text(domain.clone()));
      }
    }
    EntityFilter::Deal(f) => {
      if let Some(stage) = f.stage {
        push("stage = ?", Value::Text(stage.to_string()));
      }
      if let Some(id) = f.contact_id {
        push("contact_id = ?", uuid(id));
      }
      if let Some(id) = f.company_id {
        push("company_id = ?", uuid(id));
      }
      if let Some(id) = f.owner_id {
        push("owner_id = ?", uuid(id));
      }
    }
    EntityFilter::Activity(f) => {
      if let Some(kind) = f.kind {
        push("kind = ?", Value::Text(kind.to_string()));
      }
      if let Some(id) = f.contact_id {
        push("contact_id = ?", uuid(id));
      }
      if let Some(id) = f.deal_id {
        push("deal_id = ?", uuid(id));
      }
      if let Some(id) = f.user_id {
        push("user_id = ?", uuid(id));
      }
      if let Some(completed) = f.completed {
        push("completed = ?", Value::Integer(i64::from(completed)));
      }
    }
    EntityFilter::User(_) => {}
  }

  let where_clause = if conds.is_empty() {
    String::new()
  } else {
    format!(" WHERE {}", conds.join(" AND "))
  };

  let page = filter.page();
  let limit = page.limit.map_or(-1, |l| l as i64);
  let offset = page.offset.unwrap_or(0) as i64;
  params.push(Value::Integer(limit));
  params.push(Value::Integer(offset));
  let n = params.len();

  let sql = format!(
    "{}{where_clause} ORDER BY created_at, id LIMIT ?{} OFFSET ?{n}",
    select_sql(filter.entity_type()),
    n - 1
  );
  (sql, params)
}

fn select_many(conn: &Connection, filter: &EntityFilter) -> Result<Vec<Entity>> {
  let (sql, params) = filter_sql(filter);
  let entity_type = filter.entity_type();
  let mut stmt = conn.prepare(&sql)?;
  let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
  let mut out = Vec::new();
  while let Some(row) = rows.next()? {
    out.push(entity_from_row(entity_type, row)?);
  }
  Ok(out)
}

fn apply_op(conn: &Connection, op: WriteOp) -> Result<Option<Entity>> {
  match op {
    WriteOp::Insert(entity) => {
      let entity = first_version(entity);
      insert_one(conn, &entity)?;
      Ok(Some(entity))
    }
    WriteOp::Update { entity_type, id, patch, precondition } => {
      match update_one(conn, entity_type, id, &patch, precondition)? {
        UpdateOutcome::Updated(entity) => Ok(Some(entity)),
        UpdateOutcome::NotFound => Err(Error::NotFound { entity_type, id }),
        UpdateOutcome::VersionMismatch { current } => Err(Error::VersionMismatch {
          entity_type,
          id,
          expected: match precondition {
            Precondition::Version(v) => v,
            Precondition::Any => current,
          },
          current,
        }),
      }
    }
    WriteOp::Delete { entity_type, id } => {
      if delete_one(conn, entity_type, id)? {
        Ok(None)
      } else {
        Err(Error::NotFound { entity_type, id })
      }
    }
  }
}

/// New rows always start at version 1, whatever the caller supplied.
fn first_version(mut entity: Entity) -> Entity {
  entity.stamp(1, Utc::now());
  entity
}

// ─── EntityStore impl ────────────────────────────────────────────────────────

impl EntityStore for SqliteStore {
  type Error = Error;

  async fn find_by_id(&self, entity_type: EntityType, id: Uuid) -> Result<Option<Entity>> {
    self
      .conn
      .call(move |conn| select_one(conn, entity_type, id).map_err(Error::into_call))
      .await
      .map_err(Error::from_call)
  }

  async fn find_many(&self, filter: &EntityFilter) -> Result<Vec<Entity>> {
    let filter = filter.clone();
    self
      .conn
      .call(move |conn| select_many(conn, &filter).map_err(Error::into_call))
      .await
      .map_err(Error::from_call)
  }

  async fn insert(&self, entity: Entity) -> Result<Entity> {
    let entity = first_version(entity);
    let row = entity.clone();
    self
      .conn
      .call(move |conn| insert_one(conn, &row).map_err(Error::into_call))
      .await
      .map_err(Error::from_call)?;
    Ok(entity)
  }

  async fn update(
    &self,
    entity_type:  EntityType,
    id:           Uuid,
    patch:        &EntityPatch,
    precondition: Precondition,
  ) -> Result<UpdateOutcome> {
    let patch = patch.clone();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = update_one(&tx, entity_type, id, &patch, precondition)
          .map_err(Error::into_call)?;
        tx.commit()?;
        Ok(outcome)
      })
      .await
      .map_err(Error::from_call)
  }

  async fn delete(&self, entity_type: EntityType, id: Uuid) -> Result<bool> {
    self
      .conn
      .call(move |conn| delete_one(conn, entity_type, id).map_err(Error::into_call))
      .await
      .map_err(Error::from_call)
  }

  async fn transaction(&self, ops: Vec<WriteOp>) -> Result<Vec<Entity>> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut written = Vec::with_capacity(ops.len());
        for op in ops {
          // Returning early drops `tx`, which rolls the batch back.
          if let Some(entity) = apply_op(&tx, op).map_err(Error::into_call)? {
            written.push(entity);
          }
        }
        tx.commit()?;
        Ok(written)
      })
      .await
      .map_err(Error::from_call)
  }
}
