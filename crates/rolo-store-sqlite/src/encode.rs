//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Column order in [`columns`] is the order
//! used by [`entity_values`] and [`entity_from_row`].

use chrono::{DateTime, Utc};
use rolo_core::{
  Entity, EntityType,
  entity::{Activity, ActivityType, Company, Contact, Deal, User},
};
use rusqlite::{Row, types::Value};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── SQL values ──────────────────────────────────────────────────────────────

fn text(s: impl Into<String>) -> Value { Value::Text(s.into()) }

fn uuid_value(id: Uuid) -> Value { text(encode_uuid(id)) }

fn opt_uuid_value(id: Option<Uuid>) -> Value {
  id.map_or(Value::Null, uuid_value)
}

fn opt_text(s: Option<&str>) -> Value { s.map_or(Value::Null, text) }

fn dt_value(dt: DateTime<Utc>) -> Value { text(encode_dt(dt)) }

// ─── Tables ──────────────────────────────────────────────────────────────────

pub fn table(entity_type: EntityType) -> &'static str {
  match entity_type {
    EntityType::Contact => "contacts",
    EntityType::Company => "companies",
    EntityType::Deal => "deals",
    EntityType::Activity => "activities",
    EntityType::User => "users",
  }
}

/// Every column of the entity's table, `id` first and the three bookkeeping
/// columns (`version`, `created_at`, `updated_at`) last.
pub fn columns(entity_type: EntityType) -> &'static [&'static str] {
  match entity_type {
    EntityType::Contact => &[
      "id", "organization_id", "first_name", "last_name", "email", "phone",
      "job_title", "company_id", "version", "created_at", "updated_at",
    ],
    EntityType::Company => &[
      "id", "organization_id", "name", "domain", "version", "created_at",
      "updated_at",
    ],
    EntityType::Deal => &[
      "id", "organization_id", "title", "amount", "stage", "probability",
      "contact_id", "company_id", "owner_id", "version", "created_at",
      "updated_at",
    ],
    EntityType::Activity => &[
      "id", "organization_id", "kind", "subject", "due_date", "completed",
      "contact_id", "deal_id", "user_id", "version", "created_at",
      "updated_at",
    ],
    EntityType::User => &[
      "id", "organization_id", "name", "email", "version", "created_at",
      "updated_at",
    ],
  }
}

pub fn select_sql(entity_type: EntityType) -> String {
  format!(
    "SELECT {} FROM {}",
    columns(entity_type).join(", "),
    table(entity_type)
  )
}

pub fn insert_sql(entity_type: EntityType) -> String {
  let cols = columns(entity_type);
  let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{i}")).collect();
  format!(
    "INSERT INTO {} ({}) VALUES ({})",
    table(entity_type),
    cols.join(", "),
    placeholders.join(", ")
  )
}

/// `UPDATE` of every non-id column, guarded by `id` and the previous version.
/// Parameters: the values from [`entity_values`] followed by the old version.
pub fn update_sql(entity_type: EntityType) -> String {
  let cols = columns(entity_type);
  let assignments: Vec<String> = cols
    .iter()
    .enumerate()
    .skip(1)
    .map(|(i, col)| format!("{col} = ?{}", i + 1))
    .collect();
  format!(
    "UPDATE {} SET {} WHERE id = ?1 AND version = ?{}",
    table(entity_type),
    assignments.join(", "),
    cols.len() + 1
  )
}

// ─── Entity → row ────────────────────────────────────────────────────────────

pub fn entity_values(entity: &Entity) -> Vec<Value> {
  match entity {
    Entity::Contact(c) => vec![
      uuid_value(c.id),
      uuid_value(c.organization_id),
      text(c.first_name.as_str()),
      text(c.last_name.as_str()),
      text(c.email.as_str()),
      opt_text(c.phone.as_deref()),
      opt_text(c.job_title.as_deref()),
      opt_uuid_value(c.company_id),
      Value::Integer(c.version as i64),
      dt_value(c.created_at),
      dt_value(c.updated_at),
    ],
    Entity::Company(c) => vec![
      uuid_value(c.id),
      uuid_value(c.organization_id),
      text(c.name.as_str()),
      opt_text(c.domain.as_deref()),
      Value::Integer(c.version as i64),
      dt_value(c.created_at),
      dt_value(c.updated_at),
    ],
    Entity::Deal(d) => vec![
      uuid_value(d.id),
      uuid_value(d.organization_id),
      text(d.title.as_str()),
      d.amount.map_or(Value::Null, Value::Real),
      text(d.stage.as_str()),
      Value::Integer(d.probability),
      opt_uuid_value(d.contact_id),
      opt_uuid_value(d.company_id),
      opt_uuid_value(d.owner_id),
      Value::Integer(d.version as i64),
      dt_value(d.created_at),
      dt_value(d.updated_at),
    ],
    Entity::Activity(a) => vec![
      uuid_value(a.id),
      uuid_value(a.organization_id),
      text(a.kind.as_ref()),
      text(a.subject.as_str()),
      a.due_date.map_or(Value::Null, dt_value),
      Value::Integer(i64::from(a.completed)),
      opt_uuid_value(a.contact_id),
      opt_uuid_value(a.deal_id),
      uuid_value(a.user_id),
      Value::Integer(a.version as i64),
      dt_value(a.created_at),
      dt_value(a.updated_at),
    ],
    Entity::User(u) => vec![
      uuid_value(u.id),
      uuid_value(u.organization_id),
      text(u.name.as_str()),
      text(u.email.as_str()),
      Value::Integer(u.version as i64),
      dt_value(u.created_at),
      dt_value(u.updated_at),
    ],
  }
}

// ─── Row → entity ────────────────────────────────────────────────────────────

/// Decode a row produced by [`select_sql`] for `entity_type`.
pub fn entity_from_row(entity_type: EntityType, row: &Row<'_>) -> Result<Entity> {
  let id = decode_uuid(&row.get::<_, String>(0)?)?;
  let organization_id = decode_uuid(&row.get::<_, String>(1)?)?;

  // The bookkeeping columns are always the final three.
  let n = columns(entity_type).len();
  let version = row.get::<_, i64>(n - 3)? as u64;
  let created_at = decode_dt(&row.get::<_, String>(n - 2)?)?;
  let updated_at = decode_dt(&row.get::<_, String>(n - 1)?)?;

  let entity = match entity_type {
    EntityType::Contact => Entity::Contact(Contact {
      id,
      organization_id,
      first_name: row.get(2)?,
      last_name: row.get(3)?,
      email: row.get(4)?,
      phone: row.get(5)?,
      job_title: row.get(6)?,
      company_id: decode_opt_uuid(row.get(7)?)?,
      version,
      created_at,
      updated_at,
    }),
    EntityType::Company => Entity::Company(Company {
      id,
      organization_id,
      name: row.get(2)?,
      domain: row.get(3)?,
      version,
      created_at,
      updated_at,
    }),
    EntityType::Deal => Entity::Deal(Deal {
      id,
      organization_id,
      title: row.get(2)?,
      amount: row.get(3)?,
      stage: row.get(4)?,
      probability: row.get(5)?,
      contact_id: decode_opt_uuid(row.get(6)?)?,
      company_id: decode_opt_uuid(row.get(7)?)?,
      owner_id: decode_opt_uuid(row.get(8)?)?,
      version,
      created_at,
      updated_at,
    }),
    EntityType::Activity => {
      let kind: String = row.get(2)?;
      let due_date: Option<String> = row.get(4)?;
      Entity::Activity(Activity {
        id,
        organization_id,
        kind: kind
          .parse::<ActivityType>()
          .map_err(|_| rolo_core::Error::UnknownActivityType(kind.clone()))?,
        subject: row.get(3)?,
        due_date: due_date.as_deref().map(decode_dt).transpose()?,
        completed: row.get(5)?,
        contact_id: decode_opt_uuid(row.get(6)?)?,
        deal_id: decode_opt_uuid(row.get(7)?)?,
        user_id: decode_uuid(&row.get::<_, String>(8)?)?,
        version,
        created_at,
        updated_at,
      })
    }
    EntityType::User => Entity::User(User {
      id,
      organization_id,
      name: row.get(2)?,
      email: row.get(3)?,
      version,
      created_at,
      updated_at,
    }),
  };
  Ok(entity)
}
