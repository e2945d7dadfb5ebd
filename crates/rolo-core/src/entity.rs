//! Entity types: the CRM records this data layer reads, validates and caches.
//!
//! Every entity belongs to exactly one organization (tenant) and carries a
//! `version` that the store increments on each successful update. The version
//! is the optimistic-lock token used by the concurrency controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

// ─── Entity type ─────────────────────────────────────────────────────────────

/// Discriminant for the kinds of record held by the entity store.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntityType {
  Contact,
  Company,
  Deal,
  Activity,
  User,
}

impl EntityType {
  /// The plural path segment used for collections, e.g. `"contacts"`.
  pub fn collection(self) -> &'static str {
    match self {
      Self::Contact => "contacts",
      Self::Company => "companies",
      Self::Deal => "deals",
      Self::Activity => "activities",
      Self::User => "users",
    }
  }

  /// Inverse of [`EntityType::collection`]; also accepts the singular form.
  pub fn from_segment(segment: &str) -> crate::Result<Self> {
    match segment {
      "contacts" | "contact" => Ok(Self::Contact),
      "companies" | "company" => Ok(Self::Company),
      "deals" | "deal" => Ok(Self::Deal),
      "activities" | "activity" => Ok(Self::Activity),
      "users" | "user" => Ok(Self::User),
      other => Err(crate::Error::UnknownEntityType(other.to_owned())),
    }
  }
}

// ─── Enumerations ────────────────────────────────────────────────────────────

/// The fixed set of pipeline stages a deal may be in.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DealStage {
  Lead,
  Qualified,
  Proposal,
  Negotiation,
  Won,
  Lost,
}

impl DealStage {
  /// Closed stages no longer count towards the open pipeline.
  pub fn is_closed(self) -> bool { matches!(self, Self::Won | Self::Lost) }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActivityType {
  Call,
  Email,
  Meeting,
  Task,
  Note,
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A person the organization does business with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
  pub id:              Uuid,
  pub organization_id: Uuid,
  pub first_name:      String,
  pub last_name:       String,
  /// Unique within the organization.
  pub email:           String,
  pub phone:           Option<String>,
  pub job_title:       Option<String>,
  pub company_id:      Option<Uuid>,
  pub version:         u64,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
  pub id:              Uuid,
  pub organization_id: Uuid,
  /// Unique within the organization.
  pub name:            String,
  /// Unique within the organization when present.
  pub domain:          Option<String>,
  pub version:         u64,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

/// A sales opportunity.
///
/// `stage` is kept as the raw stored string so that values outside
/// [`DealStage`] survive a round trip and can be reported by integrity checks.
/// Likewise `probability` is not clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
  pub id:              Uuid,
  pub organization_id: Uuid,
  pub title:           String,
  pub amount:          Option<f64>,
  pub stage:           String,
  pub probability:     i64,
  pub contact_id:      Option<Uuid>,
  pub company_id:      Option<Uuid>,
  pub owner_id:        Option<Uuid>,
  pub version:         u64,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

impl Deal {
  /// The parsed stage, or `None` if the stored value is not a known stage.
  pub fn stage(&self) -> Option<DealStage> { self.stage.parse().ok() }
}

/// A logged call, email, meeting, task or note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
  pub id:              Uuid,
  pub organization_id: Uuid,
  pub kind:            ActivityType,
  pub subject:         String,
  pub due_date:        Option<DateTime<Utc>>,
  pub completed:       bool,
  pub contact_id:      Option<Uuid>,
  pub deal_id:         Option<Uuid>,
  pub user_id:         Uuid,
  pub version:         u64,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

/// A member of an organization; the owner of deals and activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id:              Uuid,
  pub organization_id: Uuid,
  pub name:            String,
  pub email:           String,
  pub version:         u64,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

// ─── Entity ──────────────────────────────────────────────────────────────────

/// Any record held by the entity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "lowercase")]
pub enum Entity {
  Contact(Contact),
  Company(Company),
  Deal(Deal),
  Activity(Activity),
  User(User),
}

impl Entity {
  pub fn entity_type(&self) -> EntityType {
    match self {
      Self::Contact(_) => EntityType::Contact,
      Self::Company(_) => EntityType::Company,
      Self::Deal(_) => EntityType::Deal,
      Self::Activity(_) => EntityType::Activity,
      Self::User(_) => EntityType::User,
    }
  }

  pub fn id(&self) -> Uuid {
    match self {
      Self::Contact(c) => c.id,
      Self::Company(c) => c.id,
      Self::Deal(d) => d.id,
      Self::Activity(a) => a.id,
      Self::User(u) => u.id,
    }
  }

  pub fn organization_id(&self) -> Uuid {
    match self {
      Self::Contact(c) => c.organization_id,
      Self::Company(c) => c.organization_id,
      Self::Deal(d) => d.organization_id,
      Self::Activity(a) => a.organization_id,
      Self::User(u) => u.organization_id,
    }
  }

  /// The optimistic-lock token.
  pub fn version(&self) -> u64 {
    match self {
      Self::Contact(c) => c.version,
      Self::Company(c) => c.version,
      Self::Deal(d) => d.version,
      Self::Activity(a) => a.version,
      Self::User(u) => u.version,
    }
  }

  pub fn updated_at(&self) -> DateTime<Utc> {
    match self {
      Self::Contact(c) => c.updated_at,
      Self::Company(c) => c.updated_at,
      Self::Deal(d) => d.updated_at,
      Self::Activity(a) => a.updated_at,
      Self::User(u) => u.updated_at,
    }
  }

  /// Outgoing references to other entities, in declaration order.
  pub fn references(&self) -> Vec<(EntityType, Uuid)> {
    let mut refs = Vec::new();
    match self {
      Self::Contact(c) => {
        refs.extend(c.company_id.map(|id| (EntityType::Company, id)));
      }
      Self::Deal(d) => {
        refs.extend(d.contact_id.map(|id| (EntityType::Contact, id)));
        refs.extend(d.company_id.map(|id| (EntityType::Company, id)));
        refs.extend(d.owner_id.map(|id| (EntityType::User, id)));
      }
      Self::Activity(a) => {
        refs.extend(a.contact_id.map(|id| (EntityType::Contact, id)));
        refs.extend(a.deal_id.map(|id| (EntityType::Deal, id)));
        refs.push((EntityType::User, a.user_id));
      }
      Self::Company(_) | Self::User(_) => {}
    }
    refs
  }

  /// Overwrite the bookkeeping fields. Stores call this; callers should not.
  pub fn stamp(&mut self, version: u64, at: DateTime<Utc>) {
    match self {
      Self::Contact(c) => (c.version, c.updated_at) = (version, at),
      Self::Company(c) => (c.version, c.updated_at) = (version, at),
      Self::Deal(d) => (d.version, d.updated_at) = (version, at),
      Self::Activity(a) => (a.version, a.updated_at) = (version, at),
      Self::User(u) => (u.version, u.updated_at) = (version, at),
    }
  }

  /// Return a copy stamped with the next version and `at` as `updated_at`.
  pub fn bumped(mut self, at: DateTime<Utc>) -> Self {
    let next = self.version() + 1;
    self.stamp(next, at);
    self
  }
}

macro_rules! entity_conversions {
  ($($variant:ident),* $(,)?) => {
    $(
      impl From<$variant> for Entity {
        fn from(value: $variant) -> Self { Self::$variant(value) }
      }

      impl TryFrom<Entity> for $variant {
        type Error = Entity;

        fn try_from(entity: Entity) -> Result<Self, Entity> {
          match entity {
            Entity::$variant(inner) => Ok(inner),
            other => Err(other),
          }
        }
      }
    )*
  };
}

entity_conversions!(Contact, Company, Deal, Activity, User);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn entity_type_round_trips_through_strings() {
    for ty in [
      EntityType::Contact,
      EntityType::Company,
      EntityType::Deal,
      EntityType::Activity,
      EntityType::User,
    ] {
      assert_eq!(ty.to_string().parse::<EntityType>().unwrap(), ty);
      assert_eq!(EntityType::from_segment(ty.collection()).unwrap(), ty);
    }
    assert!(EntityType::from_segment("widgets").is_err());
  }

  #[test]
  fn unknown_stage_does_not_parse() {
    let now = Utc::now();
    let deal = Deal {
      id:              Uuid::new_v4(),
      organization_id: Uuid::new_v4(),
      title:           "Renewal".into(),
      amount:          None,
      stage:           "abandoned".into(),
      probability:     10,
      contact_id:      None,
      company_id:      None,
      owner_id:        None,
      version:         1,
      created_at:      now,
      updated_at:      now,
    };
    assert_eq!(deal.stage(), None);
    assert_eq!(
      Deal { stage: "won".into(), ..deal }.stage(),
      Some(DealStage::Won)
    );
  }

  #[test]
  fn entity_json_is_tagged_with_type() {
    let now = Utc::now();
    let entity = Entity::Company(Company {
      id:              Uuid::nil(),
      organization_id: Uuid::nil(),
      name:            "Acme".into(),
      domain:          Some("acme.test".into()),
      version:         3,
      created_at:      now,
      updated_at:      now,
    });
    let json = serde_json::to_value(&entity).unwrap();
    assert_eq!(json["entity_type"], "company");
    assert_eq!(json["version"], 3);
  }

  #[test]
  fn bumped_increments_version() {
    let now = Utc::now();
    let user = Entity::User(User {
      id:              Uuid::new_v4(),
      organization_id: Uuid::new_v4(),
      name:            "Rep".into(),
      email:           "rep@example.com".into(),
      version:         4,
      created_at:      now,
      updated_at:      now,
    });
    assert_eq!(user.bumped(now).version(), 5);
  }
}
