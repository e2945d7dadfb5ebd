//! Partial updates.
//!
//! A patch names only the fields it changes. Nullable fields use
//! `Option<Option<T>>`: absent leaves the field alone, `null` clears it, and a
//! value sets it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::{
  Entity, EntityType, Error, Result,
  entity::{ActivityType, DealStage},
  rules,
};

fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(deserializer).map(Some)
}

// ─── Per-type patches ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub first_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_name:  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email:      Option<String>,
  #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
  pub phone:      Option<Option<String>>,
  #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
  pub job_title:  Option<Option<String>>,
  #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
  pub company_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:   Option<String>,
  #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
  pub domain: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DealPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title:       Option<String>,
  #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
  pub amount:      Option<Option<f64>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stage:       Option<DealStage>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub probability: Option<i64>,
  #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
  pub contact_id:  Option<Option<Uuid>>,
  #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
  pub company_id:  Option<Option<Uuid>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub owner_id:    Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub kind:       Option<ActivityType>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subject:    Option<String>,
  #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
  pub due_date:   Option<Option<DateTime<Utc>>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completed:  Option<bool>,
  #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
  pub contact_id: Option<Option<Uuid>>,
  #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
  pub deal_id:    Option<Option<Uuid>>,
}

// ─── Union ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "lowercase")]
pub enum EntityPatch {
  Contact(ContactPatch),
  Company(CompanyPatch),
  Deal(DealPatch),
  Activity(ActivityPatch),
}

impl EntityPatch {
  pub fn entity_type(&self) -> EntityType {
    match self {
      Self::Contact(_) => EntityType::Contact,
      Self::Company(_) => EntityType::Company,
      Self::Deal(_) => EntityType::Deal,
      Self::Activity(_) => EntityType::Activity,
    }
  }

  pub fn is_empty(&self) -> bool {
    match self {
      Self::Contact(p) => *p == ContactPatch::default(),
      Self::Company(p) => *p == CompanyPatch::default(),
      Self::Deal(p) => *p == DealPatch::default(),
      Self::Activity(p) => *p == ActivityPatch::default(),
    }
  }

  /// Check the patch's own field values. Runs before anything is written.
  pub fn validate(&self) -> Result<()> {
    let mut problems = Vec::new();
    if self.is_empty() {
      problems.push("patch changes no fields".to_owned());
    }

    match self {
      Self::Contact(p) => {
        non_blank(&mut problems, "first_name", p.first_name.as_deref());
        non_blank(&mut problems, "last_name", p.last_name.as_deref());
        if let Some(email) = &p.email
          && !rules::is_valid_email(email)
        {
          problems.push(format!("email {email:?} is not a valid address"));
        }
      }
      Self::Company(p) => {
        non_blank(&mut problems, "name", p.name.as_deref());
        if let Some(Some(domain)) = &p.domain
          && !rules::is_valid_domain(domain)
        {
          problems.push(format!("domain {domain:?} is not a valid hostname"));
        }
      }
      Self::Deal(p) => {
        non_blank(&mut problems, "title", p.title.as_deref());
        if let Some(amount) = p.amount
          && !rules::is_valid_amount(amount)
        {
          problems.push("amount must not be negative".to_owned());
        }
        if let Some(probability) = p.probability
          && !rules::is_valid_probability(probability)
        {
          problems.push(format!(
            "probability {probability} is outside {}..={}",
            rules::MIN_PROBABILITY,
            rules::MAX_PROBABILITY
          ));
        }
      }
      Self::Activity(p) => {
        non_blank(&mut problems, "subject", p.subject.as_deref());
      }
    }

    if problems.is_empty() {
      Ok(())
    } else {
      Err(Error::InvalidPatch(problems))
    }
  }

  /// Apply the patch in place. Does not touch `version` or `updated_at`.
  pub fn apply_to(&self, entity: &mut Entity) -> Result<()> {
    match (self, entity) {
      (Self::Contact(p), Entity::Contact(c)) => {
        set(&mut c.first_name, &p.first_name);
        set(&mut c.last_name, &p.last_name);
        set(&mut c.email, &p.email);
        set(&mut c.phone, &p.phone);
        set(&mut c.job_title, &p.job_title);
        set(&mut c.company_id, &p.company_id);
      }
      (Self::Company(p), Entity::Company(c)) => {
        set(&mut c.name, &p.name);
        set(&mut c.domain, &p.domain);
      }
      (Self::Deal(p), Entity::Deal(d)) => {
        set(&mut d.title, &p.title);
        set(&mut d.amount, &p.amount);
        if let Some(stage) = p.stage {
          d.stage = stage.to_string();
        }
        set(&mut d.probability, &p.probability);
        set(&mut d.contact_id, &p.contact_id);
        set(&mut d.company_id, &p.company_id);
        if let Some(owner) = p.owner_id {
          d.owner_id = Some(owner);
        }
      }
      (Self::Activity(p), Entity::Activity(a)) => {
        set(&mut a.kind, &p.kind);
        set(&mut a.subject, &p.subject);
        set(&mut a.due_date, &p.due_date);
        set(&mut a.completed, &p.completed);
        set(&mut a.contact_id, &p.contact_id);
        set(&mut a.deal_id, &p.deal_id);
      }
      (patch, target) => {
        return Err(Error::PatchTypeMismatch {
          patch:  patch.entity_type(),
          target: target.entity_type(),
        });
      }
    }
    Ok(())
  }
}

fn set<T: Clone>(field: &mut T, value: &Option<T>) {
  if let Some(v) = value {
    *field = v.clone();
  }
}

fn non_blank(problems: &mut Vec<String>, field: &str, value: Option<&str>) {
  if value.is_some_and(|v| v.trim().is_empty()) {
    problems.push(format!("{field} must not be blank"));
  }
}
