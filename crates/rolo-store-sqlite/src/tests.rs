//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::Utc;
use rolo_core::{
  Entity, EntityType,
  entity::{Company, Contact, Deal},
  filter::{ContactFilter, DealFilter, EntityFilter, Page},
  patch::{CompanyPatch, DealPatch, EntityPatch},
  store::{EntityStore, Precondition, UpdateOutcome, WriteOp},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn company(org: Uuid, name: &str) -> Entity {
  let now = Utc::now();
  Entity::Company(Company {
    id:              Uuid::new_v4(),
    organization_id: org,
    name:            name.into(),
    domain:          None,
    version:         0,
    created_at:      now,
    updated_at:      now,
  })
}

fn contact(org: Uuid, email: &str, company_id: Option<Uuid>) -> Entity {
  let now = Utc::now();
  Entity::Contact(Contact {
    id: Uuid::new_v4(),
    organization_id: org,
    first_name: "Ada".into(),
    last_name: "Lovelace".into(),
    email: email.into(),
    phone: None,
    job_title: Some("Analyst".into()),
    company_id,
    version: 0,
    created_at: now,
    updated_at: now,
  })
}

fn deal(org: Uuid, stage: &str, contact_id: Option<Uuid>) -> Entity {
  let now = Utc::now();
  Entity::Deal(Deal {
    id: Uuid::new_v4(),
    organization_id: org,
    title: "Expansion".into(),
    amount: Some(12_500.0),
    stage: stage.into(),
    probability: 30,
    contact_id,
    company_id: None,
    owner_id: None,
    version: 0,
    created_at: now,
    updated_at: now,
  })
}

// ─── Insert / find ───────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_find_by_id() {
  let s = store().await;
  let org = Uuid::new_v4();

  let inserted = s.insert(contact(org, "ada@example.com", None)).await.unwrap();
  assert_eq!(inserted.version(), 1);

  let fetched = s
    .find_by_id(EntityType::Contact, inserted.id())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched.id(), inserted.id());
  assert_eq!(fetched.organization_id(), org);
  assert_eq!(fetched.version(), 1);

  let Entity::Contact(c) = fetched else { panic!("expected contact") };
  assert_eq!(c.job_title.as_deref(), Some("Analyst"));
}

#[tokio::test]
async fn find_by_id_missing_returns_none() {
  let s = store().await;
  let result = s.find_by_id(EntityType::Deal, Uuid::new_v4()).await.unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn find_by_id_respects_entity_type() {
  let s = store().await;
  let c = s.insert(company(Uuid::new_v4(), "Acme")).await.unwrap();
  let as_contact = s.find_by_id(EntityType::Contact, c.id()).await.unwrap();
  assert!(as_contact.is_none());
}

#[tokio::test]
async fn out_of_enum_stage_round_trips() {
  let s = store().await;
  let d = s.insert(deal(Uuid::new_v4(), "abandoned", None)).await.unwrap();
  let Entity::Deal(fetched) = s.find_by_id(EntityType::Deal, d.id()).await.unwrap().unwrap()
  else {
    panic!("expected deal")
  };
  assert_eq!(fetched.stage, "abandoned");
  assert!(fetched.stage().is_none());
}

#[tokio::test]
async fn duplicate_email_in_same_org_is_rejected() {
  let s = store().await;
  let org = Uuid::new_v4();
  s.insert(contact(org, "ada@example.com", None)).await.unwrap();
  assert!(s.insert(contact(org, "ada@example.com", None)).await.is_err());
  // A different tenant may reuse the address.
  s.insert(contact(Uuid::new_v4(), "ada@example.com", None)).await.unwrap();
}

// ─── find_many ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn find_many_scopes_to_organization() {
  let s = store().await;
  let org_a = Uuid::new_v4();
  let org_b = Uuid::new_v4();
  s.insert(contact(org_a, "a1@example.com", None)).await.unwrap();
  s.insert(contact(org_a, "a2@example.com", None)).await.unwrap();
  s.insert(contact(org_b, "b1@example.com", None)).await.unwrap();

  let in_a = s
    .find_many(&EntityFilter::all_in_organization(EntityType::Contact, org_a))
    .await
    .unwrap();
  assert_eq!(in_a.len(), 2);
  assert!(in_a.iter().all(|e| e.organization_id() == org_a));

  let everywhere = s
    .find_many(&EntityFilter::Contact(ContactFilter::default()))
    .await
    .unwrap();
  assert_eq!(everywhere.len(), 3);
}

#[tokio::test]
async fn find_many_by_reference_and_email() {
  let s = store().await;
  let org = Uuid::new_v4();
  let acme = s.insert(company(org, "Acme")).await.unwrap();
  let ada = s
    .insert(contact(org, "Ada@Example.com", Some(acme.id())))
    .await
    .unwrap();
  s.insert(contact(org, "bob@example.com", None)).await.unwrap();

  let at_acme = s
    .find_many(&EntityFilter::Contact(ContactFilter {
      company_id: Some(acme.id()),
      ..Default::default()
    }))
    .await
    .unwrap();
  assert_eq!(at_acme.len(), 1);
  assert_eq!(at_acme[0].id(), ada.id());

  let by_email = s
    .find_many(&EntityFilter::Contact(ContactFilter {
      organization_id: Some(org),
      email: Some("ada@example.com".into()),
      ..Default::default()
    }))
    .await
    .unwrap();
  assert_eq!(by_email.len(), 1);
}

#[tokio::test]
async fn find_many_paginates() {
  let s = store().await;
  let org = Uuid::new_v4();
  for _ in 0..5 {
    s.insert(deal(org, "lead", None)).await.unwrap();
  }

  let page = |offset| {
    EntityFilter::Deal(DealFilter {
      organization_id: Some(org),
      page: Page { limit: Some(2), offset: Some(offset) },
      ..Default::default()
    })
  };
  assert_eq!(s.find_many(&page(0)).await.unwrap().len(), 2);
  assert_eq!(s.find_many(&page(4)).await.unwrap().len(), 1);
}

// ─── Update ──────────────────────────────────────────────────────────────────

fn won_patch() -> EntityPatch {
  EntityPatch::Deal(DealPatch {
    stage: Some(rolo_core::entity::DealStage::Won),
    probability: Some(100),
    ..Default::default()
  })
}

#[tokio::test]
async fn update_with_matching_version_bumps_version() {
  let s = store().await;
  let d = s.insert(deal(Uuid::new_v4(), "proposal", None)).await.unwrap();

  let outcome = s
    .update(EntityType::Deal, d.id(), &won_patch(), Precondition::Version(1))
    .await
    .unwrap();
  let UpdateOutcome::Updated(Entity::Deal(updated)) = outcome else {
    panic!("expected update, got {outcome:?}")
  };
  assert_eq!(updated.version, 2);
  assert_eq!(updated.stage, "won");

  let stored = s.find_by_id(EntityType::Deal, d.id()).await.unwrap().unwrap();
  assert_eq!(stored.version(), 2);
}

#[tokio::test]
async fn update_with_stale_version_reports_mismatch() {
  let s = store().await;
  let d = s.insert(deal(Uuid::new_v4(), "proposal", None)).await.unwrap();
  s.update(EntityType::Deal, d.id(), &won_patch(), Precondition::Version(1))
    .await
    .unwrap();

  let outcome = s
    .update(EntityType::Deal, d.id(), &won_patch(), Precondition::Version(1))
    .await
    .unwrap();
  assert_eq!(outcome, UpdateOutcome::VersionMismatch { current: 2 });
}

#[tokio::test]
async fn update_missing_entity_reports_not_found() {
  let s = store().await;
  let outcome = s
    .update(EntityType::Deal, Uuid::new_v4(), &won_patch(), Precondition::Any)
    .await
    .unwrap();
  assert_eq!(outcome, UpdateOutcome::NotFound);
}

#[tokio::test]
async fn update_with_wrong_patch_type_errors() {
  let s = store().await;
  let d = s.insert(deal(Uuid::new_v4(), "lead", None)).await.unwrap();
  let patch = EntityPatch::Company(CompanyPatch {
    name: Some("Acme".into()),
    ..Default::default()
  });
  let err = s
    .update(EntityType::Deal, d.id(), &patch, Precondition::Any)
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::Core(_)));
}

// ─── Delete / transaction ────────────────────────────────────────────────────

#[tokio::test]
async fn delete_removes_row() {
  let s = store().await;
  let c = s.insert(company(Uuid::new_v4(), "Acme")).await.unwrap();
  assert!(s.delete(EntityType::Company, c.id()).await.unwrap());
  assert!(!s.delete(EntityType::Company, c.id()).await.unwrap());
  assert!(s.find_by_id(EntityType::Company, c.id()).await.unwrap().is_none());
}

#[tokio::test]
async fn transaction_commits_all_ops() {
  let s = store().await;
  let org = Uuid::new_v4();
  let acme = company(org, "Acme");
  let ada = contact(org, "ada@example.com", Some(acme.id()));

  let written = s
    .transaction(vec![WriteOp::Insert(acme.clone()), WriteOp::Insert(ada.clone())])
    .await
    .unwrap();
  assert_eq!(written.len(), 2);
  assert!(written.iter().all(|e| e.version() == 1));
  assert!(s.find_by_id(EntityType::Contact, ada.id()).await.unwrap().is_some());
}

#[tokio::test]
async fn transaction_rolls_back_on_failed_precondition() {
  let s = store().await;
  let org = Uuid::new_v4();
  let existing = s.insert(deal(org, "lead", None)).await.unwrap();
  let fresh = company(org, "Globex");

  let err = s
    .transaction(vec![
      WriteOp::Insert(fresh.clone()),
      WriteOp::Update {
        entity_type:  EntityType::Deal,
        id:           existing.id(),
        patch:        won_patch(),
        precondition: Precondition::Version(7),
      },
    ])
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::VersionMismatch { expected: 7, current: 1, .. }
  ));

  // The insert that preceded the failure was rolled back.
  assert!(s.find_by_id(EntityType::Company, fresh.id()).await.unwrap().is_none());
  let untouched = s.find_by_id(EntityType::Deal, existing.id()).await.unwrap().unwrap();
  assert_eq!(untouched.version(), 1);
}

#[tokio::test]
async fn transaction_delete_of_missing_row_errors() {
  let s = store().await;
  let err = s
    .transaction(vec![WriteOp::Delete {
      entity_type: EntityType::Activity,
      id:          Uuid::new_v4(),
    }])
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::NotFound { .. }));
}
