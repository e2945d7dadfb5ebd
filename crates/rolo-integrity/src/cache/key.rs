//! Structured cache keys, key patterns and dependency tags.
//!
//! Keys are tuples rather than strings, so invalidation is a predicate over
//! key fields ([`KeyPattern::matches`]) and two query shapes can only collide
//! if their filter hashes do.

use std::fmt;

use rolo_core::{Entity, EntityType, filter::EntityFilter};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ─── Keys ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
  /// A single entity read.
  Entity {
    entity_type: EntityType,
    id:          Uuid,
  },
  /// A multi-id read; `ids_hash` covers the sorted, de-duplicated id set.
  Batch {
    entity_type: EntityType,
    ids_hash:    String,
  },
  /// A filtered list; `filter_hash` covers the canonical filter, pagination
  /// included.
  List {
    entity_type:     EntityType,
    organization_id: Option<Uuid>,
    filter_hash:     String,
  },
  /// The per-organization dashboard aggregate.
  Dashboard { organization_id: Uuid },
  /// A named analytics view, e.g. `"pipeline"`.
  Analytics {
    organization_id: Uuid,
    view:            String,
  },
}

fn sha256_hex(input: &str) -> String { hex::encode(Sha256::digest(input.as_bytes())) }

impl CacheKey {
  pub fn entity(entity_type: EntityType, id: Uuid) -> Self { Self::Entity { entity_type, id } }

  /// Order and duplicates in `ids` do not affect the key.
  pub fn batch(entity_type: EntityType, ids: &[Uuid]) -> Self {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let joined = sorted
      .iter()
      .map(Uuid::to_string)
      .collect::<Vec<_>>()
      .join(",");
    Self::Batch {
      entity_type,
      ids_hash: sha256_hex(&joined),
    }
  }

  pub fn list(filter: &EntityFilter) -> rolo_core::Result<Self> {
    Ok(Self::List {
      entity_type:     filter.entity_type(),
      organization_id: filter.organization_id(),
      filter_hash:     sha256_hex(&filter.canonical()?),
    })
  }

  pub fn dashboard(organization_id: Uuid) -> Self { Self::Dashboard { organization_id } }

  pub fn analytics(organization_id: Uuid, view: impl Into<String>) -> Self {
    Self::Analytics {
      organization_id,
      view: view.into(),
    }
  }

  pub fn entity_type(&self) -> Option<EntityType> {
    match self {
      Self::Entity { entity_type, .. }
      | Self::Batch { entity_type, .. }
      | Self::List { entity_type, .. } => Some(*entity_type),
      Self::Dashboard { .. } | Self::Analytics { .. } => None,
    }
  }

  /// The organization embedded in the key itself. Entity and batch keys
  /// carry none; their tenant is reachable through dependency tags.
  pub fn organization_id(&self) -> Option<Uuid> {
    match self {
      Self::List { organization_id, .. } => *organization_id,
      Self::Dashboard { organization_id } | Self::Analytics { organization_id, .. } => {
        Some(*organization_id)
      }
      Self::Entity { .. } | Self::Batch { .. } => None,
    }
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Entity { entity_type, id } => write!(f, "{entity_type}:{id}"),
      Self::Batch { entity_type, ids_hash } => write!(f, "batch:{entity_type}:{}", &ids_hash[..12]),
      Self::List {
        entity_type,
        organization_id,
        filter_hash,
      } => match organization_id {
        Some(org) => write!(f, "list:{entity_type}:{org}:{}", &filter_hash[..12]),
        None => write!(f, "list:{entity_type}:*:{}", &filter_hash[..12]),
      },
      Self::Dashboard { organization_id } => write!(f, "dashboard:{organization_id}"),
      Self::Analytics {
        organization_id,
        view,
      } => write!(f, "{view}:analytics:{organization_id}"),
    }
  }
}

// ─── Patterns ────────────────────────────────────────────────────────────────

/// A structural predicate over [`CacheKey`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
  /// List keys of one type, in any organization.
  Lists(EntityType),
  /// Every key that embeds this organization.
  Organization(Uuid),
  Dashboards,
  Analytics,
}

impl KeyPattern {
  pub fn matches(&self, key: &CacheKey) -> bool {
    match self {
      Self::Lists(ty) => matches!(key, CacheKey::List { entity_type, .. } if entity_type == ty),
      Self::Organization(org) => key.organization_id() == Some(*org),
      Self::Dashboards => matches!(key, CacheKey::Dashboard { .. }),
      Self::Analytics => matches!(key, CacheKey::Analytics { .. }),
    }
  }
}

// ─── Dependency tags ─────────────────────────────────────────────────────────

/// A label tying a cache entry to something other than its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyTag {
  Entity(EntityType, Uuid),
  Organization(Uuid),
}

impl fmt::Display for DependencyTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Entity(ty, id) => write!(f, "{ty}:{id}"),
      Self::Organization(org) => write!(f, "org:{org}"),
    }
  }
}

/// A value the cache manager may store. Implementors name the entities and
/// tenants their content derives from.
pub trait Cacheable: Clone + Send + Sync + 'static {
  fn dependency_tags(&self) -> Vec<DependencyTag> { Vec::new() }
}

impl Cacheable for Entity {
  /// The entity itself, everything it references, and its organization.
  fn dependency_tags(&self) -> Vec<DependencyTag> {
    let mut tags = vec![
      DependencyTag::Entity(self.entity_type(), self.id()),
      DependencyTag::Organization(self.organization_id()),
    ];
    tags.extend(
      self
        .references()
        .into_iter()
        .map(|(ty, id)| DependencyTag::Entity(ty, id)),
    );
    tags
  }
}

impl<T: Cacheable> Cacheable for Vec<T> {
  fn dependency_tags(&self) -> Vec<DependencyTag> {
    let mut tags: Vec<_> = self.iter().flat_map(Cacheable::dependency_tags).collect();
    tags.sort_unstable();
    tags.dedup();
    tags
  }
}

impl<T: Cacheable> Cacheable for Option<T> {
  fn dependency_tags(&self) -> Vec<DependencyTag> {
    self.as_ref().map(Cacheable::dependency_tags).unwrap_or_default()
  }
}
