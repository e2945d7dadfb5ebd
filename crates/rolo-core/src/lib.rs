//! Core types for the Rolo CRM data layer: entities, filters, patches, field
//! rules, and the [`store::EntityStore`] seam that storage backends implement.
//!
//! No HTTP or database dependencies live here.

pub mod entity;
pub mod error;
pub mod filter;
pub mod patch;
pub mod rules;
pub mod store;

pub use entity::{Entity, EntityType};
pub use error::{Error, Result};
