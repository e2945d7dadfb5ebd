//! Data integrity for the Rolo CRM data layer.
//!
//! Sits between request handlers and an [`EntityStore`](rolo_core::store::EntityStore):
//!
//! - [`CacheManager`] serves reads from an in-process TTL cache, checks what
//!   it returns and invalidates dependent entries when entities change.
//! - [`IntegrityValidator`] checks referential integrity, business rules and
//!   tenant isolation.
//! - [`ConcurrencyController`] applies optimistic-locking updates under a
//!   [`ConflictStrategy`].
//! - [`PerformanceMonitor`] times every operation above and flags slow ones.
//!
//! [`DataLayer`] wires them together from an [`IntegrityConfig`].

pub mod cache;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod layer;
pub mod monitor;
pub mod reports;
pub mod validator;

#[cfg(test)]
mod fixtures;

pub use cache::{
  CacheKey, CacheManager, CacheStats, CacheStore, Cacheable, DependencyTag, KeyPattern, Validator,
};
pub use concurrency::{Backoff, ConcurrencyController, ConflictStrategy, RetryPolicy};
pub use config::{CacheConfig, ConcurrencyConfig, IntegrityConfig, MonitorConfig, StrategyKind};
pub use error::{Error, Result};
pub use layer::DataLayer;
pub use monitor::{OperationMetrics, PerformanceMonitor};
pub use reports::{Dashboard, Pipeline, Reports, StageSummary};
pub use validator::{IntegrityCheckResult, IntegrityValidator};
