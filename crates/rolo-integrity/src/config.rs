//! Tunables for the cache, concurrency controller, monitor and validator.
//!
//! Every struct deserialises with defaults for missing fields, so an empty
//! `[integrity]` table yields [`IntegrityConfig::default`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::concurrency::{Backoff, ConflictStrategy, RetryPolicy};

// ─── Cache ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// TTL applied when a caller does not pass one.
  pub default_ttl_secs:    u64,
  /// Period of the background expiry sweep. `0` disables the sweeper.
  pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      default_ttl_secs:    300,
      sweep_interval_secs: 60,
    }
  }
}

impl CacheConfig {
  pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl_secs = ttl.as_secs();
    self
  }

  pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
    self.sweep_interval_secs = interval.as_secs();
    self
  }

  pub fn default_ttl(&self) -> Duration { Duration::from_secs(self.default_ttl_secs) }

  /// `None` when sweeping is disabled.
  pub fn sweep_interval(&self) -> Option<Duration> {
    (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
  }
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

/// Which [`ConflictStrategy`] callers get when they do not name one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
  FailFast,
  LastWriterWins,
  #[default]
  Retry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
  pub max_retries:      u32,
  pub backoff:          Backoff,
  pub default_strategy: StrategyKind,
}

impl Default for ConcurrencyConfig {
  fn default() -> Self {
    Self {
      max_retries:      3,
      backoff:          Backoff::Fixed { delay_ms: 50 },
      default_strategy: StrategyKind::Retry,
    }
  }
}

impl ConcurrencyConfig {
  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_retries: self.max_retries,
      backoff:     self.backoff.clone(),
    }
  }

  pub fn default_strategy(&self) -> ConflictStrategy {
    match self.default_strategy {
      StrategyKind::FailFast => ConflictStrategy::FailFast,
      StrategyKind::LastWriterWins => ConflictStrategy::LastWriterWins,
      StrategyKind::Retry => ConflictStrategy::Retry(self.retry_policy()),
    }
  }
}

// ─── Monitor ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
  /// Samples strictly longer than this are logged and counted as slow.
  pub slow_threshold_ms: u64,
}

impl Default for MonitorConfig {
  fn default() -> Self { Self { slow_threshold_ms: 1000 } }
}

impl MonitorConfig {
  pub fn slow_threshold(&self) -> Duration { Duration::from_millis(self.slow_threshold_ms) }
}

// ─── Top level ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
  pub cache:                  CacheConfig,
  pub concurrency:            ConcurrencyConfig,
  pub monitor:                MonitorConfig,
  /// Maximum in-flight entity validations during an organization scan.
  pub validation_concurrency: usize,
}

impl Default for IntegrityConfig {
  fn default() -> Self {
    Self {
      cache:                  CacheConfig::default(),
      concurrency:            ConcurrencyConfig::default(),
      monitor:                MonitorConfig::default(),
      validation_concurrency: 8,
    }
  }
}
