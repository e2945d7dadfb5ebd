//! Operation timing.
//!
//! Recording a sample never fails and never changes what the timed operation
//! returns; slow samples are only logged and counted.

use std::{
  collections::{BTreeMap, HashMap},
  future::Future,
  sync::{Mutex, PoisonError},
  time::Duration,
};

use serde::Serialize;
use tokio::time::Instant;
use tracing::warn;

/// Aggregate timings for one operation name. Times are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationMetrics {
  pub count:         u64,
  pub total_time_ms: f64,
  pub avg_time_ms:   f64,
  pub max_time_ms:   f64,
  pub slow_count:    u64,
}

impl OperationMetrics {
  fn record(&mut self, elapsed: Duration, slow: bool) {
    let ms = elapsed.as_micros() as f64 / 1000.0;
    self.count += 1;
    self.total_time_ms += ms;
    self.avg_time_ms = self.total_time_ms / self.count as f64;
    self.max_time_ms = self.max_time_ms.max(ms);
    if slow {
      self.slow_count += 1;
    }
  }
}

pub struct PerformanceMonitor {
  metrics:        Mutex<HashMap<String, OperationMetrics>>,
  slow_threshold: Duration,
}

impl Default for PerformanceMonitor {
  fn default() -> Self { Self::new(Duration::from_millis(1000)) }
}

impl PerformanceMonitor {
  pub fn new(slow_threshold: Duration) -> Self {
    Self {
      metrics: Mutex::new(HashMap::new()),
      slow_threshold,
    }
  }

  /// Start timing `operation`. Calling the returned closure records one
  /// sample and hands back its duration.
  pub fn start_timer(&self, operation: impl Into<String>) -> impl FnOnce() -> Duration + Send + '_ {
    let operation = operation.into();
    let started = Instant::now();
    move || {
      let elapsed = started.elapsed();
      self.record(operation, elapsed);
      elapsed
    }
  }

  /// Await `fut`, recording its duration under `operation`.
  pub async fn measure<F: Future>(&self, operation: &str, fut: F) -> F::Output {
    let stop = self.start_timer(operation);
    let output = fut.await;
    stop();
    output
  }

  fn record(&self, operation: String, elapsed: Duration) {
    let slow = elapsed > self.slow_threshold;
    if slow {
      warn!(
        operation = %operation,
        elapsed_ms = elapsed.as_millis() as u64,
        threshold_ms = self.slow_threshold.as_millis() as u64,
        "slow operation"
      );
    }
    self
      .metrics
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .entry(operation)
      .or_default()
      .record(elapsed, slow);
  }

  /// A snapshot keyed by operation name.
  pub fn get_metrics(&self) -> BTreeMap<String, OperationMetrics> {
    self
      .metrics
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .map(|(name, m)| (name.clone(), m.clone()))
      .collect()
  }

  pub fn reset_metrics(&self) {
    self.metrics.lock().unwrap_or_else(PoisonError::into_inner).clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test(start_paused = true)]
  async fn timer_records_count_total_and_average() {
    let monitor = PerformanceMonitor::default();

    for ms in [100, 300] {
      let stop = monitor.start_timer("cache.get_cached_data");
      tokio::time::advance(Duration::from_millis(ms)).await;
      stop();
    }

    let metrics = monitor.get_metrics();
    let m = &metrics["cache.get_cached_data"];
    assert_eq!(m.count, 2);
    assert_eq!(m.total_time_ms, 400.0);
    assert_eq!(m.avg_time_ms, 200.0);
    assert_eq!(m.max_time_ms, 300.0);
    assert_eq!(m.slow_count, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn slow_samples_are_counted_without_affecting_output() {
    let monitor = PerformanceMonitor::new(Duration::from_millis(1000));

    let value = monitor
      .measure("integrity.validate_organization", async {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        42
      })
      .await;
    assert_eq!(value, 42);

    monitor
      .measure("integrity.validate_organization", tokio::time::sleep(Duration::from_millis(900)))
      .await;

    let m = &monitor.get_metrics()["integrity.validate_organization"];
    assert_eq!(m.count, 2);
    assert_eq!(m.slow_count, 1);
  }

  #[tokio::test]
  async fn reset_clears_everything() {
    let monitor = PerformanceMonitor::default();
    monitor.measure("concurrency.safe_update", async {}).await;
    assert_eq!(monitor.get_metrics().len(), 1);
    monitor.reset_metrics();
    assert!(monitor.get_metrics().is_empty());
  }
}
