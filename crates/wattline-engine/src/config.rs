//! [`SharedConfig`] — the single owner of the runtime-mutable engine
//! configuration.
//!
//! Thresholds and tuning are adjustable at runtime through the API while the
//! monitor keeps polling; both sides go through this handle rather than any
//! ambient global. The monitor takes a fresh snapshot each tick, so an
//! update applies from the next tick onward.

use std::sync::Arc;

use tokio::sync::RwLock;
use wattline_core::config::EngineConfig;

#[derive(Clone)]
pub struct SharedConfig {
  inner: Arc<RwLock<EngineConfig>>,
}

impl SharedConfig {
  pub fn new(config: EngineConfig) -> Self {
    Self { inner: Arc::new(RwLock::new(config)) }
  }

  /// Clone out the current configuration.
  pub async fn snapshot(&self) -> EngineConfig {
    self.inner.read().await.clone()
  }

  pub async fn poll_interval_secs(&self) -> f64 {
    self.inner.read().await.poll_interval_secs
  }

  pub async fn source_keys(&self) -> Vec<String> {
    self.inner.read().await.source_keys()
  }

  /// Apply a mutation under the write lock. The closure's own validation
  /// decides whether anything changes; an `Err` leaves whatever the closure
  /// already wrote, so callers mutate only after validating.
  pub async fn update<T>(
    &self,
    apply: impl FnOnce(&mut EngineConfig) -> wattline_core::Result<T>,
  ) -> wattline_core::Result<T> {
    let mut guard = self.inner.write().await;
    apply(&mut guard)
  }
}
