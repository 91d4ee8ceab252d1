//! [`Monitor`] — the polling loop.
//!
//! Samples every configured source each tick, classifies, appends an event
//! to the store on each detected transition, and pushes a full snapshot to
//! the broadcast channels whether or not anything changed.
//!
//! Failure policy, per tick:
//! - a read or classification fault on one source yields `ERROR` for that
//!   source and leaves the others untouched;
//! - a storage failure on append is logged and the in-memory previous state
//!   is *not* advanced, so the same transition is retried next tick instead
//!   of being lost behind a transient outage.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::{broadcast, watch};

use wattline_core::{
  classifier::classify,
  event::{NewEvent, Snapshot, SourceSample, SourceState, format_timestamp},
  store::EventStore,
};

use crate::{config::SharedConfig, source::VoltageSource};

/// How many snapshots a slow subscriber may fall behind before it starts
/// missing frames. Missing frames is the intended behavior: a stalled
/// websocket must not stall sampling.
pub const BROADCAST_CAPACITY: usize = 64;

pub struct Monitor<S: EventStore> {
  store:    S,
  source:   Box<dyn VoltageSource>,
  config:   SharedConfig,
  /// Last-known state per source. This loop is the only writer.
  previous: HashMap<String, SourceState>,
  live:     broadcast::Sender<Snapshot>,
  latest:   watch::Sender<Option<Snapshot>>,
  shutdown: watch::Receiver<bool>,
}

impl<S: EventStore> Monitor<S> {
  pub fn new(
    store: S,
    source: Box<dyn VoltageSource>,
    config: SharedConfig,
    live: broadcast::Sender<Snapshot>,
    latest: watch::Sender<Option<Snapshot>>,
    shutdown: watch::Receiver<bool>,
  ) -> Self {
    Self {
      store,
      source,
      config,
      previous: HashMap::new(),
      live,
      latest,
      shutdown,
    }
  }

  /// Run until the shutdown signal flips. The sleep between ticks is
  /// cancellable, so shutdown is observed within one select round rather
  /// than one polling interval.
  pub async fn run(mut self) {
    tracing::info!("monitor started");
    loop {
      let interval = self.config.poll_interval_secs().await;
      tokio::select! {
        changed = self.shutdown.changed() => {
          if changed.is_err() || *self.shutdown.borrow() {
            break;
          }
        }
        () = tokio::time::sleep(std::time::Duration::from_secs_f64(interval)) => {
          self.tick().await;
        }
      }
    }
    tracing::info!("monitor stopped");
  }

  /// One sampling round over all configured sources.
  pub async fn tick(&mut self) {
    let config = self.config.snapshot().await;
    let stamp = format_timestamp(Utc::now().naive_utc());
    let mut snapshot = Snapshot::new();

    for key in config.sources.keys() {
      let (voltage, state) = match self.source.read(key) {
        Ok(v) => (v, classify(key, v, &config)),
        Err(e) => {
          tracing::warn!(source = %key, error = %e, "voltage read failed");
          (0.0, SourceState::Error)
        }
      };

      // Every source starts as ACTIVE until observed otherwise; the log has
      // no boot marker, and reconstruction makes the same assumption.
      let prev = *self
        .previous
        .entry(key.clone())
        .or_insert(SourceState::Active);

      if state != prev {
        let append = self
          .store
          .append(NewEvent {
            source:    key.clone(),
            state,
            voltage:   Some(voltage),
            timestamp: stamp.clone(),
          })
          .await;

        match append {
          Ok(inserted) => {
            if inserted {
              tracing::info!(
                source = %key,
                from = prev.as_str(),
                to = state.as_str(),
                voltage,
                "state transition"
              );
            }
            self.previous.insert(key.clone(), state);
          }
          Err(e) => {
            // Not advancing `previous` means this transition is re-detected
            // and re-appended on the next tick.
            tracing::warn!(source = %key, error = %e, "failed to persist transition");
          }
        }
      }

      snapshot.insert(key.clone(), SourceSample {
        voltage: (voltage * 100.0).round() / 100.0,
        state,
        timestamp: stamp.clone(),
      });
    }

    self.latest.send_replace(Some(snapshot.clone()));
    // No live subscribers is normal; the send result only signals that.
    let _ = self.live.send(snapshot);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
  };

  use wattline_core::{
    config::{EngineConfig, SourceConfig},
    event::{Event, NewEvent},
    store::EventQuery,
  };

  use crate::source::SourceReadError;

  // ── Test doubles ───────────────────────────────────────────────────────

  #[derive(Debug, thiserror::Error)]
  #[error("storage down")]
  struct StoreDown;

  /// In-memory store with a switch to simulate a storage outage.
  #[derive(Clone, Default)]
  struct MemoryStore {
    events: Arc<Mutex<Vec<NewEvent>>>,
    broken: Arc<AtomicBool>,
  }

  impl MemoryStore {
    fn recorded(&self) -> Vec<NewEvent> {
      self.events.lock().unwrap().clone()
    }
  }

  impl EventStore for MemoryStore {
    type Error = StoreDown;

    async fn append(&self, event: NewEvent) -> Result<bool, StoreDown> {
      if self.broken.load(Ordering::SeqCst) {
        return Err(StoreDown);
      }
      let mut events = self.events.lock().unwrap();
      let duplicate = events.iter().any(|e| {
        e.source == event.source
          && e.state == event.state
          && e.timestamp == event.timestamp
      });
      if duplicate {
        return Ok(false);
      }
      events.push(event);
      Ok(true)
    }

    async fn query(&self, _query: EventQuery) -> Result<Vec<Event>, StoreDown> {
      unimplemented!("not exercised by monitor tests")
    }
  }

  /// Fixed voltage per source; sources not in the map fail to read.
  struct FixedSource(HashMap<String, f64>);

  impl VoltageSource for FixedSource {
    fn read(&mut self, source: &str) -> Result<f64, SourceReadError> {
      self.0.get(source).copied().ok_or_else(|| SourceReadError {
        key:    source.to_owned(),
        reason: "sensor offline".to_owned(),
      })
    }
  }

  fn test_config() -> EngineConfig {
    let mut sources = std::collections::BTreeMap::new();
    for key in ["a", "b"] {
      sources.insert(key.to_owned(), SourceConfig {
        display_name:    key.to_uppercase(),
        channel:         0,
        priority:        1,
        threshold_volts: 180.0,
        threshold_range: (100.0, 250.0),
      });
    }
    EngineConfig { sources, ..EngineConfig::default() }
  }

  fn monitor(
    store: MemoryStore,
    volts: &[(&str, f64)],
  ) -> (Monitor<MemoryStore>, watch::Receiver<Option<Snapshot>>) {
    let (live_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
    let (latest_tx, latest_rx) = watch::channel(None);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let source = FixedSource(
      volts
        .iter()
        .map(|(k, v)| ((*k).to_owned(), *v))
        .collect(),
    );
    let monitor = Monitor::new(
      store,
      Box::new(source),
      SharedConfig::new(test_config()),
      live_tx,
      latest_tx,
      shutdown_rx,
    );
    (monitor, latest_rx)
  }

  // ── Edge-triggered recording ───────────────────────────────────────────

  #[tokio::test]
  async fn constant_failure_records_one_event() {
    let store = MemoryStore::default();
    let (mut m, _) = monitor(store.clone(), &[("a", 10.0), ("b", 200.0)]);

    for _ in 0..20 {
      m.tick().await;
    }

    let events = store.recorded();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source, "a");
    assert_eq!(events[0].state, SourceState::Failed);
  }

  #[tokio::test]
  async fn healthy_sources_record_nothing() {
    // Bootstrap state is ACTIVE, so active readings are not transitions.
    let store = MemoryStore::default();
    let (mut m, _) = monitor(store.clone(), &[("a", 220.0), ("b", 200.0)]);

    for _ in 0..10 {
      m.tick().await;
    }
    assert!(store.recorded().is_empty());
  }

  // ── Storage failure handling ───────────────────────────────────────────

  #[tokio::test]
  async fn storage_outage_retries_transition_next_tick() {
    let store = MemoryStore::default();
    let (mut m, _) = monitor(store.clone(), &[("a", 10.0), ("b", 200.0)]);

    store.broken.store(true, Ordering::SeqCst);
    m.tick().await;
    assert!(store.recorded().is_empty());

    // Storage recovers; the same transition must be re-detected.
    store.broken.store(false, Ordering::SeqCst);
    m.tick().await;

    let events = store.recorded();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source, "a");
    assert_eq!(events[0].state, SourceState::Failed);

    // And only once.
    m.tick().await;
    assert_eq!(store.recorded().len(), 1);
  }

  // ── Per-source fault isolation ─────────────────────────────────────────

  #[tokio::test]
  async fn read_fault_maps_to_error_without_aborting_tick() {
    let store = MemoryStore::default();
    // "b" has no reading at all.
    let (mut m, latest) = monitor(store.clone(), &[("a", 220.0)]);

    m.tick().await;

    let snapshot = latest.borrow().clone().unwrap();
    assert_eq!(snapshot["a"].state, SourceState::Active);
    assert_eq!(snapshot["b"].state, SourceState::Error);
    assert_eq!(snapshot["b"].voltage, 0.0);

    // ERROR is a real transition from the bootstrap ACTIVE state.
    let events = store.recorded();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source, "b");
    assert_eq!(events[0].state, SourceState::Error);
  }

  // ── Snapshots ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn snapshot_is_published_every_tick() {
    let store = MemoryStore::default();
    let (mut m, _) = monitor(store.clone(), &[("a", 220.0), ("b", 200.0)]);
    let mut live = m.live.subscribe();

    m.tick().await;
    m.tick().await;

    // Two frames even though nothing transitioned.
    let first = live.recv().await.unwrap();
    let second = live.recv().await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    assert!((first["a"].voltage - 220.0).abs() < f64::EPSILON);
  }

  #[tokio::test]
  async fn recovery_after_failure_records_both_edges() {
    let store = MemoryStore::default();
    let (mut m, _) = monitor(store.clone(), &[("a", 10.0), ("b", 200.0)]);
    m.tick().await;

    // Source recovers.
    m.source = Box::new(FixedSource(
      [("a".to_owned(), 220.0), ("b".to_owned(), 200.0)].into(),
    ));
    m.tick().await;

    let states: Vec<SourceState> =
      store.recorded().iter().map(|e| e.state).collect();
    assert_eq!(states, vec![SourceState::Failed, SourceState::Active]);
  }
}
