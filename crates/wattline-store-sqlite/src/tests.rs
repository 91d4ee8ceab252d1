//! Integration tests for `SqliteStore` against an in-memory database.

use wattline_core::{
  config::ConfigValue,
  event::{NewEvent, SourceState},
  store::{ConfigStore, EventQuery, EventStore, SortOrder},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn transition(source: &str, state: SourceState, ts: &str) -> NewEvent {
  NewEvent {
    source:    source.to_owned(),
    state,
    voltage:   Some(117.3),
    timestamp: ts.to_owned(),
  }
}

// ─── Append / dedup ──────────────────────────────────────────────────────────

#[tokio::test]
async fn append_and_query_roundtrip() {
  let s = store().await;

  let inserted = s
    .append(transition("mains", SourceState::Failed, "2024-06-01 10:00:00"))
    .await
    .unwrap();
  assert!(inserted);

  let events = s.query(EventQuery::default()).await.unwrap();
  assert_eq!(events.len(), 1);
  assert_eq!(events[0].source, "mains");
  assert_eq!(events[0].state, SourceState::Failed);
  assert_eq!(events[0].voltage, Some(117.3));
  assert_eq!(events[0].timestamp, "2024-06-01 10:00:00");
}

#[tokio::test]
async fn duplicate_triple_is_silently_dropped() {
  let s = store().await;

  let first = s
    .append(transition("mains", SourceState::Failed, "2024-06-01 10:00:00"))
    .await
    .unwrap();
  let second = s
    .append(transition("mains", SourceState::Failed, "2024-06-01 10:00:00"))
    .await
    .unwrap();

  assert!(first);
  assert!(!second);

  let events = s.query(EventQuery::default()).await.unwrap();
  assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn dedup_ignores_voltage() {
  let s = store().await;

  s.append(transition("mains", SourceState::Failed, "2024-06-01 10:00:00"))
    .await
    .unwrap();

  let mut same_triple_new_voltage =
    transition("mains", SourceState::Failed, "2024-06-01 10:00:00");
  same_triple_new_voltage.voltage = Some(42.0);
  let inserted = s.append(same_triple_new_voltage).await.unwrap();
  assert!(!inserted);

  // The first write's voltage wins.
  let events = s.query(EventQuery::default()).await.unwrap();
  assert_eq!(events[0].voltage, Some(117.3));
}

#[tokio::test]
async fn different_state_same_second_is_distinct() {
  let s = store().await;

  assert!(
    s.append(transition("mains", SourceState::Failed, "2024-06-01 10:00:00"))
      .await
      .unwrap()
  );
  assert!(
    s.append(transition("mains", SourceState::Active, "2024-06-01 10:00:00"))
      .await
      .unwrap()
  );

  let events = s.query(EventQuery::default()).await.unwrap();
  assert_eq!(events.len(), 2);
}

// ─── Query ordering and filters ──────────────────────────────────────────────

async fn seeded() -> SqliteStore {
  let s = store().await;
  s.append(transition("mains", SourceState::Failed, "2024-06-01 10:00:00"))
    .await
    .unwrap();
  s.append(transition("solar", SourceState::Failed, "2024-06-01 10:05:00"))
    .await
    .unwrap();
  s.append(transition("mains", SourceState::Active, "2024-06-01 10:10:00"))
    .await
    .unwrap();
  s
}

#[tokio::test]
async fn default_order_is_newest_first() {
  let s = seeded().await;
  let events = s.query(EventQuery::default()).await.unwrap();
  assert_eq!(events[0].timestamp, "2024-06-01 10:10:00");
  assert_eq!(events[2].timestamp, "2024-06-01 10:00:00");
}

#[tokio::test]
async fn ascending_order_for_replay() {
  let s = seeded().await;
  let events = s
    .query(EventQuery {
      order: SortOrder::Ascending,
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(events[0].timestamp, "2024-06-01 10:00:00");
  assert_eq!(events[2].timestamp, "2024-06-01 10:10:00");
}

#[tokio::test]
async fn tied_timestamps_order_by_insertion() {
  let s = store().await;
  s.append(transition("mains", SourceState::Failed, "2024-06-01 10:00:00"))
    .await
    .unwrap();
  s.append(transition("mains", SourceState::Active, "2024-06-01 10:00:00"))
    .await
    .unwrap();

  let asc = s
    .query(EventQuery {
      order: SortOrder::Ascending,
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(asc[0].state, SourceState::Failed);
  assert_eq!(asc[1].state, SourceState::Active);
  assert!(asc[0].id < asc[1].id);
}

#[tokio::test]
async fn filter_by_source() {
  let s = seeded().await;
  let events = s
    .query(EventQuery {
      source: Some("mains".to_owned()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(events.len(), 2);
  assert!(events.iter().all(|e| e.source == "mains"));
}

#[tokio::test]
async fn filter_by_time_window() {
  let s = seeded().await;
  let events = s
    .query(EventQuery {
      since: Some("2024-06-01 10:01:00".to_owned()),
      until: Some("2024-06-01 10:09:00".to_owned()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(events.len(), 1);
  assert_eq!(events[0].source, "solar");
}

#[tokio::test]
async fn limit_is_applied() {
  let s = seeded().await;
  let events = s
    .query(EventQuery {
      limit: Some(2),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(events.len(), 2);
}

// ─── Settings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn setting_kinds_roundtrip() {
  let s = store().await;

  let cases = vec![
    ("interval", ConfigValue::Float(2.5)),
    ("ratio", ConfigValue::Int(70)),
    ("notify", ConfigValue::Bool(true)),
    (
      "thresholds",
      ConfigValue::Json(serde_json::json!({"mains": 180.0})),
    ),
    ("label", ConfigValue::Text("hello".to_owned())),
  ];

  for (key, value) in &cases {
    s.put_setting(key, value.clone(), "test").await.unwrap();
  }
  for (key, value) in &cases {
    let got = s.get_setting(key).await.unwrap();
    assert_eq!(got.as_ref(), Some(value), "key {key}");
  }
}

/// Drives the settings methods through the trait with borrowed keys, the way
/// generic callers (settings bootstrap, API handlers) do.
async fn write_then_read<S: ConfigStore>(
  store: &S,
  key: &str,
) -> Option<ConfigValue> {
  store
    .put_setting(key, ConfigValue::Int(7), "test")
    .await
    .ok()?;
  store.get_setting(key).await.ok().flatten()
}

#[tokio::test]
async fn settings_work_through_the_trait() {
  let s = store().await;
  let key = String::from("generic_key");
  let got = write_then_read(&s, &key).await;
  assert_eq!(got, Some(ConfigValue::Int(7)));
}

#[tokio::test]
async fn missing_setting_is_none() {
  let s = store().await;
  assert!(s.get_setting("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn put_overwrites_existing() {
  let s = store().await;
  s.put_setting("ratio", ConfigValue::Int(70), "test")
    .await
    .unwrap();
  s.put_setting("ratio", ConfigValue::Int(85), "test")
    .await
    .unwrap();
  assert_eq!(
    s.get_setting("ratio").await.unwrap(),
    Some(ConfigValue::Int(85))
  );
}

#[tokio::test]
async fn seed_does_not_clobber_operator_changes() {
  let s = store().await;
  s.put_setting("ratio", ConfigValue::Int(85), "operator")
    .await
    .unwrap();
  s.seed_setting("ratio", ConfigValue::Int(70)).await.unwrap();
  assert_eq!(
    s.get_setting("ratio").await.unwrap(),
    Some(ConfigValue::Int(85))
  );

  s.seed_setting("fresh", ConfigValue::Bool(false))
    .await
    .unwrap();
  assert_eq!(
    s.get_setting("fresh").await.unwrap(),
    Some(ConfigValue::Bool(false))
  );
}
