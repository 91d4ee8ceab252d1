//! Handler for `GET /stats`.
//!
//! Aggregates the transition log over a trailing window (`24h`, `7d` or
//! `30d`) into per-source counts and availability, and attaches an uptime
//! reconstruction over the full log.

use std::collections::BTreeMap;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use wattline_core::{
  event::{Event, SourceState, format_timestamp, parse_timestamp},
  store::{ConfigStore, EventQuery, EventStore, SortOrder},
  timeline::{UptimeReport, reconstruct},
};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct StatsParams {
  /// Trailing window: `24h` (default), `7d` or `30d`.
  pub period: Option<String>,
  /// Restrict aggregates and uptime to one source.
  pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SourceStats {
  pub display_name:     String,
  /// Transitions recorded inside the window, all states.
  pub events:           usize,
  pub failures:         usize,
  pub instabilities:    usize,
  pub errors:           usize,
  pub recoveries:       usize,
  /// Voltage aggregates over transitions that carried a reading.
  pub voltage_min:      Option<f64>,
  pub voltage_max:      Option<f64>,
  pub voltage_mean:     Option<f64>,
  pub downtime_seconds: f64,
  pub availability_pct: f64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
  pub period:       String,
  pub since:        String,
  pub generated_at: String,
  pub sources:      BTreeMap<String, SourceStats>,
  pub uptime:       UptimeReport,
}

fn parse_period(period: &str) -> Result<Duration, ApiError> {
  match period {
    "24h" => Ok(Duration::hours(24)),
    "7d" => Ok(Duration::days(7)),
    "30d" => Ok(Duration::days(30)),
    other => Err(ApiError::BadRequest(format!(
      "unknown period: {other} (expected 24h, 7d or 30d)"
    ))),
  }
}

/// Seconds spent in `FAILED` across `events`, which must be sorted oldest
/// first. A failure still open at `now` counts up to `now`.
fn downtime_seconds(
  events: &[&Event],
  window_start: NaiveDateTime,
  now: NaiveDateTime,
) -> f64 {
  let mut down_since: Option<NaiveDateTime> = None;
  let mut total = 0.0;

  for event in events {
    let Ok(at) = parse_timestamp(&event.timestamp) else {
      continue;
    };
    let at = at.max(window_start);
    if event.state == SourceState::Failed {
      down_since.get_or_insert(at);
    } else if let Some(start) = down_since.take() {
      total += (at - start).num_milliseconds() as f64 / 1000.0;
    }
  }
  if let Some(start) = down_since {
    total += (now - start).num_milliseconds() as f64 / 1000.0;
  }
  total.max(0.0)
}

/// `GET /stats[?period=24h|7d|30d][&source=...]`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<StatsParams>,
) -> Result<Json<StatsResponse>, ApiError>
where
  S: EventStore + ConfigStore,
{
  let period = params.period.unwrap_or_else(|| "24h".to_owned());
  let window = parse_period(&period)?;
  let now = Utc::now().naive_utc();
  let window_start = now - window;

  let config = state.config.snapshot().await;
  if let Some(source) = &params.source
    && !config.sources.contains_key(source)
  {
    return Err(ApiError::BadRequest(format!("unknown source: {source}")));
  }

  let windowed = state
    .store
    .query(EventQuery {
      source: params.source.clone(),
      since: Some(format_timestamp(window_start)),
      order: SortOrder::Ascending,
      ..EventQuery::default()
    })
    .await
    .map_err(ApiError::storage)?;

  let mut sources = BTreeMap::new();
  for (key, cfg) in &config.sources {
    if let Some(filter) = &params.source
      && filter != key
    {
      continue;
    }
    let events: Vec<&Event> =
      windowed.iter().filter(|e| &e.source == key).collect();
    let count =
      |state| events.iter().filter(|e| e.state == state).count();

    let voltages: Vec<f64> = events.iter().filter_map(|e| e.voltage).collect();
    let round2 = |v: f64| (v * 100.0).round() / 100.0;
    let voltage_mean = (!voltages.is_empty())
      .then(|| round2(voltages.iter().sum::<f64>() / voltages.len() as f64));

    let downtime = downtime_seconds(&events, window_start, now);
    let window_secs = window.num_milliseconds() as f64 / 1000.0;
    let availability =
      ((window_secs - downtime) / window_secs * 10_000.0).round() / 100.0;

    sources.insert(key.clone(), SourceStats {
      display_name:     cfg.display_name.clone(),
      events:           events.len(),
      failures:         count(SourceState::Failed),
      instabilities:    count(SourceState::Unstable),
      errors:           count(SourceState::Error),
      recoveries:       count(SourceState::Active),
      voltage_min:      voltages.iter().copied().reduce(f64::min).map(round2),
      voltage_max:      voltages.iter().copied().reduce(f64::max).map(round2),
      voltage_mean,
      downtime_seconds: downtime,
      availability_pct: availability.clamp(0.0, 100.0),
    });
  }

  // Uptime looks beyond the window: the last failure may predate it. The
  // query is newest-first so that when the log exceeds the row cap the
  // *recent* history survives the clamp; `reconstruct` re-sorts anyway.
  let full_log = state
    .store
    .query(EventQuery {
      source: params.source.clone(),
      ..EventQuery::default()
    })
    .await
    .map_err(ApiError::storage)?;

  let source_keys = config.source_keys();
  let uptime = reconstruct(
    params.source.as_deref(),
    &source_keys,
    &full_log,
    now,
    state.process_start,
  );

  Ok(Json(StatsResponse {
    period,
    since: format_timestamp(window_start),
    generated_at: format_timestamp(now),
    sources,
    uptime,
  }))
}
