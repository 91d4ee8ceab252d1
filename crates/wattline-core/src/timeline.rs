//! Timeline reconstruction — replays the event log to answer uptime
//! questions.
//!
//! Two questions are answered from the same log:
//!
//! - per-source: "how long since this source last failed?"
//! - system-wide: "how long since the last *total blackout* ended?", where a
//!   total blackout is an interval during which every configured source was
//!   simultaneously `FAILED`.
//!
//! The log carries no "system start" marker, so both modes fall back to the
//! engine's own process start instant when the window contains no qualifying
//! event. Replay bootstraps every source to `Active`, mirroring the polling
//! loop's own startup assumption.
//!
//! Reconstruction never fails: records whose timestamps parse under neither
//! accepted format are skipped with a diagnostic, and the result is
//! independent of the order the store returned the events in (they are
//! re-sorted by timestamp, ties broken by insertion id).

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::event::{Event, SourceState, parse_timestamp};

// ─── Result types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UptimeMode {
  Source,
  System,
}

/// An interval during which every configured source was `FAILED`.
/// Derived on demand; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlackoutPeriod {
  pub start: NaiveDateTime,
  /// `None` while the blackout is still ongoing.
  pub end:   Option<NaiveDateTime>,
}

/// The answer to an uptime query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UptimeReport {
  pub uptime_seconds: f64,
  pub mode:           UptimeMode,
  /// Per-source mode: the last failure instant. System mode: the start of
  /// the last total blackout. `None` when neither occurred in-window.
  pub marker:         Option<NaiveDateTime>,
  /// Set in per-source mode only.
  pub source:         Option<String>,
}

// ─── Reconstruction ──────────────────────────────────────────────────────────

/// Replay `events` and compute the uptime report.
///
/// `source_filter` selects per-source mode; otherwise the system-wide
/// blackout reconstruction runs over `sources` (the configured source keys).
/// `now` and `process_start` are injected so the algorithm stays pure and
/// testable.
pub fn reconstruct(
  source_filter: Option<&str>,
  sources: &[String],
  events: &[Event],
  now: NaiveDateTime,
  process_start: NaiveDateTime,
) -> UptimeReport {
  match source_filter {
    Some(source) => source_uptime(source, events, now, process_start),
    None => system_uptime(sources, events, now, process_start),
  }
}

fn seconds_between(later: NaiveDateTime, earlier: NaiveDateTime) -> f64 {
  (later - earlier).num_milliseconds() as f64 / 1000.0
}

/// Parse and chronologically sort the usable slice of `events`.
///
/// Stable ordering on `(timestamp, id)` makes the result independent of the
/// order the store handed the events back in.
fn parsed_sorted(events: &[Event]) -> Vec<(NaiveDateTime, &Event)> {
  let mut parsed: Vec<(NaiveDateTime, &Event)> = events
    .iter()
    .filter_map(|event| match parse_timestamp(&event.timestamp) {
      Ok(at) => Some((at, event)),
      Err(_) => {
        tracing::debug!(
          source = %event.source,
          timestamp = %event.timestamp,
          "skipping event with unparseable timestamp"
        );
        None
      }
    })
    .collect();
  parsed.sort_by_key(|(at, event)| (*at, event.id));
  parsed
}

// ─── Per-source mode ─────────────────────────────────────────────────────────

fn source_uptime(
  source: &str,
  events: &[Event],
  now: NaiveDateTime,
  process_start: NaiveDateTime,
) -> UptimeReport {
  let last_failure = parsed_sorted(events)
    .into_iter()
    .filter(|(_, e)| e.source == source && e.state == SourceState::Failed)
    .next_back();

  let (uptime_seconds, marker) = match last_failure {
    Some((at, _)) => (seconds_between(now, at), Some(at)),
    // No failure in the queried window. Without a persisted boot marker the
    // engine's own start is the only honest lower bound.
    None => (seconds_between(now, process_start), None),
  };

  UptimeReport {
    uptime_seconds,
    mode: UptimeMode::Source,
    marker,
    source: Some(source.to_owned()),
  }
}

// ─── System-wide mode ────────────────────────────────────────────────────────

fn system_uptime(
  sources: &[String],
  events: &[Event],
  now: NaiveDateTime,
  process_start: NaiveDateTime,
) -> UptimeReport {
  // "All of an empty set is failed" would be vacuously true; an empty
  // configuration means no blackout can exist, which is not the same as
  // "never had one".
  if sources.is_empty() {
    return UptimeReport {
      uptime_seconds: seconds_between(now, process_start),
      mode:           UptimeMode::System,
      marker:         None,
      source:         None,
    };
  }

  let mut states: BTreeMap<&str, SourceState> = sources
    .iter()
    .map(|s| (s.as_str(), SourceState::Active))
    .collect();

  let mut open_start: Option<NaiveDateTime> = None;
  let mut closed: Vec<BlackoutPeriod> = Vec::new();

  for (at, event) in parsed_sorted(events) {
    // Events for sources no longer configured cannot affect "all configured
    // sources failed".
    let Some(slot) = states.get_mut(event.source.as_str()) else {
      continue;
    };
    *slot = event.state;

    let all_failed = states.values().all(|s| *s == SourceState::Failed);
    if all_failed && open_start.is_none() {
      open_start = Some(at);
    } else if !all_failed && let Some(start) = open_start.take() {
      closed.push(BlackoutPeriod { start, end: Some(at) });
    }
  }

  let currently_all_failed =
    states.values().all(|s| *s == SourceState::Failed);

  if let Some(start) = open_start
    && currently_all_failed
  {
    // Still dark: no uptime to report, point at where it began.
    return UptimeReport {
      uptime_seconds: 0.0,
      mode:           UptimeMode::System,
      marker:         Some(start),
      source:         None,
    };
  }

  if let Some(last) = closed.last() {
    let end = last.end.unwrap_or(now);
    return UptimeReport {
      uptime_seconds: seconds_between(now, end),
      mode:           UptimeMode::System,
      marker:         Some(last.start),
      source:         None,
    };
  }

  UptimeReport {
    uptime_seconds: seconds_between(now, process_start),
    mode:           UptimeMode::System,
    marker:         None,
    source:         None,
  }
}
