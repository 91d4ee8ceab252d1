//! Event types — the persisted unit of the Wattline state engine.
//!
//! An event records a single detected state transition for one source.
//! Events are never updated or deleted; the log is strictly append-only,
//! and the `(source, state, timestamp)` triple is unique at second
//! granularity.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── State ───────────────────────────────────────────────────────────────────

/// Discrete health classification of a power source.
///
/// `Error` is a sentinel for "could not evaluate" (sensor fault, missing
/// configuration). It participates in transition detection like any other
/// state; it is never swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceState {
  Active,
  Unstable,
  Failed,
  Error,
}

impl SourceState {
  pub fn as_str(self) -> &'static str {
    match self {
      SourceState::Active => "ACTIVE",
      SourceState::Unstable => "UNSTABLE",
      SourceState::Failed => "FAILED",
      SourceState::Error => "ERROR",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "ACTIVE" => Some(SourceState::Active),
      "UNSTABLE" => Some(SourceState::Unstable),
      "FAILED" => Some(SourceState::Failed),
      "ERROR" => Some(SourceState::Error),
      _ => None,
    }
  }
}

// ─── Timestamps ──────────────────────────────────────────────────────────────

/// Canonical on-disk timestamp format, second granularity.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp the way the engine writes it.
pub fn format_timestamp(dt: NaiveDateTime) -> String {
  dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse an event timestamp.
///
/// Two formats are accepted: the canonical space-separated form, and
/// ISO 8601 with an optional trailing `Z` (older exports and manually
/// injected events use it). Anything else is a [`Error::MalformedTimestamp`].
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
  if let Ok(dt) = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT) {
    return Ok(dt);
  }
  if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
    return Ok(dt.naive_utc());
  }
  // ISO 8601 without offset, e.g. "2024-01-01T12:00:00".
  if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
    return Ok(dt);
  }
  Err(Error::MalformedTimestamp(s.to_owned()))
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// A persisted state transition.
///
/// `timestamp` is kept as the stored text: the log may contain records in
/// either accepted format (or, historically, malformed ones), and the
/// reconstruction layer decides what to do with records it cannot parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
  /// Surrogate sequence id; breaks ordering ties between equal timestamps.
  pub id:        i64,
  pub source:    String,
  pub state:     SourceState,
  pub voltage:   Option<f64>,
  pub timestamp: String,
}

/// An event about to be appended; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewEvent {
  pub source:    String,
  pub state:     SourceState,
  pub voltage:   Option<f64>,
  pub timestamp: String,
}

// ─── Live snapshot ───────────────────────────────────────────────────────────

/// One source's slice of a polling tick, as pushed to live subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSample {
  pub voltage:   f64,
  pub state:     SourceState,
  pub timestamp: String,
}

/// Full per-tick snapshot: every configured source, every tick, whether or
/// not anything transitioned.
pub type Snapshot = std::collections::BTreeMap<String, SourceSample>;
