//! The `EventStore` and `ConfigStore` traits and supporting query types.
//!
//! The traits are implemented by storage backends (e.g.
//! `wattline-store-sqlite`). Higher layers (`wattline-engine`,
//! `wattline-api`) depend on these abstractions, not on any concrete
//! backend.

use std::future::Future;

use crate::{
  config::ConfigValue,
  event::{Event, NewEvent},
};

// ─── Query types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
  /// Newest first — the default for event listings and exports.
  #[default]
  Descending,
  /// Oldest first — requested explicitly by the timeline reconstructor.
  Ascending,
}

/// Query limits are clamped to this many rows regardless of what the caller
/// asks for.
pub const MAX_QUERY_LIMIT: usize = 50_000;

/// Parameters for [`EventStore::query`].
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
  /// Restrict to one source key.
  pub source: Option<String>,
  /// Inclusive lower bound, canonical timestamp text.
  pub since:  Option<String>,
  /// Inclusive upper bound, canonical timestamp text.
  pub until:  Option<String>,
  /// Row cap; clamped to [`MAX_QUERY_LIMIT`].
  pub limit:  Option<usize>,
  pub order:  SortOrder,
}

impl EventQuery {
  pub fn effective_limit(&self) -> usize {
    self.limit.unwrap_or(MAX_QUERY_LIMIT).min(MAX_QUERY_LIMIT)
  }
}

// ─── EventStore ──────────────────────────────────────────────────────────────

/// Abstraction over the append-only transition log.
///
/// Writes deduplicate on the `(source, state, timestamp)` triple: appending
/// an already-present transition is a silent no-op, not an error. A storage
/// I/O failure is a real error, and callers must not assume the write
/// happened.
pub trait EventStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Append one event. Returns `true` if a row was inserted, `false` if an
  /// identical `(source, state, timestamp)` triple already existed.
  fn append(
    &self,
    event: NewEvent,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Fetch events matching `query`, ordered per `query.order` with ties
  /// broken by insertion order.
  fn query(
    &self,
    query: EventQuery,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;
}

// ─── ConfigStore ─────────────────────────────────────────────────────────────

/// Abstraction over persisted, kind-tagged settings.
pub trait ConfigStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_setting<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<ConfigValue>, Self::Error>> + Send + 'a;

  /// Insert or overwrite a setting, recording who changed it.
  fn put_setting<'a>(
    &'a self,
    key: &'a str,
    value: ConfigValue,
    updated_by: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Insert a setting only if the key is absent; used to seed defaults at
  /// startup without clobbering operator changes.
  fn seed_setting<'a>(
    &'a self,
    key: &'a str,
    value: ConfigValue,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
