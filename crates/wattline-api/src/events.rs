//! Handlers for `/events`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/events` | optional `source`, `since`, `until`, `limit`; newest first |
//! | `POST` | `/events` | Body: [`NewEventBody`]; returns 201 + whether a row was inserted |
//!
//! Timestamp filters accept either the canonical `YYYY-MM-DD HH:MM:SS` form
//! or RFC 3339 and are normalised before they reach the store.

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use wattline_core::{
  event::{Event, NewEvent, SourceState, format_timestamp, parse_timestamp},
  store::{ConfigStore, EventQuery, EventStore},
};

use crate::{AppState, error::ApiError};

/// Re-render a user-supplied timestamp in the canonical store format.
fn normalize(value: &str) -> Result<String, ApiError> {
  Ok(format_timestamp(parse_timestamp(value)?))
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub source: Option<String>,
  pub since:  Option<String>,
  pub until:  Option<String>,
  pub limit:  Option<usize>,
}

/// `GET /events[?source=...][&since=...][&until=...][&limit=...]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Event>>, ApiError>
where
  S: EventStore + ConfigStore,
{
  let query = EventQuery {
    source: params.source,
    since:  params.since.as_deref().map(normalize).transpose()?,
    until:  params.until.as_deref().map(normalize).transpose()?,
    limit:  params.limit,
    ..EventQuery::default()
  };

  let events = state.store.query(query).await.map_err(ApiError::storage)?;
  Ok(Json(events))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /events`.
#[derive(Debug, Deserialize)]
pub struct NewEventBody {
  pub source:    String,
  pub state:     SourceState,
  pub voltage:   Option<f64>,
  pub timestamp: String,
}

/// `POST /events` — returns 201 and whether a row was actually inserted.
///
/// Re-posting an existing `(source, state, timestamp)` triple is not an
/// error; it reports `"inserted": false`.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewEventBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EventStore + ConfigStore,
{
  let config = state.config.snapshot().await;
  if !config.sources.contains_key(&body.source) {
    return Err(ApiError::BadRequest(format!(
      "unknown source: {}",
      body.source
    )));
  }

  let event = NewEvent {
    source:    body.source,
    state:     body.state,
    voltage:   body.voltage,
    timestamp: normalize(&body.timestamp)?,
  };

  let inserted = state
    .store
    .append(event)
    .await
    .map_err(ApiError::storage)?;
  Ok((StatusCode::CREATED, Json(json!({ "inserted": inserted }))))
}
