//! Handler for `GET /export`.
//!
//! Streams the transition log as a downloadable CSV or JSON attachment.
//! Responds 400 for an unknown format or a malformed time bound, and 404
//! when the selection matches no events at all.

use axum::{
  extract::{Query, State},
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use wattline_core::{
  event::{Event, format_timestamp, parse_timestamp},
  store::{ConfigStore, EventQuery, EventStore},
};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct ExportParams {
  /// `csv` (default) or `json`.
  pub format: Option<String>,
  pub source: Option<String>,
  pub start:  Option<String>,
  pub end:    Option<String>,
}

fn csv_body(events: &[Event]) -> String {
  let mut out = String::from("id,source,state,voltage,timestamp\n");
  for e in events {
    let voltage = e
      .voltage
      .map(|v| format!("{v:.2}"))
      .unwrap_or_default();
    out.push_str(&format!(
      "{},{},{},{},{}\n",
      e.id,
      e.source,
      e.state.as_str(),
      voltage,
      e.timestamp
    ));
  }
  out
}

fn attachment(content_type: &str, filename: &str, body: String) -> Response {
  (
    StatusCode::OK,
    [
      (header::CONTENT_TYPE, content_type.to_owned()),
      (
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{filename}\""),
      ),
    ],
    body,
  )
    .into_response()
}

/// `GET /export[?format=csv|json][&source=...][&start=...][&end=...]`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ExportParams>,
) -> Result<Response, ApiError>
where
  S: EventStore + ConfigStore,
{
  let format = params.format.as_deref().unwrap_or("csv");
  if format != "csv" && format != "json" {
    return Err(ApiError::BadRequest(format!(
      "unknown format: {format} (expected csv or json)"
    )));
  }

  if let Some(source) = &params.source {
    let config = state.config.snapshot().await;
    if !config.sources.contains_key(source) {
      return Err(ApiError::BadRequest(format!("unknown source: {source}")));
    }
  }

  let normalize =
    |v: &str| parse_timestamp(v).map(format_timestamp).map_err(ApiError::from);

  let events = state
    .store
    .query(EventQuery {
      source: params.source,
      since:  params.start.as_deref().map(normalize).transpose()?,
      until:  params.end.as_deref().map(normalize).transpose()?,
      ..EventQuery::default()
    })
    .await
    .map_err(ApiError::storage)?;

  if events.is_empty() {
    return Err(ApiError::NotFound("no events match the export".to_owned()));
  }

  let stamp = Utc::now().format("%Y%m%d_%H%M%S");
  let response = match format {
    "json" => attachment(
      "application/json",
      &format!("events_{stamp}.json"),
      serde_json::to_string_pretty(&events)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?,
    ),
    _ => attachment(
      "text/csv",
      &format!("events_{stamp}.csv"),
      csv_body(&events),
    ),
  };
  Ok(response)
}
