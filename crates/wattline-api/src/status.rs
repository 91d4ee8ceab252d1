//! Handler for `GET /status`.
//!
//! Combines the monitor's most recent snapshot with the static source
//! metadata from configuration. Sources the monitor has not sampled yet
//! (e.g. before the first tick) come back with null reading fields.

use std::collections::BTreeMap;

use axum::{Json, extract::State};
use chrono::Utc;
use serde::Serialize;
use wattline_core::{
  event::{SourceState, format_timestamp},
  store::{ConfigStore, EventStore},
};

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct SourceStatus {
  pub display_name:    String,
  pub priority:        u8,
  pub threshold_volts: f64,
  pub state:           Option<SourceState>,
  pub voltage:         Option<f64>,
  pub sampled_at:      Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
  pub generated_at: String,
  pub sources:      BTreeMap<String, SourceStatus>,
}

/// `GET /status`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<StatusResponse>, ApiError>
where
  S: EventStore + ConfigStore,
{
  let config = state.config.snapshot().await;
  let snapshot = state.latest.borrow().clone();

  let sources = config
    .sources
    .iter()
    .map(|(key, cfg)| {
      let sample = snapshot.as_ref().and_then(|s| s.get(key));
      (key.clone(), SourceStatus {
        display_name:    cfg.display_name.clone(),
        priority:        cfg.priority,
        threshold_volts: cfg.threshold_volts,
        state:           sample.map(|s| s.state),
        voltage:         sample.map(|s| s.voltage),
        sampled_at:      sample.map(|s| s.timestamp.clone()),
      })
    })
    .collect();

  Ok(Json(StatusResponse {
    generated_at: format_timestamp(Utc::now().naive_utc()),
    sources,
  }))
}
