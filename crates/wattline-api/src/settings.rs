//! Handlers for `/config`.
//!
//! `GET` returns the live engine configuration. `POST` applies a partial
//! update: each recognised field is validated and applied independently, so
//! one bad value does not block the others. Accepted changes are persisted
//! to the settings store and take effect from the monitor's next tick.

use std::collections::BTreeMap;

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use wattline_core::{
  config::{
    ConfigValue, EngineConfig, SETTING_INSTABILITY_RATIO,
    SETTING_NOTIFY_FAILURES, SETTING_NOTIFY_RECOVERY, SETTING_POLL_INTERVAL,
    SETTING_SOURCE_THRESHOLDS, validate_instability_ratio,
    validate_poll_interval,
  },
  store::{ConfigStore, EventStore},
};

use crate::{AppState, error::ApiError};

/// Operator name recorded in the settings table for API-driven changes.
const UPDATED_BY: &str = "api";

/// `GET /config`
pub async fn get_config<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<EngineConfig>, ApiError>
where
  S: EventStore + ConfigStore,
{
  Ok(Json(state.config.snapshot().await))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// Partial update accepted by `POST /config`. Absent fields are untouched.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateBody {
  pub poll_interval_secs: Option<f64>,
  pub instability_ratio:  Option<i64>,
  pub notify_failures:    Option<bool>,
  pub notify_recovery:    Option<bool>,
  /// Per-source failure thresholds, volts.
  #[serde(default)]
  pub thresholds:         BTreeMap<String, f64>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
  /// Field names that were validated, applied, and persisted.
  pub applied: Vec<String>,
  /// Field name to rejection reason, for fields that failed validation.
  pub errors:  BTreeMap<String, String>,
  pub config:  EngineConfig,
}

/// `POST /config`
///
/// Responds 200 when at least one field applied (even with partial errors),
/// 400 when every requested field was rejected.
pub async fn update_config<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<UpdateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EventStore + ConfigStore,
{
  let mut applied = Vec::new();
  let mut errors = BTreeMap::new();
  let mut requested = 0usize;

  if let Some(secs) = body.poll_interval_secs {
    requested += 1;
    match validate_poll_interval(secs) {
      Ok(secs) => {
        state
          .config
          .update(|c| {
            c.poll_interval_secs = secs;
            Ok(())
          })
          .await?;
        state
          .store
          .put_setting(SETTING_POLL_INTERVAL, ConfigValue::Float(secs), UPDATED_BY)
          .await
          .map_err(ApiError::storage)?;
        applied.push(SETTING_POLL_INTERVAL.to_owned());
      }
      Err(e) => {
        errors.insert(SETTING_POLL_INTERVAL.to_owned(), e.to_string());
      }
    }
  }

  if let Some(ratio) = body.instability_ratio {
    requested += 1;
    match validate_instability_ratio(ratio) {
      Ok(ratio) => {
        state
          .config
          .update(|c| {
            c.instability_ratio = ratio;
            Ok(())
          })
          .await?;
        state
          .store
          .put_setting(
            SETTING_INSTABILITY_RATIO,
            ConfigValue::Int(i64::from(ratio)),
            UPDATED_BY,
          )
          .await
          .map_err(ApiError::storage)?;
        applied.push(SETTING_INSTABILITY_RATIO.to_owned());
      }
      Err(e) => {
        errors.insert(SETTING_INSTABILITY_RATIO.to_owned(), e.to_string());
      }
    }
  }

  for (key, flag) in [
    (SETTING_NOTIFY_FAILURES, body.notify_failures),
    (SETTING_NOTIFY_RECOVERY, body.notify_recovery),
  ] {
    let Some(value) = flag else { continue };
    requested += 1;
    state
      .config
      .update(|c| {
        match key {
          SETTING_NOTIFY_FAILURES => c.notify_failures = value,
          _ => c.notify_recovery = value,
        }
        Ok(())
      })
      .await?;
    state
      .store
      .put_setting(key, ConfigValue::Bool(value), UPDATED_BY)
      .await
      .map_err(ApiError::storage)?;
    applied.push(key.to_owned());
  }

  for (source, volts) in &body.thresholds {
    requested += 1;
    let outcome = state
      .config
      .update(|c| c.set_threshold(source, *volts))
      .await;
    match outcome {
      Ok(()) => applied.push(format!("thresholds.{source}")),
      Err(e) => {
        errors.insert(format!("thresholds.{source}"), e.to_string());
      }
    }
  }

  let config = state.config.snapshot().await;

  // Persist the whole threshold map once, after all per-source updates.
  if applied.iter().any(|f| f.starts_with("thresholds.")) {
    let thresholds: BTreeMap<&str, f64> = config
      .sources
      .iter()
      .map(|(k, s)| (k.as_str(), s.threshold_volts))
      .collect();
    state
      .store
      .put_setting(
        SETTING_SOURCE_THRESHOLDS,
        ConfigValue::Json(json!(thresholds)),
        UPDATED_BY,
      )
      .await
      .map_err(ApiError::storage)?;
  }

  let status = if requested > 0 && applied.is_empty() {
    StatusCode::BAD_REQUEST
  } else {
    StatusCode::OK
  };

  tracing::info!(applied = ?applied, rejected = errors.len(), "configuration update");
  Ok((status, Json(UpdateResponse { applied, errors, config })))
}
