//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The event log could not be read or written. Surfaces as 503 so callers
  /// can tell a storage outage apart from their own mistakes.
  #[error("storage unavailable: {0}")]
  StorageUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Wrap a backend error from an [`EventStore`] or [`ConfigStore`] call.
  ///
  /// [`EventStore`]: wattline_core::store::EventStore
  /// [`ConfigStore`]: wattline_core::store::ConfigStore
  pub fn storage<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    ApiError::StorageUnavailable(Box::new(e))
  }
}

impl From<wattline_core::Error> for ApiError {
  fn from(e: wattline_core::Error) -> Self {
    ApiError::BadRequest(e.to_string())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::StorageUnavailable(e) => {
        tracing::error!(error = %e, "storage unavailable");
        (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
