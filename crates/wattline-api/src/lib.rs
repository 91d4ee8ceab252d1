//! JSON REST API for Wattline.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`EventStore`] and [`ConfigStore`]. TLS and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", wattline_api::api_router(state))
//! ```

pub mod error;
pub mod events;
pub mod export;
pub mod live;
pub mod settings;
pub mod stats;
pub mod status;


use std::sync::Arc;

use axum::{Router, routing::get};
use chrono::NaiveDateTime;
use tokio::sync::{broadcast, watch};
use wattline_core::{
  event::Snapshot,
  store::{ConfigStore, EventStore},
};
use wattline_engine::SharedConfig;

pub use error::ApiError;

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:         Arc<S>,
  pub config:        SharedConfig,
  /// Most recent snapshot published by the monitor, if any tick has run.
  pub latest:        watch::Receiver<Option<Snapshot>>,
  /// Live snapshot feed for websocket subscribers.
  pub live:          broadcast::Sender<Snapshot>,
  /// Fallback marker for uptime reconstruction over an empty log.
  pub process_start: NaiveDateTime,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:         Arc::clone(&self.store),
      config:        self.config.clone(),
      latest:        self.latest.clone(),
      live:          self.live.clone(),
      process_start: self.process_start,
    }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: EventStore + ConfigStore + 'static,
{
  Router::new()
    .route("/status", get(status::handler::<S>))
    .route("/events", get(events::list::<S>).post(events::create::<S>))
    .route("/stats", get(stats::handler::<S>))
    .route(
      "/config",
      get(settings::get_config::<S>).post(settings::update_config::<S>),
    )
    .route("/export", get(export::handler::<S>))
    .route("/live", get(live::handler::<S>))
    .with_state(state)
}
