//! Wattline server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the
//! SQLite event log, starts the sampling monitor against the simulated
//! grid, and serves the JSON API under `/api`.
//!
//! Engine tuning (thresholds, polling interval, notification flags) lives
//! in the settings table of the store, not the config file: defaults are
//! seeded on first start and operator changes made through `POST /config`
//! survive restarts.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use chrono::Utc;
use clap::Parser;
use serde::Deserialize;
use tokio::{
  net::TcpListener,
  sync::{broadcast, watch},
};
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use wattline_api::AppState;
use wattline_core::{
  config::{
    ConfigValue, EngineConfig, SETTING_INSTABILITY_RATIO,
    SETTING_NOTIFY_FAILURES, SETTING_NOTIFY_RECOVERY, SETTING_POLL_INTERVAL,
    SETTING_SOURCE_THRESHOLDS, validate_instability_ratio,
    validate_poll_interval,
  },
  store::ConfigStore,
};
use wattline_engine::{Monitor, SharedConfig, SimulatedGrid, monitor::BROADCAST_CAPACITY};
use wattline_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Wattline power monitoring server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

/// Transport-level configuration, deserialised from `config.toml` and the
/// `WATTLINE_*` environment.
#[derive(Debug, Deserialize, Clone)]
struct ServerConfig {
  #[serde(default = "default_host")]
  host:    String,
  #[serde(default = "default_port")]
  port:    u16,
  #[serde(default = "default_db_path")]
  db_path: PathBuf,
}

fn default_host() -> String {
  "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
  8000
}

fn default_db_path() -> PathBuf {
  PathBuf::from("wattline.db")
}

/// Write default engine settings into the store without clobbering any the
/// operator has already changed.
async fn seed_defaults<S: ConfigStore>(
  store: &S,
  defaults: &EngineConfig,
) -> Result<(), S::Error> {
  store
    .seed_setting(
      SETTING_POLL_INTERVAL,
      ConfigValue::Float(defaults.poll_interval_secs),
    )
    .await?;
  store
    .seed_setting(
      SETTING_INSTABILITY_RATIO,
      ConfigValue::Int(i64::from(defaults.instability_ratio)),
    )
    .await?;
  store
    .seed_setting(
      SETTING_NOTIFY_FAILURES,
      ConfigValue::Bool(defaults.notify_failures),
    )
    .await?;
  store
    .seed_setting(
      SETTING_NOTIFY_RECOVERY,
      ConfigValue::Bool(defaults.notify_recovery),
    )
    .await?;

  let thresholds: serde_json::Map<String, serde_json::Value> = defaults
    .sources
    .iter()
    .map(|(k, s)| (k.clone(), serde_json::json!(s.threshold_volts)))
    .collect();
  store
    .seed_setting(
      SETTING_SOURCE_THRESHOLDS,
      ConfigValue::Json(serde_json::Value::Object(thresholds)),
    )
    .await?;
  Ok(())
}

/// Overlay persisted settings onto `config`. A persisted value that no
/// longer validates is logged and skipped rather than taking the server
/// down.
async fn load_settings<S: ConfigStore>(
  store: &S,
  config: &mut EngineConfig,
) -> Result<(), S::Error> {
  if let Some(value) = store.get_setting(SETTING_POLL_INTERVAL).await? {
    match value.as_float().map(validate_poll_interval) {
      Some(Ok(secs)) => config.poll_interval_secs = secs,
      _ => tracing::warn!(?value, "ignoring bad persisted poll interval"),
    }
  }

  if let Some(value) = store.get_setting(SETTING_INSTABILITY_RATIO).await? {
    match value.as_int().map(validate_instability_ratio) {
      Some(Ok(ratio)) => config.instability_ratio = ratio,
      _ => tracing::warn!(?value, "ignoring bad persisted instability ratio"),
    }
  }

  if let Some(value) = store.get_setting(SETTING_NOTIFY_FAILURES).await?
    && let Some(flag) = value.as_bool()
  {
    config.notify_failures = flag;
  }
  if let Some(value) = store.get_setting(SETTING_NOTIFY_RECOVERY).await?
    && let Some(flag) = value.as_bool()
  {
    config.notify_recovery = flag;
  }

  if let Some(value) = store.get_setting(SETTING_SOURCE_THRESHOLDS).await? {
    let entries = value
      .as_json()
      .and_then(|v| v.as_object())
      .cloned()
      .unwrap_or_default();
    for (source, volts) in entries {
      let Some(volts) = volts.as_f64() else {
        tracing::warn!(source, "ignoring non-numeric persisted threshold");
        continue;
      };
      if let Err(e) = config.set_threshold(&source, volts) {
        tracing::warn!(source, error = %e, "ignoring bad persisted threshold");
      }
    }
  }
  Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("WATTLINE"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store = SqliteStore::open(&server_cfg.db_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", server_cfg.db_path))?;

  // Engine tuning: defaults first, then whatever the operator persisted.
  let mut engine_cfg = EngineConfig::default();
  seed_defaults(&store, &engine_cfg)
    .await
    .context("failed to seed default settings")?;
  load_settings(&store, &mut engine_cfg)
    .await
    .context("failed to load persisted settings")?;
  let config = SharedConfig::new(engine_cfg);

  let (live_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
  let (latest_tx, latest_rx) = watch::channel(None);
  let (shutdown_tx, shutdown_rx) = watch::channel(false);

  let monitor = Monitor::new(
    store.clone(),
    Box::new(SimulatedGrid::new()),
    config.clone(),
    live_tx.clone(),
    latest_tx,
    shutdown_rx,
  );
  let monitor_task = tokio::spawn(monitor.run());

  let state = AppState {
    store: Arc::new(store),
    config,
    latest: latest_rx,
    live: live_tx,
    process_start: Utc::now().naive_utc(),
  };

  let app = axum::Router::new()
    .nest("/api", wattline_api::api_router(state))
    .layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!("listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install ctrl-c handler");
      }
    })
    .await
    .context("server error")?;

  // Let the monitor finish its current tick before the store goes away.
  let _ = shutdown_tx.send(true);
  let _ = monitor_task.await;

  Ok(())
}
