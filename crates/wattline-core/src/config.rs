//! Engine configuration: monitored sources, classification tuning, and the
//! kind-tagged values persisted to the settings store.
//!
//! Validation happens here, at the boundary. The classifier and the polling
//! loop only ever see already-validated values; an out-of-range input is
//! rejected with [`Error::InvalidConfiguration`] before it reaches them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Accepted polling interval, in seconds.
pub const POLL_INTERVAL_RANGE: (f64, f64) = (0.1, 60.0);

/// Accepted instability ratio, in percent of the failure threshold.
pub const INSTABILITY_RATIO_RANGE: (u8, u8) = (50, 90);

pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 1.0;
pub const DEFAULT_INSTABILITY_RATIO: u8 = 70;

// ─── Sources ─────────────────────────────────────────────────────────────────

/// Static attributes of one monitored power source.
///
/// The failure threshold is the only runtime-mutable field; everything else
/// is fixed at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
  /// Human-readable name, e.g. "Mains".
  pub display_name:    String,
  /// ADC channel the source is wired to when physical hardware is present.
  pub channel:         u8,
  /// Failover priority rank; 1 is preferred.
  pub priority:        u8,
  /// Voltage at or above which the source counts as fully available.
  pub threshold_volts: f64,
  /// Valid range for runtime threshold updates, volts.
  pub threshold_range: (f64, f64),
}

// ─── Engine configuration ────────────────────────────────────────────────────

/// The full runtime-adjustable configuration consumed by the classifier and
/// the polling loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
  pub poll_interval_secs: f64,
  /// Percentage of a source's threshold below which it is `Unstable` rather
  /// than `Active`, and below *that* boundary, `Failed`.
  pub instability_ratio:  u8,
  /// Advisory only; never affects classification.
  pub notify_failures:    bool,
  /// Advisory only; never affects classification.
  pub notify_recovery:    bool,
  /// Keyed by stable source key, e.g. "mains", "solar".
  pub sources:            BTreeMap<String, SourceConfig>,
}

impl EngineConfig {
  /// The default four-source setup: mains, solar, generator, battery.
  pub fn default_sources() -> BTreeMap<String, SourceConfig> {
    let mut sources = BTreeMap::new();
    sources.insert("mains".to_owned(), SourceConfig {
      display_name:    "Mains".to_owned(),
      channel:         1,
      priority:        1,
      threshold_volts: 180.0,
      threshold_range: (100.0, 250.0),
    });
    sources.insert("solar".to_owned(), SourceConfig {
      display_name:    "Solar".to_owned(),
      channel:         2,
      priority:        2,
      threshold_volts: 120.0,
      threshold_range: (80.0, 200.0),
    });
    sources.insert("generator".to_owned(), SourceConfig {
      display_name:    "Generator".to_owned(),
      channel:         0,
      priority:        3,
      threshold_volts: 180.0,
      threshold_range: (100.0, 250.0),
    });
    sources.insert("battery".to_owned(), SourceConfig {
      display_name:    "Battery/UPS".to_owned(),
      channel:         3,
      priority:        4,
      threshold_volts: 10.0,
      threshold_range: (5.0, 20.0),
    });
    sources
  }

  pub fn source_keys(&self) -> Vec<String> {
    self.sources.keys().cloned().collect()
  }

  pub fn threshold_for(&self, source: &str) -> Option<f64> {
    self.sources.get(source).map(|s| s.threshold_volts)
  }

  /// Validate and apply a runtime threshold update for one source.
  pub fn set_threshold(&mut self, source: &str, volts: f64) -> Result<()> {
    let cfg = self
      .sources
      .get_mut(source)
      .ok_or_else(|| Error::UnknownSource(source.to_owned()))?;
    let (min, max) = cfg.threshold_range;
    if !volts.is_finite() || volts < min || volts > max {
      return Err(Error::InvalidConfiguration(format!(
        "threshold for {source} must be between {min}V and {max}V, got {volts}"
      )));
    }
    cfg.threshold_volts = volts;
    Ok(())
  }
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
      instability_ratio:  DEFAULT_INSTABILITY_RATIO,
      notify_failures:    true,
      notify_recovery:    true,
      sources:            Self::default_sources(),
    }
  }
}

// ─── Boundary validation ─────────────────────────────────────────────────────

pub fn validate_poll_interval(secs: f64) -> Result<f64> {
  let (min, max) = POLL_INTERVAL_RANGE;
  if !secs.is_finite() || secs < min || secs > max {
    return Err(Error::InvalidConfiguration(format!(
      "poll interval must be between {min}s and {max}s, got {secs}"
    )));
  }
  Ok(secs)
}

pub fn validate_instability_ratio(percent: i64) -> Result<u8> {
  let (min, max) = INSTABILITY_RATIO_RANGE;
  if percent < i64::from(min) || percent > i64::from(max) {
    return Err(Error::InvalidConfiguration(format!(
      "instability ratio must be between {min}% and {max}%, got {percent}"
    )));
  }
  Ok(percent as u8)
}

// ─── Persisted settings ──────────────────────────────────────────────────────

/// A kind-tagged setting value.
///
/// Settings are persisted as text plus a kind discriminant; coercion happens
/// once, at the storage boundary, and the rest of the system only handles
/// typed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ConfigValue {
  Float(f64),
  Int(i64),
  Bool(bool),
  Json(serde_json::Value),
  Text(String),
}

impl ConfigValue {
  /// Discriminant stored in the settings table's `kind` column.
  pub fn kind(&self) -> &'static str {
    match self {
      ConfigValue::Float(_) => "float",
      ConfigValue::Int(_) => "int",
      ConfigValue::Bool(_) => "bool",
      ConfigValue::Json(_) => "json",
      ConfigValue::Text(_) => "text",
    }
  }

  pub fn as_float(&self) -> Option<f64> {
    match self {
      ConfigValue::Float(v) => Some(*v),
      ConfigValue::Int(v) => Some(*v as f64),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      ConfigValue::Int(v) => Some(*v),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      ConfigValue::Bool(v) => Some(*v),
      _ => None,
    }
  }

  pub fn as_json(&self) -> Option<&serde_json::Value> {
    match self {
      ConfigValue::Json(v) => Some(v),
      _ => None,
    }
  }
}

// Well-known setting keys.
pub const SETTING_POLL_INTERVAL: &str = "poll_interval_secs";
pub const SETTING_INSTABILITY_RATIO: &str = "instability_ratio";
pub const SETTING_NOTIFY_FAILURES: &str = "notify_failures";
pub const SETTING_NOTIFY_RECOVERY: &str = "notify_recovery";
pub const SETTING_SOURCE_THRESHOLDS: &str = "source_thresholds";

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn poll_interval_bounds() {
    assert!(validate_poll_interval(0.1).is_ok());
    assert!(validate_poll_interval(60.0).is_ok());
    assert!(validate_poll_interval(0.05).is_err());
    assert!(validate_poll_interval(61.0).is_err());
    assert!(validate_poll_interval(f64::NAN).is_err());
  }

  #[test]
  fn instability_ratio_bounds() {
    assert!(validate_instability_ratio(50).is_ok());
    assert!(validate_instability_ratio(90).is_ok());
    assert!(validate_instability_ratio(49).is_err());
    assert!(validate_instability_ratio(91).is_err());
  }

  #[test]
  fn threshold_update_respects_source_range() {
    let mut cfg = EngineConfig::default();
    assert!(cfg.set_threshold("battery", 12.0).is_ok());
    assert_eq!(cfg.threshold_for("battery"), Some(12.0));

    // Out of the battery's 5-20V range.
    assert!(matches!(
      cfg.set_threshold("battery", 100.0),
      Err(Error::InvalidConfiguration(_))
    ));
    assert!(matches!(
      cfg.set_threshold("flux_capacitor", 100.0),
      Err(Error::UnknownSource(_))
    ));
  }

  #[test]
  fn config_value_kinds() {
    assert_eq!(ConfigValue::Float(1.5).kind(), "float");
    assert_eq!(ConfigValue::Bool(true).kind(), "bool");
    assert_eq!(ConfigValue::Int(3).as_float(), Some(3.0));
    assert_eq!(ConfigValue::Text("x".into()).as_float(), None);
  }
}
