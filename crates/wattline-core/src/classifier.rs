//! Voltage-to-state classification.
//!
//! Pure and deterministic: the same `(source, voltage, config)` always
//! yields the same state, and nothing here can fail — an unconfigured
//! source or an unusable threshold degrades to [`SourceState::Error`]
//! instead of raising.

use crate::{config::EngineConfig, event::SourceState};

/// Classify a raw voltage reading for `source`.
///
/// With failure threshold `T` and instability ratio `r` percent, the
/// instability boundary is `L = T * r / 100`:
///
/// - `v >= T` → `Active`
/// - `L <= v < T` → `Unstable`
/// - `v < L` → `Failed`
///
/// Sensor noise can produce negative voltages; those are ordinary `Failed`
/// readings, not errors.
pub fn classify(source: &str, voltage: f64, config: &EngineConfig) -> SourceState {
  let Some(threshold) = config.threshold_for(source) else {
    return SourceState::Error;
  };
  if !threshold.is_finite() || threshold <= 0.0 || !voltage.is_finite() {
    return SourceState::Error;
  }

  let boundary = threshold * f64::from(config.instability_ratio) / 100.0;
  if voltage >= threshold {
    SourceState::Active
  } else if voltage >= boundary {
    SourceState::Unstable
  } else {
    SourceState::Failed
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::SourceConfig;

  fn config(threshold: f64, ratio: u8) -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.instability_ratio = ratio;
    cfg.sources.insert("test".to_owned(), SourceConfig {
      display_name:    "Test".to_owned(),
      channel:         0,
      priority:        1,
      threshold_volts: threshold,
      threshold_range: (0.0, 1000.0),
    });
    cfg
  }

  #[test]
  fn default_ratio_splits_three_ways() {
    // T=180, r=70 -> L=126.
    let cfg = config(180.0, 70);
    assert_eq!(classify("test", 200.0, &cfg), SourceState::Active);
    assert_eq!(classify("test", 150.0, &cfg), SourceState::Unstable);
    assert_eq!(classify("test", 50.0, &cfg), SourceState::Failed);
  }

  #[test]
  fn boundaries_are_inclusive_below() {
    let cfg = config(180.0, 70);
    assert_eq!(classify("test", 180.0, &cfg), SourceState::Active);
    assert_eq!(classify("test", 126.0, &cfg), SourceState::Unstable);
    assert_eq!(classify("test", 125.999, &cfg), SourceState::Failed);
  }

  #[test]
  fn monotonic_in_voltage() {
    let cfg = config(180.0, 70);
    fn rank(s: SourceState) -> u8 {
      match s {
        SourceState::Failed => 0,
        SourceState::Unstable => 1,
        SourceState::Active => 2,
        SourceState::Error => unreachable!("pure inputs never classify as ERROR"),
      }
    }
    let mut prev = rank(classify("test", -50.0, &cfg));
    for step in 0..500 {
      let v = -50.0 + f64::from(step);
      let cur = rank(classify("test", v, &cfg));
      assert!(cur >= prev, "classification regressed at {v}V");
      prev = cur;
    }
  }

  #[test]
  fn negative_voltage_is_failed_not_error() {
    let cfg = config(180.0, 70);
    assert_eq!(classify("test", -3.2, &cfg), SourceState::Failed);
  }

  #[test]
  fn unconfigured_source_is_error() {
    let cfg = config(180.0, 70);
    assert_eq!(classify("nope", 200.0, &cfg), SourceState::Error);
  }

  #[test]
  fn unusable_threshold_is_error() {
    let cfg = config(0.0, 70);
    assert_eq!(classify("test", 200.0, &cfg), SourceState::Error);
    let cfg = config(f64::NAN, 70);
    assert_eq!(classify("test", 200.0, &cfg), SourceState::Error);
  }
}
