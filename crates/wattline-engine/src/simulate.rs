//! [`SimulatedGrid`] — the stochastic [`VoltageSource`] used when no
//! physical sensor is wired up.
//!
//! Each source gets a nominal voltage, bounded jitter, and a small per-tick
//! probability of entering a timed failure episode with reduced voltage.
//! Solar output follows the hour of day; the battery sags slowly over the
//! process's run time.

use std::{
  collections::HashMap,
  time::{Duration, Instant},
};

use chrono::Timelike as _;
use rand::{Rng as _, SeedableRng as _, rngs::StdRng};

use crate::source::{SourceReadError, VoltageSource};

// ─── Profiles ────────────────────────────────────────────────────────────────

struct Profile {
  nominal:          f64,
  /// Symmetric jitter bound during normal operation, volts.
  jitter:           f64,
  /// Probability per read of starting a failure episode.
  failure_prob:     f64,
  episode_secs:     (u64, u64),
  /// Voltage band sampled while an episode is running.
  sag_volts:        (f64, f64),
  /// Scale output by sun position (solar panels).
  daylight_shaped:  bool,
  /// Decay slowly over elapsed run time (battery discharge).
  discharge_shaped: bool,
}

fn default_profiles() -> HashMap<String, Profile> {
  let mut profiles = HashMap::new();
  profiles.insert("mains".to_owned(), Profile {
    nominal:          220.0,
    jitter:           8.0,
    failure_prob:     0.003,
    episode_secs:     (5, 120),
    sag_volts:        (0.0, 50.0),
    daylight_shaped:  false,
    discharge_shaped: false,
  });
  profiles.insert("solar".to_owned(), Profile {
    nominal:          180.0,
    jitter:           25.0,
    failure_prob:     0.008,
    episode_secs:     (10, 300),
    sag_volts:        (20.0, 80.0),
    daylight_shaped:  true,
    discharge_shaped: false,
  });
  profiles.insert("generator".to_owned(), Profile {
    nominal:          240.0,
    jitter:           12.0,
    failure_prob:     0.005,
    episode_secs:     (3, 60),
    sag_volts:        (0.0, 30.0),
    daylight_shaped:  false,
    discharge_shaped: false,
  });
  profiles.insert("battery".to_owned(), Profile {
    nominal:          12.6,
    jitter:           0.8,
    failure_prob:     0.001,
    episode_secs:     (2, 30),
    sag_volts:        (9.5, 11.0),
    daylight_shaped:  false,
    discharge_shaped: true,
  });
  profiles
}

// ─── Simulator ───────────────────────────────────────────────────────────────

pub struct SimulatedGrid {
  profiles: HashMap<String, Profile>,
  /// Running failure episodes, by source key.
  episodes: HashMap<String, Instant>,
  started:  Instant,
  rng:      StdRng,
}

impl SimulatedGrid {
  pub fn new() -> Self {
    Self {
      profiles: default_profiles(),
      episodes: HashMap::new(),
      started:  Instant::now(),
      rng:      StdRng::from_entropy(),
    }
  }

  /// Deterministic variant for tests.
  pub fn with_seed(seed: u64) -> Self {
    Self { rng: StdRng::seed_from_u64(seed), ..Self::new() }
  }

  fn episode_voltage(rng: &mut StdRng, profile: &Profile) -> f64 {
    let (lo, hi) = profile.sag_volts;
    let sagged = rng.gen_range(lo..=hi) + rng.gen_range(-5.0..=5.0);
    sagged.max(0.0)
  }
}

impl Default for SimulatedGrid {
  fn default() -> Self {
    Self::new()
  }
}

impl VoltageSource for SimulatedGrid {
  fn read(&mut self, source: &str) -> Result<f64, SourceReadError> {
    let profile = self.profiles.get(source).ok_or_else(|| SourceReadError {
      key:    source.to_owned(),
      reason: "no simulation profile".to_owned(),
    })?;

    // A running episode keeps producing sag voltage until it expires.
    if let Some(until) = self.episodes.get(source) {
      if Instant::now() < *until {
        return Ok(Self::episode_voltage(&mut self.rng, profile));
      }
      self.episodes.remove(source);
      tracing::debug!(source, "simulated failure episode ended");
    }

    // Maybe start a new one.
    if self.rng.gen_bool(profile.failure_prob) {
      let (lo, hi) = profile.episode_secs;
      let duration = Duration::from_secs(self.rng.gen_range(lo..=hi));
      self
        .episodes
        .insert(source.to_owned(), Instant::now() + duration);
      tracing::debug!(source, secs = duration.as_secs(), "simulated failure episode started");
      return Ok(Self::episode_voltage(&mut self.rng, profile));
    }

    // Normal operation.
    let mut base = profile.nominal;

    if profile.daylight_shaped {
      let hour = chrono::Local::now().hour();
      base *= if (6..=18).contains(&hour) {
        // Peaks at noon, tapers toward dawn and dusk.
        0.3 + 0.7 * (1.0 - (f64::from(hour) - 12.0).abs() / 6.0)
      } else {
        0.1
      };
    }

    if profile.discharge_shaped {
      // Roughly 15% sag over 24 hours of running, floored.
      let elapsed = self.started.elapsed().as_secs_f64();
      base *= (1.0 - elapsed / 86_400.0).max(0.85);
    }

    let jitter = self.rng.gen_range(-profile.jitter..=profile.jitter);
    Ok((base + jitter).max(0.0))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_source_is_an_error() {
    let mut grid = SimulatedGrid::with_seed(1);
    assert!(grid.read("flux_capacitor").is_err());
  }

  #[test]
  fn readings_are_non_negative() {
    let mut grid = SimulatedGrid::with_seed(7);
    for _ in 0..2000 {
      for source in ["mains", "solar", "generator", "battery"] {
        let v = grid.read(source).unwrap();
        assert!(v >= 0.0, "{source} produced {v}V");
      }
    }
  }

  #[test]
  fn mains_usually_reads_near_nominal() {
    // Episodes run on wall-clock time, so a single grid polled in a tight
    // loop would spend almost the whole test inside the first episode it
    // rolls. Sampling the first read of many fresh grids measures the
    // per-read episode probability instead.
    let healthy = (0..1000u64)
      .filter(|seed| {
        let mut grid = SimulatedGrid::with_seed(*seed);
        let v = grid.read("mains").unwrap();
        (180.0..=260.0).contains(&v)
      })
      .count();
    // Episode probability is 0.3%; the overwhelming majority of first
    // reads are nominal.
    assert!(healthy > 950, "only {healthy}/1000 healthy reads");
  }

  #[test]
  fn battery_stays_in_battery_range() {
    let mut grid = SimulatedGrid::with_seed(3);
    for _ in 0..500 {
      let v = grid.read("battery").unwrap();
      assert!(v < 20.0, "battery produced {v}V");
    }
  }
}
