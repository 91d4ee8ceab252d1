//! The voltage-source boundary.
//!
//! The engine consumes a numeric reading per source and nothing else; the
//! backing may be physical hardware or the stochastic simulator. A failed
//! read maps to the `ERROR` state for that source only — it never aborts
//! the tick for the others.

use thiserror::Error;

/// A failed reading for one source.
///
/// The field is `key`, not `source`: thiserror reserves a field named
/// `source` for the underlying-cause chain, and there is none here.
#[derive(Debug, Error)]
#[error("voltage read failed for {key}: {reason}")]
pub struct SourceReadError {
  pub key:    String,
  pub reason: String,
}

/// One voltage reading per configured source per tick.
pub trait VoltageSource: Send {
  fn read(&mut self, source: &str) -> Result<f64, SourceReadError>;
}
