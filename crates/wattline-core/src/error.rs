//! Error types for `wattline-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown source: {0:?}")]
  UnknownSource(String),

  #[error("invalid configuration: {0}")]
  InvalidConfiguration(String),

  #[error("malformed timestamp: {0:?}")]
  MalformedTimestamp(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
