//! Error type for `docchat-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// One half of the token/user pair is missing or empty.
  #[error("stored session is incomplete: {0}")]
  Incomplete(&'static str),
}

impl From<Error> for docchat_core::Error {
  fn from(e: Error) -> Self { docchat_core::Error::Storage(Box::new(e)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
