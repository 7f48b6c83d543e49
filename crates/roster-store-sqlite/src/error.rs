//! Error type for `roster-store-sqlite`.

use roster_core::{AsErrorKind, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("engine error: {0}")]
  Engine(#[from] roster_core::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored value no longer maps onto a domain type.
  #[error("decode error: {0}")]
  Decode(String),
}

impl AsErrorKind for Error {
  fn error_kind(&self) -> ErrorKind {
    match self {
      Self::Engine(err) => err.kind(),
      _ => ErrorKind::Store,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
