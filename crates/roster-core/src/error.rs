//! Error types for `roster-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Persisted state does not match what the order assumes, e.g. no
  /// timeline entry covers the order's effective date.
  #[error("failed precondition: {0}")]
  FailedPrecondition(String),

  /// The engine reached a state it never expects, such as cancelling an
  /// entry that already lies in the past. Never retried.
  #[error("internal error: {0}")]
  Internal(String),

  #[error("{context}: {source}")]
  Store {
    context: String,
    #[source]
    source:  Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn precondition(message: impl Into<String>) -> Self {
    Self::FailedPrecondition(message.into())
  }

  pub fn internal(message: impl Into<String>) -> Self {
    Self::Internal(message.into())
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
      Self::Internal(_) => ErrorKind::Internal,
      Self::Store { .. } | Self::Serialization(_) => ErrorKind::Store,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// Coarse error category, used by outer layers to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  FailedPrecondition,
  Internal,
  Store,
}

/// Implemented by error types of other crates that can wrap an engine error.
pub trait AsErrorKind {
  fn error_kind(&self) -> ErrorKind;
}

impl AsErrorKind for Error {
  fn error_kind(&self) -> ErrorKind { self.kind() }
}

// ─── Context ─────────────────────────────────────────────────────────────────

/// Wraps a backend error with the identifiers of the write that failed.
pub(crate) trait StoreContext<T> {
  fn context_with<F>(self, context: F) -> Result<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> StoreContext<T> for std::result::Result<T, E>
where
  E: std::error::Error + Send + Sync + 'static,
{
  fn context_with<F>(self, context: F) -> Result<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|source| Error::Store {
      context: context(),
      source:  Box::new(source),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn store_context_keeps_identifiers() {
    let failed: std::result::Result<(), std::io::Error> =
      Err(std::io::Error::other("disk full"));
    let err = failed
      .context_with(|| "upsert package p-1".to_string())
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Store);
    assert_eq!(err.to_string(), "upsert package p-1: disk full");
  }

  #[test]
  fn kinds_follow_variants() {
    assert_eq!(
      Error::precondition("missing entry").kind(),
      ErrorKind::FailedPrecondition
    );
    assert_eq!(Error::internal("past").error_kind(), ErrorKind::Internal);
  }
}
