//! Error type for `locus-store-sqlite`.
//!
//! Domain errors pass through as [`Error::Core`]; backend failures keep
//! their own variants internally and collapse into
//! [`locus_core::Error::Storage`] at the trait boundary via
//! [`Error::into_core`]. `SQLITE_BUSY`/`SQLITE_LOCKED` map to
//! [`locus_core::Error::ConcurrentModification`] so callers see the one
//! retryable kind.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(locus_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("database error: {0}")]
  Sqlite(rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A status column held a discriminant no enum variant matches.
  #[error("unknown status discriminant: {0:?}")]
  UnknownStatus(String),
}

impl Error {
  /// Collapse into the public taxonomy exposed by the store trait.
  pub fn into_core(self) -> locus_core::Error {
    match self {
      Error::Core(e) => e,
      other => locus_core::Error::Storage(other.to_string()),
    }
  }
}

impl From<locus_core::Error> for Error {
  fn from(e: locus_core::Error) -> Self { Error::Core(e) }
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self {
    if let rusqlite::Error::SqliteFailure(f, _) = &e
      && matches!(
        f.code,
        rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
      )
    {
      return Error::Core(locus_core::Error::ConcurrentModification(
        e.to_string(),
      ));
    }
    Error::Sqlite(e)
  }
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Rusqlite(e) => e.into(),
      other => Error::Database(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
