//! Error type for `btr-store-sqlite`.

use btr_core::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] btr_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The database was migrated by a newer build.
  #[error("schema version {found} is newer than the {supported} this build supports")]
  SchemaTooNew { found: i64, supported: usize },

  /// A stored token no longer maps to a known enum variant.
  #[error("cannot decode stored value: {0}")]
  Decode(String),
}

impl DomainError for Error {
  fn domain(&self) -> Option<&btr_core::Error> {
    match self {
      Error::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
