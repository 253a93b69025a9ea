//! Error types for `btr-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// A required input field is missing or has the wrong shape.
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("request not found: {0}")]
  NotFound(Uuid),

  #[error("unknown field: {0:?}")]
  UnknownField(String),

  /// The field exists but is assigned by the store and cannot be set.
  #[error("field {0:?} cannot be modified")]
  ImmutableField(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Recover the domain error carried by a backend error, if any.
///
/// Generic layers (the HTTP API) use this to tell a caller mistake apart from
/// an infrastructure failure without knowing which backend is in use.
pub trait DomainError {
  fn domain(&self) -> Option<&Error>;
}

impl DomainError for Error {
  fn domain(&self) -> Option<&Error> { Some(self) }
}
