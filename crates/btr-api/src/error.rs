//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use btr_core::DomainError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a store error: caller mistakes become 4xx, anything else is
  /// treated as an internal failure.
  pub fn from_store<E>(e: E) -> Self
  where
    E: std::error::Error + DomainError + Send + Sync + 'static,
  {
    use btr_core::Error;

    let mapped = e.domain().and_then(|d| match d {
      Error::NotFound(_) => Some(ApiError::NotFound(d.to_string())),
      Error::Validation(_) | Error::UnknownField(_) | Error::ImmutableField(_) => {
        Some(ApiError::BadRequest(d.to_string()))
      }
      Error::Serialization(_) => None,
    });
    mapped.unwrap_or_else(|| ApiError::Store(Box::new(e)))
  }
}

impl From<btr_core::Error> for ApiError {
  fn from(e: btr_core::Error) -> Self { Self::from_store(e) }
}

// Extractor failures (malformed JSON, a non-UUID path segment, a bad query
// value) are caller mistakes and share the JSON error body.

impl From<JsonRejection> for ApiError {
  fn from(r: JsonRejection) -> Self { Self::BadRequest(r.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(r: PathRejection) -> Self { Self::BadRequest(r.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(r: QueryRejection) -> Self { Self::BadRequest(r.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
