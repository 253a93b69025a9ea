//! The `RequestStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `btr-store-sqlite`).
//! The HTTP layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  DomainError,
  request::{FieldUpdate, NewRequest, OmissionRequest, RequestHistory, RequestStatus},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`RequestStore::list`].
#[derive(Debug, Clone, Default)]
pub struct RequestQuery {
  pub business_identifier: Option<String>,
  pub status:              Option<RequestStatus>,
  /// Defaults to 100.
  pub limit:               Option<usize>,
  pub offset:              Option<usize>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an audited omission request store.
///
/// Records are never deleted. Each committed field change appends a history
/// snapshot in the same transaction as the change itself, so a change and its
/// audit row are persisted together or not at all.
pub trait RequestStore: Send + Sync {
  type Error: std::error::Error + DomainError + Send + Sync + 'static;

  /// Validate and persist a new request. The store assigns `id`, `uuid`,
  /// both timestamps, and the default status when none is supplied.
  fn create(
    &self,
    input: NewRequest,
  ) -> impl Future<Output = Result<OmissionRequest, Self::Error>> + Send + '_;

  /// Retrieve the current state of a request. Returns `None` if not found.
  fn find_by_uuid(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Option<OmissionRequest>, Self::Error>> + Send + '_;

  /// Change a single field, recording the prior state as a new history
  /// version. Writing the value a field already holds changes nothing.
  fn set_field(
    &self,
    uuid: Uuid,
    update: FieldUpdate,
  ) -> impl Future<Output = Result<OmissionRequest, Self::Error>> + Send + '_;

  /// Apply several field changes in one transaction, one history version per
  /// changed field. Any failure discards all of them.
  fn update(
    &self,
    uuid: Uuid,
    updates: Vec<FieldUpdate>,
  ) -> impl Future<Output = Result<OmissionRequest, Self::Error>> + Send + '_;

  /// All history snapshots of a request, oldest first.
  fn history(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Vec<RequestHistory>, Self::Error>> + Send + '_;

  /// Requests matching `query`, ordered by `id`.
  fn list<'a>(
    &'a self,
    query: &'a RequestQuery,
  ) -> impl Future<Output = Result<Vec<OmissionRequest>, Self::Error>> + Send + 'a;

  /// Check that the backing store is reachable.
  fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
