//! JSON REST API for the omission request registry.
//!
//! Exposes an axum [`Router`] backed by any [`btr_core::store::RequestStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api/v1", btr_api::api_router(store.clone()))
//! ```

pub mod error;
pub mod requests;

use std::sync::Arc;

use axum::{Router, routing::get};
use btr_core::store::RequestStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: RequestStore + 'static,
{
  Router::new()
    .route("/requests", get(requests::list::<S>).post(requests::create::<S>))
    .route(
      "/requests/{id}",
      get(requests::get_one::<S>).patch(requests::update_one::<S>),
    )
    .route("/requests/{id}/history", get(requests::history::<S>))
    .with_state(store)
}
