//! HTTP server assembly for the omission request registry.
//!
//! Mounts the JSON API under `/api/v1` next to the `/ops` probes used by the
//! deployment platform.

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
  routing::get,
};
use btr_core::store::RequestStore;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and `BTR_*`
/// environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
}

fn default_host() -> String { "0.0.0.0".to_string() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("btr.sqlite3") }

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router for `store`.
pub fn router<S>(store: Arc<S>) -> Router
where
  S: RequestStore + 'static,
{
  let ops = Router::new()
    .route("/healthz", get(healthz::<S>))
    .route("/readyz", get(readyz))
    .with_state(store.clone());

  Router::new()
    .nest("/api/v1", btr_api::api_router(store))
    .nest("/ops", ops)
    .layer(TraceLayer::new_for_http())
}

// ─── Ops handlers ────────────────────────────────────────────────────────────

/// Liveness: the process is up and the store answers.
async fn healthz<S>(State(store): State<Arc<S>>) -> impl IntoResponse
where
  S: RequestStore,
{
  match store.ping().await {
    Ok(()) => (StatusCode::OK, Json(json!({ "message": "api is healthy" }))),
    Err(e) => {
      tracing::warn!(error = %e, "health check failed");
      (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "api is down" })),
      )
    }
  }
}

async fn readyz() -> impl IntoResponse {
  (StatusCode::OK, Json(json!({ "message": "api is ready" })))
}
