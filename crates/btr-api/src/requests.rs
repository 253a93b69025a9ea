//! Handlers for `/requests` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/requests` | Optional `businessIdentifier`, `status`, `limit`, `offset` |
//! | `POST`  | `/requests` | Body: wire-form request; returns 201 + stored request |
//! | `GET`   | `/requests/:id` | 404 if not found |
//! | `PATCH` | `/requests/:id` | Body: `{"<wireField>": <value>, ...}`; one history version per changed field |
//! | `GET`   | `/requests/:id/history` | Prior versions, oldest first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, PathRejection, QueryRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use btr_core::{
  request::{FieldUpdate, NewRequest, OmissionRequest, RequestHistory, RequestStatus},
  store::{RequestQuery, RequestStore},
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  pub business_identifier: Option<String>,
  pub status:              Option<RequestStatus>,
  pub limit:               Option<usize>,
  pub offset:              Option<usize>,
}

/// `GET /requests[?businessIdentifier=...][&status=...][&limit=...][&offset=...]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<OmissionRequest>>, ApiError>
where
  S: RequestStore,
{
  let Query(params) = params?;
  let query = RequestQuery {
    business_identifier: params.business_identifier,
    status:              params.status,
    limit:               params.limit,
    offset:              params.offset,
  };
  let requests = store.list(&query).await.map_err(ApiError::from_store)?;
  Ok(Json(requests))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /requests` — body is decoded by [`NewRequest::from_wire`] so missing
/// or malformed fields come back as 400 with the offending key.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RequestStore,
{
  let Json(body) = body?;
  let input = NewRequest::from_wire(body)?;
  let request = store.create(input).await.map_err(ApiError::from_store)?;
  tracing::info!(uuid = %request.uuid, "omission request created");
  Ok((StatusCode::CREATED, Json(request)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /requests/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<OmissionRequest>, ApiError>
where
  S: RequestStore,
{
  let Path(id) = id?;
  let request = store
    .find_by_uuid(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("request {id} not found")))?;
  Ok(Json(request))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /requests/:id` — every key is parsed before anything is written, so
/// an unknown or read-only key rejects the whole body. Keys are applied in the
/// order they appear in the body.
pub async fn update_one<S>(
  State(store): State<Arc<S>>,
  id: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<OmissionRequest>, ApiError>
where
  S: RequestStore,
{
  let Path(id) = id?;
  let Value::Object(body) = body?.0 else {
    return Err(ApiError::BadRequest(
      "request body must be a JSON object".to_owned(),
    ));
  };

  let updates = body
    .into_iter()
    .map(|(key, value)| FieldUpdate::from_wire(&key, value))
    .collect::<Result<Vec<_>, _>>()?;

  let request = store
    .update(id, updates)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(uuid = %id, version = request.version, "omission request updated");
  Ok(Json(request))
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /requests/:id/history`
pub async fn history<S>(
  State(store): State<Arc<S>>,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<RequestHistory>>, ApiError>
where
  S: RequestStore,
{
  let Path(id) = id?;
  let history = store.history(id).await.map_err(ApiError::from_store)?;
  Ok(Json(history))
}
