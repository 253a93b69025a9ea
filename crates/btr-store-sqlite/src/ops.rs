//! Synchronous request operations against an open connection.
//!
//! None of these functions begins, commits, or rolls back a transaction. They
//! run inside whatever scope the caller holds: pass a
//! [`rusqlite::Transaction`] or [`rusqlite::Savepoint`] (both deref to
//! [`Connection`]) and the caller decides whether the work is kept.
//! [`crate::SqliteStore`] wraps each call in its own transaction.
//!
//! Every mutation goes through [`append_history`] before the live row is
//! overwritten, so a change and its audit snapshot share one unit of work.

use btr_core::{
  request::{FieldUpdate, NewRequest, OmissionRequest, RequestField, RequestHistory},
  store::RequestQuery,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  encode::{EncodedRequest, RawRequest, decode_dt, encode_dt, encode_status, encode_uuid},
  Error, Result,
};

const SELECT_REQUEST: &str = "
SELECT id, uuid, full_name, email, birthdate, business_identifier,
       information_to_omit, individual_at_risk, reasons, completing_party,
       completing_name, completing_email, created_at, updated_at, status,
       version
FROM request";

const DEFAULT_LIMIT: usize = 100;

// ─── Create ──────────────────────────────────────────────────────────────────

/// Insert a new request as version 1 with a freshly generated UUID.
pub fn insert(
  conn: &Connection,
  input: NewRequest,
  now: DateTime<Utc>,
) -> Result<OmissionRequest> {
  input.validate()?;

  // `id` is assigned by SQLite below.
  let mut request = input.into_request(0, Uuid::new_v4(), now);
  let row = EncodedRequest::new(&request)?;

  conn.execute(
    "INSERT INTO request (
       uuid, full_name, email, birthdate, business_identifier,
       information_to_omit, individual_at_risk, reasons, completing_party,
       completing_name, completing_email, created_at, updated_at, status,
       version
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    rusqlite::params![
      row.uuid,
      row.full_name,
      row.email,
      row.birthdate,
      row.business_identifier,
      row.information_to_omit,
      row.individual_at_risk,
      row.reasons,
      row.completing_party,
      row.completing_name,
      row.completing_email,
      row.created_at,
      row.updated_at,
      row.status,
      request.version,
    ],
  )?;
  request.id = conn.last_insert_rowid();

  tracing::debug!(uuid = %request.uuid, id = request.id, "created omission request");
  Ok(request)
}

// ─── Reads ───────────────────────────────────────────────────────────────────

pub fn find_by_uuid(conn: &Connection, uuid: Uuid) -> Result<Option<OmissionRequest>> {
  let raw = conn
    .query_row(
      &format!("{SELECT_REQUEST} WHERE uuid = ?1"),
      rusqlite::params![encode_uuid(uuid)],
      |row| RawRequest::from_row(row, 0),
    )
    .optional()?;

  raw.map(RawRequest::into_request).transpose()
}

pub fn list(conn: &Connection, query: &RequestQuery) -> Result<Vec<OmissionRequest>> {
  let status = query.status.map(encode_status);
  let limit  = sql_count("limit", query.limit.unwrap_or(DEFAULT_LIMIT))?;
  let offset = sql_count("offset", query.offset.unwrap_or(0))?;

  let mut conds: Vec<&'static str> = vec![];
  if query.business_identifier.is_some() {
    conds.push("business_identifier = ?1");
  }
  if status.is_some() {
    conds.push("status = ?2");
  }
  let where_clause = if conds.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conds.join(" AND "))
  };

  let mut stmt = conn.prepare(&format!(
    "{SELECT_REQUEST} {where_clause} ORDER BY id LIMIT ?3 OFFSET ?4"
  ))?;
  let raws = stmt
    .query_map(
      rusqlite::params![query.business_identifier.as_deref(), status, limit, offset],
      |row| RawRequest::from_row(row, 0),
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  raws.into_iter().map(RawRequest::into_request).collect()
}

/// SQLite reads a negative `LIMIT` as "no limit", so values past `i64::MAX`
/// are rejected rather than wrapped.
fn sql_count(name: &str, value: usize) -> Result<i64> {
  i64::try_from(value).map_err(|_| {
    Error::from(btr_core::Error::Validation(format!(
      "{name}: {value} is out of range"
    )))
  })
}

/// History snapshots of a request, oldest first.
pub fn history(conn: &Connection, uuid: Uuid) -> Result<Vec<RequestHistory>> {
  let request = find_by_uuid(conn, uuid)?.ok_or(btr_core::Error::NotFound(uuid))?;

  // The snapshot's own version is one less than the version its change
  // produced.
  let mut stmt = conn.prepare(
    "SELECT version, changed_at, changed_field,
            request_id, uuid, full_name, email, birthdate, business_identifier,
            information_to_omit, individual_at_risk, reasons, completing_party,
            completing_name, completing_email, created_at, updated_at, status,
            version - 1
     FROM request_history
     WHERE request_id = ?1
     ORDER BY version",
  )?;
  let rows = stmt
    .query_map(rusqlite::params![request.id], |row| {
      Ok((
        row.get::<_, i64>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        RawRequest::from_row(row, 3)?,
      ))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  rows
    .into_iter()
    .map(|(version, changed_at, changed_field, raw)| -> Result<RequestHistory> {
      let changed_field = RequestField::from_column(&changed_field)
        .ok_or_else(|| Error::Decode(format!("unknown field: {changed_field:?}")))?;
      Ok(RequestHistory {
        version,
        changed_at: decode_dt(&changed_at)?,
        changed_field,
        request: raw.into_request()?,
      })
    })
    .collect()
}

pub fn ping(conn: &Connection) -> Result<()> {
  conn.query_row("SELECT 1", [], |_| Ok(()))?;
  Ok(())
}

// ─── Mutations ───────────────────────────────────────────────────────────────

/// Change one field of the request identified by `uuid`.
pub fn set_field(
  conn: &Connection,
  uuid: Uuid,
  update: FieldUpdate,
  now: DateTime<Utc>,
) -> Result<OmissionRequest> {
  let current = find_by_uuid(conn, uuid)?.ok_or(btr_core::Error::NotFound(uuid))?;
  apply(conn, current, update, now)
}

/// Apply `updates` in order; each changed field becomes its own version.
pub fn update(
  conn: &Connection,
  uuid: Uuid,
  updates: Vec<FieldUpdate>,
  now: DateTime<Utc>,
) -> Result<OmissionRequest> {
  let mut current = find_by_uuid(conn, uuid)?.ok_or(btr_core::Error::NotFound(uuid))?;
  for update in updates {
    current = apply(conn, current, update, now)?;
  }
  Ok(current)
}

fn apply(
  conn: &Connection,
  current: OmissionRequest,
  update: FieldUpdate,
  now: DateTime<Utc>,
) -> Result<OmissionRequest> {
  update.validate()?;

  let field = update.field();
  let mut next = current.clone();
  if !update.apply(&mut next) {
    return Ok(current);
  }

  // `updated_at` never moves backwards, even if the clock does.
  let changed_at = now.max(current.updated_at);
  next.updated_at = changed_at;
  next.version = current.version + 1;

  append_history(conn, &current, next.version, changed_at, field)?;
  write_current(conn, &next)?;

  tracing::debug!(
    uuid = %next.uuid,
    field = field.wire_name(),
    version = next.version,
    "versioned omission request change"
  );
  Ok(next)
}

/// Persist `snapshot` (the pre-change state) as history version `version`.
fn append_history(
  conn: &Connection,
  snapshot: &OmissionRequest,
  version: i64,
  changed_at: DateTime<Utc>,
  field: RequestField,
) -> Result<()> {
  let row = EncodedRequest::new(snapshot)?;

  conn.execute(
    "INSERT INTO request_history (
       request_id, version, changed_at, changed_field,
       uuid, full_name, email, birthdate, business_identifier,
       information_to_omit, individual_at_risk, reasons, completing_party,
       completing_name, completing_email, created_at, updated_at, status
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
               ?15, ?16, ?17, ?18)",
    rusqlite::params![
      snapshot.id,
      version,
      encode_dt(changed_at),
      field.column(),
      row.uuid,
      row.full_name,
      row.email,
      row.birthdate,
      row.business_identifier,
      row.information_to_omit,
      row.individual_at_risk,
      row.reasons,
      row.completing_party,
      row.completing_name,
      row.completing_email,
      row.created_at,
      row.updated_at,
      row.status,
    ],
  )?;
  Ok(())
}

/// Overwrite the live row. `uuid` and `created_at` are never written.
fn write_current(conn: &Connection, request: &OmissionRequest) -> Result<()> {
  let row = EncodedRequest::new(request)?;

  conn.execute(
    "UPDATE request SET
       full_name = ?2, email = ?3, birthdate = ?4, business_identifier = ?5,
       information_to_omit = ?6, individual_at_risk = ?7, reasons = ?8,
       completing_party = ?9, completing_name = ?10, completing_email = ?11,
       updated_at = ?12, status = ?13, version = ?14
     WHERE id = ?1",
    rusqlite::params![
      request.id,
      row.full_name,
      row.email,
      row.birthdate,
      row.business_identifier,
      row.information_to_omit,
      row.individual_at_risk,
      row.reasons,
      row.completing_party,
      row.completing_name,
      row.completing_email,
      row.updated_at,
      row.status,
      request.version,
    ],
  )?;
  Ok(())
}
