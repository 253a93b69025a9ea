//! Schema migrations for the SQLite store.
//!
//! Migrations are applied in order and gated on `PRAGMA user_version`: a
//! database at version `n` has had the first `n` entries of [`MIGRATIONS`]
//! applied. Each migration runs in its own transaction together with the
//! version bump.

use rusqlite::Connection;

use crate::{Error, Result};

/// Per-connection settings; not persisted in the schema version.
const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// Requests are never deleted; closing one is a status change.
const CREATE_REQUEST: &str = "
CREATE TABLE IF NOT EXISTS request (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid                TEXT NOT NULL UNIQUE,
    full_name           TEXT NOT NULL,
    email               TEXT NOT NULL,
    birthdate           TEXT NOT NULL,   -- YYYY-MM-DD
    business_identifier TEXT NOT NULL,
    information_to_omit TEXT NOT NULL,   -- JSON array of storage tokens
    individual_at_risk  TEXT NOT NULL,   -- JSON array of storage tokens
    reasons             TEXT NOT NULL,
    completing_party    TEXT NOT NULL,
    completing_name     TEXT NOT NULL,
    completing_email    TEXT NOT NULL,
    created_at          TEXT NOT NULL,   -- RFC 3339 UTC
    updated_at          TEXT NOT NULL,   -- RFC 3339 UTC
    status              TEXT NOT NULL DEFAULT 'awaiting_review',
    version             INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS request_business_identifier_idx
    ON request(business_identifier);
";

/// Append-only. One row per committed field change, holding the state the
/// change replaced.
const CREATE_REQUEST_HISTORY: &str = "
CREATE TABLE IF NOT EXISTS request_history (
    request_id          INTEGER NOT NULL REFERENCES request(id),
    version             INTEGER NOT NULL,
    changed_at          TEXT NOT NULL,
    changed_field       TEXT NOT NULL,
    uuid                TEXT NOT NULL,
    full_name           TEXT NOT NULL,
    email               TEXT NOT NULL,
    birthdate           TEXT NOT NULL,
    business_identifier TEXT NOT NULL,
    information_to_omit TEXT NOT NULL,
    individual_at_risk  TEXT NOT NULL,
    reasons             TEXT NOT NULL,
    completing_party    TEXT NOT NULL,
    completing_name     TEXT NOT NULL,
    completing_email    TEXT NOT NULL,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL,
    status              TEXT NOT NULL,
    PRIMARY KEY (request_id, version),
    CHECK (version > 1)
);
";

pub const MIGRATIONS: &[&str] = &[CREATE_REQUEST, CREATE_REQUEST_HISTORY];

/// Apply connection pragmas and every migration newer than the database's
/// `user_version`.
pub fn run(conn: &mut Connection) -> Result<()> {
  conn.execute_batch(PRAGMAS)?;

  let current: i64 =
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
  let applied = usize::try_from(current).unwrap_or(0);
  if applied > MIGRATIONS.len() {
    return Err(Error::SchemaTooNew {
      found:     current,
      supported: MIGRATIONS.len(),
    });
  }

  for (index, ddl) in MIGRATIONS.iter().enumerate().skip(applied) {
    let version = index + 1;
    let tx = conn.transaction()?;
    tx.execute_batch(ddl)?;
    tx.execute_batch(&format!("PRAGMA user_version = {version};"))?;
    tx.commit()?;
    tracing::info!(version, "applied schema migration");
  }

  Ok(())
}

/// The schema version recorded in the database.
pub fn schema_version(conn: &Connection) -> Result<i64> {
  Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}
