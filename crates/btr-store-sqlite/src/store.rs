//! [`SqliteStore`] — the SQLite implementation of [`RequestStore`].

use std::path::Path;

use btr_core::{
  request::{FieldUpdate, NewRequest, OmissionRequest, RequestHistory},
  store::{RequestQuery, RequestStore},
};
use chrono::Utc;
use rusqlite::Transaction;
use uuid::Uuid;

use crate::{Result, migrations, ops};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An omission request store backed by a single SQLite file.
///
/// Each trait call runs in its own transaction. Cloning is cheap — the inner
/// connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and bring its schema up to date.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.migrate().await?;
    Ok(store)
  }

  /// Open a disposable in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.migrate().await?;
    Ok(store)
  }

  async fn migrate(&self) -> Result<()> {
    self
      .conn
      .call(|conn| Ok(migrations::run(conn)))
      .await?
  }

  /// Run `f` as one unit of work: committed if it returns `Ok`, rolled back
  /// otherwise. Use this to group several [`ops`] calls atomically.
  pub async fn transaction<F, T>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self
      .conn
      .call(move |conn| Ok(in_transaction(conn, f)))
      .await?
  }
}

fn in_transaction<T>(
  conn: &mut rusqlite::Connection,
  f: impl FnOnce(&Transaction<'_>) -> Result<T>,
) -> Result<T> {
  let tx = conn.transaction()?;
  // Dropping `tx` on the error path rolls it back.
  let value = f(&tx)?;
  tx.commit()?;
  Ok(value)
}

// ─── RequestStore impl ───────────────────────────────────────────────────────

impl RequestStore for SqliteStore {
  type Error = crate::Error;

  async fn create(&self, input: NewRequest) -> Result<OmissionRequest> {
    self
      .transaction(move |tx| ops::insert(tx, input, Utc::now()))
      .await
  }

  async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<OmissionRequest>> {
    self.transaction(move |tx| ops::find_by_uuid(tx, uuid)).await
  }

  async fn set_field(
    &self,
    uuid:   Uuid,
    update: FieldUpdate,
  ) -> Result<OmissionRequest> {
    self
      .transaction(move |tx| ops::set_field(tx, uuid, update, Utc::now()))
      .await
  }

  async fn update(
    &self,
    uuid:    Uuid,
    updates: Vec<FieldUpdate>,
  ) -> Result<OmissionRequest> {
    self
      .transaction(move |tx| ops::update(tx, uuid, updates, Utc::now()))
      .await
  }

  async fn history(&self, uuid: Uuid) -> Result<Vec<RequestHistory>> {
    self.transaction(move |tx| ops::history(tx, uuid)).await
  }

  async fn list<'a>(&'a self, query: &'a RequestQuery) -> Result<Vec<OmissionRequest>> {
    let query = query.clone();
    self.transaction(move |tx| ops::list(tx, &query)).await
  }

  async fn ping(&self) -> Result<()> {
    self.conn.call(|conn| Ok(ops::ping(conn))).await?
  }
}
