//! Integration tests for `SqliteStore` and the transaction-scoped operations.

use std::collections::HashSet;

use btr_core::{
  request::{
    CompletingParty, FieldUpdate, IndividualAtRisk, InformationToOmit,
    NewRequest, RequestField, RequestStatus,
  },
  store::{RequestQuery, RequestStore},
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

use crate::{SqliteStore, migrations, ops};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// A migrated in-memory connection.
fn connection() -> Connection {
  let mut conn = Connection::open_in_memory().expect("in-memory connection");
  migrations::run(&mut conn).expect("migrations");
  conn
}

/// Run `f` inside a savepoint nested in an outer transaction, then roll both
/// back so nothing `f` writes outlives it.
fn rollback_only<T>(conn: &mut Connection, f: impl FnOnce(&Connection) -> T) -> T {
  let mut outer = conn.transaction().expect("outer transaction");
  let nested = outer.savepoint().expect("savepoint");
  f(&nested)
}

fn t(secs: i64) -> DateTime<Utc> {
  Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
}

fn jane() -> NewRequest {
  NewRequest::from_wire(json!({
    "fullName": "Jane Doe",
    "email": "j@example.com",
    "birthdate": "1990-01-01",
    "businessIdentifier": "BC1234567",
    "informationToOmit": ["ADDRESS"],
    "individualAtRisk": ["APPLICANT"],
    "reasons": "safety",
    "completingParty": "INDIVIDUAL",
    "completingName": "Jane Doe",
    "completingEmail": "j@example.com"
  }))
  .unwrap()
}

fn for_business(business_identifier: &str) -> NewRequest {
  NewRequest {
    business_identifier: business_identifier.into(),
    ..jane()
  }
}

fn count(conn: &Connection, table: &str) -> i64 {
  conn
    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
    .unwrap()
}

// ─── Migrations ──────────────────────────────────────────────────────────────

#[test]
fn migrations_are_idempotent() {
  let mut conn = connection();
  assert_eq!(
    migrations::schema_version(&conn).unwrap(),
    migrations::MIGRATIONS.len() as i64
  );

  migrations::run(&mut conn).unwrap();
  assert_eq!(
    migrations::schema_version(&conn).unwrap(),
    migrations::MIGRATIONS.len() as i64
  );
}

#[test]
fn migrations_refuse_a_newer_schema() {
  let mut conn = connection();
  let newer = migrations::MIGRATIONS.len() as i64 + 1;
  conn
    .execute_batch(&format!("PRAGMA user_version = {newer};"))
    .unwrap();

  let err = migrations::run(&mut conn).unwrap_err();
  assert!(matches!(
    err,
    crate::Error::SchemaTooNew { found, supported }
      if found == newer && supported == migrations::MIGRATIONS.len()
  ));
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_assigns_identity_and_defaults() {
  let s = store().await;

  let request = s.create(jane()).await.unwrap();
  assert!(request.id > 0);
  assert_eq!(request.uuid.get_version_num(), 4);
  assert_eq!(request.status, RequestStatus::AwaitingReview);
  assert_eq!(request.created_at, request.updated_at);
  assert_eq!(request.version, 1);

  let wire = request.to_wire().unwrap();
  assert_eq!(wire["status"], json!("AWAITING_REVIEW"));
  assert_eq!(wire["createdAt"], wire["updatedAt"]);
}

#[tokio::test]
async fn create_keeps_supplied_status() {
  let s = store().await;
  let input = NewRequest { status: Some(RequestStatus::Completed), ..jane() };
  let request = s.create(input).await.unwrap();
  assert_eq!(request.status, RequestStatus::Completed);
}

#[tokio::test]
async fn create_generates_unique_uuids_and_increasing_ids() {
  let s = store().await;

  let mut uuids = HashSet::new();
  let mut last_id = 0;
  for _ in 0..20 {
    let request = s.create(jane()).await.unwrap();
    assert!(uuids.insert(request.uuid));
    assert!(request.id > last_id);
    last_id = request.id;
  }
}

#[tokio::test]
async fn create_rejects_invalid_input_without_writing() {
  let s = store().await;
  let input = NewRequest { information_to_omit: vec![], ..jane() };

  let err = s.create(input).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(btr_core::Error::Validation(_))
  ));
  assert!(s.list(&RequestQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_then_find_round_trips_every_field() {
  let s = store().await;
  let input = NewRequest {
    information_to_omit: vec![
      InformationToOmit::TaxNumber,
      InformationToOmit::FullBirthDate,
      InformationToOmit::Address,
    ],
    individual_at_risk: vec![
      IndividualAtRisk::FamilyMember,
      IndividualAtRisk::Applicant,
    ],
    completing_party: CompletingParty::Representative,
    ..jane()
  };

  let created = s.create(input).await.unwrap();
  let found = s.find_by_uuid(created.uuid).await.unwrap().unwrap();
  assert_eq!(found, created);
}

// ─── Find ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn find_unknown_uuid_returns_none() {
  let s = store().await;
  s.create(jane()).await.unwrap();
  assert!(s.find_by_uuid(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Set field ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn set_status_records_prior_state_as_version_two() {
  let s = store().await;
  let created = s.create(jane()).await.unwrap();

  let updated = s
    .set_field(created.uuid, FieldUpdate::Status(RequestStatus::Approved))
    .await
    .unwrap();
  assert_eq!(updated.status, RequestStatus::Approved);
  assert_eq!(updated.version, 2);
  assert!(updated.updated_at >= created.updated_at);
  assert_eq!(updated.created_at, created.created_at);
  assert_eq!(updated.to_wire().unwrap()["status"], json!("APPROVED"));

  let history = s.history(created.uuid).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].version, 2);
  assert_eq!(history[0].changed_field, RequestField::Status);
  assert_eq!(history[0].changed_at, updated.updated_at);
  assert_eq!(history[0].request, created);
  assert_eq!(history[0].request.status, RequestStatus::AwaitingReview);
}

#[tokio::test]
async fn set_field_on_unknown_uuid_is_not_found() {
  let s = store().await;
  let missing = Uuid::new_v4();
  let err = s
    .set_field(missing, FieldUpdate::Reasons("x".into()))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(btr_core::Error::NotFound(id)) if id == missing
  ));
}

#[tokio::test]
async fn set_field_to_current_value_is_a_no_op() {
  let s = store().await;
  let created = s.create(jane()).await.unwrap();

  let same = s
    .set_field(created.uuid, FieldUpdate::Reasons("safety".into()))
    .await
    .unwrap();
  assert_eq!(same, created);
  assert!(s.history(created.uuid).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_of_unknown_uuid_is_not_found() {
  let s = store().await;
  let err = s.history(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, crate::Error::Core(btr_core::Error::NotFound(_))));
}

// ─── Batch update ────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_versions_each_changed_field() {
  let s = store().await;
  let created = s.create(jane()).await.unwrap();

  let updated = s
    .update(
      created.uuid,
      vec![
        FieldUpdate::Status(RequestStatus::UnderReview),
        FieldUpdate::Reasons("safety".into()),
        FieldUpdate::Email("jane@example.com".into()),
      ],
    )
    .await
    .unwrap();
  assert_eq!(updated.version, 3);

  let history = s.history(created.uuid).await.unwrap();
  let fields: Vec<_> = history.iter().map(|h| h.changed_field).collect();
  assert_eq!(fields, [RequestField::Status, RequestField::Email]);
  assert_eq!(history[1].request.status, RequestStatus::UnderReview);
  assert_eq!(history[1].request.email, "j@example.com");
}

#[tokio::test]
async fn update_failure_discards_every_change() {
  let s = store().await;
  let created = s.create(jane()).await.unwrap();

  let err = s
    .update(
      created.uuid,
      vec![
        FieldUpdate::Status(RequestStatus::Rejected),
        FieldUpdate::InformationToOmit(vec![]),
      ],
    )
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::Core(btr_core::Error::Validation(_))));

  let current = s.find_by_uuid(created.uuid).await.unwrap().unwrap();
  assert_eq!(current, created);
  assert!(s.history(created.uuid).await.unwrap().is_empty());
}

// ─── List ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_filters_by_business_and_status() {
  let s = store().await;
  let a1 = s.create(for_business("BC0000001")).await.unwrap();
  let a2 = s.create(for_business("BC0000001")).await.unwrap();
  s.create(for_business("BC0000002")).await.unwrap();
  s.set_field(a2.uuid, FieldUpdate::Status(RequestStatus::Approved))
    .await
    .unwrap();

  let by_business = s
    .list(&RequestQuery {
      business_identifier: Some("BC0000001".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  let ids: Vec<_> = by_business.iter().map(|r| r.uuid).collect();
  assert_eq!(ids, [a1.uuid, a2.uuid]);

  let approved = s
    .list(&RequestQuery {
      business_identifier: Some("BC0000001".into()),
      status: Some(RequestStatus::Approved),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(approved.len(), 1);
  assert_eq!(approved[0].uuid, a2.uuid);

  let everything = s.list(&RequestQuery::default()).await.unwrap();
  assert_eq!(everything.len(), 3);
}

#[tokio::test]
async fn list_pages_with_limit_and_offset() {
  let s = store().await;
  for _ in 0..5 {
    s.create(jane()).await.unwrap();
  }

  let page = s
    .list(&RequestQuery {
      limit: Some(2),
      offset: Some(3),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(page.len(), 2);
  assert!(page[0].id < page[1].id);
}

#[tokio::test]
async fn list_rejects_limit_and_offset_past_i64() {
  let s = store().await;
  s.create(jane()).await.unwrap();

  for query in [
    RequestQuery { limit: Some(usize::MAX), ..Default::default() },
    RequestQuery { offset: Some(usize::MAX), ..Default::default() },
  ] {
    let err = s.list(&query).await.unwrap_err();
    assert!(matches!(err, crate::Error::Core(btr_core::Error::Validation(_))));
  }
}

#[tokio::test]
async fn ping_succeeds() {
  let s = store().await;
  s.ping().await.unwrap();
}

// ─── Transactions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn aborted_transaction_keeps_neither_value_nor_history() {
  let s = store().await;
  let created = s.create(jane()).await.unwrap();
  let uuid = created.uuid;

  let err = s
    .transaction(move |tx| {
      ops::set_field(tx, uuid, FieldUpdate::Status(RequestStatus::Approved), Utc::now())?;
      Err::<(), _>(crate::Error::Decode("caller aborted".into()))
    })
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::Decode(_)));

  let current = s.find_by_uuid(uuid).await.unwrap().unwrap();
  assert_eq!(current.status, RequestStatus::AwaitingReview);
  assert!(s.history(uuid).await.unwrap().is_empty());
}

#[test]
fn rollback_only_fixture_leaves_no_rows() {
  let mut conn = connection();

  let uuid = rollback_only(&mut conn, |c| {
    let request = ops::insert(c, jane(), t(0)).unwrap();
    ops::set_field(c, request.uuid, FieldUpdate::Reasons("moved".into()), t(1))
      .unwrap();
    assert_eq!(count(c, "request"), 1);
    assert_eq!(count(c, "request_history"), 1);
    request.uuid
  });

  assert_eq!(count(&conn, "request"), 0);
  assert_eq!(count(&conn, "request_history"), 0);
  assert!(ops::find_by_uuid(&conn, uuid).unwrap().is_none());
}

// ─── Versioning properties ───────────────────────────────────────────────────

#[test]
fn each_mutation_snapshots_the_state_before_it() {
  let mut conn = connection();
  rollback_only(&mut conn, |c| {
    let created = ops::insert(c, jane(), t(0)).unwrap();

    let updates = vec![
      FieldUpdate::FullName("Janet Doe".into()),
      FieldUpdate::Birthdate(NaiveDate::from_ymd_opt(1991, 2, 3).unwrap()),
      FieldUpdate::BusinessIdentifier("BC7654321".into()),
      FieldUpdate::InformationToOmit(vec![
        InformationToOmit::Address,
        InformationToOmit::BirthYear,
      ]),
      FieldUpdate::IndividualAtRisk(vec![]),
      FieldUpdate::CompletingParty(CompletingParty::ParentOrGuardian),
      FieldUpdate::CompletingName("John Doe".into()),
      FieldUpdate::CompletingEmail("john@example.com".into()),
      FieldUpdate::Status(RequestStatus::Completed),
    ];

    let mut states = vec![created.clone()];
    for (i, update) in updates.iter().cloned().enumerate() {
      let next = ops::set_field(c, created.uuid, update, t(10 + i as i64)).unwrap();
      states.push(next);
    }

    let history = ops::history(c, created.uuid).unwrap();
    assert_eq!(history.len(), updates.len());
    for (i, snapshot) in history.iter().enumerate() {
      assert_eq!(snapshot.version, i as i64 + 2);
      assert_eq!(snapshot.changed_field, updates[i].field());
      assert_eq!(snapshot.request, states[i]);
      assert_eq!(snapshot.changed_at, states[i + 1].updated_at);
    }

    let last = states.last().unwrap();
    assert_eq!(last.created_at, created.created_at);
    assert_eq!(last.uuid, created.uuid);
    assert_eq!(last.id, created.id);
    assert!(states.windows(2).all(|w| w[0].updated_at < w[1].updated_at));
  });
}

#[test]
fn updated_at_never_moves_backwards() {
  let mut conn = connection();
  rollback_only(&mut conn, |c| {
    let created = ops::insert(c, jane(), t(100)).unwrap();

    let updated = ops::set_field(
      c,
      created.uuid,
      FieldUpdate::Status(RequestStatus::UnderReview),
      t(50),
    )
    .unwrap();
    assert_eq!(updated.updated_at, created.updated_at);
    assert_eq!(updated.created_at, created.created_at);
  });
}

#[test]
fn history_rows_belong_to_their_request() {
  let mut conn = connection();
  rollback_only(&mut conn, |c| {
    let a = ops::insert(c, jane(), t(0)).unwrap();
    let b = ops::insert(c, jane(), t(0)).unwrap();
    ops::set_field(c, a.uuid, FieldUpdate::Reasons("a".into()), t(1)).unwrap();
    ops::set_field(c, b.uuid, FieldUpdate::Reasons("b".into()), t(1)).unwrap();
    ops::set_field(c, b.uuid, FieldUpdate::Reasons("bb".into()), t(2)).unwrap();

    assert_eq!(ops::history(c, a.uuid).unwrap().len(), 1);
    let b_history = ops::history(c, b.uuid).unwrap();
    assert_eq!(b_history.len(), 2);
    assert!(b_history.iter().all(|h| h.request.uuid == b.uuid));
    assert_eq!(b_history[1].request.reasons, "b");
  });
}
