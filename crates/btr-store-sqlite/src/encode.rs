//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, dates as `YYYY-MM-DD`, UUIDs as
//! hyphenated lowercase strings. Enumerations use lowercase storage tokens
//! that are independent of the wire tokens; lists of them are JSON arrays.

use btr_core::request::{
  CompletingParty, IndividualAtRisk, InformationToOmit, OmissionRequest,
  RequestStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> / NaiveDate ───────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── RequestStatus ───────────────────────────────────────────────────────────

pub fn encode_status(s: RequestStatus) -> &'static str {
  match s {
    RequestStatus::AwaitingReview => "awaiting_review",
    RequestStatus::UnderReview => "under_review",
    RequestStatus::Approved => "approved",
    RequestStatus::Rejected => "rejected",
    RequestStatus::Completed => "completed",
  }
}

pub fn decode_status(s: &str) -> Result<RequestStatus> {
  match s {
    "awaiting_review" => Ok(RequestStatus::AwaitingReview),
    "under_review" => Ok(RequestStatus::UnderReview),
    "approved" => Ok(RequestStatus::Approved),
    "rejected" => Ok(RequestStatus::Rejected),
    "completed" => Ok(RequestStatus::Completed),
    other => Err(Error::Decode(format!("unknown status: {other:?}"))),
  }
}

// ─── CompletingParty ─────────────────────────────────────────────────────────

pub fn encode_party(p: CompletingParty) -> &'static str {
  match p {
    CompletingParty::Individual => "individual",
    CompletingParty::ParentOrGuardian => "parent_or_guardian",
    CompletingParty::Representative => "representative",
  }
}

pub fn decode_party(s: &str) -> Result<CompletingParty> {
  match s {
    "individual" => Ok(CompletingParty::Individual),
    "parent_or_guardian" => Ok(CompletingParty::ParentOrGuardian),
    "representative" => Ok(CompletingParty::Representative),
    other => Err(Error::Decode(format!("unknown completing party: {other:?}"))),
  }
}

// ─── InformationToOmit ───────────────────────────────────────────────────────

fn encode_category(c: InformationToOmit) -> &'static str {
  match c {
    InformationToOmit::FullName => "full_name",
    InformationToOmit::BirthYear => "birth_year",
    InformationToOmit::FullBirthDate => "full_birth_date",
    InformationToOmit::Address => "address",
    InformationToOmit::Email => "email",
    InformationToOmit::PhoneNumber => "phone_number",
    InformationToOmit::Citizenship => "citizenship",
    InformationToOmit::TaxNumber => "tax_number",
  }
}

fn decode_category(s: &str) -> Result<InformationToOmit> {
  match s {
    "full_name" => Ok(InformationToOmit::FullName),
    "birth_year" => Ok(InformationToOmit::BirthYear),
    "full_birth_date" => Ok(InformationToOmit::FullBirthDate),
    "address" => Ok(InformationToOmit::Address),
    "email" => Ok(InformationToOmit::Email),
    "phone_number" => Ok(InformationToOmit::PhoneNumber),
    "citizenship" => Ok(InformationToOmit::Citizenship),
    "tax_number" => Ok(InformationToOmit::TaxNumber),
    other => Err(Error::Decode(format!("unknown category: {other:?}"))),
  }
}

pub fn encode_categories(items: &[InformationToOmit]) -> Result<String> {
  let tokens: Vec<&str> = items.iter().copied().map(encode_category).collect();
  Ok(serde_json::to_string(&tokens)?)
}

pub fn decode_categories(s: &str) -> Result<Vec<InformationToOmit>> {
  let tokens: Vec<String> = serde_json::from_str(s)?;
  tokens.iter().map(|t| decode_category(t)).collect()
}

// ─── IndividualAtRisk ────────────────────────────────────────────────────────

fn encode_risk(r: IndividualAtRisk) -> &'static str {
  match r {
    IndividualAtRisk::Applicant => "applicant",
    IndividualAtRisk::FamilyMember => "family_member",
    IndividualAtRisk::OtherIndividual => "other_individual",
  }
}

fn decode_risk(s: &str) -> Result<IndividualAtRisk> {
  match s {
    "applicant" => Ok(IndividualAtRisk::Applicant),
    "family_member" => Ok(IndividualAtRisk::FamilyMember),
    "other_individual" => Ok(IndividualAtRisk::OtherIndividual),
    other => Err(Error::Decode(format!("unknown risk flag: {other:?}"))),
  }
}

pub fn encode_risks(items: &[IndividualAtRisk]) -> Result<String> {
  let tokens: Vec<&str> = items.iter().copied().map(encode_risk).collect();
  Ok(serde_json::to_string(&tokens)?)
}

pub fn decode_risks(s: &str) -> Result<Vec<IndividualAtRisk>> {
  let tokens: Vec<String> = serde_json::from_str(s)?;
  tokens.iter().map(|t| decode_risk(t)).collect()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column values of one request, ready to bind as statement parameters.
///
/// The same shape is written to `request` and to `request_history`.
pub struct EncodedRequest {
  pub uuid:                String,
  pub full_name:           String,
  pub email:               String,
  pub birthdate:           String,
  pub business_identifier: String,
  pub information_to_omit: String,
  pub individual_at_risk:  String,
  pub reasons:             String,
  pub completing_party:    &'static str,
  pub completing_name:     String,
  pub completing_email:    String,
  pub created_at:          String,
  pub updated_at:          String,
  pub status:              &'static str,
}

impl EncodedRequest {
  pub fn new(r: &OmissionRequest) -> Result<Self> {
    Ok(Self {
      uuid:                encode_uuid(r.uuid),
      full_name:           r.full_name.clone(),
      email:               r.email.clone(),
      birthdate:           encode_date(r.birthdate),
      business_identifier: r.business_identifier.clone(),
      information_to_omit: encode_categories(&r.information_to_omit)?,
      individual_at_risk:  encode_risks(&r.individual_at_risk)?,
      reasons:             r.reasons.clone(),
      completing_party:    encode_party(r.completing_party),
      completing_name:     r.completing_name.clone(),
      completing_email:    r.completing_email.clone(),
      created_at:          encode_dt(r.created_at),
      updated_at:          encode_dt(r.updated_at),
      status:              encode_status(r.status),
    })
  }
}

/// Raw values read from a request-shaped row, in the column order
/// `id, uuid, full_name, email, birthdate, business_identifier,
/// information_to_omit, individual_at_risk, reasons, completing_party,
/// completing_name, completing_email, created_at, updated_at, status,
/// version`.
pub struct RawRequest {
  pub id:                  i64,
  pub uuid:                String,
  pub full_name:           String,
  pub email:               String,
  pub birthdate:           String,
  pub business_identifier: String,
  pub information_to_omit: String,
  pub individual_at_risk:  String,
  pub reasons:             String,
  pub completing_party:    String,
  pub completing_name:     String,
  pub completing_email:    String,
  pub created_at:          String,
  pub updated_at:          String,
  pub status:              String,
  pub version:             i64,
}

impl RawRequest {
  /// Read the request columns starting at index `offset`.
  pub fn from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                  row.get(offset)?,
      uuid:                row.get(offset + 1)?,
      full_name:           row.get(offset + 2)?,
      email:               row.get(offset + 3)?,
      birthdate:           row.get(offset + 4)?,
      business_identifier: row.get(offset + 5)?,
      information_to_omit: row.get(offset + 6)?,
      individual_at_risk:  row.get(offset + 7)?,
      reasons:             row.get(offset + 8)?,
      completing_party:    row.get(offset + 9)?,
      completing_name:     row.get(offset + 10)?,
      completing_email:    row.get(offset + 11)?,
      created_at:          row.get(offset + 12)?,
      updated_at:          row.get(offset + 13)?,
      status:              row.get(offset + 14)?,
      version:             row.get(offset + 15)?,
    })
  }

  pub fn into_request(self) -> Result<OmissionRequest> {
    Ok(OmissionRequest {
      id:                  self.id,
      uuid:                decode_uuid(&self.uuid)?,
      full_name:           self.full_name,
      email:               self.email,
      birthdate:           decode_date(&self.birthdate)?,
      business_identifier: self.business_identifier,
      information_to_omit: decode_categories(&self.information_to_omit)?,
      individual_at_risk:  decode_risks(&self.individual_at_risk)?,
      reasons:             self.reasons,
      completing_party:    decode_party(&self.completing_party)?,
      completing_name:     self.completing_name,
      completing_email:    self.completing_email,
      created_at:          decode_dt(&self.created_at)?,
      updated_at:          decode_dt(&self.updated_at)?,
      status:              decode_status(&self.status)?,
      version:             self.version,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn storage_tokens_differ_from_wire_tokens() {
    assert_eq!(encode_status(RequestStatus::AwaitingReview), "awaiting_review");
    assert_eq!(
      serde_json::to_value(RequestStatus::AwaitingReview).unwrap(),
      serde_json::json!("AWAITING_REVIEW")
    );
  }

  #[test]
  fn category_list_preserves_order() {
    let items = vec![
      InformationToOmit::TaxNumber,
      InformationToOmit::Address,
      InformationToOmit::FullName,
    ];
    let encoded = encode_categories(&items).unwrap();
    assert_eq!(encoded, r#"["tax_number","address","full_name"]"#);
    assert_eq!(decode_categories(&encoded).unwrap(), items);
  }

  #[test]
  fn unknown_stored_token_is_a_decode_error() {
    assert!(matches!(decode_status("pending"), Err(Error::Decode(_))));
    assert!(matches!(decode_risks(r#"["cousin"]"#), Err(Error::Decode(_))));
  }

  #[test]
  fn dates_use_iso_calendar_form() {
    let d = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
    assert_eq!(encode_date(d), "1990-01-01");
    assert_eq!(decode_date("1990-01-01").unwrap(), d);
    assert!(matches!(decode_date("1990/01/01"), Err(Error::DateParse(_))));
  }
}
