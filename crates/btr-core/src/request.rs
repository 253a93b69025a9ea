//! The omission request entity, its create input, and its wire projection.
//!
//! A request is created once from an untyped wire payload and afterwards only
//! changed one field at a time through [`FieldUpdate`]. Every committed field
//! change leaves a [`RequestHistory`] snapshot of the state it replaced.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer, de::DeserializeOwned};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Enumerations ────────────────────────────────────────────────────────────

/// A category of personal information the applicant asks to withhold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InformationToOmit {
  FullName,
  BirthYear,
  FullBirthDate,
  Address,
  Email,
  PhoneNumber,
  Citizenship,
  TaxNumber,
}

/// Who would be put at risk if the information were disclosed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndividualAtRisk {
  Applicant,
  FamilyMember,
  OtherIndividual,
}

/// Who filled in the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletingParty {
  Individual,
  ParentOrGuardian,
  Representative,
}

/// Review workflow state. Any state may follow any other.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
  #[default]
  AwaitingReview,
  UnderReview,
  Approved,
  Rejected,
  Completed,
}

// ─── Wire helpers ────────────────────────────────────────────────────────────

/// Timestamps leave the service as RFC 3339 with an explicit `+00:00` offset.
fn wire_timestamp<S: Serializer>(
  dt: &DateTime<Utc>,
  serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
  serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Micros, false))
}

fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Result<T> {
  serde_json::from_value(value)
    .map_err(|e| Error::Validation(format!("{key}: {e}")))
}

fn validate_information_to_omit(items: &[InformationToOmit]) -> Result<()> {
  if items.is_empty() {
    return Err(Error::Validation(
      "informationToOmit: at least one category is required".to_owned(),
    ));
  }
  let mut seen = HashSet::with_capacity(items.len());
  if let Some(dup) = items.iter().find(|item| !seen.insert(**item)) {
    return Err(Error::Validation(format!(
      "informationToOmit: duplicate category {dup:?}"
    )));
  }
  Ok(())
}

// ─── OmissionRequest ─────────────────────────────────────────────────────────

/// The live state of a request to omit information.
///
/// Serialises to the wire form: camelCase keys, enum wire tokens, RFC 3339
/// timestamps. The internal `version` counter is not exposed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OmissionRequest {
  /// Store-assigned sequential id; never reused.
  pub id:                  i64,
  /// The external identifier; generated once at creation.
  pub uuid:                Uuid,
  pub full_name:           String,
  pub email:               String,
  pub birthdate:           NaiveDate,
  pub business_identifier: String,
  pub information_to_omit: Vec<InformationToOmit>,
  pub individual_at_risk:  Vec<IndividualAtRisk>,
  pub reasons:             String,
  pub completing_party:    CompletingParty,
  pub completing_name:     String,
  pub completing_email:    String,
  #[serde(serialize_with = "wire_timestamp")]
  pub created_at:          DateTime<Utc>,
  #[serde(serialize_with = "wire_timestamp")]
  pub updated_at:          DateTime<Utc>,
  pub status:              RequestStatus,
  /// 1 at creation, incremented by each committed field change.
  #[serde(skip)]
  pub version:             i64,
}

impl OmissionRequest {
  /// Project the record onto its wire field names.
  pub fn to_wire(&self) -> Result<Map<String, Value>> {
    match serde_json::to_value(self)? {
      Value::Object(map) => Ok(map),
      other => Err(Error::Validation(format!(
        "request serialised to a non-object: {other}"
      ))),
    }
  }
}

// ─── NewRequest ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::RequestStore::create`].
///
/// `id`, `uuid` and the timestamps are always assigned by the store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
  pub full_name:           String,
  pub email:               String,
  pub birthdate:           NaiveDate,
  pub business_identifier: String,
  pub information_to_omit: Vec<InformationToOmit>,
  pub individual_at_risk:  Vec<IndividualAtRisk>,
  pub reasons:             String,
  pub completing_party:    CompletingParty,
  pub completing_name:     String,
  pub completing_email:    String,
  /// Only supplied when restoring or seeding records.
  #[serde(default)]
  pub status:              Option<RequestStatus>,
}

impl NewRequest {
  /// Decode an untyped wire payload. Unknown keys are ignored.
  pub fn from_wire(input: Value) -> Result<Self> {
    let request: Self = serde_json::from_value(input)
      .map_err(|e| Error::Validation(e.to_string()))?;
    request.validate()?;
    Ok(request)
  }

  pub fn validate(&self) -> Result<()> {
    validate_information_to_omit(&self.information_to_omit)
  }

  /// Build the initial record state. Status falls back to
  /// [`RequestStatus::AwaitingReview`]; both timestamps are `now`.
  pub fn into_request(
    self,
    id: i64,
    uuid: Uuid,
    now: DateTime<Utc>,
  ) -> OmissionRequest {
    OmissionRequest {
      id,
      uuid,
      full_name: self.full_name,
      email: self.email,
      birthdate: self.birthdate,
      business_identifier: self.business_identifier,
      information_to_omit: self.information_to_omit,
      individual_at_risk: self.individual_at_risk,
      reasons: self.reasons,
      completing_party: self.completing_party,
      completing_name: self.completing_name,
      completing_email: self.completing_email,
      created_at: now,
      updated_at: now,
      status: self.status.unwrap_or_default(),
      version: 1,
    }
  }
}

// ─── Field selection ─────────────────────────────────────────────────────────

/// The fields a caller may change after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestField {
  FullName,
  Email,
  Birthdate,
  BusinessIdentifier,
  InformationToOmit,
  IndividualAtRisk,
  Reasons,
  CompletingParty,
  CompletingName,
  CompletingEmail,
  Status,
}

impl RequestField {
  pub const ALL: [RequestField; 11] = [
    Self::FullName,
    Self::Email,
    Self::Birthdate,
    Self::BusinessIdentifier,
    Self::InformationToOmit,
    Self::IndividualAtRisk,
    Self::Reasons,
    Self::CompletingParty,
    Self::CompletingName,
    Self::CompletingEmail,
    Self::Status,
  ];

  /// The key used in API payloads. Must match the serde tags above.
  pub fn wire_name(self) -> &'static str {
    match self {
      Self::FullName => "fullName",
      Self::Email => "email",
      Self::Birthdate => "birthdate",
      Self::BusinessIdentifier => "businessIdentifier",
      Self::InformationToOmit => "informationToOmit",
      Self::IndividualAtRisk => "individualAtRisk",
      Self::Reasons => "reasons",
      Self::CompletingParty => "completingParty",
      Self::CompletingName => "completingName",
      Self::CompletingEmail => "completingEmail",
      Self::Status => "status",
    }
  }

  /// The storage column name.
  pub fn column(self) -> &'static str {
    match self {
      Self::FullName => "full_name",
      Self::Email => "email",
      Self::Birthdate => "birthdate",
      Self::BusinessIdentifier => "business_identifier",
      Self::InformationToOmit => "information_to_omit",
      Self::IndividualAtRisk => "individual_at_risk",
      Self::Reasons => "reasons",
      Self::CompletingParty => "completing_party",
      Self::CompletingName => "completing_name",
      Self::CompletingEmail => "completing_email",
      Self::Status => "status",
    }
  }

  pub fn from_column(column: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|f| f.column() == column)
  }
}

/// A single typed field change.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
  FullName(String),
  Email(String),
  Birthdate(NaiveDate),
  BusinessIdentifier(String),
  InformationToOmit(Vec<InformationToOmit>),
  IndividualAtRisk(Vec<IndividualAtRisk>),
  Reasons(String),
  CompletingParty(CompletingParty),
  CompletingName(String),
  CompletingEmail(String),
  Status(RequestStatus),
}

impl FieldUpdate {
  /// Parse a wire key (case-exact) and its JSON value.
  pub fn from_wire(key: &str, value: Value) -> Result<Self> {
    let update = match key {
      "fullName" => Self::FullName(decode(key, value)?),
      "email" => Self::Email(decode(key, value)?),
      "birthdate" => Self::Birthdate(decode(key, value)?),
      "businessIdentifier" => Self::BusinessIdentifier(decode(key, value)?),
      "informationToOmit" => Self::InformationToOmit(decode(key, value)?),
      "individualAtRisk" => Self::IndividualAtRisk(decode(key, value)?),
      "reasons" => Self::Reasons(decode(key, value)?),
      "completingParty" => Self::CompletingParty(decode(key, value)?),
      "completingName" => Self::CompletingName(decode(key, value)?),
      "completingEmail" => Self::CompletingEmail(decode(key, value)?),
      "status" => Self::Status(decode(key, value)?),
      "id" | "uuid" | "createdAt" | "updatedAt" => {
        return Err(Error::ImmutableField(key.to_owned()));
      }
      other => return Err(Error::UnknownField(other.to_owned())),
    };
    update.validate()?;
    Ok(update)
  }

  pub fn validate(&self) -> Result<()> {
    match self {
      Self::InformationToOmit(items) => validate_information_to_omit(items),
      _ => Ok(()),
    }
  }

  pub fn field(&self) -> RequestField {
    match self {
      Self::FullName(_) => RequestField::FullName,
      Self::Email(_) => RequestField::Email,
      Self::Birthdate(_) => RequestField::Birthdate,
      Self::BusinessIdentifier(_) => RequestField::BusinessIdentifier,
      Self::InformationToOmit(_) => RequestField::InformationToOmit,
      Self::IndividualAtRisk(_) => RequestField::IndividualAtRisk,
      Self::Reasons(_) => RequestField::Reasons,
      Self::CompletingParty(_) => RequestField::CompletingParty,
      Self::CompletingName(_) => RequestField::CompletingName,
      Self::CompletingEmail(_) => RequestField::CompletingEmail,
      Self::Status(_) => RequestField::Status,
    }
  }

  /// Write the value into `request`. Returns `false` when the field already
  /// held it. Timestamps and version are left to the store.
  pub fn apply(self, request: &mut OmissionRequest) -> bool {
    fn set<T: PartialEq>(slot: &mut T, value: T) -> bool {
      if *slot == value {
        return false;
      }
      *slot = value;
      true
    }

    match self {
      Self::FullName(v) => set(&mut request.full_name, v),
      Self::Email(v) => set(&mut request.email, v),
      Self::Birthdate(v) => set(&mut request.birthdate, v),
      Self::BusinessIdentifier(v) => set(&mut request.business_identifier, v),
      Self::InformationToOmit(v) => set(&mut request.information_to_omit, v),
      Self::IndividualAtRisk(v) => set(&mut request.individual_at_risk, v),
      Self::Reasons(v) => set(&mut request.reasons, v),
      Self::CompletingParty(v) => set(&mut request.completing_party, v),
      Self::CompletingName(v) => set(&mut request.completing_name, v),
      Self::CompletingEmail(v) => set(&mut request.completing_email, v),
      Self::Status(v) => set(&mut request.status, v),
    }
  }
}

// ─── History ─────────────────────────────────────────────────────────────────

/// A read-only copy of a request as it stood immediately before one field
/// change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHistory {
  /// Sequence number of the change; the first change is version 2 since
  /// creation counts as version 1.
  pub version:       i64,
  /// When this state was superseded.
  #[serde(serialize_with = "wire_timestamp")]
  pub changed_at:    DateTime<Utc>,
  pub changed_field: RequestField,
  pub request:       OmissionRequest,
}
