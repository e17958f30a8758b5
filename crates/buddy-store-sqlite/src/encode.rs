//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and calendar dates as ISO
//! `YYYY-MM-DD`. Enum tags use their lowercase names.

use buddy_core::{
  birthday::{BirthdayRecord, Relationship},
  dedupe::{DedupeKey, SubjectKind},
  preferences::PermissionState,
  user::{UserKey, UserProfile},
};
use chrono::{DateTime, NaiveDate, Utc};

use crate::{Error, Result};

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn encode_relationship(r: Relationship) -> String { r.as_ref().to_owned() }

pub fn decode_relationship(s: &str) -> Result<Relationship> {
  s.parse()
    .map_err(|_| Error::Decode { column: "relationship", value: s.to_owned() })
}

pub fn encode_subject_kind(k: SubjectKind) -> String { k.as_ref().to_owned() }

pub fn decode_subject_kind(s: &str) -> Result<SubjectKind> {
  s.parse()
    .map_err(|_| Error::Decode { column: "subject_kind", value: s.to_owned() })
}

pub fn encode_permission(p: PermissionState) -> String { p.as_ref().to_owned() }

pub fn decode_permission(s: &str) -> Result<PermissionState> {
  s.parse()
    .map_err(|_| Error::Decode { column: "notification_permission", value: s.to_owned() })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `birthdays` row.
pub struct RawBirthday {
  pub birthday_id:  String,
  pub name:         String,
  pub birth_date:   String,
  pub relationship: String,
  pub phone_number: Option<String>,
  pub email:        Option<String>,
  pub notes:        Option<String>,
  pub photo_url:    Option<String>,
}

impl RawBirthday {
  pub fn into_record(self) -> Result<BirthdayRecord> {
    Ok(BirthdayRecord {
      id:           self.birthday_id,
      name:         self.name,
      date:         decode_date(&self.birth_date)?,
      relationship: decode_relationship(&self.relationship)?,
      phone_number: self.phone_number,
      email:        self.email,
      notes:        self.notes,
      photo_url:    self.photo_url,
    })
  }
}

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_key:   String,
  pub name:       String,
  pub photo_url:  Option<String>,
  pub created_at: String,
}

impl RawUser {
  pub fn into_profile(self) -> Result<UserProfile> {
    Ok(UserProfile {
      key:        UserKey::new(&self.user_key)?,
      name:       self.name,
      photo_url:  self.photo_url,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `notification_log` row.
pub struct RawLogEntry {
  pub day:          String,
  pub subject_kind: String,
  pub subject_id:   String,
}

impl RawLogEntry {
  pub fn into_key(self) -> Result<DedupeKey> {
    Ok(DedupeKey {
      day:     decode_date(&self.day)?,
      kind:    decode_subject_kind(&self.subject_kind)?,
      subject: self.subject_id,
    })
  }
}
