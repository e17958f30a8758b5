//! Birthday records: the data the reminder engine acts upon.
//!
//! Records are owned by a single user and stored as a full list per user.
//! The id is assigned once at creation and never changes; edits replace every
//! other field in place.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result, ident::time_based_id};

// ─── Relationship ────────────────────────────────────────────────────────────

/// How the owning user knows the person.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  AsRefStr,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Relationship {
  Family,
  Friend,
  Colleague,
  Partner,
  #[default]
  Other,
}

impl Relationship {
  /// Parse a free-text tag; anything unrecognised becomes [`Self::Other`].
  pub fn parse_lossy(s: &str) -> Self { s.trim().parse().unwrap_or_default() }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A stored birthday. The year component of `date` is kept for display but
/// ignored for recurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirthdayRecord {
  pub id:           String,
  pub name:         String,
  pub date:         NaiveDate,
  pub relationship: Relationship,
  pub phone_number: Option<String>,
  pub email:        Option<String>,
  pub notes:        Option<String>,
  pub photo_url:    Option<String>,
}

impl BirthdayRecord {
  /// Whether the record carries a way to send wishes directly.
  pub fn has_contact(&self) -> bool { self.phone_number.is_some() || self.email.is_some() }
}

// ─── Input ───────────────────────────────────────────────────────────────────

/// Form input for adding or editing a birthday.
#[derive(Debug, Clone, Default)]
pub struct NewBirthday {
  pub name:         String,
  pub date:         Option<NaiveDate>,
  pub relationship: Relationship,
  pub phone_number: Option<String>,
  pub email:        Option<String>,
  pub notes:        Option<String>,
  pub photo_url:    Option<String>,
}

impl NewBirthday {
  pub fn new(name: impl Into<String>, date: NaiveDate) -> Self {
    Self { name: name.into(), date: Some(date), ..Self::default() }
  }

  /// Check mandatory fields and return the normalised values.
  fn validated(self) -> Result<ValidBirthday> {
    let name = self.name.trim().to_owned();
    if name.is_empty() {
      return Err(Error::MissingName);
    }
    let date = self.date.ok_or(Error::MissingDate)?;
    Ok(ValidBirthday {
      name,
      date,
      relationship: self.relationship,
      phone_number: non_blank(self.phone_number),
      email: non_blank(self.email),
      notes: non_blank(self.notes),
      photo_url: non_blank(self.photo_url),
    })
  }

  /// Build a brand-new record, assigning an id unique within `existing`.
  pub fn into_record(
    self,
    now: DateTime<Utc>,
    existing: &[BirthdayRecord],
  ) -> Result<BirthdayRecord> {
    let valid = self.validated()?;
    let id = time_based_id(now, |candidate| existing.iter().any(|b| b.id == candidate));
    Ok(valid.into_record(id))
  }

  /// Apply this input to `current`, keeping its id and, when no new photo is
  /// supplied, its photo.
  pub fn apply_to(self, current: &BirthdayRecord) -> Result<BirthdayRecord> {
    let mut valid = self.validated()?;
    if valid.photo_url.is_none() {
      valid.photo_url = current.photo_url.clone();
    }
    Ok(valid.into_record(current.id.clone()))
  }
}

struct ValidBirthday {
  name:         String,
  date:         NaiveDate,
  relationship: Relationship,
  phone_number: Option<String>,
  email:        Option<String>,
  notes:        Option<String>,
  photo_url:    Option<String>,
}

impl ValidBirthday {
  fn into_record(self, id: String) -> BirthdayRecord {
    BirthdayRecord {
      id,
      name: self.name,
      date: self.date,
      relationship: self.relationship,
      phone_number: self.phone_number,
      email: self.email,
      notes: self.notes,
      photo_url: self.photo_url,
    }
  }
}

fn non_blank(value: Option<String>) -> Option<String> {
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
}

/// Parse an ISO `YYYY-MM-DD` birth date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
    .map_err(|_| Error::InvalidDate(s.to_owned()))
}
