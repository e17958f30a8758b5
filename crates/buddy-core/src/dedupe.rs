//! Per-day record of alerts already shown.
//!
//! A `(day, subject)` pair present in the table means the alert for that
//! subject has fired on that calendar day. Entries from earlier days are
//! dropped by [`DedupeTable::prune`] at the start of every check.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// What an alert was about.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubjectKind {
  Birthday,
  Geofence,
}

/// Composite key of a dedup entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DedupeKey {
  pub day:     NaiveDate,
  pub kind:    SubjectKind,
  pub subject: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupeTable {
  shown: BTreeSet<DedupeKey>,
}

impl DedupeTable {
  pub fn new() -> Self { Self::default() }

  pub fn from_entries(entries: impl IntoIterator<Item = DedupeKey>) -> Self {
    Self { shown: entries.into_iter().collect() }
  }

  /// Keep only entries for `today`. Returns how many were dropped.
  pub fn prune(&mut self, today: NaiveDate) -> usize {
    let before = self.shown.len();
    self.shown.retain(|k| k.day == today);
    before - self.shown.len()
  }

  pub fn is_shown(&self, day: NaiveDate, kind: SubjectKind, subject: &str) -> bool {
    self.shown.contains(&DedupeKey { day, kind, subject: subject.to_owned() })
  }

  /// Record that the alert fired. Returns `false` if it was already recorded.
  pub fn mark_shown(&mut self, day: NaiveDate, kind: SubjectKind, subject: &str) -> bool {
    self.shown.insert(DedupeKey { day, kind, subject: subject.to_owned() })
  }

  /// Remove the entry so the alert can fire again the same day.
  pub fn forget(&mut self, day: NaiveDate, kind: SubjectKind, subject: &str) -> bool {
    self.shown.remove(&DedupeKey { day, kind, subject: subject.to_owned() })
  }

  pub fn entries(&self) -> impl Iterator<Item = &DedupeKey> { self.shown.iter() }

  pub fn len(&self) -> usize { self.shown.len() }

  pub fn is_empty(&self) -> bool { self.shown.is_empty() }
}
