//! Annual recurrence arithmetic over birth dates.
//!
//! Only month and day take part; the birth year is ignored. For counting
//! days, a 29 February birthday recurs on 1 March in years without a leap
//! day, but [`is_today`] only ever matches the calendar day itself.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::birthday::BirthdayRecord;

/// The date on which `birth` recurs in `year`.
pub fn occurrence_in(birth: NaiveDate, year: i32) -> NaiveDate {
  NaiveDate::from_ymd_opt(year, birth.month(), birth.day())
    .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
    .unwrap_or(NaiveDate::MAX)
}

/// Days from `today` to the next occurrence of `birth`; `0` when it is today.
pub fn days_until(birth: NaiveDate, today: NaiveDate) -> i64 {
  let this_year = occurrence_in(birth, today.year());
  let next = if this_year < today {
    occurrence_in(birth, today.year() + 1)
  } else {
    this_year
  };
  (next - today).num_days()
}

/// Whether `today` has the month and day of `birth`.
pub fn is_today(birth: NaiveDate, today: NaiveDate) -> bool {
  birth.month() == today.month() && birth.day() == today.day()
}

/// A record paired with its distance in days from today.
#[derive(Debug, Clone, Serialize)]
pub struct Upcoming<'a> {
  pub record:     &'a BirthdayRecord,
  pub days_until: i64,
}

/// Records whose next occurrence is at most `window_days` away, soonest
/// first, truncated to `limit`.
pub fn upcoming(
  records: &[BirthdayRecord],
  today: NaiveDate,
  window_days: i64,
  limit: usize,
) -> Vec<Upcoming<'_>> {
  let mut items: Vec<Upcoming<'_>> = records
    .iter()
    .map(|record| Upcoming { record, days_until: days_until(record.date, today) })
    .filter(|u| u.days_until <= window_days)
    .collect();
  items.sort_by_key(|u| u.days_until);
  items.truncate(limit);
  items
}

/// Dashboard summary counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
  pub total:            usize,
  pub this_month:       usize,
  /// Days to the nearest birthday strictly after today.
  pub next_birthday_in: Option<i64>,
}

pub fn stats(records: &[BirthdayRecord], today: NaiveDate) -> Stats {
  let this_month = records
    .iter()
    .filter(|r| r.date.month() == today.month())
    .count();
  let next_birthday_in = records
    .iter()
    .map(|r| days_until(r.date, today))
    .filter(|d| *d > 0)
    .min();
  Stats { total: records.len(), this_month, next_birthday_in }
}
