//! Time-based record identifiers.

use chrono::{DateTime, Utc};

/// Millisecond timestamp rendered as a decimal string, bumped by one until
/// `taken` no longer claims it.
///
/// Records created within the same millisecond still get distinct ids, and
/// ids sort roughly by creation time.
pub fn time_based_id(now: DateTime<Utc>, taken: impl Fn(&str) -> bool) -> String {
  let mut millis = now.timestamp_millis();
  loop {
    let candidate = millis.to_string();
    if !taken(&candidate) {
      return candidate;
    }
    millis += 1;
  }
}
