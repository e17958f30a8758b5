//! The in-app notification list.

use buddy_core::{birthday::BirthdayRecord, calendar::days_until};
use chrono::NaiveDate;
use serde::Serialize;

use crate::engine::ProximityEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  High,
  Medium,
  Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
  BirthdayToday,
  BirthdayTomorrow,
  BirthdayUpcoming,
  GeofenceNearby,
  Welcome,
  Feature,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
  pub kind:     FeedKind,
  pub priority: Priority,
  pub message:  String,
}

impl FeedItem {
  fn new(kind: FeedKind, priority: Priority, message: String) -> Self {
    Self { kind, priority, message }
  }
}

/// Inputs for one rendering of the feed.
pub struct FeedContext<'a> {
  pub records:     &'a [BirthdayRecord],
  pub today:       NaiveDate,
  /// Geofences currently containing the user; empty when geofencing is off
  /// or no fix is known.
  pub nearby:      &'a [ProximityEvent],
  pub first_visit: bool,
  pub show_promo:  bool,
}

/// Build the feed, grouped high to medium to low.
pub fn build(ctx: &FeedContext<'_>) -> Vec<FeedItem> {
  let mut dated: Vec<(i64, &BirthdayRecord)> = ctx
    .records
    .iter()
    .map(|r| (days_until(r.date, ctx.today), r))
    .filter(|(days, _)| *days <= 7)
    .collect();
  dated.sort_by_key(|(days, _)| *days);

  let mut items = Vec::new();
  for (days, record) in dated {
    let name = &record.name;
    items.push(match days {
      0 => FeedItem::new(
        FeedKind::BirthdayToday,
        Priority::High,
        format!("🎉 {name}'s birthday is today!"),
      ),
      1 => FeedItem::new(
        FeedKind::BirthdayTomorrow,
        Priority::Medium,
        format!("🎂 {name}'s birthday is tomorrow!"),
      ),
      n => FeedItem::new(
        FeedKind::BirthdayUpcoming,
        Priority::Low,
        format!("📅 {name}'s birthday is in {n} days"),
      ),
    });
  }

  for event in ctx.nearby {
    items.push(FeedItem::new(
      FeedKind::GeofenceNearby,
      Priority::Medium,
      format!("📍 You're near {} ({:.2} km away)", event.geofence.name, event.distance_km),
    ));
  }

  if ctx.records.is_empty() && ctx.first_visit {
    items.push(FeedItem::new(
      FeedKind::Welcome,
      Priority::Low,
      "👋 Welcome! Add your first birthday to get started.".into(),
    ));
  }

  if ctx.show_promo {
    items.push(FeedItem::new(
      FeedKind::Feature,
      Priority::Low,
      "🎯 Try the new geo-fencing feature to get location-based birthday alerts!".into(),
    ));
  }

  // Stable, so order within a priority is kept.
  items.sort_by_key(|i| i.priority);
  items
}
