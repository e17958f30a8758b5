//! Decides which birthday and proximity alerts reach the user, and how.
//!
//! Both triggers share one [`DedupeTable`]: an alert fires at most once per
//! subject per calendar day. System notifications are attempted only when
//! the platform permits them and the user has not switched them off; in-app
//! presentations are returned to the caller, which owns their timing.

use std::{sync::Arc, time::Duration};

use buddy_core::{
  birthday::BirthdayRecord,
  calendar,
  contact::ContactPopup,
  dedupe::{DedupeTable, SubjectKind},
  preferences::NotificationPreferences,
};
use chrono::NaiveDate;
use serde::Serialize;

use crate::{
  capability::{Notifier, PermissionState, Presentation, SystemNotification, ToastKind},
  config::AlertConfig,
  engine::ProximityEvent,
};

/// A presentation to show after `delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheduled<T> {
  pub delay: Duration,
  pub item:  T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
  Unsupported,
  Enabled,
  /// The platform permission was denied.
  Blocked,
  /// Supported but not granted yet, or switched off by the user.
  NeedsPermission,
}

/// Result of asking for notification permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
  Unsupported,
  Granted,
  /// The prompt was shown and refused.
  Denied,
  /// Previously denied; no prompt was shown.
  Blocked,
}

pub struct Dispatcher<N> {
  notifier:    Arc<N>,
  preferences: NotificationPreferences,
  dedupe:      DedupeTable,
  config:      AlertConfig,
}

impl<N: Notifier> Dispatcher<N> {
  pub fn new(notifier: Arc<N>, config: AlertConfig) -> Self {
    Self {
      notifier,
      preferences: NotificationPreferences::default(),
      dedupe: DedupeTable::new(),
      config,
    }
  }

  pub fn load(&mut self, preferences: NotificationPreferences, dedupe: DedupeTable) {
    self.preferences = preferences;
    self.dedupe = dedupe;
  }

  pub fn preferences(&self) -> &NotificationPreferences { &self.preferences }

  pub fn preferences_mut(&mut self) -> &mut NotificationPreferences { &mut self.preferences }

  pub fn dedupe(&self) -> &DedupeTable { &self.dedupe }

  // ─── Birthdays ─────────────────────────────────────────────────────────────

  /// Fire alerts for every record whose birthday is `today` and that has
  /// not been alerted today. Popups are staggered in record order.
  pub fn birthdays_due(
    &mut self,
    today: NaiveDate,
    records: &[BirthdayRecord],
  ) -> Vec<Scheduled<Presentation>> {
    let pruned = self.dedupe.prune(today);
    if pruned > 0 {
      tracing::debug!(pruned, "dropped dedup entries from earlier days");
    }

    let due: Vec<&BirthdayRecord> = records
      .iter()
      .filter(|r| calendar::is_today(r.date, today))
      .filter(|r| !self.dedupe.is_shown(today, SubjectKind::Birthday, &r.id))
      .collect();

    let mut scheduled = Vec::with_capacity(due.len());
    for (index, record) in due.into_iter().enumerate() {
      tracing::info!(birthday = %record.id, name = %record.name, "birthday today");
      self.notify(&birthday_notification(record));
      scheduled.push(Scheduled {
        delay: self.config.popup_delay(index),
        item:  birthday_presentation(record),
      });
      self.dedupe.mark_shown(today, SubjectKind::Birthday, &record.id);
    }
    scheduled
  }

  /// Re-fire for a record just edited onto today, regardless of whether it
  /// was already alerted today.
  pub fn birthday_edited(
    &mut self,
    today: NaiveDate,
    record: &BirthdayRecord,
  ) -> Option<Scheduled<Presentation>> {
    if !calendar::is_today(record.date, today) {
      return None;
    }
    self.dedupe.forget(today, SubjectKind::Birthday, &record.id);
    self.notify(&birthday_notification(record));
    self.dedupe.mark_shown(today, SubjectKind::Birthday, &record.id);
    Some(Scheduled {
      delay: self.config.edit_popup_delay(),
      item:  birthday_presentation(record),
    })
  }

  // ─── Proximity ─────────────────────────────────────────────────────────────

  /// In-app messages for the proximity events not yet alerted today.
  pub fn proximity(&mut self, today: NaiveDate, events: &[ProximityEvent]) -> Vec<Presentation> {
    self.dedupe.prune(today);

    let mut out = Vec::new();
    for event in events {
      let fence = &event.geofence;
      if !self.dedupe.mark_shown(today, SubjectKind::Geofence, &fence.id) {
        tracing::debug!(geofence = %fence.id, "proximity alert already shown today");
        continue;
      }
      tracing::info!(geofence = %fence.id, distance_km = event.distance_km, "inside geofence");

      self.notify(&SystemNotification {
        title: format!("📍 Near {}", fence.name),
        body:  format!("You're {:.2} km from {}.", event.distance_km, fence.name),
        tag:   format!("geofence-{}", fence.id),
      });
      out.push(Presentation::toast(
        format!("You're near {}! ({:.2} km away)", fence.name, event.distance_km),
        ToastKind::Info,
      ));
      if event.distance_km < self.config.nearby_hint_km {
        out.push(Presentation::toast(
          "You might be near someone's birthday location!",
          ToastKind::Success,
        ));
      }
    }
    out
  }

  // ─── Permission ────────────────────────────────────────────────────────────

  pub fn status(&self) -> NotificationStatus {
    if !self.notifier.is_supported() {
      return NotificationStatus::Unsupported;
    }
    match self.notifier.permission() {
      PermissionState::Denied => NotificationStatus::Blocked,
      PermissionState::Granted if self.preferences.system_notifications => {
        NotificationStatus::Enabled
      }
      _ => NotificationStatus::NeedsPermission,
    }
  }

  /// Ask for notification permission. A denied permission is re-requested
  /// only when `explicit` is set, i.e. on a direct user action.
  pub async fn request_permission(&self, explicit: bool) -> PermissionOutcome {
    if !self.notifier.is_supported() {
      return PermissionOutcome::Unsupported;
    }
    match self.notifier.permission() {
      PermissionState::Granted => return PermissionOutcome::Granted,
      PermissionState::Denied if !explicit => return PermissionOutcome::Blocked,
      _ => {}
    }

    match self.notifier.request_permission().await {
      PermissionState::Granted => {
        tracing::info!("notification permission granted");
        self.notify(&SystemNotification {
          title: "Birthday Buddy Notifications Enabled! 🎉".into(),
          body:  "You will receive notifications on birthdays".into(),
          tag:   "notification-enabled".into(),
        });
        PermissionOutcome::Granted
      }
      _ => {
        tracing::info!("notification permission denied");
        PermissionOutcome::Denied
      }
    }
  }

  /// Show a system notification if allowed. Failures are logged only.
  fn notify(&self, notification: &SystemNotification) -> bool {
    if !self.preferences.system_notifications
      || !self.notifier.is_supported()
      || self.notifier.permission() != PermissionState::Granted
    {
      return false;
    }
    match self.notifier.show(notification) {
      Ok(()) => true,
      Err(e) => {
        tracing::warn!(error = %e, tag = %notification.tag, "system notification failed");
        false
      }
    }
  }
}

fn birthday_notification(record: &BirthdayRecord) -> SystemNotification {
  let body = match (&record.phone_number, &record.email) {
    (Some(_), Some(_)) => "Click to send a birthday wish (WhatsApp or Gmail)",
    (Some(_), None) => "Click to send a birthday wish on WhatsApp",
    (None, Some(_)) => "Click to send a birthday wish on Gmail",
    (None, None) => "Click to send a birthday wish",
  };
  SystemNotification {
    title: format!("🎉 It's {}'s Birthday!", record.name),
    body:  body.to_owned(),
    tag:   format!("birthday-{}", record.id),
  }
}

fn birthday_presentation(record: &BirthdayRecord) -> Presentation {
  if record.has_contact() {
    Presentation::ContactPopup(ContactPopup::for_record(record, None))
  } else {
    Presentation::toast(
      format!("🎉 {}'s birthday is today! Add phone number or email to send wishes.", record.name),
      ToastKind::Info,
    )
  }
}

#[cfg(test)]
mod tests {
  use buddy_core::{
    birthday::{NewBirthday, Relationship},
    geofence::Geofence,
  };
  use chrono::Utc;

  use super::*;
  use crate::testing::{date, FakeNotifier};

  fn record(id: &str, name: &str, born: NaiveDate, phone: Option<&str>) -> BirthdayRecord {
    BirthdayRecord {
      id:           id.to_owned(),
      name:         name.to_owned(),
      date:         born,
      relationship: Relationship::Friend,
      phone_number: phone.map(str::to_owned),
      email:        None,
      notes:        None,
      photo_url:    None,
    }
  }

  fn dispatcher(notifier: &Arc<FakeNotifier>) -> Dispatcher<FakeNotifier> {
    Dispatcher::new(notifier.clone(), AlertConfig::default())
  }

  #[test]
  fn due_birthday_fires_once_per_day() {
    let notifier = Arc::new(FakeNotifier::granted());
    let mut d = dispatcher(&notifier);
    let today = date(2024, 3, 15);
    let records = [record("1", "Sam", date(1990, 3, 15), Some("555"))];

    let first = d.birthdays_due(today, &records);
    assert_eq!(first.len(), 1);
    assert!(matches!(first[0].item, Presentation::ContactPopup(_)));
    assert_eq!(notifier.shown().len(), 1);
    assert_eq!(notifier.shown()[0].title, "🎉 It's Sam's Birthday!");

    assert!(d.birthdays_due(today, &records).is_empty());
    assert_eq!(notifier.shown().len(), 1);
  }

  #[test]
  fn edit_onto_today_bypasses_dedup() {
    let notifier = Arc::new(FakeNotifier::granted());
    let mut d = dispatcher(&notifier);
    let today = date(2024, 3, 15);
    let sam = record("1", "Sam", date(1990, 3, 15), None);
    d.birthdays_due(today, std::slice::from_ref(&sam));

    let again = d.birthday_edited(today, &sam).unwrap();
    assert_eq!(again.delay, Duration::from_millis(2000));
    assert_eq!(notifier.shown().len(), 2);
    // Still marked, so the regular check stays quiet.
    assert!(d.birthdays_due(today, std::slice::from_ref(&sam)).is_empty());
  }

  #[test]
  fn edit_away_from_today_does_nothing() {
    let notifier = Arc::new(FakeNotifier::granted());
    let mut d = dispatcher(&notifier);
    let moved = record("1", "Sam", date(1990, 6, 1), None);
    assert!(d.birthday_edited(date(2024, 3, 15), &moved).is_none());
    assert!(notifier.shown().is_empty());
  }

  #[test]
  fn new_day_fires_again() {
    let notifier = Arc::new(FakeNotifier::granted());
    let mut d = dispatcher(&notifier);
    let records = [record("1", "Leap", date(1992, 2, 29), None)];

    // Only the 29th itself; common years pass without an alert.
    assert!(d.birthdays_due(date(2023, 3, 1), &records).is_empty());
    assert_eq!(d.birthdays_due(date(2024, 2, 29), &records).len(), 1);
    assert_eq!(d.dedupe().len(), 1);

    let today = [record("2", "Sam", date(1990, 6, 1), None)];
    assert_eq!(d.birthdays_due(date(2024, 6, 1), &today).len(), 1);
    assert_eq!(d.birthdays_due(date(2024, 6, 2), &today).len(), 0);
    assert_eq!(d.birthdays_due(date(2025, 6, 1), &today).len(), 1);
  }

  #[test]
  fn popups_are_staggered_and_contactless_records_get_a_toast() {
    let notifier = Arc::new(FakeNotifier::granted());
    let mut d = dispatcher(&notifier);
    let today = date(2024, 3, 15);
    let records = [
      record("1", "Sam", date(1990, 3, 15), Some("555")),
      record("2", "Alex", date(1990, 3, 16), None),
      record("3", "Kim", date(1985, 3, 15), None),
    ];

    let out = d.birthdays_due(today, &records);
    let delays: Vec<_> = out.iter().map(|s| s.delay.as_millis()).collect();
    assert_eq!(delays, vec![1500, 2000]);
    assert_eq!(
      out[1].item,
      Presentation::toast(
        "🎉 Kim's birthday is today! Add phone number or email to send wishes.",
        ToastKind::Info
      )
    );
  }

  #[test]
  fn notifications_respect_permission_and_preference() {
    let today = date(2024, 3, 15);
    let records = [record("1", "Sam", date(1990, 3, 15), None)];

    let blocked = Arc::new(FakeNotifier::with_permission(PermissionState::Denied));
    let mut d = dispatcher(&blocked);
    assert_eq!(d.birthdays_due(today, &records).len(), 1);
    assert!(blocked.shown().is_empty());

    let granted = Arc::new(FakeNotifier::granted());
    let mut d = dispatcher(&granted);
    d.preferences_mut().system_notifications = false;
    assert_eq!(d.birthdays_due(today, &records).len(), 1);
    assert!(granted.shown().is_empty());
    assert_eq!(d.status(), NotificationStatus::NeedsPermission);
  }

  #[test]
  fn notifier_failure_does_not_stop_the_popup() {
    let notifier = Arc::new(FakeNotifier::granted());
    notifier.fail_next_show();
    let mut d = dispatcher(&notifier);
    let sam = NewBirthday::new("Sam", date(1990, 3, 15))
      .into_record(Utc::now(), &[])
      .unwrap();
    assert_eq!(d.birthdays_due(date(2024, 3, 15), &[sam]).len(), 1);
  }

  #[test]
  fn proximity_dedups_per_geofence_and_day() {
    let notifier = Arc::new(FakeNotifier::granted());
    let mut d = dispatcher(&notifier);
    let event = ProximityEvent {
      geofence:    Geofence {
        id:         "g1".into(),
        name:       "Office".into(),
        latitude:   40.0,
        longitude:  -74.0,
        radius:     1000.0,
        created_at: Utc::now(),
      },
      distance_km: 0.0,
    };
    let today = date(2024, 3, 15);

    let out = d.proximity(today, std::slice::from_ref(&event));
    assert_eq!(out, vec![
      Presentation::toast("You're near Office! (0.00 km away)", ToastKind::Info),
      Presentation::toast("You might be near someone's birthday location!", ToastKind::Success),
    ]);
    assert_eq!(notifier.shown().len(), 1);

    assert!(d.proximity(today, std::slice::from_ref(&event)).is_empty());
    assert_eq!(d.proximity(date(2024, 3, 16), &[event]).len(), 2);
  }

  #[test]
  fn proximity_and_birthday_ids_do_not_collide() {
    let notifier = Arc::new(FakeNotifier::granted());
    let mut d = dispatcher(&notifier);
    let today = date(2024, 3, 15);
    d.birthdays_due(today, &[record("42", "Sam", date(1990, 3, 15), None)]);

    let event = ProximityEvent {
      geofence:    Geofence {
        id:         "42".into(),
        name:       "Gym".into(),
        latitude:   0.0,
        longitude:  0.0,
        radius:     100.0,
        created_at: Utc::now(),
      },
      distance_km: 0.9,
    };
    assert_eq!(d.proximity(today, &[event]).len(), 1);
  }

  #[tokio::test]
  async fn denied_permission_is_not_reprompted_automatically() {
    let notifier = Arc::new(FakeNotifier::with_permission(PermissionState::Denied));
    let d = dispatcher(&notifier);

    assert_eq!(d.request_permission(false).await, PermissionOutcome::Blocked);
    assert_eq!(notifier.prompts(), 0);
    assert_eq!(d.status(), NotificationStatus::Blocked);

    assert_eq!(d.request_permission(true).await, PermissionOutcome::Denied);
    assert_eq!(notifier.prompts(), 1);
  }

  #[tokio::test]
  async fn granting_shows_a_confirmation() {
    let notifier = Arc::new(FakeNotifier::with_permission(PermissionState::Default));
    notifier.answer_with(PermissionState::Granted);
    let d = dispatcher(&notifier);

    assert_eq!(d.status(), NotificationStatus::NeedsPermission);
    assert_eq!(d.request_permission(false).await, PermissionOutcome::Granted);
    assert_eq!(notifier.shown()[0].tag, "notification-enabled");
    assert_eq!(d.status(), NotificationStatus::Enabled);
  }

  #[tokio::test]
  async fn unsupported_platform() {
    let notifier = Arc::new(FakeNotifier::unsupported());
    let d = dispatcher(&notifier);
    assert_eq!(d.status(), NotificationStatus::Unsupported);
    assert_eq!(d.request_permission(true).await, PermissionOutcome::Unsupported);
  }
}
