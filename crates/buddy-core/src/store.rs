//! The `ReminderStore` trait: a per-user keyed repository.
//!
//! Every method takes the [`UserKey`] whose partition it touches; nothing in
//! a store is shared between users. The trait is implemented by storage
//! backends (e.g. `buddy-store-sqlite`); the alerting runtime depends on this
//! abstraction, not on any concrete backend.
//!
//! Writes are whole-record replacements. There is no optimistic concurrency
//! control: a single active session per user is assumed.

use std::future::Future;

use crate::{
  birthday::BirthdayRecord,
  dedupe::DedupeTable,
  geofence::GeofenceSettings,
  preferences::NotificationPreferences,
  user::{UserKey, UserProfile},
};

/// Abstraction over a Birthday Buddy store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait ReminderStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Create or replace the profile for `profile.key`.
  fn upsert_user<'a>(
    &'a self,
    profile: &'a UserProfile,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Retrieve a profile. Returns `None` if the user is unknown.
  fn get_user<'a>(
    &'a self,
    user: &'a UserKey,
  ) -> impl Future<Output = Result<Option<UserProfile>, Self::Error>> + Send + 'a;

  // ── Birthdays ─────────────────────────────────────────────────────────

  /// The user's full birthday list in insertion order.
  fn load_birthdays<'a>(
    &'a self,
    user: &'a UserKey,
  ) -> impl Future<Output = Result<Vec<BirthdayRecord>, Self::Error>> + Send + 'a;

  /// Replace the user's full birthday list.
  fn save_birthdays<'a>(
    &'a self,
    user: &'a UserKey,
    records: &'a [BirthdayRecord],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Geofencing settings ───────────────────────────────────────────────

  /// The user's geofencing settings; defaults when none are stored or the
  /// stored record is unreadable.
  fn load_settings<'a>(
    &'a self,
    user: &'a UserKey,
  ) -> impl Future<Output = Result<GeofenceSettings, Self::Error>> + Send + 'a;

  fn save_settings<'a>(
    &'a self,
    user: &'a UserKey,
    settings: &'a GeofenceSettings,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Notification state ────────────────────────────────────────────────

  fn load_preferences<'a>(
    &'a self,
    user: &'a UserKey,
  ) -> impl Future<Output = Result<NotificationPreferences, Self::Error>> + Send + 'a;

  fn save_preferences<'a>(
    &'a self,
    user: &'a UserKey,
    preferences: &'a NotificationPreferences,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn load_dedupe<'a>(
    &'a self,
    user: &'a UserKey,
  ) -> impl Future<Output = Result<DedupeTable, Self::Error>> + Send + 'a;

  /// Replace the user's dedup table.
  fn save_dedupe<'a>(
    &'a self,
    user: &'a UserKey,
    table: &'a DedupeTable,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
