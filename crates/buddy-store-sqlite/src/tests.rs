//! Integration tests for `SqliteStore` against an in-memory database.

use buddy_core::{
  birthday::{BirthdayRecord, NewBirthday, Relationship},
  dedupe::{DedupeTable, SubjectKind},
  geofence::GeofenceSettings,
  preferences::{NotificationPreferences, PermissionState},
  store::ReminderStore,
  user::{UserKey, UserProfile},
};
use chrono::{NaiveDate, TimeZone, Utc};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn key(email: &str) -> UserKey { UserKey::new(email).unwrap() }

fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

fn record(id: &str, name: &str, born: NaiveDate) -> BirthdayRecord {
  BirthdayRecord {
    id:           id.to_owned(),
    name:         name.to_owned(),
    date:         born,
    relationship: Relationship::Friend,
    phone_number: None,
    email:        None,
    notes:        None,
    photo_url:    None,
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_and_get_user() {
  let s = store().await;
  let profile = UserProfile {
    key:        key("alice@example.com"),
    name:       "Alice".into(),
    photo_url:  None,
    created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
  };
  s.upsert_user(&profile).await.unwrap();

  let fetched = s.get_user(&key("ALICE@example.com ")).await.unwrap().unwrap();
  assert_eq!(fetched.name, "Alice");
  assert_eq!(fetched.created_at, profile.created_at);
}

#[tokio::test]
async fn upsert_keeps_original_creation_time() {
  let s = store().await;
  let first = UserProfile {
    key:        key("bob@example.com"),
    name:       "Bob".into(),
    photo_url:  None,
    created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
  };
  s.upsert_user(&first).await.unwrap();
  let renamed = UserProfile {
    name: "Robert".into(),
    photo_url: Some("https://img.example/bob.png".into()),
    created_at: Utc::now(),
    ..first.clone()
  };
  s.upsert_user(&renamed).await.unwrap();

  let fetched = s.get_user(&first.key).await.unwrap().unwrap();
  assert_eq!(fetched.name, "Robert");
  assert_eq!(fetched.photo_url.as_deref(), Some("https://img.example/bob.png"));
  assert_eq!(fetched.created_at, first.created_at);
}

#[tokio::test]
async fn unknown_user_is_none() {
  let s = store().await;
  assert!(s.get_user(&key("nobody@example.com")).await.unwrap().is_none());
}

// ─── Birthdays ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn birthdays_default_to_empty() {
  let s = store().await;
  assert!(s.load_birthdays(&key("a@example.com")).await.unwrap().is_empty());
}

#[tokio::test]
async fn birthdays_keep_insertion_order_and_fields() {
  let s = store().await;
  let user = key("a@example.com");
  let mut zed = record("2", "Zed", date(1985, 12, 1));
  zed.relationship = Relationship::Family;
  zed.phone_number = Some("+1 555 0100".into());
  zed.notes = Some("likes tea".into());
  let records = vec![zed, record("1", "Amy", date(1990, 3, 15))];

  s.save_birthdays(&user, &records).await.unwrap();
  let loaded = s.load_birthdays(&user).await.unwrap();
  assert_eq!(loaded, records);
}

#[tokio::test]
async fn saving_replaces_the_whole_list() {
  let s = store().await;
  let user = key("a@example.com");
  s.save_birthdays(&user, &[record("1", "Amy", date(1990, 3, 15)), record("2", "Ben", date(1991, 4, 1))])
    .await
    .unwrap();
  s.save_birthdays(&user, &[record("2", "Ben", date(1991, 4, 1))])
    .await
    .unwrap();

  let loaded = s.load_birthdays(&user).await.unwrap();
  assert_eq!(loaded.len(), 1);
  assert_eq!(loaded[0].id, "2");
}

#[tokio::test]
async fn birthdays_are_partitioned_per_user() {
  let s = store().await;
  let alice = key("alice@example.com");
  let bob = key("bob@example.com");
  let new = NewBirthday::new("Sam", date(1990, 3, 15))
    .into_record(Utc::now(), &[])
    .unwrap();
  s.save_birthdays(&alice, std::slice::from_ref(&new)).await.unwrap();
  // Same id under another user is independent.
  s.save_birthdays(&bob, &[record(&new.id, "Other", date(2000, 1, 1))])
    .await
    .unwrap();

  assert_eq!(s.load_birthdays(&alice).await.unwrap()[0].name, "Sam");
  assert_eq!(s.load_birthdays(&bob).await.unwrap()[0].name, "Other");

  s.save_birthdays(&bob, &[]).await.unwrap();
  assert_eq!(s.load_birthdays(&alice).await.unwrap().len(), 1);
  assert!(s.load_birthdays(&bob).await.unwrap().is_empty());
}

// ─── Geofencing settings ─────────────────────────────────────────────────────

#[tokio::test]
async fn settings_default_when_missing() {
  let s = store().await;
  let settings = s.load_settings(&key("a@example.com")).await.unwrap();
  assert_eq!(settings, GeofenceSettings::default());
  assert_eq!(settings.radius, 1000.0);
}

#[tokio::test]
async fn settings_round_trip() {
  let s = store().await;
  let user = key("a@example.com");
  let mut settings = GeofenceSettings { enabled: true, share_location: true, ..Default::default() };
  settings
    .add_geofence("Office", 40.7128, -74.0060, Some(250.0), Utc::now())
    .unwrap();

  s.save_settings(&user, &settings).await.unwrap();
  assert_eq!(s.load_settings(&user).await.unwrap(), settings);
}

#[tokio::test]
async fn malformed_settings_fall_back_to_defaults() {
  let s = store().await;
  let user = key("a@example.com");
  let raw_key = user.as_str().to_owned();
  s.conn
    .call(move |conn| {
      conn.execute(
        "INSERT INTO geofencing_settings (user_key, settings_json) VALUES (?1, '{not json')",
        rusqlite::params![raw_key],
      )?;
      Ok(())
    })
    .await
    .unwrap();

  assert_eq!(s.load_settings(&user).await.unwrap(), GeofenceSettings::default());
}

// ─── Notification state ──────────────────────────────────────────────────────

#[tokio::test]
async fn preferences_default_and_round_trip() {
  let s = store().await;
  let user = key("a@example.com");
  let prefs = s.load_preferences(&user).await.unwrap();
  assert!(prefs.system_notifications);
  assert!(!prefs.has_visited);

  assert_eq!(prefs.notification_permission, PermissionState::Default);

  let updated = NotificationPreferences {
    system_notifications:    false,
    has_visited:             true,
    notification_permission: PermissionState::Granted,
  };
  s.save_preferences(&user, &updated).await.unwrap();
  assert_eq!(s.load_preferences(&user).await.unwrap(), updated);

  let denied = NotificationPreferences { notification_permission: PermissionState::Denied, ..updated };
  s.save_preferences(&user, &denied).await.unwrap();
  assert_eq!(
    s.load_preferences(&user).await.unwrap().notification_permission,
    PermissionState::Denied
  );
}

#[tokio::test]
async fn enum_columns_hold_lowercase_names() {
  let s = store().await;
  let user = key("a@example.com");
  let mut amy = record("1", "Amy", date(1990, 3, 15));
  amy.relationship = Relationship::Colleague;
  s.save_birthdays(&user, &[amy]).await.unwrap();
  let mut table = DedupeTable::new();
  table.mark_shown(date(2024, 3, 15), SubjectKind::Geofence, "g1");
  s.save_dedupe(&user, &table).await.unwrap();

  let (relationship, kind): (String, String) = s
    .conn
    .call(|conn| {
      let relationship =
        conn.query_row("SELECT relationship FROM birthdays", [], |r| r.get(0))?;
      let kind = conn.query_row("SELECT subject_kind FROM notification_log", [], |r| r.get(0))?;
      Ok((relationship, kind))
    })
    .await
    .unwrap();
  assert_eq!(relationship, "colleague");
  assert_eq!(kind, "geofence");
}

#[tokio::test]
async fn dedupe_table_round_trip() {
  let s = store().await;
  let user = key("a@example.com");
  let today = date(2024, 3, 15);

  let mut table = DedupeTable::new();
  table.mark_shown(today, SubjectKind::Birthday, "1700000000000");
  table.mark_shown(today, SubjectKind::Geofence, "1700000000000");
  s.save_dedupe(&user, &table).await.unwrap();

  let loaded = s.load_dedupe(&user).await.unwrap();
  assert_eq!(loaded, table);
  assert!(loaded.is_shown(today, SubjectKind::Birthday, "1700000000000"));
  assert!(!loaded.is_shown(date(2024, 3, 16), SubjectKind::Birthday, "1700000000000"));

  // A pruned table overwrites the old rows.
  let mut pruned = loaded;
  pruned.prune(date(2024, 3, 16));
  s.save_dedupe(&user, &pruned).await.unwrap();
  assert!(s.load_dedupe(&user).await.unwrap().is_empty());
}

#[tokio::test]
async fn reopening_a_file_store_keeps_data() {
  let dir = std::env::temp_dir().join(format!("buddy-store-{}", std::process::id()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("reopen.db");
  let _ = std::fs::remove_file(&path);
  let user = key("a@example.com");

  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.save_birthdays(&user, &[record("1", "Amy", date(1990, 3, 15))])
      .await
      .unwrap();
  }
  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(s.load_birthdays(&user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn version_one_database_gains_the_permission_column() {
  let dir = std::env::temp_dir().join(format!("buddy-store-{}", std::process::id()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("v1.db");
  let _ = std::fs::remove_file(&path);

  {
    let conn = tokio_rusqlite::Connection::open(&path).await.unwrap();
    conn
      .call(|conn| {
        conn.execute_batch(
          "CREATE TABLE notification_preferences (
               user_key              TEXT PRIMARY KEY,
               system_notifications  INTEGER NOT NULL DEFAULT 1,
               has_visited           INTEGER NOT NULL DEFAULT 0
           );
           INSERT INTO notification_preferences VALUES ('a@example.com', 0, 1);
           PRAGMA user_version = 1;",
        )?;
        Ok(())
      })
      .await
      .unwrap();
  }

  let s = SqliteStore::open(&path).await.unwrap();
  let prefs = s.load_preferences(&key("a@example.com")).await.unwrap();
  assert!(!prefs.system_notifications);
  assert!(prefs.has_visited);
  assert_eq!(prefs.notification_permission, PermissionState::Default);

  // A second open must not try to add the column again.
  drop(s);
  SqliteStore::open(&path).await.unwrap();
}
