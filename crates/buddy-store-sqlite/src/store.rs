//! [`SqliteStore`]: the SQLite implementation of [`ReminderStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;

use buddy_core::{
  birthday::BirthdayRecord,
  dedupe::DedupeTable,
  geofence::GeofenceSettings,
  preferences::NotificationPreferences,
  store::ReminderStore,
  user::{UserKey, UserProfile},
};

use crate::{
  encode::{
    decode_permission, encode_date, encode_dt, encode_permission, encode_relationship,
    encode_subject_kind, RawBirthday, RawLogEntry, RawUser,
  },
  schema::{MIGRATE_V1_TO_V2, SCHEMA},
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Birthday Buddy store backed by a single SQLite file.
///
/// Clones share one reference-counted connection.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a fresh in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        if version == 1 {
          conn.execute_batch(MIGRATE_V1_TO_V2)?;
        }
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ReminderStore impl ──────────────────────────────────────────────────────

impl ReminderStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn upsert_user(&self, profile: &UserProfile) -> Result<()> {
    let key = profile.key.as_str().to_owned();
    let name = profile.name.clone();
    let photo = profile.photo_url.clone();
    let created = encode_dt(profile.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_key, name, photo_url, created_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(user_key) DO UPDATE SET
             name = excluded.name,
             photo_url = excluded.photo_url",
          rusqlite::params![key, name, photo, created],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(user = %profile.key, "user profile saved");
    Ok(())
  }

  async fn get_user(&self, user: &UserKey) -> Result<Option<UserProfile>> {
    let key = user.as_str().to_owned();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        let row = conn
          .query_row(
            "SELECT user_key, name, photo_url, created_at FROM users WHERE user_key = ?1",
            rusqlite::params![key],
            |r| {
              Ok(RawUser {
                user_key:   r.get(0)?,
                name:       r.get(1)?,
                photo_url:  r.get(2)?,
                created_at: r.get(3)?,
              })
            },
          )
          .optional()?;
        Ok(row)
      })
      .await?;

    raw.map(RawUser::into_profile).transpose()
  }

  // ── Birthdays ─────────────────────────────────────────────────────────────

  async fn load_birthdays(&self, user: &UserKey) -> Result<Vec<BirthdayRecord>> {
    let key = user.as_str().to_owned();

    let raws: Vec<RawBirthday> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT birthday_id, name, birth_date, relationship,
                  phone_number, email, notes, photo_url
           FROM birthdays
           WHERE user_key = ?1
           ORDER BY position",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![key], |r| {
            Ok(RawBirthday {
              birthday_id:  r.get(0)?,
              name:         r.get(1)?,
              birth_date:   r.get(2)?,
              relationship: r.get(3)?,
              phone_number: r.get(4)?,
              email:        r.get(5)?,
              notes:        r.get(6)?,
              photo_url:    r.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBirthday::into_record).collect()
  }

  async fn save_birthdays(&self, user: &UserKey, records: &[BirthdayRecord]) -> Result<()> {
    let key = user.as_str().to_owned();
    let rows: Vec<_> = records
      .iter()
      .map(|b| {
        (
          b.id.clone(),
          b.name.clone(),
          encode_date(b.date),
          encode_relationship(b.relationship),
          b.phone_number.clone(),
          b.email.clone(),
          b.notes.clone(),
          b.photo_url.clone(),
        )
      })
      .collect();
    let count = rows.len();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM birthdays WHERE user_key = ?1", rusqlite::params![key])?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO birthdays
               (user_key, birthday_id, position, name, birth_date, relationship,
                phone_number, email, notes, photo_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          )?;
          for (position, (id, name, date, rel, phone, email, notes, photo)) in
            rows.into_iter().enumerate()
          {
            stmt.execute(rusqlite::params![
              key,
              id,
              position as i64,
              name,
              date,
              rel,
              phone,
              email,
              notes,
              photo
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(user = %user, count, "birthdays saved");
    Ok(())
  }

  // ── Geofencing settings ───────────────────────────────────────────────────

  async fn load_settings(&self, user: &UserKey) -> Result<GeofenceSettings> {
    let key = user.as_str().to_owned();

    let blob: Option<String> = self
      .conn
      .call(move |conn| {
        let blob = conn
          .query_row(
            "SELECT settings_json FROM geofencing_settings WHERE user_key = ?1",
            rusqlite::params![key],
            |r| r.get(0),
          )
          .optional()?;
        Ok(blob)
      })
      .await?;

    Ok(
      blob
        .as_deref()
        .map(GeofenceSettings::from_blob_or_default)
        .unwrap_or_default(),
    )
  }

  async fn save_settings(&self, user: &UserKey, settings: &GeofenceSettings) -> Result<()> {
    let key = user.as_str().to_owned();
    let blob = settings.to_blob()?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO geofencing_settings (user_key, settings_json) VALUES (?1, ?2)
           ON CONFLICT(user_key) DO UPDATE SET settings_json = excluded.settings_json",
          rusqlite::params![key, blob],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Notification state ────────────────────────────────────────────────────

  async fn load_preferences(&self, user: &UserKey) -> Result<NotificationPreferences> {
    let key = user.as_str().to_owned();

    let row: Option<(bool, bool, String)> = self
      .conn
      .call(move |conn| {
        let row = conn
          .query_row(
            "SELECT system_notifications, has_visited, notification_permission
             FROM notification_preferences WHERE user_key = ?1",
            rusqlite::params![key],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )
          .optional()?;
        Ok(row)
      })
      .await?;

    let Some((system_notifications, has_visited, permission)) = row else {
      return Ok(NotificationPreferences::default());
    };
    Ok(NotificationPreferences {
      system_notifications,
      has_visited,
      notification_permission: decode_permission(&permission)?,
    })
  }

  async fn save_preferences(
    &self,
    user: &UserKey,
    preferences: &NotificationPreferences,
  ) -> Result<()> {
    let key = user.as_str().to_owned();
    let NotificationPreferences { system_notifications, has_visited, notification_permission } =
      *preferences;
    let permission = encode_permission(notification_permission);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notification_preferences
             (user_key, system_notifications, has_visited, notification_permission)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(user_key) DO UPDATE SET
             system_notifications = excluded.system_notifications,
             has_visited = excluded.has_visited,
             notification_permission = excluded.notification_permission",
          rusqlite::params![key, system_notifications, has_visited, permission],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn load_dedupe(&self, user: &UserKey) -> Result<DedupeTable> {
    let key = user.as_str().to_owned();

    let raws: Vec<RawLogEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT day, subject_kind, subject_id FROM notification_log WHERE user_key = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![key], |r| {
            Ok(RawLogEntry {
              day:          r.get(0)?,
              subject_kind: r.get(1)?,
              subject_id:   r.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let keys = raws
      .into_iter()
      .map(RawLogEntry::into_key)
      .collect::<Result<Vec<_>>>()?;
    Ok(DedupeTable::from_entries(keys))
  }

  async fn save_dedupe(&self, user: &UserKey, table: &DedupeTable) -> Result<()> {
    let key = user.as_str().to_owned();
    let rows: Vec<(String, String, String)> = table
      .entries()
      .map(|e| (encode_date(e.day), encode_subject_kind(e.kind), e.subject.clone()))
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM notification_log WHERE user_key = ?1", rusqlite::params![key])?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO notification_log (user_key, day, subject_kind, subject_id)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          for (day, kind, subject) in rows {
            stmt.execute(rusqlite::params![key, day, kind, subject])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
