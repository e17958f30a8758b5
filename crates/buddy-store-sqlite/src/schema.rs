//! SQL schema for the Birthday Buddy SQLite store.
//!
//! Executed once at connection startup. Every table is partitioned by
//! `user_key`, the normalised user email.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_key    TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    photo_url   TEXT,
    created_at  TEXT NOT NULL
);

-- Rewritten wholesale on every save; `position` keeps insertion order.
CREATE TABLE IF NOT EXISTS birthdays (
    user_key      TEXT NOT NULL,
    birthday_id   TEXT NOT NULL,
    position      INTEGER NOT NULL,
    name          TEXT NOT NULL,
    birth_date    TEXT NOT NULL,   -- ISO 8601 date
    relationship  TEXT NOT NULL,   -- 'family' | 'friend' | 'colleague' | 'partner' | 'other'
    phone_number  TEXT,
    email         TEXT,
    notes         TEXT,
    photo_url     TEXT,
    PRIMARY KEY (user_key, birthday_id)
);

-- One JSON document per user: flags, geofence list and default radius.
CREATE TABLE IF NOT EXISTS geofencing_settings (
    user_key       TEXT PRIMARY KEY,
    settings_json  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notification_preferences (
    user_key              TEXT PRIMARY KEY,
    system_notifications  INTEGER NOT NULL DEFAULT 1,
    has_visited           INTEGER NOT NULL DEFAULT 0,
    notification_permission TEXT NOT NULL DEFAULT 'default'  -- 'default' | 'granted' | 'denied'
);

-- Alerts already shown, keyed by calendar day.
CREATE TABLE IF NOT EXISTS notification_log (
    user_key      TEXT NOT NULL,
    day           TEXT NOT NULL,   -- ISO 8601 date
    subject_kind  TEXT NOT NULL,   -- 'birthday' | 'geofence'
    subject_id    TEXT NOT NULL,
    PRIMARY KEY (user_key, day, subject_kind, subject_id)
);

CREATE INDEX IF NOT EXISTS birthdays_user_idx ON birthdays(user_key, position);

PRAGMA user_version = 2;
";

/// Brings a version 1 database up to date before [`SCHEMA`] runs.
pub const MIGRATE_V1_TO_V2: &str = "
ALTER TABLE notification_preferences
    ADD COLUMN notification_permission TEXT NOT NULL DEFAULT 'default';
";
