//! Platform capabilities the runtime depends on.
//!
//! Each trait mirrors one platform service. Implementations live at the
//! edges (the CLI, test doubles); nothing in this crate talks to a device
//! directly.

use std::{fmt, future::Future};

use buddy_core::{
  contact::ContactPopup,
  location::{LocationError, LocationSample, PositionOptions},
};
pub use buddy_core::preferences::PermissionState;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

// ─── Geolocation ─────────────────────────────────────────────────────────────

/// Handle of a running position watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(Uuid);

impl WatchId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for WatchId {
  fn default() -> Self { Self::new() }
}

impl fmt::Display for WatchId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// One delivery from a position watch.
pub type LocationEvent = Result<LocationSample, LocationError>;

pub trait Geolocation: Send + Sync + 'static {
  fn is_supported(&self) -> bool;

  /// Resolve a single fix.
  fn current_position(
    &self,
    options: PositionOptions,
  ) -> impl Future<Output = Result<LocationSample, LocationError>> + Send + '_;

  /// Start delivering fixes and failures into `sink` until
  /// [`clear_watch`](Self::clear_watch) is called with the returned id.
  fn watch_position(
    &self,
    options: PositionOptions,
    sink: mpsc::UnboundedSender<LocationEvent>,
  ) -> WatchId;

  fn clear_watch(&self, id: WatchId);
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemNotification {
  pub title: String,
  pub body:  String,
  /// Replaces an earlier notification with the same tag.
  pub tag:   String,
}

#[derive(Debug, Error)]
#[error("system notification failed: {0}")]
pub struct NotifyError(pub String);

pub trait Notifier: Send + Sync {
  fn is_supported(&self) -> bool;

  fn permission(&self) -> PermissionState;

  /// Prompt the user. Resolves with the resulting state.
  fn request_permission(&self) -> impl Future<Output = PermissionState> + Send + '_;

  fn show(&self, notification: &SystemNotification) -> Result<(), NotifyError>;
}

// ─── Presentation ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
  Info,
  Success,
  Warning,
  Error,
}

/// Something shown to the user inside the app.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Presentation {
  Toast { message: String, kind: ToastKind },
  ContactPopup(ContactPopup),
  /// Manual steps for re-allowing location access, with a retry affordance.
  LocationHelp,
  /// Manual steps for unblocking notifications.
  NotificationHelp,
}

impl Presentation {
  pub fn toast(message: impl Into<String>, kind: ToastKind) -> Self {
    Self::Toast { message: message.into(), kind }
  }
}

pub trait Presenter: Send + Sync {
  fn present(&self, presentation: Presentation);
}

// ─── Clock ───────────────────────────────────────────────────────────────────

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;

  /// The user's calendar day.
  fn today(&self) -> NaiveDate { self.now().with_timezone(&Local).date_naive() }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}
