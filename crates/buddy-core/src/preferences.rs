//! Per-user notification preferences.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// The user's answer to the system notification prompt.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  AsRefStr,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PermissionState {
  /// Never asked.
  #[default]
  Default,
  Granted,
  Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
  /// Surface alerts as system notifications when the platform allows it.
  pub system_notifications:    bool,
  /// Set once the welcome entry has been shown in the notification feed.
  pub has_visited:             bool,
  /// Last known answer to the permission prompt, for platforms that do not
  /// remember it between sessions.
  #[serde(default)]
  pub notification_permission: PermissionState,
}

impl Default for NotificationPreferences {
  fn default() -> Self {
    Self {
      system_notifications:    true,
      has_visited:             false,
      notification_permission: PermissionState::Default,
    }
  }
}
