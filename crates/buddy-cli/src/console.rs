//! Terminal implementations of the notification and presentation
//! capabilities.

use std::sync::Mutex;

use buddy_alerts::capability::{
  Notifier, NotifyError, PermissionState, Presentation, Presenter, SystemNotification, ToastKind,
};

/// Prints system notifications to stderr, apart from command output. The
/// terminal keeps no permission of its own: the state is seeded from the
/// stored answer, and a first request is granted.
pub struct ConsoleNotifier {
  permission: Mutex<PermissionState>,
}

impl ConsoleNotifier {
  pub fn new(permission: PermissionState) -> Self { Self { permission: Mutex::new(permission) } }

  fn state(&self) -> PermissionState {
    self
      .permission
      .lock()
      .map(|p| *p)
      .unwrap_or(PermissionState::Denied)
  }
}

impl Notifier for ConsoleNotifier {
  fn is_supported(&self) -> bool { true }

  fn permission(&self) -> PermissionState { self.state() }

  async fn request_permission(&self) -> PermissionState {
    if let Ok(mut p) = self.permission.lock() {
      *p = PermissionState::Granted;
    }
    self.state()
  }

  fn show(&self, notification: &SystemNotification) -> Result<(), NotifyError> {
    tracing::debug!(tag = %notification.tag, "system notification");
    eprintln!("🔔 {}\n   {}", notification.title, notification.body);
    Ok(())
  }
}

pub struct ConsolePresenter;

impl Presenter for ConsolePresenter {
  fn present(&self, presentation: Presentation) {
    match presentation {
      Presentation::Toast { message, kind } => {
        let label = match kind {
          ToastKind::Info => "info",
          ToastKind::Success => "ok",
          ToastKind::Warning => "warn",
          ToastKind::Error => "error",
        };
        println!("[{label}] {message}");
      }
      Presentation::ContactPopup(popup) => {
        println!("🎂 Send wishes to {}", popup.name);
        println!("{}", popup.message);
        if let Some(link) = &popup.whatsapp {
          println!("  WhatsApp: {link}");
        }
        if let Some(link) = &popup.gmail {
          println!("  Gmail:    {link}");
        }
        if !popup.has_links() {
          println!("  (no phone or email on file; try `buddy links {} --phone ...`)", popup.birthday_id);
        }
      }
      Presentation::LocationHelp => {
        println!("Location permission required.");
        println!("  Allow location access for this device in your system settings,");
        println!("  then run `buddy geofencing enable` again.");
      }
      Presentation::NotificationHelp => {
        println!("Notifications are blocked.");
        println!("  Re-enable them in your system notification settings,");
        println!("  then run `buddy notify-permission` again.");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn seeded_answer_is_kept() {
    let granted = ConsoleNotifier::new(PermissionState::Granted);
    assert_eq!(granted.permission(), PermissionState::Granted);

    let denied = ConsoleNotifier::new(PermissionState::Denied);
    assert_eq!(denied.permission(), PermissionState::Denied);

    let fresh = ConsoleNotifier::new(PermissionState::Default);
    assert_eq!(fresh.request_permission().await, PermissionState::Granted);
    assert_eq!(fresh.permission(), PermissionState::Granted);
  }
}
