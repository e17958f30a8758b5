//! Timing and threshold knobs for the alert runtime.

use std::time::Duration;

use buddy_core::location::SIGNIFICANT_CHANGE_KM;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
  /// Delay before the first same-day birthday popup.
  pub popup_delay_ms:        u64,
  /// Added per further popup so they do not overlap.
  pub popup_stagger_ms:      u64,
  /// Delay before the popup that follows editing a birthday onto today.
  pub edit_popup_delay_ms:   u64,
  pub upcoming_window_days:  i64,
  pub upcoming_limit:        usize,
  /// Below this distance a proximity alert gets an extra hint.
  pub nearby_hint_km:        f64,
  pub significant_change_km: f64,
}

impl Default for AlertConfig {
  fn default() -> Self {
    Self {
      popup_delay_ms:        1500,
      popup_stagger_ms:      500,
      edit_popup_delay_ms:   2000,
      upcoming_window_days:  30,
      upcoming_limit:        5,
      nearby_hint_km:        0.5,
      significant_change_km: SIGNIFICANT_CHANGE_KM,
    }
  }
}

impl AlertConfig {
  /// Presentation delay of the `index`-th popup in one birthday check.
  pub fn popup_delay(&self, index: usize) -> Duration {
    Duration::from_millis(self.popup_delay_ms + self.popup_stagger_ms * index as u64)
  }

  pub fn edit_popup_delay(&self) -> Duration { Duration::from_millis(self.edit_popup_delay_ms) }
}
