//! Location samples, request options and failure kinds.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::distance_km;

/// Movement below this many kilometres is treated as GPS jitter.
pub const SIGNIFICANT_CHANGE_KM: f64 = 0.01;

/// One position fix. Held as the current location; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
  pub latitude:  f64,
  pub longitude: f64,
  /// Metres, when the source reports it.
  pub accuracy:  Option<f64>,
  pub timestamp: DateTime<Utc>,
}

impl LocationSample {
  pub fn distance_km_to(&self, other: &LocationSample) -> f64 {
    distance_km(self.latitude, self.longitude, other.latitude, other.longitude)
  }
}

/// Whether `next` should replace `current`: always when there is no current
/// fix, otherwise only when it moved strictly more than `threshold_km`.
pub fn is_significant_change(
  current: Option<&LocationSample>,
  next: &LocationSample,
  threshold_km: f64,
) -> bool {
  match current {
    None => true,
    Some(current) => current.distance_km_to(next) > threshold_km,
  }
}

/// Options passed to the platform with each position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
  pub high_accuracy: bool,
  pub timeout:       Duration,
  /// How old a cached fix the platform may hand back.
  pub maximum_age:   Duration,
}

impl PositionOptions {
  /// One-shot request: precise, patient, accepts a fix up to a minute old.
  pub const ONE_SHOT: Self = Self {
    high_accuracy: true,
    timeout:       Duration::from_secs(15),
    maximum_age:   Duration::from_secs(60),
  };

  /// Continuous watch: coarse for battery and stability.
  pub const WATCH: Self = Self {
    high_accuracy: false,
    timeout:       Duration::from_secs(10),
    maximum_age:   Duration::from_secs(60),
  };
}

/// The platform's canonical geolocation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
  #[error(
    "location permission denied; enable location access in your settings"
  )]
  PermissionDenied,
  #[error("location information is unavailable; check your device settings")]
  PositionUnavailable,
  #[error("location request timed out; please try again")]
  Timeout,
}
