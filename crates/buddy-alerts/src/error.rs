//! Error type for `buddy-alerts`.

use buddy_core::location::LocationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The backing store failed; the concrete error is boxed so the service
  /// stays generic over store implementations.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error(transparent)]
  Core(#[from] buddy_core::Error),

  #[error(transparent)]
  Location(#[from] LocationError),

  #[error("geofencing must be enabled first")]
  GeofencingRequired,

  #[error("current location is not known yet")]
  NoCurrentLocation,

  #[error("no birthday with id {0}")]
  BirthdayNotFound(String),

  #[error("no geofence with id {0}")]
  GeofenceNotFound(String),

  #[error("geolocation is not supported on this device")]
  Unsupported,
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
