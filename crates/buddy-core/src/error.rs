//! Error types for `buddy-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("user email must not be empty")]
  EmptyUserKey,

  #[error("birthday name is required")]
  MissingName,

  #[error("birthday date is required")]
  MissingDate,

  #[error("invalid birthday date: {0:?}")]
  InvalidDate(String),

  #[error("geofence name is required")]
  MissingGeofenceName,

  #[error("coordinates out of range: ({latitude}, {longitude})")]
  InvalidCoordinates { latitude: f64, longitude: f64 },

  #[error("radius must be positive, got {0}")]
  InvalidRadius(f64),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
