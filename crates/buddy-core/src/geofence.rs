//! Geofences and the per-user geofencing settings record.
//!
//! The settings record is persisted as a single JSON document per user:
//!
//! ```json
//! { "enabled": false, "backgroundLocation": false, "shareLocation": false,
//!   "geofences": [{ "id": "…", "name": "…", "latitude": 0.0,
//!                   "longitude": 0.0, "radius": 1000.0,
//!                   "createdAt": "…" }],
//!   "radius": 1000.0 }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, geo::distance_km, ident::time_based_id};

/// Radius applied to new geofences until the user picks another.
pub const DEFAULT_RADIUS_M: f64 = 1000.0;

// ─── Geofence ────────────────────────────────────────────────────────────────

/// A named circular region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geofence {
  pub id:         String,
  pub name:       String,
  pub latitude:   f64,
  pub longitude:  f64,
  /// Metres.
  pub radius:     f64,
  pub created_at: DateTime<Utc>,
}

impl Geofence {
  /// Distance in kilometres from the centre to `(latitude, longitude)`.
  pub fn distance_km_from(&self, latitude: f64, longitude: f64) -> f64 {
    distance_km(latitude, longitude, self.latitude, self.longitude)
  }

  /// Boundary-inclusive membership test for a distance in kilometres.
  pub fn contains_distance(&self, distance_km: f64) -> bool {
    distance_km <= self.radius / 1000.0
  }
}

// ─── Settings ────────────────────────────────────────────────────────────────

/// Everything the geofencing feature persists for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceSettings {
  pub enabled:             bool,
  pub background_location: bool,
  pub share_location:      bool,
  pub geofences:           Vec<Geofence>,
  /// Default radius in metres for newly added geofences.
  pub radius:              f64,
}

impl Default for GeofenceSettings {
  fn default() -> Self {
    Self {
      enabled:             false,
      background_location: false,
      share_location:      false,
      geofences:           Vec::new(),
      radius:              DEFAULT_RADIUS_M,
    }
  }
}

impl GeofenceSettings {
  pub fn to_blob(&self) -> Result<String> { Ok(serde_json::to_string(self)?) }

  /// Decode a persisted blob. Anything unreadable yields the defaults rather
  /// than an error.
  pub fn from_blob_or_default(blob: &str) -> Self {
    match serde_json::from_str(blob) {
      Ok(settings) => settings,
      Err(e) => {
        tracing::warn!(error = %e, "discarding malformed geofencing settings");
        Self::default()
      }
    }
  }

  /// Append a geofence; `radius` falls back to the configured default.
  pub fn add_geofence(
    &mut self,
    name: &str,
    latitude: f64,
    longitude: f64,
    radius: Option<f64>,
    now: DateTime<Utc>,
  ) -> Result<&Geofence> {
    let name = name.trim();
    if name.is_empty() {
      return Err(Error::MissingGeofenceName);
    }
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
      return Err(Error::InvalidCoordinates { latitude, longitude });
    }
    let radius = radius.unwrap_or(self.radius);
    if !(radius > 0.0) {
      return Err(Error::InvalidRadius(radius));
    }

    let id = time_based_id(now, |candidate| self.geofences.iter().any(|g| g.id == candidate));
    self.geofences.push(Geofence {
      id,
      name: name.to_owned(),
      latitude,
      longitude,
      radius,
      created_at: now,
    });
    Ok(&self.geofences[self.geofences.len() - 1])
  }

  /// Drop the geofence with `id`. Returns whether anything was removed.
  pub fn remove_geofence(&mut self, id: &str) -> bool {
    let before = self.geofences.len();
    self.geofences.retain(|g| g.id != id);
    self.geofences.len() != before
  }

  pub fn set_default_radius(&mut self, radius: f64) -> Result<()> {
    if !(radius > 0.0) {
      return Err(Error::InvalidRadius(radius));
    }
    self.radius = radius;
    Ok(())
  }
}
