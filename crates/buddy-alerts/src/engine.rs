//! Geofence evaluation behind the significant-change filter.

use buddy_core::{
  geofence::Geofence,
  location::{is_significant_change, LocationSample},
};

/// The current location lies within `geofence`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityEvent {
  pub geofence:    Geofence,
  pub distance_km: f64,
}

/// Every geofence containing `sample`, in list order.
pub fn evaluate(sample: &LocationSample, geofences: &[Geofence]) -> Vec<ProximityEvent> {
  geofences
    .iter()
    .filter_map(|geofence| {
      let distance_km = geofence.distance_km_from(sample.latitude, sample.longitude);
      geofence
        .contains_distance(distance_km)
        .then(|| ProximityEvent { geofence: geofence.clone(), distance_km })
    })
    .collect()
}

/// Holds the current location and decides which samples are worth
/// evaluating.
#[derive(Debug)]
pub struct GeofenceEngine {
  current:      Option<LocationSample>,
  threshold_km: f64,
  evaluations:  u64,
}

impl GeofenceEngine {
  pub fn new(threshold_km: f64) -> Self { Self { current: None, threshold_km, evaluations: 0 } }

  pub fn current(&self) -> Option<&LocationSample> { self.current.as_ref() }

  /// How many samples have been evaluated since construction.
  pub fn evaluations(&self) -> u64 { self.evaluations }

  /// Offer a sample. Jitter is discarded and yields `None`; otherwise the
  /// sample becomes the current location and the proximity events for it
  /// are returned.
  pub fn accept(
    &mut self,
    sample: LocationSample,
    geofences: &[Geofence],
  ) -> Option<Vec<ProximityEvent>> {
    if !is_significant_change(self.current.as_ref(), &sample, self.threshold_km) {
      tracing::debug!(
        latitude = sample.latitude,
        longitude = sample.longitude,
        "location change below threshold; ignored"
      );
      return None;
    }
    self.current = Some(sample);
    self.evaluations += 1;
    Some(evaluate(&sample, geofences))
  }

  /// Forget the current location.
  pub fn clear(&mut self) { self.current = None; }
}
