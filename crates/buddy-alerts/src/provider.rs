//! One-shot position requests and position watches over a [`Geolocation`].

use std::sync::Arc;

use buddy_core::location::{LocationError, LocationSample, PositionOptions};
use tokio::sync::mpsc;

use crate::capability::{Geolocation, LocationEvent, WatchId};

pub struct LocationProvider<G> {
  geo: Arc<G>,
}

impl<G: Geolocation> LocationProvider<G> {
  pub fn new(geo: Arc<G>) -> Self { Self { geo } }

  pub fn is_supported(&self) -> bool { self.geo.is_supported() }

  /// A single precise fix, using [`PositionOptions::ONE_SHOT`].
  pub async fn current_location(&self) -> Result<LocationSample, LocationError> {
    self.geo.current_position(PositionOptions::ONE_SHOT).await
  }

  /// Subscribe to continuous coarse updates, using [`PositionOptions::WATCH`].
  pub fn watch(&self) -> LocationWatch<G> {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = self.geo.watch_position(PositionOptions::WATCH, tx);
    tracing::debug!(watch = %id, "location watch started");
    LocationWatch { id, rx, geo: self.geo.clone(), closed: false }
  }
}

/// A running position watch.
///
/// The platform watch is cleared exactly once: by [`close`](Self::close), or
/// on drop when it was never closed. Events still queued at that point are
/// discarded.
pub struct LocationWatch<G: Geolocation> {
  id:     WatchId,
  rx:     mpsc::UnboundedReceiver<LocationEvent>,
  geo:    Arc<G>,
  closed: bool,
}

impl<G: Geolocation> LocationWatch<G> {
  pub fn id(&self) -> WatchId { self.id }

  /// The next fix or failure. `None` once the source has stopped.
  ///
  /// Cancel-safe: dropping the future loses no event.
  pub async fn next(&mut self) -> Option<LocationEvent> { self.rx.recv().await }

  pub fn close(mut self) { self.release(); }

  fn release(&mut self) {
    if self.closed {
      return;
    }
    self.closed = true;
    self.rx.close();
    self.geo.clear_watch(self.id);
    tracing::debug!(watch = %self.id, "location watch cleared");
  }
}

impl<G: Geolocation> Drop for LocationWatch<G> {
  fn drop(&mut self) { self.release(); }
}
