//! A [`Geolocation`] source that replays recorded positions.
//!
//! Input is JSON lines, one per delivery:
//!
//! ```text
//! {"latitude": 40.7128, "longitude": -74.0060, "accuracy": 25}
//! {"error": "timeout"}
//! ```
//!
//! One-shot requests answer with the first line. Each watch runs as its own
//! task and delivers the lines at a fixed interval until cleared.

use std::{
  collections::HashMap,
  path::Path,
  sync::{Arc, Mutex},
  time::Duration,
};

use anyhow::Context as _;
use buddy_alerts::capability::{Geolocation, LocationEvent, WatchId};
use buddy_core::location::{LocationError, LocationSample, PositionOptions};
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum ReplayLine {
  Fix {
    latitude:  f64,
    longitude: f64,
    #[serde(default)]
    accuracy:  Option<f64>,
  },
  Failure {
    error: ReplayError,
  },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayError {
  PermissionDenied,
  PositionUnavailable,
  Timeout,
}

impl ReplayLine {
  fn into_event(self) -> LocationEvent {
    match self {
      Self::Fix { latitude, longitude, accuracy } => {
        Ok(LocationSample { latitude, longitude, accuracy, timestamp: Utc::now() })
      }
      Self::Failure { error } => Err(match error {
        ReplayError::PermissionDenied => LocationError::PermissionDenied,
        ReplayError::PositionUnavailable => LocationError::PositionUnavailable,
        ReplayError::Timeout => LocationError::Timeout,
      }),
    }
  }
}

pub struct ReplayGeolocation {
  lines:    Arc<[ReplayLine]>,
  interval: Duration,
  watches:  Mutex<HashMap<WatchId, CancellationToken>>,
}

impl ReplayGeolocation {
  pub fn new(lines: Vec<ReplayLine>, interval: Duration) -> Self {
    Self { lines: lines.into(), interval, watches: Mutex::new(HashMap::new()) }
  }

  /// A source that always reports `(latitude, longitude)`.
  pub fn fixed(latitude: f64, longitude: f64) -> Self {
    Self::new(
      vec![ReplayLine::Fix { latitude, longitude, accuracy: None }],
      Duration::ZERO,
    )
  }

  pub fn from_file(path: &Path, interval: Duration) -> anyhow::Result<Self> {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading replay file {}", path.display()))?;
    Ok(Self::new(parse_lines(&raw)?, interval))
  }
}

pub fn parse_lines(raw: &str) -> anyhow::Result<Vec<ReplayLine>> {
  raw
    .lines()
    .enumerate()
    .filter(|(_, line)| !line.trim().is_empty())
    .map(|(n, line)| {
      serde_json::from_str(line).with_context(|| format!("replay line {}: {line}", n + 1))
    })
    .collect()
}

impl Geolocation for ReplayGeolocation {
  fn is_supported(&self) -> bool { true }

  async fn current_position(
    &self,
    options: PositionOptions,
  ) -> Result<LocationSample, LocationError> {
    tracing::debug!(?options, "one-shot position request");
    match self.lines.first() {
      Some(line) => line.into_event(),
      None => Err(LocationError::PositionUnavailable),
    }
  }

  fn watch_position(
    &self,
    options: PositionOptions,
    sink: mpsc::UnboundedSender<LocationEvent>,
  ) -> WatchId {
    let id = WatchId::new();
    let token = CancellationToken::new();
    let cancelled = token.clone();
    let lines = self.lines.clone();
    let interval = self.interval;

    tokio::spawn(async move {
      for line in lines.iter() {
        tokio::select! {
          _ = cancelled.cancelled() => return,
          _ = tokio::time::sleep(interval) => {}
        }
        if sink.send(line.into_event()).is_err() {
          return;
        }
      }
      tracing::debug!(watch = %id, "replay finished");
    });

    tracing::debug!(watch = %id, ?options, lines = self.lines.len(), "replay watch started");
    if let Ok(mut watches) = self.watches.lock() {
      watches.insert(id, token);
    }
    id
  }

  fn clear_watch(&self, id: WatchId) {
    let token = self.watches.lock().ok().and_then(|mut w| w.remove(&id));
    if let Some(token) = token {
      token.cancel();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_fixes_and_failures() {
    let lines = parse_lines(
      "{\"latitude\": 1.5, \"longitude\": 2.5}\n\n{\"error\": \"timeout\"}\n",
    )
    .unwrap();
    assert_eq!(lines.len(), 2);
    assert!(matches!(lines[0], ReplayLine::Fix { latitude, accuracy: None, .. } if latitude == 1.5));
    assert_eq!(lines[1].into_event(), Err(LocationError::Timeout));
  }

  #[test]
  fn bad_lines_are_reported_with_their_number() {
    let err = parse_lines("{\"latitude\": 1}\nnot json").unwrap_err();
    assert!(err.to_string().starts_with("replay line 1"));
  }

  #[tokio::test(start_paused = true)]
  async fn watch_replays_then_ends() {
    let geo = ReplayGeolocation::new(
      parse_lines("{\"latitude\": 1, \"longitude\": 1}\n{\"latitude\": 2, \"longitude\": 2}").unwrap(),
      Duration::from_secs(1),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();
    geo.watch_position(PositionOptions::WATCH, tx);

    assert_eq!(rx.recv().await.unwrap().unwrap().latitude, 1.0);
    assert_eq!(rx.recv().await.unwrap().unwrap().latitude, 2.0);
    assert!(rx.recv().await.is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn clearing_stops_delivery() {
    let geo = ReplayGeolocation::new(
      parse_lines("{\"latitude\": 1, \"longitude\": 1}").unwrap(),
      Duration::from_secs(60),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = geo.watch_position(PositionOptions::WATCH, tx);
    geo.clear_watch(id);

    assert!(rx.recv().await.is_none());
  }

  #[tokio::test]
  async fn one_shot_answers_with_the_first_line() {
    let geo = ReplayGeolocation::fixed(40.0, -74.0);
    let fix = geo.current_position(PositionOptions::ONE_SHOT).await.unwrap();
    assert_eq!((fix.latitude, fix.longitude), (40.0, -74.0));

    let empty = ReplayGeolocation::new(Vec::new(), Duration::ZERO);
    assert_eq!(
      empty.current_position(PositionOptions::ONE_SHOT).await,
      Err(LocationError::PositionUnavailable)
    );
  }
}
