//! [`Dashboard`]: the per-session service object.
//!
//! Owns the user's in-memory state (birthdays, geofencing settings, current
//! location, dedup table) and drives it from two sources: direct calls for
//! user actions, and [`Dashboard::step`], which waits for the next due
//! presentation or location update and processes it to completion before
//! returning.

use std::{collections::VecDeque, sync::Arc};

use buddy_core::{
  birthday::{BirthdayRecord, NewBirthday},
  calendar::{self, Stats, Upcoming},
  contact::ContactPopup,
  geofence::{Geofence, GeofenceSettings},
  location::{LocationError, LocationSample},
  store::ReminderStore,
  user::{UserKey, UserProfile},
};
use serde::Serialize;
use tokio::time::{self, Instant};

use crate::{
  capability::{
    Clock, Geolocation, LocationEvent, Notifier, PermissionState, Presentation, Presenter,
    ToastKind,
  },
  config::AlertConfig,
  dispatcher::{Dispatcher, NotificationStatus, PermissionOutcome, Scheduled},
  engine::{self, GeofenceEngine},
  feed::{self, FeedContext, FeedItem, FeedKind},
  provider::{LocationProvider, LocationWatch},
  Error, Result,
};

// ─── Types ───────────────────────────────────────────────────────────────────

/// Everything a [`Dashboard`] talks to.
pub struct Collaborators<S, G, N, P> {
  pub store:       S,
  pub geolocation: Arc<G>,
  pub notifier:    Arc<N>,
  pub presenter:   P,
  pub clock:       Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeofencingState {
  Disabled,
  RequestingPermission,
  Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationStatus {
  Inactive,
  /// Enabled, waiting for a first fix.
  Locating,
  Active,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeofenceDistance {
  pub geofence:    Geofence,
  /// `None` while the current location is unknown.
  pub distance_km: Option<f64>,
  pub inside:      bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationOutcome {
  /// The sample became the current location; `inside` geofences contain it.
  Evaluated { inside: usize },
  /// Discarded as jitter.
  Ignored,
  Failed(LocationError),
}

/// What a single [`Dashboard::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
  /// Nothing scheduled and no watch running.
  Idle,
  Presented,
  Location(LocationOutcome),
  /// The location source stopped on its own.
  WatchEnded,
}

struct Pending {
  due:          Instant,
  presentation: Presentation,
}

enum Wake {
  Due,
  Location(Option<LocationEvent>),
}

// ─── Dashboard ───────────────────────────────────────────────────────────────

pub struct Dashboard<S, G: Geolocation, N, P> {
  user:        UserKey,
  store:       S,
  location:    LocationProvider<G>,
  dispatcher:  Dispatcher<N>,
  presenter:   P,
  clock:       Arc<dyn Clock>,
  config:      AlertConfig,
  birthdays:   Vec<BirthdayRecord>,
  settings:    GeofenceSettings,
  state:       GeofencingState,
  watch:       Option<LocationWatch<G>>,
  engine:      GeofenceEngine,
  pending:     VecDeque<Pending>,
  promo_shown: bool,
}

impl<S, G, N, P> Dashboard<S, G, N, P>
where
  S: ReminderStore,
  G: Geolocation,
  N: Notifier,
  P: Presenter,
{
  pub fn new(user: UserKey, parts: Collaborators<S, G, N, P>, config: AlertConfig) -> Self {
    Self {
      user,
      store: parts.store,
      location: LocationProvider::new(parts.geolocation),
      dispatcher: Dispatcher::new(parts.notifier, config.clone()),
      presenter: parts.presenter,
      clock: parts.clock,
      engine: GeofenceEngine::new(config.significant_change_km),
      config,
      birthdays: Vec::new(),
      settings: GeofenceSettings::default(),
      state: GeofencingState::Disabled,
      watch: None,
      pending: VecDeque::new(),
      promo_shown: false,
    }
  }

  pub fn user(&self) -> &UserKey { &self.user }

  /// Load the user's state, resume geofencing if it was left on, ask for
  /// notification permission if never asked, and run the birthday check.
  pub async fn init(&mut self) -> Result<()> {
    self.birthdays = self.store.load_birthdays(&self.user).await.map_err(Error::store)?;
    self.settings = self.store.load_settings(&self.user).await.map_err(Error::store)?;
    let preferences = self.store.load_preferences(&self.user).await.map_err(Error::store)?;
    let dedupe = self.store.load_dedupe(&self.user).await.map_err(Error::store)?;
    self.dispatcher.load(preferences, dedupe);

    tracing::info!(
      user = %self.user,
      birthdays = self.birthdays.len(),
      geofences = self.settings.geofences.len(),
      "session loaded"
    );

    if self.settings.enabled {
      if self.location.is_supported() {
        // The platform remembers the earlier grant, so no prompt here.
        self.start_watch();
        tracing::info!("geofencing resumed");
      } else {
        tracing::warn!("geofencing was enabled but geolocation is unsupported here");
        self.settings.enabled = false;
        self.save_settings().await?;
        self.presenter.present(Presentation::toast(
          "Geolocation is not supported by this device.",
          ToastKind::Error,
        ));
      }
    }

    let outcome = self.dispatcher.request_permission(false).await;
    tracing::debug!(?outcome, "notification permission");
    self.remember_permission(outcome).await?;

    self.check_birthdays().await?;
    Ok(())
  }

  // ─── Profile ─────────────────────────────────────────────────────────────

  pub async fn profile(&self) -> Result<Option<UserProfile>> {
    self.store.get_user(&self.user).await.map_err(Error::store)
  }

  /// Create or update the profile; the creation time of an existing profile
  /// is kept.
  pub async fn update_profile(
    &self,
    name: String,
    photo_url: Option<String>,
  ) -> Result<UserProfile> {
    let created_at = match self.profile().await? {
      Some(existing) => existing.created_at,
      None => self.clock.now(),
    };
    let profile = UserProfile { key: self.user.clone(), name, photo_url, created_at };
    self.store.upsert_user(&profile).await.map_err(Error::store)?;
    Ok(profile)
  }

  // ─── Birthdays ───────────────────────────────────────────────────────────

  pub fn birthdays(&self) -> &[BirthdayRecord] { &self.birthdays }

  pub fn birthday(&self, id: &str) -> Option<&BirthdayRecord> {
    self.birthdays.iter().find(|b| b.id == id)
  }

  /// Run the birthday-due check. Returns how many alerts fired.
  pub async fn check_birthdays(&mut self) -> Result<usize> {
    let today = self.clock.today();
    let scheduled = self.dispatcher.birthdays_due(today, &self.birthdays);
    let fired = scheduled.len();
    for s in scheduled {
      self.schedule(s);
    }
    self.save_dedupe().await?;
    Ok(fired)
  }

  pub async fn add_birthday(&mut self, input: NewBirthday) -> Result<BirthdayRecord> {
    let record = input.into_record(self.clock.now(), &self.birthdays)?;
    self.birthdays.push(record.clone());
    self.save_birthdays().await?;
    tracing::info!(birthday = %record.id, name = %record.name, "birthday added");
    self
      .presenter
      .present(Presentation::toast("Birthday added successfully!", ToastKind::Success));

    self.check_birthdays().await?;
    Ok(record)
  }

  /// Replace a record's fields, keeping its id. Moving a birthday onto today
  /// alerts again even if it already fired today.
  pub async fn edit_birthday(&mut self, id: &str, input: NewBirthday) -> Result<BirthdayRecord> {
    let index = self
      .birthdays
      .iter()
      .position(|b| b.id == id)
      .ok_or_else(|| Error::BirthdayNotFound(id.to_owned()))?;
    let updated = input.apply_to(&self.birthdays[index])?;
    self.birthdays[index] = updated.clone();
    self.save_birthdays().await?;
    tracing::info!(birthday = %updated.id, "birthday updated");
    self
      .presenter
      .present(Presentation::toast("Birthday updated successfully!", ToastKind::Success));

    if let Some(s) = self.dispatcher.birthday_edited(self.clock.today(), &updated) {
      self.schedule(s);
      self.save_dedupe().await?;
    }
    Ok(updated)
  }

  pub async fn delete_birthday(&mut self, id: &str) -> Result<BirthdayRecord> {
    let index = self
      .birthdays
      .iter()
      .position(|b| b.id == id)
      .ok_or_else(|| Error::BirthdayNotFound(id.to_owned()))?;
    let removed = self.birthdays.remove(index);
    self.save_birthdays().await?;
    tracing::info!(birthday = %removed.id, "birthday deleted");
    self
      .presenter
      .present(Presentation::toast("Birthday deleted successfully!", ToastKind::Success));
    Ok(removed)
  }

  pub fn upcoming(&self) -> Vec<Upcoming<'_>> {
    calendar::upcoming(
      &self.birthdays,
      self.clock.today(),
      self.config.upcoming_window_days,
      self.config.upcoming_limit,
    )
  }

  pub fn stats(&self) -> Stats { calendar::stats(&self.birthdays, self.clock.today()) }

  /// The wish popup for a record, filling a missing phone or email with the
  /// values given.
  pub fn contact_popup(
    &self,
    id: &str,
    phone: Option<&str>,
    email: Option<&str>,
    video_url: Option<&str>,
  ) -> Result<ContactPopup> {
    let record = self.birthday(id).ok_or_else(|| Error::BirthdayNotFound(id.to_owned()))?;
    Ok(ContactPopup::with_manual_contact(record, phone, email, video_url))
  }

  // ─── Notifications ───────────────────────────────────────────────────────

  pub fn notification_status(&self) -> NotificationStatus { self.dispatcher.status() }

  /// Explicit user request for notification permission. A refusal, new or
  /// earlier, brings up the manual instructions.
  pub async fn request_notification_permission(&mut self) -> Result<PermissionOutcome> {
    let outcome = self.dispatcher.request_permission(true).await;
    self.remember_permission(outcome).await?;
    match outcome {
      PermissionOutcome::Denied | PermissionOutcome::Blocked => {
        self.presenter.present(Presentation::NotificationHelp);
      }
      PermissionOutcome::Unsupported => self.presenter.present(Presentation::toast(
        "Notifications are not supported on this device.",
        ToastKind::Error,
      )),
      PermissionOutcome::Granted => {}
    }
    Ok(outcome)
  }

  pub async fn set_system_notifications(&mut self, enabled: bool) -> Result<()> {
    self.dispatcher.preferences_mut().system_notifications = enabled;
    self.save_preferences().await?;
    self.presenter.present(Presentation::toast(
      format!("Browser notifications {}.", if enabled { "enabled" } else { "disabled" }),
      ToastKind::Info,
    ));
    Ok(())
  }

  /// The notification list. Marks the welcome entry and the feature promo
  /// as seen once they have been included.
  pub async fn feed(&mut self) -> Result<Vec<FeedItem>> {
    let nearby = match (self.state, self.engine.current()) {
      (GeofencingState::Active, Some(here)) => engine::evaluate(here, &self.settings.geofences),
      _ => Vec::new(),
    };
    let items = feed::build(&FeedContext {
      records:     &self.birthdays,
      today:       self.clock.today(),
      nearby:      &nearby,
      first_visit: !self.dispatcher.preferences().has_visited,
      show_promo:  self.state == GeofencingState::Disabled && !self.promo_shown,
    });

    if items.iter().any(|i| i.kind == FeedKind::Welcome) {
      self.dispatcher.preferences_mut().has_visited = true;
      self.save_preferences().await?;
    }
    if items.iter().any(|i| i.kind == FeedKind::Feature) {
      self.promo_shown = true;
    }
    Ok(items)
  }

  // ─── Geofencing ──────────────────────────────────────────────────────────

  pub fn geofencing_state(&self) -> GeofencingState { self.state }

  pub fn settings(&self) -> &GeofenceSettings { &self.settings }

  pub fn current_location(&self) -> Option<&LocationSample> { self.engine.current() }

  /// Samples evaluated against the geofences this session.
  pub fn samples_evaluated(&self) -> u64 { self.engine.evaluations() }

  pub fn location_status(&self) -> LocationStatus {
    match (self.state, self.engine.current()) {
      (GeofencingState::Active, Some(_)) => LocationStatus::Active,
      (GeofencingState::Active, None) => LocationStatus::Locating,
      _ => LocationStatus::Inactive,
    }
  }

  /// Ask for location access and start watching. A refusal leaves
  /// geofencing off and brings up the manual instructions; a slow or
  /// missing first fix does not.
  pub async fn enable_geofencing(&mut self) -> Result<LocationStatus> {
    if !self.location.is_supported() {
      self.presenter.present(Presentation::toast(
        "Geolocation is not supported by this device.",
        ToastKind::Error,
      ));
      return Err(Error::Unsupported);
    }
    if self.state == GeofencingState::Active {
      return Ok(self.location_status());
    }

    self.state = GeofencingState::RequestingPermission;
    tracing::info!("requesting location permission");
    let first = self.location.current_location().await;

    if first == Err(LocationError::PermissionDenied) {
      self.state = GeofencingState::Disabled;
      self.settings.enabled = false;
      self.save_settings().await?;
      tracing::info!("location permission denied; geofencing stays off");
      self.presenter.present(Presentation::LocationHelp);
      return Err(LocationError::PermissionDenied.into());
    }

    self.settings.enabled = true;
    self.save_settings().await?;
    self.start_watch();
    tracing::info!("geofencing enabled");
    self.presenter.present(Presentation::toast(
      "Geo-fencing enabled! Location tracking started.",
      ToastKind::Success,
    ));

    match first {
      Ok(sample) => {
        self.on_sample(sample).await?;
      }
      Err(e) => {
        tracing::warn!(error = %e, "no initial location fix");
        self.presenter.present(Presentation::toast(e.to_string(), ToastKind::Warning));
      }
    }
    Ok(self.location_status())
  }

  /// The "try again" action offered with the location help.
  pub async fn retry_location_permission(&mut self) -> Result<LocationStatus> {
    self
      .presenter
      .present(Presentation::toast("Requesting location permission...", ToastKind::Info));
    self.enable_geofencing().await
  }

  /// Stop watching and forget the current location. Does nothing when
  /// geofencing is not on.
  pub async fn disable_geofencing(&mut self) -> Result<()> {
    if self.state == GeofencingState::Disabled {
      return Ok(());
    }
    self.stop_watch();
    self.state = GeofencingState::Disabled;
    self.settings.enabled = false;
    self.save_settings().await?;
    tracing::info!("geofencing disabled");
    self.presenter.present(Presentation::toast("Geo-fencing disabled.", ToastKind::Info));
    Ok(())
  }

  pub async fn set_background_location(&mut self, enabled: bool) -> Result<()> {
    if enabled && !self.settings.enabled {
      self.presenter.present(Presentation::toast(
        "Please enable geo-fencing first to use background location.",
        ToastKind::Error,
      ));
      return Err(Error::GeofencingRequired);
    }
    self.settings.background_location = enabled;
    self.save_settings().await?;
    self.presenter.present(Presentation::toast(
      format!("Background location {}.", if enabled { "enabled" } else { "disabled" }),
      ToastKind::Info,
    ));
    Ok(())
  }

  pub async fn set_share_location(&mut self, enabled: bool) -> Result<()> {
    self.settings.share_location = enabled;
    self.save_settings().await?;
    self.presenter.present(Presentation::toast(
      format!("Location sharing {}.", if enabled { "enabled" } else { "disabled" }),
      ToastKind::Info,
    ));
    Ok(())
  }

  pub async fn add_geofence(
    &mut self,
    name: &str,
    latitude: f64,
    longitude: f64,
    radius: Option<f64>,
  ) -> Result<Geofence> {
    let geofence = self
      .settings
      .add_geofence(name, latitude, longitude, radius, self.clock.now())?
      .clone();
    self.save_settings().await?;
    tracing::info!(geofence = %geofence.id, name = %geofence.name, "geofence added");
    self.presenter.present(Presentation::toast(
      format!("Geofence \"{}\" added successfully!", geofence.name),
      ToastKind::Success,
    ));
    Ok(geofence)
  }

  pub async fn add_current_location_as_geofence(&mut self, name: &str) -> Result<Geofence> {
    if self.state != GeofencingState::Active {
      return Err(Error::GeofencingRequired);
    }
    let here = *self.engine.current().ok_or(Error::NoCurrentLocation)?;
    self.add_geofence(name, here.latitude, here.longitude, None).await
  }

  pub async fn remove_geofence(&mut self, id: &str) -> Result<()> {
    if !self.settings.remove_geofence(id) {
      return Err(Error::GeofenceNotFound(id.to_owned()));
    }
    self.save_settings().await?;
    self
      .presenter
      .present(Presentation::toast("Geofence removed successfully!", ToastKind::Success));
    Ok(())
  }

  /// Default radius in metres for geofences added from now on.
  pub async fn set_default_radius(&mut self, radius: f64) -> Result<()> {
    self.settings.set_default_radius(radius)?;
    self.save_settings().await?;
    Ok(())
  }

  pub fn geofence_distances(&self) -> Vec<GeofenceDistance> {
    let here = self.engine.current();
    self
      .settings
      .geofences
      .iter()
      .map(|g| {
        let distance_km = here.map(|h| g.distance_km_from(h.latitude, h.longitude));
        GeofenceDistance {
          geofence: g.clone(),
          distance_km,
          inside: distance_km.is_some_and(|d| g.contains_distance(d)),
        }
      })
      .collect()
  }

  // ─── Event loop ──────────────────────────────────────────────────────────

  pub fn pending_presentations(&self) -> usize { self.pending.len() }

  /// Wait for the next due presentation or location update and handle it.
  /// Returns [`Step::Idle`] immediately when there is nothing to wait for.
  pub async fn step(&mut self) -> Result<Step> {
    if self.pending.is_empty() && self.watch.is_none() {
      return Ok(Step::Idle);
    }

    let due = self.pending.front().map(|p| p.due);
    let wake = tokio::select! {
      biased;
      () = sleep_until(due) => Wake::Due,
      event = next_event(self.watch.as_mut()) => Wake::Location(event),
    };

    match wake {
      Wake::Due => {
        if let Some(p) = self.pending.pop_front() {
          self.presenter.present(p.presentation);
        }
        Ok(Step::Presented)
      }
      Wake::Location(Some(Ok(sample))) => Ok(Step::Location(self.on_sample(sample).await?)),
      Wake::Location(Some(Err(e))) => {
        tracing::warn!(error = %e, "location update failed");
        self.presenter.present(Presentation::toast(e.to_string(), ToastKind::Warning));
        Ok(Step::Location(LocationOutcome::Failed(e)))
      }
      Wake::Location(None) => {
        tracing::warn!("location source stopped");
        // Saved settings stay on so the next session resumes.
        self.stop_watch();
        self.state = GeofencingState::Disabled;
        Ok(Step::WatchEnded)
      }
    }
  }

  /// Show every scheduled presentation at its due time, ignoring location
  /// updates meanwhile.
  pub async fn flush_presentations(&mut self) {
    while let Some(p) = self.pending.pop_front() {
      time::sleep_until(p.due).await;
      self.presenter.present(p.presentation);
    }
  }

  /// End the session: release the watch and drop anything still scheduled.
  /// Saved settings are left as they are, so the next session resumes.
  pub async fn shutdown(&mut self) -> Result<()> {
    self.stop_watch();
    if self.state == GeofencingState::Active {
      self.state = GeofencingState::Disabled;
    }
    self.pending.clear();
    self.save_dedupe().await?;
    tracing::info!(user = %self.user, "session closed");
    Ok(())
  }

  // ─── Internals ───────────────────────────────────────────────────────────

  fn schedule(&mut self, scheduled: Scheduled<Presentation>) {
    let due = Instant::now() + scheduled.delay;
    let at = self.pending.partition_point(|p| p.due <= due);
    self.pending.insert(at, Pending { due, presentation: scheduled.item });
  }

  fn start_watch(&mut self) {
    if self.watch.is_none() {
      self.watch = Some(self.location.watch());
    }
    self.state = GeofencingState::Active;
  }

  fn stop_watch(&mut self) {
    if let Some(watch) = self.watch.take() {
      watch.close();
    }
    self.engine.clear();
  }

  async fn on_sample(&mut self, sample: LocationSample) -> Result<LocationOutcome> {
    let Some(events) = self.engine.accept(sample, &self.settings.geofences) else {
      return Ok(LocationOutcome::Ignored);
    };
    tracing::debug!(
      latitude = sample.latitude,
      longitude = sample.longitude,
      inside = events.len(),
      "location updated"
    );

    let presentations = self.dispatcher.proximity(self.clock.today(), &events);
    if !presentations.is_empty() {
      for p in presentations {
        self.presenter.present(p);
      }
      self.save_dedupe().await?;
    }
    Ok(LocationOutcome::Evaluated { inside: events.len() })
  }

  async fn save_birthdays(&self) -> Result<()> {
    self.store.save_birthdays(&self.user, &self.birthdays).await.map_err(Error::store)
  }

  async fn save_settings(&self) -> Result<()> {
    self.store.save_settings(&self.user, &self.settings).await.map_err(Error::store)
  }

  async fn save_preferences(&self) -> Result<()> {
    self
      .store
      .save_preferences(&self.user, self.dispatcher.preferences())
      .await
      .map_err(Error::store)
  }

  /// Store the answer to the notification prompt for platforms that
  /// forget it between sessions.
  async fn remember_permission(&mut self, outcome: PermissionOutcome) -> Result<()> {
    let answer = match outcome {
      PermissionOutcome::Granted => PermissionState::Granted,
      PermissionOutcome::Denied | PermissionOutcome::Blocked => PermissionState::Denied,
      PermissionOutcome::Unsupported => return Ok(()),
    };
    if self.dispatcher.preferences().notification_permission == answer {
      return Ok(());
    }
    self.dispatcher.preferences_mut().notification_permission = answer;
    self.save_preferences().await
  }

  async fn save_dedupe(&self) -> Result<()> {
    self.store.save_dedupe(&self.user, self.dispatcher.dedupe()).await.map_err(Error::store)
  }
}

async fn sleep_until(due: Option<Instant>) {
  match due {
    Some(at) => time::sleep_until(at).await,
    None => std::future::pending().await,
  }
}

async fn next_event<G: Geolocation>(watch: Option<&mut LocationWatch<G>>) -> Option<LocationEvent> {
  match watch {
    Some(watch) => watch.next().await,
    None => std::future::pending().await,
  }
}
