//! Test doubles for every collaborator of the runtime, plus a [`Harness`]
//! that wires them into a [`Dashboard`].

use std::{
  collections::HashMap,
  convert::Infallible,
  sync::{Arc, Mutex},
};

use buddy_core::{
  birthday::BirthdayRecord,
  dedupe::DedupeTable,
  geofence::GeofenceSettings,
  location::{LocationError, LocationSample, PositionOptions},
  preferences::NotificationPreferences,
  store::ReminderStore,
  user::{UserKey, UserProfile},
};
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use tokio::sync::mpsc;

use crate::{
  capability::{
    Clock, Geolocation, LocationEvent, Notifier, NotifyError, PermissionState, Presentation,
    Presenter, SystemNotification, ToastKind, WatchId,
  },
  config::AlertConfig,
  dashboard::{Collaborators, Dashboard},
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

/// A fix with a fixed timestamp, so samples compare equal by position.
pub fn sample(latitude: f64, longitude: f64) -> LocationSample {
  LocationSample {
    latitude,
    longitude,
    accuracy: Some(20.0),
    timestamp: Utc.timestamp_opt(0, 0).unwrap(),
  }
}

// ─── FakeGeolocation ─────────────────────────────────────────────────────────

pub struct FakeGeolocation {
  supported: bool,
  state:     Mutex<GeoState>,
}

struct GeoState {
  one_shot: Result<LocationSample, LocationError>,
  options:  Vec<PositionOptions>,
  watches:  Vec<(WatchId, mpsc::UnboundedSender<LocationEvent>)>,
  /// Senders of cleared watches, kept to simulate late deliveries.
  retired:  Vec<mpsc::UnboundedSender<LocationEvent>>,
  cleared:  Vec<WatchId>,
}

impl Default for FakeGeolocation {
  fn default() -> Self { Self::failing(LocationError::PositionUnavailable) }
}

impl FakeGeolocation {
  pub fn with_fix(fix: LocationSample) -> Self { Self::answering(Ok(fix)) }

  pub fn failing(error: LocationError) -> Self { Self::answering(Err(error)) }

  pub fn unsupported() -> Self { Self { supported: false, ..Self::default() } }

  fn answering(one_shot: Result<LocationSample, LocationError>) -> Self {
    Self {
      supported: true,
      state:     Mutex::new(GeoState {
        one_shot,
        options: Vec::new(),
        watches: Vec::new(),
        retired: Vec::new(),
        cleared: Vec::new(),
      }),
    }
  }

  pub fn set_one_shot(&self, answer: Result<LocationSample, LocationError>) {
    self.state.lock().unwrap().one_shot = answer;
  }

  /// Deliver to every running watch.
  pub fn emit(&self, event: LocationEvent) {
    for (_, tx) in &self.state.lock().unwrap().watches {
      let _ = tx.send(event);
    }
  }

  /// Deliver through watches that have already been cleared. Returns how
  /// many deliveries were accepted by a receiver.
  pub fn emit_to_cleared(&self, event: LocationEvent) -> usize {
    let state = self.state.lock().unwrap();
    state.retired.iter().filter(|tx| tx.send(event).is_ok()).count()
  }

  pub fn requested_options(&self) -> Vec<PositionOptions> {
    self.state.lock().unwrap().options.clone()
  }

  pub fn cleared(&self) -> Vec<WatchId> { self.state.lock().unwrap().cleared.clone() }

  pub fn active_watches(&self) -> usize { self.state.lock().unwrap().watches.len() }

  /// Drop the senders of every running watch, as a source that stops.
  pub fn end_watches(&self) { self.state.lock().unwrap().watches.clear(); }
}

impl Geolocation for FakeGeolocation {
  fn is_supported(&self) -> bool { self.supported }

  async fn current_position(
    &self,
    options: PositionOptions,
  ) -> Result<LocationSample, LocationError> {
    let mut state = self.state.lock().unwrap();
    state.options.push(options);
    state.one_shot
  }

  fn watch_position(
    &self,
    options: PositionOptions,
    sink: mpsc::UnboundedSender<LocationEvent>,
  ) -> WatchId {
    let id = WatchId::new();
    let mut state = self.state.lock().unwrap();
    state.options.push(options);
    state.watches.push((id, sink));
    id
  }

  fn clear_watch(&self, id: WatchId) {
    let mut state = self.state.lock().unwrap();
    state.cleared.push(id);
    if let Some(pos) = state.watches.iter().position(|(w, _)| *w == id) {
      let (_, tx) = state.watches.remove(pos);
      state.retired.push(tx);
    }
  }
}

// ─── FakeNotifier ────────────────────────────────────────────────────────────

pub struct FakeNotifier {
  supported: bool,
  state:     Mutex<NotifierState>,
}

struct NotifierState {
  permission: PermissionState,
  answer:     PermissionState,
  prompts:    usize,
  shown:      Vec<SystemNotification>,
  fail_next:  bool,
}

impl FakeNotifier {
  pub fn with_permission(permission: PermissionState) -> Self {
    Self {
      supported: true,
      state:     Mutex::new(NotifierState {
        permission,
        answer: PermissionState::Denied,
        prompts: 0,
        shown: Vec::new(),
        fail_next: false,
      }),
    }
  }

  pub fn granted() -> Self { Self::with_permission(PermissionState::Granted) }

  pub fn unsupported() -> Self {
    Self { supported: false, ..Self::with_permission(PermissionState::Default) }
  }

  /// What the user will answer to the next prompt.
  pub fn answer_with(&self, answer: PermissionState) { self.state.lock().unwrap().answer = answer; }

  pub fn fail_next_show(&self) { self.state.lock().unwrap().fail_next = true; }

  pub fn prompts(&self) -> usize { self.state.lock().unwrap().prompts }

  pub fn shown(&self) -> Vec<SystemNotification> { self.state.lock().unwrap().shown.clone() }
}

impl Notifier for FakeNotifier {
  fn is_supported(&self) -> bool { self.supported }

  fn permission(&self) -> PermissionState { self.state.lock().unwrap().permission }

  async fn request_permission(&self) -> PermissionState {
    let mut state = self.state.lock().unwrap();
    state.prompts += 1;
    state.permission = state.answer;
    state.permission
  }

  fn show(&self, notification: &SystemNotification) -> Result<(), NotifyError> {
    let mut state = self.state.lock().unwrap();
    if std::mem::take(&mut state.fail_next) {
      return Err(NotifyError("blocked by the platform".into()));
    }
    state.shown.push(notification.clone());
    Ok(())
  }
}

// ─── RecordingPresenter ──────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingPresenter {
  seen: Arc<Mutex<Vec<Presentation>>>,
}

impl RecordingPresenter {
  /// Everything presented since the last call.
  pub fn take(&self) -> Vec<Presentation> { std::mem::take(&mut *self.seen.lock().unwrap()) }

  pub fn toasts(&self) -> Vec<(String, ToastKind)> {
    self
      .seen
      .lock()
      .unwrap()
      .iter()
      .filter_map(|p| match p {
        Presentation::Toast { message, kind } => Some((message.clone(), *kind)),
        _ => None,
      })
      .collect()
  }
}

impl Presenter for RecordingPresenter {
  fn present(&self, presentation: Presentation) { self.seen.lock().unwrap().push(presentation); }
}

// ─── FixedClock ──────────────────────────────────────────────────────────────

/// A clock that only moves when told to. `today` is the UTC date.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
  pub fn on(day: NaiveDate) -> Self {
    Self(Mutex::new(day.and_hms_opt(12, 0, 0).unwrap().and_utc()))
  }

  pub fn advance_days(&self, days: u64) {
    let mut now = self.0.lock().unwrap();
    *now = *now + Days::new(days);
  }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> { *self.0.lock().unwrap() }

  fn today(&self) -> NaiveDate { self.now().date_naive() }
}

// ─── MemoryStore ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemoryStore {
  inner: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
  users:       HashMap<UserKey, UserProfile>,
  birthdays:   HashMap<UserKey, Vec<BirthdayRecord>>,
  settings:    HashMap<UserKey, GeofenceSettings>,
  preferences: HashMap<UserKey, NotificationPreferences>,
  dedupe:      HashMap<UserKey, DedupeTable>,
}

impl MemoryStore {
  pub fn settings_of(&self, user: &UserKey) -> Option<GeofenceSettings> {
    self.inner.lock().unwrap().settings.get(user).cloned()
  }

  pub fn preferences_of(&self, user: &UserKey) -> Option<NotificationPreferences> {
    self.inner.lock().unwrap().preferences.get(user).copied()
  }

  pub fn dedupe_of(&self, user: &UserKey) -> Option<DedupeTable> {
    self.inner.lock().unwrap().dedupe.get(user).cloned()
  }
}

impl ReminderStore for MemoryStore {
  type Error = Infallible;

  async fn upsert_user(&self, profile: &UserProfile) -> Result<(), Infallible> {
    self.inner.lock().unwrap().users.insert(profile.key.clone(), profile.clone());
    Ok(())
  }

  async fn get_user(&self, user: &UserKey) -> Result<Option<UserProfile>, Infallible> {
    Ok(self.inner.lock().unwrap().users.get(user).cloned())
  }

  async fn load_birthdays(&self, user: &UserKey) -> Result<Vec<BirthdayRecord>, Infallible> {
    Ok(self.inner.lock().unwrap().birthdays.get(user).cloned().unwrap_or_default())
  }

  async fn save_birthdays(
    &self,
    user: &UserKey,
    records: &[BirthdayRecord],
  ) -> Result<(), Infallible> {
    self.inner.lock().unwrap().birthdays.insert(user.clone(), records.to_vec());
    Ok(())
  }

  async fn load_settings(&self, user: &UserKey) -> Result<GeofenceSettings, Infallible> {
    Ok(self.settings_of(user).unwrap_or_default())
  }

  async fn save_settings(
    &self,
    user: &UserKey,
    settings: &GeofenceSettings,
  ) -> Result<(), Infallible> {
    self.inner.lock().unwrap().settings.insert(user.clone(), settings.clone());
    Ok(())
  }

  async fn load_preferences(&self, user: &UserKey) -> Result<NotificationPreferences, Infallible> {
    Ok(self.inner.lock().unwrap().preferences.get(user).copied().unwrap_or_default())
  }

  async fn save_preferences(
    &self,
    user: &UserKey,
    preferences: &NotificationPreferences,
  ) -> Result<(), Infallible> {
    self.inner.lock().unwrap().preferences.insert(user.clone(), *preferences);
    Ok(())
  }

  async fn load_dedupe(&self, user: &UserKey) -> Result<DedupeTable, Infallible> {
    Ok(self.dedupe_of(user).unwrap_or_default())
  }

  async fn save_dedupe(&self, user: &UserKey, table: &DedupeTable) -> Result<(), Infallible> {
    self.inner.lock().unwrap().dedupe.insert(user.clone(), table.clone());
    Ok(())
  }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

pub type TestDashboard = Dashboard<MemoryStore, FakeGeolocation, FakeNotifier, RecordingPresenter>;

pub struct Harness {
  pub user:      UserKey,
  pub store:     MemoryStore,
  pub geo:       Arc<FakeGeolocation>,
  pub notifier:  Arc<FakeNotifier>,
  pub presenter: RecordingPresenter,
  pub clock:     Arc<FixedClock>,
}

impl Harness {
  pub fn new(today: NaiveDate) -> Self {
    Self {
      user:      UserKey::new("tester@example.com").unwrap(),
      store:     MemoryStore::default(),
      geo:       Arc::new(FakeGeolocation::default()),
      notifier:  Arc::new(FakeNotifier::granted()),
      presenter: RecordingPresenter::default(),
      clock:     Arc::new(FixedClock::on(today)),
    }
  }

  /// A fresh dashboard over the shared fakes; state persists through the
  /// store across calls, like a new session.
  pub fn dashboard(&self) -> TestDashboard {
    Dashboard::new(
      self.user.clone(),
      Collaborators {
        store:       self.store.clone(),
        geolocation: self.geo.clone(),
        notifier:    self.notifier.clone(),
        presenter:   self.presenter.clone(),
        clock:       self.clock.clone(),
      },
      AlertConfig::default(),
    )
  }
}
