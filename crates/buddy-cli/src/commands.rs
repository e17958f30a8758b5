//! Subcommands and their handlers.

use std::path::PathBuf;

use anyhow::{Context as _, bail};
use buddy_alerts::{
  dashboard::{Dashboard, LocationStatus, Step},
  dispatcher::PermissionOutcome,
  feed::Priority,
};
use buddy_core::{
  birthday::{NewBirthday, Relationship, parse_date},
  contact::BIRTHDAY_VIDEOS,
};
use buddy_store_sqlite::SqliteStore;
use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;

use crate::{
  console::{ConsoleNotifier, ConsolePresenter},
  replay::ReplayGeolocation,
};

pub type AppDashboard = Dashboard<SqliteStore, ReplayGeolocation, ConsoleNotifier, ConsolePresenter>;

// ─── Arguments ───────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Show the profile, or update it when a name is given.
  Profile {
    #[arg(long)]
    name:      Option<String>,
    #[arg(long)]
    photo_url: Option<String>,
  },
  /// Add a birthday.
  Add(BirthdayArgs),
  /// Replace the fields of a birthday, keeping its id.
  Edit {
    id:     String,
    #[command(flatten)]
    fields: BirthdayArgs,
  },
  /// Delete a birthday.
  Remove { id: String },
  /// All birthdays in the order they were added.
  List,
  /// Birthdays coming up soon.
  Upcoming,
  Stats,
  /// Run the birthday check and show today's alerts.
  Check,
  /// The notification list.
  Feed,
  /// Print WhatsApp and Gmail links for sending wishes.
  Links {
    id:    String,
    /// Phone number to use when the record has none.
    #[arg(long)]
    phone: Option<String>,
    /// Email to use when the record has none.
    #[arg(long)]
    email: Option<String>,
    /// A video URL, or the number of a suggested video (see `videos`).
    #[arg(long)]
    video: Option<String>,
  },
  /// Suggested birthday animations for `links --video`.
  Videos,
  /// Ask for permission to show system notifications.
  NotifyPermission,
  /// Turn system notifications on or off.
  Notifications { state: Toggle },
  /// Manage geofences.
  #[command(subcommand)]
  Geofence(GeofenceCommand),
  /// Turn location-based alerts on or off.
  #[command(subcommand)]
  Geofencing(GeofencingCommand),
  /// Replay recorded positions through the geofence engine.
  Watch {
    /// JSON-lines file of positions.
    #[arg(long, value_name = "FILE")]
    replay:      PathBuf,
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
  },
}

#[derive(Subcommand, Debug)]
pub enum GeofenceCommand {
  Add {
    name:      String,
    #[arg(long, allow_negative_numbers = true)]
    latitude:  f64,
    #[arg(long, allow_negative_numbers = true)]
    longitude: f64,
    /// Metres; defaults to the configured radius.
    #[arg(long)]
    radius:    Option<f64>,
  },
  Remove { id: String },
  /// Geofences with their distance from the current location.
  List,
  /// Set the default radius, in metres, for new geofences.
  Radius { meters: f64 },
  /// Add a geofence at the current location.
  Here { name: String },
}

#[derive(Subcommand, Debug)]
pub enum GeofencingCommand {
  Enable,
  Disable,
  Status,
  /// Allow tracking while in the background.
  Background { state: Toggle },
  /// Share location with contacts.
  Share { state: Toggle },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Toggle {
  On,
  Off,
}

impl Toggle {
  fn enabled(self) -> bool { matches!(self, Toggle::On) }
}

#[derive(Args, Debug)]
pub struct BirthdayArgs {
  name:         String,
  /// Birth date as `YYYY-MM-DD`.
  #[arg(long)]
  date:         String,
  /// family, friend, colleague, partner or other.
  #[arg(long, default_value = "other")]
  relationship: String,
  #[arg(long)]
  phone:        Option<String>,
  #[arg(long)]
  email:        Option<String>,
  #[arg(long)]
  notes:        Option<String>,
  #[arg(long)]
  photo_url:    Option<String>,
}

impl BirthdayArgs {
  fn into_input(self) -> anyhow::Result<NewBirthday> {
    Ok(NewBirthday {
      date:         Some(parse_date(&self.date)?),
      name:         self.name,
      relationship: Relationship::parse_lossy(&self.relationship),
      phone_number: self.phone,
      email:        self.email,
      notes:        self.notes,
      photo_url:    self.photo_url,
    })
  }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

pub async fn run(dash: &mut AppDashboard, command: Command, json: bool) -> anyhow::Result<()> {
  match command {
    Command::Profile { name: Some(name), photo_url } => {
      let profile = dash.update_profile(name, photo_url).await?;
      println!("profile saved for {} ({})", profile.name, profile.key);
    }
    Command::Profile { name: None, .. } => match dash.profile().await? {
      Some(p) if json => print_json(&p)?,
      Some(p) => {
        println!("{} <{}>", p.name, p.key);
        println!("member since {}", p.created_at.format("%Y-%m-%d"));
      }
      None => println!("no profile yet; set one with `buddy profile --name ...`"),
    },

    Command::Add(args) => {
      let record = dash.add_birthday(args.into_input()?).await?;
      println!("added {} ({})", record.name, record.id);
    }
    Command::Edit { id, fields } => {
      let record = dash.edit_birthday(&id, fields.into_input()?).await?;
      println!("updated {} ({})", record.name, record.id);
    }
    Command::Remove { id } => {
      let record = dash.delete_birthday(&id).await?;
      println!("removed {}", record.name);
    }

    Command::List if json => print_json(&dash.birthdays())?,
    Command::List => {
      if dash.birthdays().is_empty() {
        println!("no birthdays yet; add one with `buddy add NAME --date YYYY-MM-DD`");
      }
      for b in dash.birthdays() {
        let contact = [b.phone_number.as_deref(), b.email.as_deref()]
          .into_iter()
          .flatten()
          .collect::<Vec<_>>()
          .join(", ");
        println!("{}  {}  {} ({})  {contact}", b.id, b.date, b.name, b.relationship);
      }
    }
    Command::Upcoming if json => print_json(&dash.upcoming())?,
    Command::Upcoming => {
      for u in dash.upcoming() {
        let when = match u.days_until {
          0 => "today".to_owned(),
          1 => "tomorrow".to_owned(),
          n => format!("in {n} days"),
        };
        println!("{:<24} {when}", u.record.name);
      }
    }
    Command::Stats if json => print_json(&dash.stats())?,
    Command::Stats => {
      let stats = dash.stats();
      println!("total:      {}", stats.total);
      println!("this month: {}", stats.this_month);
      match stats.next_birthday_in {
        Some(days) => println!("next in:    {days} days"),
        None => println!("next in:    -"),
      }
    }
    Command::Check => {
      let fired = dash.pending_presentations() + dash.check_birthdays().await?;
      println!("{fired} birthday alert(s) today");
    }
    Command::Feed => {
      let items = dash.feed().await?;
      if json {
        return print_json(&items);
      }
      if items.is_empty() {
        println!("no notifications");
      }
      for item in &items {
        let marker = match item.priority {
          Priority::High => "!!",
          Priority::Medium => "! ",
          Priority::Low => "  ",
        };
        println!("{marker} {}", item.message);
      }
    }

    Command::Links { id, phone, email, video } => {
      let video_url = video.as_deref().map(resolve_video).transpose()?;
      let popup = dash.contact_popup(&id, phone.as_deref(), email.as_deref(), video_url)?;
      if !popup.has_links() {
        bail!("{} has no phone or email; pass --phone or --email", popup.name);
      }
      if json {
        print_json(&popup)?;
      } else {
        if let Some(link) = &popup.whatsapp {
          println!("WhatsApp: {link}");
        }
        if let Some(link) = &popup.gmail {
          println!("Gmail:    {link}");
        }
      }
    }
    Command::Videos => {
      for (n, video) in BIRTHDAY_VIDEOS.iter().enumerate() {
        println!("{}. {}  {}\n   {}", n + 1, video.name, video.description, video.url);
      }
    }

    Command::NotifyPermission => match dash.request_notification_permission().await? {
      PermissionOutcome::Granted => println!("notifications enabled"),
      PermissionOutcome::Denied | PermissionOutcome::Blocked => println!("notifications blocked"),
      PermissionOutcome::Unsupported => println!("notifications are not supported here"),
    },
    Command::Notifications { state } => dash.set_system_notifications(state.enabled()).await?,

    Command::Geofence(cmd) => geofence(dash, cmd, json).await?,
    Command::Geofencing(cmd) => geofencing(dash, cmd, json).await?,

    Command::Watch { .. } => watch(dash).await?,
  }
  Ok(())
}

async fn geofence(dash: &mut AppDashboard, cmd: GeofenceCommand, json: bool) -> anyhow::Result<()> {
  match cmd {
    GeofenceCommand::Add { name, latitude, longitude, radius } => {
      let g = dash.add_geofence(&name, latitude, longitude, radius).await?;
      println!("added {} ({})", g.name, g.id);
    }
    GeofenceCommand::Remove { id } => dash.remove_geofence(&id).await?,
    GeofenceCommand::List => {
      wait_for_fix(dash).await?;
      let distances = dash.geofence_distances();
      if json {
        return print_json(&distances);
      }
      for d in distances {
        let g = &d.geofence;
        let distance = match d.distance_km {
          Some(km) => format!("{km:.2} km{}", if d.inside { " (inside)" } else { "" }),
          None => "distance unknown".to_owned(),
        };
        println!(
          "{}  {}  ({:.5}, {:.5})  r={}m  {distance}",
          g.id, g.name, g.latitude, g.longitude, g.radius
        );
      }
    }
    GeofenceCommand::Radius { meters } => {
      dash.set_default_radius(meters).await?;
      println!("default radius set to {meters} m");
    }
    GeofenceCommand::Here { name } => {
      wait_for_fix(dash).await?;
      let g = dash.add_current_location_as_geofence(&name).await?;
      println!("added {} at ({:.5}, {:.5})", g.name, g.latitude, g.longitude);
    }
  }
  Ok(())
}

#[derive(Serialize)]
struct GeofencingReport {
  state:               buddy_alerts::dashboard::GeofencingState,
  location:            LocationStatus,
  background_location: bool,
  share_location:      bool,
  default_radius_m:    f64,
  geofences:           usize,
  notifications:       buddy_alerts::dispatcher::NotificationStatus,
}

async fn geofencing(
  dash: &mut AppDashboard,
  cmd: GeofencingCommand,
  json: bool,
) -> anyhow::Result<()> {
  match cmd {
    GeofencingCommand::Enable => {
      let status = dash.enable_geofencing().await?;
      println!("geofencing on; location {status:?}");
    }
    GeofencingCommand::Disable => dash.disable_geofencing().await?,
    GeofencingCommand::Status => {
      wait_for_fix(dash).await?;
      let settings = dash.settings();
      let report = GeofencingReport {
        state:               dash.geofencing_state(),
        location:            dash.location_status(),
        background_location: settings.background_location,
        share_location:      settings.share_location,
        default_radius_m:    settings.radius,
        geofences:           settings.geofences.len(),
        notifications:       dash.notification_status(),
      };
      if json {
        return print_json(&report);
      }
      println!("geofencing:    {:?}", report.state);
      println!("location:      {:?}", report.location);
      println!("background:    {}", report.background_location);
      println!("sharing:       {}", report.share_location);
      println!("radius:        {} m", report.default_radius_m);
      println!("geofences:     {}", report.geofences);
      println!("notifications: {:?}", report.notifications);
    }
    GeofencingCommand::Background { state } => dash.set_background_location(state.enabled()).await?,
    GeofencingCommand::Share { state } => dash.set_share_location(state.enabled()).await?,
  }
  Ok(())
}

/// Drive location updates until the replay ends or Ctrl-C is pressed.
async fn watch(dash: &mut AppDashboard) -> anyhow::Result<()> {
  if dash.location_status() == LocationStatus::Inactive {
    dash.enable_geofencing().await?;
  }
  loop {
    tokio::select! {
      step = dash.step() => match step? {
        Step::Idle | Step::WatchEnded => break,
        Step::Presented | Step::Location(_) => {}
      },
      signal = tokio::signal::ctrl_c() => {
        signal.context("failed to listen for Ctrl-C")?;
        tracing::info!("interrupted");
        break;
      }
    }
  }
  Ok(())
}

/// Pull location updates until a fix is known or the source has nothing
/// more to give. Does nothing while geofencing is off.
async fn wait_for_fix(dash: &mut AppDashboard) -> anyhow::Result<()> {
  while dash.location_status() == LocationStatus::Locating {
    match dash.step().await? {
      Step::Idle | Step::WatchEnded => break,
      Step::Presented | Step::Location(_) => {}
    }
  }
  Ok(())
}

fn resolve_video(choice: &str) -> anyhow::Result<&str> {
  match choice.parse::<usize>() {
    Ok(n) => BIRTHDAY_VIDEOS
      .get(n.wrapping_sub(1))
      .map(|v| v.url)
      .with_context(|| format!("no suggested video number {n}")),
    Err(_) => Ok(choice),
  }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
