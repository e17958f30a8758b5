//! `buddy`: birthday reminders with location-based alerts, from the terminal.
//!
//! # Usage
//!
//! ```
//! buddy --user alice@example.com add "Sam Lee" --date 1990-03-15 --phone +15551234567
//! buddy --user alice@example.com --at 40.7128,-74.0060 geofencing enable
//! buddy --config ~/.config/buddy/buddy.toml watch --replay walk.jsonl
//! ```
//!
//! Settings come from `buddy.toml` (or `--config`) and `BUDDY_*` environment
//! variables; see [`config::AppConfig`].

mod commands;
mod config;
mod console;
mod replay;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use buddy_alerts::{
  capability::SystemClock,
  dashboard::{Collaborators, Dashboard},
};
use buddy_core::{store::ReminderStore as _, user::UserKey};
use buddy_store_sqlite::SqliteStore;
use clap::Parser;
use commands::Command;
use config::{AppConfig, expand_tilde};
use console::{ConsoleNotifier, ConsolePresenter};
use replay::ReplayGeolocation;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "buddy", author, version, about = "Birthday reminders with location-based alerts")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "buddy.toml")]
  config: PathBuf,

  /// Email of the acting user; overrides `user` in the config.
  #[arg(short, long)]
  user: Option<String>,

  /// Report this position (`LAT,LON`) to location requests.
  #[arg(long, value_name = "LAT,LON", value_parser = parse_position, allow_hyphen_values = true)]
  at: Option<(f64, f64)>,

  /// Print results as JSON.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

fn parse_position(s: &str) -> Result<(f64, f64), String> {
  let (lat, lon) = s.split_once(',').ok_or("expected LAT,LON")?;
  let lat = lat.trim().parse::<f64>().map_err(|e| format!("latitude: {e}"))?;
  let lon = lon.trim().parse::<f64>().map_err(|e| format!("longitude: {e}"))?;
  Ok((lat, lon))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr so `--json` output stays clean.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let app = AppConfig::load(&cli.config)?;

  let email = cli
    .user
    .clone()
    .or_else(|| app.user.clone())
    .context("no user given; pass --user or set `user` in the config file")?;
  let user = UserKey::new(&email).context("invalid user email")?;

  // Open SQLite store.
  let store_path = expand_tilde(&app.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {}", store_path.display()))?;
  tracing::debug!(path = %store_path.display(), "store opened");

  // The terminal has no permission memory of its own.
  let permission = store
    .load_preferences(&user)
    .await
    .context("failed to load notification preferences")?
    .notification_permission;

  let geolocation = match (&cli.command, cli.at) {
    (Command::Watch { replay, interval_ms }, _) => {
      ReplayGeolocation::from_file(replay, Duration::from_millis(*interval_ms))?
    }
    (_, Some((latitude, longitude))) => ReplayGeolocation::fixed(latitude, longitude),
    _ => ReplayGeolocation::new(Vec::new(), Duration::ZERO),
  };

  let mut dash = Dashboard::new(
    user,
    Collaborators {
      store,
      geolocation: Arc::new(geolocation),
      notifier: Arc::new(ConsoleNotifier::new(permission)),
      presenter: ConsolePresenter,
      clock: Arc::new(SystemClock),
    },
    app.alerts.clone(),
  );
  dash.init().await.context("failed to load session")?;

  if let Some(name) = &app.name
    && dash.profile().await?.is_none()
  {
    dash.update_profile(name.clone(), None).await?;
  }

  let result = commands::run(&mut dash, cli.command, cli.json).await;

  // Queued alerts still show after a failed command.
  dash.flush_presentations().await;
  dash.shutdown().await.context("failed to save session")?;
  result
}
