//! Runtime core of Birthday Buddy: location sampling, geofence evaluation
//! and alert dispatch, wired together by [`Dashboard`].
//!
//! Platform services (geolocation, system notifications, on-screen
//! presentation, the wall clock) are reached only through the traits in
//! [`capability`], so every collaborator can be replaced in tests.

#![allow(async_fn_in_trait)]

pub mod capability;
pub mod config;
pub mod dashboard;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod feed;
pub mod provider;

#[cfg(test)]
mod testing;

pub use config::AlertConfig;
pub use dashboard::Dashboard;
pub use error::{Error, Result};
