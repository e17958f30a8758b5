//! Core types and trait definitions for Birthday Buddy.
//!
//! No database or runtime dependencies live here.
//! The store backend and the alerting runtime both depend on it.

// Native `async fn` in trait impls; the trait itself spells out `Send`.
#![allow(async_fn_in_trait)]

pub mod birthday;
pub mod calendar;
pub mod contact;
pub mod dedupe;
pub mod error;
pub mod geo;
pub mod geofence;
pub mod ident;
pub mod location;
pub mod preferences;
pub mod store;
pub mod user;

pub use error::{Error, Result};
