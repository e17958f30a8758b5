//! User identity, the partition key for every per-user store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A normalised user email: trimmed and lower-cased.
///
/// Two keys built from `" Alice@Example.com"` and `"alice@example.com"`
/// compare equal, so partitioning is case-insensitive by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserKey(String);

impl UserKey {
  pub fn new(email: impl AsRef<str>) -> Result<Self> {
    let normalised = email.as_ref().trim().to_lowercase();
    if normalised.is_empty() {
      return Err(Error::EmptyUserKey);
    }
    Ok(Self(normalised))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for UserKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl TryFrom<String> for UserKey {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::new(value) }
}

impl From<UserKey> for String {
  fn from(key: UserKey) -> Self { key.0 }
}

/// The profile half of a user record. Credentials are not stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
  pub key:        UserKey,
  pub name:       String,
  pub photo_url:  Option<String>,
  pub created_at: DateTime<Utc>,
}
