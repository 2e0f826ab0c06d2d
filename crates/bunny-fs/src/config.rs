use std::fmt;

use serde::Deserialize;

/// Adapter configuration, fixed once the adapter is built.
///
/// Empty strings mean "not configured": URL generation fails without a
/// pull zone URL, and signing fails without a token.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
  /// Public base URL of the pull zone serving the storage zone.
  pub pull_zone_url:   String,
  /// Token authentication key of the pull zone.
  pub pull_zone_token: String,
}

impl AdapterConfig {
  /// Environment variable read for [`pull_zone_url`](Self::pull_zone_url).
  pub const PULL_ZONE_URL_VAR: &'static str = "BUNNY_PULL_ZONE_URL";
  /// Environment variable read for
  /// [`pull_zone_token`](Self::pull_zone_token).
  pub const PULL_ZONE_TOKEN_VAR: &'static str = "BUNNY_PULL_ZONE_TOKEN";

  /// Reads the configuration from the environment. Unset variables are
  /// left empty.
  #[must_use]
  pub fn from_env() -> Self {
    Self {
      pull_zone_url:   std::env::var(Self::PULL_ZONE_URL_VAR)
        .unwrap_or_default(),
      pull_zone_token: std::env::var(Self::PULL_ZONE_TOKEN_VAR)
        .unwrap_or_default(),
    }
  }

  /// Sets the pull zone URL.
  #[must_use]
  pub fn with_pull_zone_url(mut self, url: impl Into<String>) -> Self {
    self.pull_zone_url = url.into();
    self
  }

  /// Sets the pull zone token.
  #[must_use]
  pub fn with_pull_zone_token(mut self, token: impl Into<String>) -> Self {
    self.pull_zone_token = token.into();
    self
  }
}

impl fmt::Debug for AdapterConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AdapterConfig")
      .field("pull_zone_url", &self.pull_zone_url)
      .field("has_pull_zone_token", &!self.pull_zone_token.is_empty())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_deserialize_partial() {
    let config: AdapterConfig =
      serde_json::from_str(r#"{ "pull_zone_url": "https://cdn.test" }"#)
        .unwrap();
    assert_eq!(config.pull_zone_url, "https://cdn.test");
    assert!(config.pull_zone_token.is_empty());
  }

  #[test]
  fn test_debug_hides_token() {
    let config = AdapterConfig::default().with_pull_zone_token("hunter2");
    let debug = format!("{config:?}");
    assert!(!debug.contains("hunter2"));
    assert!(debug.contains("has_pull_zone_token: true"));
  }
}
