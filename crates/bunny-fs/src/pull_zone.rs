//! Public and token-authenticated URLs for objects served through a pull
//! zone.
//!
//! Signed URLs follow BunnyCDN token authentication: the token is the
//! URL-safe, unpadded base64 of `sha256(key + path + expires + query)`,
//! where `query` holds the extra parameters sorted by key. The CDN
//! recomputes the same hash, so the hashed input must not change shape.

use std::collections::BTreeMap;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::{AdapterConfig, FilesystemError, FilesystemResult};

/// A pull zone URL and its token authentication key.
#[derive(Clone, Default)]
pub struct PullZone {
  url:   String,
  token: String,
}

impl PullZone {
  /// Creates a new [`PullZone`]. Empty values mean "not configured".
  pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
    Self {
      url:   url.into(),
      token: token.into(),
    }
  }

  /// Whether a pull zone URL is configured.
  #[must_use]
  pub fn has_url(&self) -> bool { !self.url.is_empty() }

  fn base_url(&self) -> FilesystemResult<&str> {
    if self.url.is_empty() {
      return Err(FilesystemError::MissingPullZoneUrl);
    }
    Ok(self.url.trim_end_matches('/'))
  }

  /// The public URL of `path`.
  pub fn public_url(&self, path: &str) -> FilesystemResult<String> {
    let base = self.base_url()?;
    Ok(format!("{base}/{}", path.trim_start_matches('/')))
  }

  /// A URL for `path` that the CDN accepts until `expires_at`.
  ///
  /// `params` are appended to the URL and covered by the token; their
  /// order does not matter. `_allow_for_path` is accepted for API
  /// compatibility and is not part of the hashed input.
  #[instrument(skip(self, params), fields(expires = expires_at.timestamp()), err)]
  pub fn temporary_url<K, V>(
    &self,
    path: &str,
    expires_at: DateTime<Utc>,
    params: impl IntoIterator<Item = (K, V)>,
    _allow_for_path: Option<&str>,
  ) -> FilesystemResult<String>
  where
    K: Into<String>,
    V: Into<String>,
  {
    let base = self.base_url()?;
    if self.token.is_empty() {
      return Err(FilesystemError::MissingPullZoneToken);
    }
    // the path scope is not hashed; tokens cover `path` only

    let params: BTreeMap<String, String> = params
      .into_iter()
      .map(|(k, v)| (k.into(), v.into()))
      .collect();
    let query = encode_query(&params);
    let expires = expires_at.timestamp();
    let token = sign(&self.token, path, expires, &query);

    debug!(param_count = params.len(), "signed url");

    let query = if query.is_empty() {
      query
    } else {
      format!("&{query}")
    };
    Ok(format!("{base}{path}?token={token}{query}&expires={expires}"))
  }
}

impl From<&AdapterConfig> for PullZone {
  fn from(config: &AdapterConfig) -> Self {
    Self::new(config.pull_zone_url.clone(), config.pull_zone_token.clone())
  }
}

/// Form-encodes parameters in key order, with spaces as `+` and every
/// reserved character escaped. `form_urlencoded` leaves `*` bare, so it is
/// escaped afterwards; a literal `*` can only come from an unescaped byte.
fn encode_query(params: &BTreeMap<String, String>) -> String {
  let mut serializer = url::form_urlencoded::Serializer::new(String::new());
  for (key, value) in params {
    serializer.append_pair(key, value);
  }
  serializer.finish().replace('*', "%2A")
}

/// Computes the token for a path, expiry and encoded query.
#[must_use]
pub fn sign(token: &str, path: &str, expires: i64, query: &str) -> String {
  let digest = Sha256::digest(format!("{token}{path}{expires}{query}"));
  URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn expiry() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
  }

  fn no_params() -> Vec<(String, String)> { Vec::new() }

  #[test]
  fn test_public_url_trims_slashes() {
    let zone = PullZone::new("https://example.org.local/assets/", "");
    assert_eq!(
      zone.public_url("/path.txt").unwrap(),
      "https://example.org.local/assets/path.txt"
    );
    assert_eq!(
      zone.public_url("a/b.txt").unwrap(),
      "https://example.org.local/assets/a/b.txt"
    );
  }

  #[test]
  fn test_public_url_requires_url() {
    let zone = PullZone::default();
    assert!(matches!(
      zone.public_url("/a"),
      Err(FilesystemError::MissingPullZoneUrl)
    ));
  }

  #[test]
  fn test_sign_known_answer() {
    assert_eq!(
      sign("secret", "/a/b.txt", 1_700_000_000, ""),
      "AwFnXDhVm5O4os0YniftvAlV__BfyA0CHI_p4oQOcNE"
    );
  }

  #[test]
  fn test_temporary_url_shape() {
    let zone = PullZone::new("https://cdn.test/", "secret");
    let url = zone
      .temporary_url("/a/b.txt", expiry(), no_params(), None)
      .unwrap();
    assert_eq!(
      url,
      "https://cdn.test/a/b.txt?token=AwFnXDhVm5O4os0YniftvAlV__BfyA0CHI_p4oQOcNE&expires=1700000000"
    );
  }

  #[test]
  fn test_temporary_url_with_params() {
    let zone = PullZone::new("https://cdn.test", "secret");
    let url = zone
      .temporary_url("/a/b.txt", expiry(), [("b", "2"), ("a", "1 x")], None)
      .unwrap();
    assert_eq!(
      url,
      "https://cdn.test/a/b.txt?token=kQUUwkCfVvBLSYVZzrPsW1G8iqvaDwYyeOexqVqhdCM&a=1+x&b=2&expires=1700000000"
    );
  }

  #[test]
  fn test_encode_query_escapes_reserved() {
    let params = BTreeMap::from([
      ("token_countries".to_owned(), "US,*".to_owned()),
      ("x".to_owned(), "a b~c".to_owned()),
    ]);
    assert_eq!(
      encode_query(&params),
      "token_countries=US%2C%2A&x=a+b%7Ec"
    );
  }

  #[test]
  fn test_temporary_url_with_wildcard_param() {
    let zone = PullZone::new("https://cdn.test", "secret");
    let url = zone
      .temporary_url("/a/b.txt", expiry(), [("token_countries", "US,*")], None)
      .unwrap();
    assert_eq!(
      url,
      "https://cdn.test/a/b.txt?token=6Oc3qQWGcx6isw5khlu3tCaK0137UhgL1xdoO9K09n8&token_countries=US%2C%2A&expires=1700000000"
    );
  }

  #[test]
  fn test_temporary_url_param_order_independent() {
    let zone = PullZone::new("https://cdn.test", "secret");
    let first = zone
      .temporary_url("/a.txt", expiry(), [("b", "2"), ("a", "1")], None)
      .unwrap();
    let second = zone
      .temporary_url("/a.txt", expiry(), [("a", "1"), ("b", "2")], None)
      .unwrap();
    assert_eq!(first, second);
  }

  #[test]
  fn test_temporary_url_ignores_allow_for_path() {
    let zone = PullZone::new("https://cdn.test", "secret");
    let plain = zone
      .temporary_url("/a.txt", expiry(), no_params(), None)
      .unwrap();
    let scoped = zone
      .temporary_url("/a.txt", expiry(), no_params(), Some("/"))
      .unwrap();
    assert_eq!(plain, scoped);
  }

  #[test]
  fn test_temporary_url_requires_config() {
    let zone = PullZone::new("", "secret");
    assert!(matches!(
      zone.temporary_url("/a", expiry(), no_params(), None),
      Err(FilesystemError::MissingPullZoneUrl)
    ));

    let zone = PullZone::new("https://cdn.test", "");
    assert!(matches!(
      zone.temporary_url("/a", expiry(), no_params(), None),
      Err(FilesystemError::MissingPullZoneToken)
    ));
  }
}
