use std::fmt;

use serde::{Deserialize, Serialize};

/// A normalized, absolute path inside a storage zone.
///
/// Always starts with a single `/`, never contains repeated slashes, and
/// never ends with a slash unless it is the root.
#[derive(
  Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(from = "String", into = "String")]
pub struct StoragePath(String);

impl StoragePath {
  /// Normalize a raw path string.
  ///
  /// Backslashes are treated as separators, `.` segments are dropped and
  /// `..` segments pop their parent (saturating at the root).
  pub fn new(raw: impl AsRef<str>) -> Self {
    let raw = raw.as_ref().replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
      match segment {
        "" | "." => {}
        ".." => {
          segments.pop();
        }
        s => segments.push(s),
      }
    }
    Self(format!("/{}", segments.join("/")))
  }

  /// The root path, `/`.
  #[must_use]
  pub fn root() -> Self { Self("/".to_owned()) }

  /// Whether this is the root path.
  #[must_use]
  pub fn is_root(&self) -> bool { self.0 == "/" }

  /// The containing directory. The root is its own parent.
  #[must_use]
  pub fn parent(&self) -> Self {
    match self.0.rfind('/') {
      Some(0) | None => Self::root(),
      Some(idx) => Self(self.0[..idx].to_owned()),
    }
  }

  /// The final segment, or an empty string for the root.
  #[must_use]
  pub fn file_name(&self) -> &str {
    self.0.rsplit('/').next().unwrap_or_default()
  }

  /// Join a child segment onto this path.
  #[must_use]
  pub fn join(&self, child: &str) -> Self {
    Self::new(format!("{}/{child}", self.0))
  }

  /// Whether `self` is `other` or lies below it.
  #[must_use]
  pub fn starts_with(&self, other: &Self) -> bool {
    other.is_root()
      || self == other
      || self
        .0
        .strip_prefix(other.as_str())
        .is_some_and(|rest| rest.starts_with('/'))
  }

  /// Get the path as a string slice
  #[must_use]
  pub fn as_str(&self) -> &str { &self.0 }
  /// Convert into inner String
  #[must_use]
  pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for StoragePath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<String> for StoragePath {
  fn from(s: String) -> Self { Self::new(s) }
}

impl From<&str> for StoragePath {
  fn from(s: &str) -> Self { Self::new(s) }
}

impl From<StoragePath> for String {
  fn from(p: StoragePath) -> Self { p.0 }
}

impl AsRef<str> for StoragePath {
  fn as_ref(&self) -> &str { &self.0 }
}

/// Replace the first occurrence of `needle` in `haystack`.
#[must_use]
pub fn replace_first(haystack: &str, needle: &str, replacement: &str) -> String {
  if needle.is_empty() {
    return haystack.to_owned();
  }
  match haystack.find(needle) {
    Some(idx) => format!(
      "{}{replacement}{}",
      &haystack[..idx],
      &haystack[idx + needle.len()..]
    ),
    None => haystack.to_owned(),
  }
}

/// Split a raw path into its normalized directory and its final segment.
#[must_use]
pub fn split_dir_file(raw: &str) -> (String, String) {
  let path = StoragePath::new(raw);
  let file = path.file_name().to_owned();
  (path.parent().into_inner(), file)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_normalize_collapses_slashes() {
    assert_eq!(StoragePath::new("//a///b//").as_str(), "/a/b");
    assert_eq!(StoragePath::new("a/b.txt").as_str(), "/a/b.txt");
    assert_eq!(StoragePath::new("").as_str(), "/");
    assert_eq!(StoragePath::new("///").as_str(), "/");
  }

  #[test]
  fn test_normalize_dot_segments() {
    assert_eq!(StoragePath::new("/a/./b/../c").as_str(), "/a/c");
    assert_eq!(StoragePath::new("/../../a").as_str(), "/a");
    assert_eq!(StoragePath::new("a\\b\\c.txt").as_str(), "/a/b/c.txt");
  }

  #[test]
  fn test_parent_and_file_name() {
    let path = StoragePath::new("/dir/sub/file.txt");
    assert_eq!(path.parent().as_str(), "/dir/sub");
    assert_eq!(path.file_name(), "file.txt");
    assert_eq!(StoragePath::new("/file.txt").parent(), StoragePath::root());
    assert_eq!(StoragePath::root().parent(), StoragePath::root());
    assert_eq!(StoragePath::root().file_name(), "");
  }

  #[test]
  fn test_starts_with() {
    let dir = StoragePath::new("/dir");
    assert!(StoragePath::new("/dir/file").starts_with(&dir));
    assert!(StoragePath::new("/dir").starts_with(&dir));
    assert!(!StoragePath::new("/directory/file").starts_with(&dir));
    assert!(StoragePath::new("/anything").starts_with(&StoragePath::root()));
  }

  #[test]
  fn test_replace_first() {
    assert_eq!(replace_first("/zone/zone/a", "zone/", "/"), "//zone/a");
    assert_eq!(replace_first("/other/a", "zone/", "/"), "/other/a");
    assert_eq!(replace_first("abc", "", "x"), "abc");
  }

  #[test]
  fn test_split_dir_file() {
    assert_eq!(
      split_dir_file("/zone/dir/"),
      ("/zone".to_owned(), "dir".to_owned())
    );
    assert_eq!(
      split_dir_file("file.txt"),
      ("/".to_owned(), "file.txt".to_owned())
    );
  }

  #[test]
  fn test_serde_normalizes() {
    let path: StoragePath = serde_json::from_str("\"a//b/\"").unwrap();
    assert_eq!(path.as_str(), "/a/b");
    assert_eq!(serde_json::to_string(&path).unwrap(), "\"/a/b\"");
  }
}
