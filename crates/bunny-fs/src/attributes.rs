use std::fmt;

use bunny_types::StoragePath;
use serde::Serialize;

/// Whether an object is publicly reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
  /// Served through the pull zone.
  Public,
  /// Not reachable without storage credentials.
  Private,
}

impl fmt::Display for Visibility {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Public => "public",
      Self::Private => "private",
    })
  }
}

/// Discriminant recorded in [`ExtraMetadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
  /// A regular object.
  File,
  /// A directory.
  Dir,
}

/// Auxiliary fields copied from the raw listing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtraMetadata {
  /// Record type.
  #[serde(rename = "type")]
  pub kind:              EntryKind,
  /// Directory containing the zone-prefixed record directory.
  pub dirname:           String,
  /// Unique identifier of the object.
  pub guid:              String,
  /// Leaf name.
  pub object_name:       String,
  /// Last change as a Unix timestamp.
  pub timestamp:         i64,
  /// Storage server id.
  pub server_id:         i64,
  /// Owner id.
  pub user_id:           String,
  /// Creation time, verbatim.
  pub date_created:      String,
  /// Storage zone name.
  pub storage_zone_name: String,
  /// Storage zone id.
  pub storage_zone_id:   i64,
  /// Content checksum reported by the API.
  pub checksum:          Option<String>,
  /// Replication regions.
  pub replicated_zones:  Option<String>,
}

/// A normalized file record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileAttributes {
  /// Normalized path.
  pub path:           StoragePath,
  /// Size in bytes.
  pub file_size:      u64,
  /// Always [`Visibility::Public`] for listed objects.
  pub visibility:     Visibility,
  /// Last change as a Unix timestamp.
  pub last_modified:  i64,
  /// Resolved mime type, `None` when unknown.
  pub mime_type:      Option<String>,
  /// Raw record fields.
  pub extra_metadata: ExtraMetadata,
}

/// A normalized directory record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryAttributes {
  /// Normalized path.
  pub path: StoragePath,
}

/// A normalized listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageAttributes {
  /// A file.
  File(FileAttributes),
  /// A directory.
  Dir(DirectoryAttributes),
}

impl StorageAttributes {
  /// The normalized path of the entry.
  #[must_use]
  pub const fn path(&self) -> &StoragePath {
    match self {
      Self::File(f) => &f.path,
      Self::Dir(d) => &d.path,
    }
  }

  /// Whether this is a file.
  #[must_use]
  pub const fn is_file(&self) -> bool { matches!(self, Self::File(_)) }

  /// Whether this is a directory.
  #[must_use]
  pub const fn is_dir(&self) -> bool { matches!(self, Self::Dir(_)) }

  /// The file attributes, if this is a file.
  #[must_use]
  pub const fn as_file(&self) -> Option<&FileAttributes> {
    match self {
      Self::File(f) => Some(f),
      Self::Dir(_) => None,
    }
  }
}
