use serde::{Deserialize, Serialize};

/// A raw directory-listing record as returned by the storage API.
///
/// `path` is the zone-prefixed directory portion (e.g. `/my-zone/images/`),
/// `object_name` the leaf name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StorageEntry {
  /// Unique identifier of the object.
  pub guid:              String,
  /// Name of the storage zone the object lives in.
  pub storage_zone_name: String,
  /// Zone-prefixed directory portion of the path.
  pub path:              String,
  /// Leaf name of the object.
  pub object_name:       String,
  /// Size in bytes. Zero for directories.
  pub length:            u64,
  /// Last change, `YYYY-MM-DDTHH:MM:SS[.ffffff]`.
  pub last_changed:      String,
  /// Storage server that holds the object.
  pub server_id:         i64,
  /// Position of the record in the backend's array.
  pub array_number:      i64,
  /// Whether the record is a directory.
  pub is_directory:      bool,
  /// Owner of the object.
  pub user_id:           String,
  /// Stored content type, frequently empty.
  pub content_type:      String,
  /// Creation time, same formats as `last_changed`.
  pub date_created:      String,
  /// Numeric id of the storage zone.
  pub storage_zone_id:   i64,
  /// Uppercase hex SHA-256 of the content, absent for directories.
  pub checksum:          Option<String>,
  /// Comma-separated replication regions, if any.
  pub replicated_zones:  Option<String>,
}

impl StorageEntry {
  /// The zone-prefixed path of the record, `path` followed by
  /// `object_name`.
  #[must_use]
  pub fn raw_path(&self) -> String {
    format!("{}{}", self.path, self.object_name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_deserialize_listing_record() {
    let json = r#"{
      "Guid": "5ed3b2b5-8c3f-4c2e-9f39-ad1cd0a5d2d1",
      "StorageZoneName": "my-zone",
      "Path": "/my-zone/images/",
      "ObjectName": "cat.png",
      "Length": 1024,
      "LastChanged": "2023-01-01T12:00:00.5",
      "ServerId": 47,
      "ArrayNumber": 0,
      "IsDirectory": false,
      "UserId": "a8e2f6d1-0000-0000-0000-000000000000",
      "ContentType": "",
      "DateCreated": "2023-01-01T12:00:00",
      "StorageZoneId": 12345,
      "Checksum": "ABCDEF",
      "ReplicatedZones": "DE,NY"
    }"#;

    let entry: StorageEntry = serde_json::from_str(json).unwrap();
    assert_eq!(entry.storage_zone_name, "my-zone");
    assert_eq!(entry.raw_path(), "/my-zone/images/cat.png");
    assert_eq!(entry.length, 1024);
    assert!(!entry.is_directory);
    assert_eq!(entry.checksum.as_deref(), Some("ABCDEF"));
  }

  #[test]
  fn test_deserialize_directory_with_nulls() {
    let json = r#"{
      "StorageZoneName": "my-zone",
      "Path": "/my-zone/",
      "ObjectName": "images",
      "IsDirectory": true,
      "Checksum": null,
      "ReplicatedZones": null
    }"#;

    let entry: StorageEntry = serde_json::from_str(json).unwrap();
    assert!(entry.is_directory);
    assert_eq!(entry.length, 0);
    assert_eq!(entry.checksum, None);
  }
}
