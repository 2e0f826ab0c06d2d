//! Conversion of raw listing records into [`StorageAttributes`].

use bunny_core::{ClientError, ClientResult, StorageClientLike};
use bunny_types::{StorageEntry, StoragePath, replace_first, split_dir_file};
use chrono::NaiveDateTime;
use futures::TryStreamExt;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::{
  DirectoryAttributes, EntryKind, ExtraMetadata, FileAttributes,
  FilesystemError, FilesystemResult, StorageAttributes, Visibility,
};

/// Bytes read from an object when sniffing its mime type.
const SNIFF_LEN: u64 = 80;

/// Parses a listing timestamp, with or without fractional seconds, into
/// Unix seconds. Timestamps are UTC.
pub fn parse_timestamp(timestamp: &str) -> FilesystemResult<i64> {
  NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
    .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S"))
    .map(|dt| dt.and_utc().timestamp())
    .map_err(|_| FilesystemError::InvalidTimestamp(timestamp.to_owned()))
}

/// The logical path of a record: the zone prefix is dropped and the
/// result normalized.
#[must_use]
pub fn normalized_path(entry: &StorageEntry) -> StoragePath {
  StoragePath::new(replace_first(
    &entry.raw_path(),
    &format!("{}/", entry.storage_zone_name),
    "/",
  ))
}

/// Mime type from the path's extension alone.
#[must_use]
pub fn mime_from_extension(path: &str) -> Option<String> {
  mime_guess::from_path(path).first().map(|m| m.to_string())
}

/// Mime type from an object's leading bytes.
#[must_use]
pub fn mime_from_content(buf: &[u8]) -> Option<String> {
  infer::get(buf).map(|kind| kind.mime_type().to_owned())
}

async fn read_prefix(
  client: &dyn StorageClientLike,
  path: &str,
) -> ClientResult<Vec<u8>> {
  let stream = client.stream(path).await?;
  let mut reader =
    StreamReader::new(stream.map_err(ClientError::into_io_error))
      .take(SNIFF_LEN);
  let mut buf = Vec::new();
  reader.read_to_end(&mut buf).await?;
  Ok(buf)
}

/// Best-effort mime detection: the extension first, then the first bytes
/// of the object. Failures yield `None`.
pub(crate) async fn detect_mime_type(
  client: &dyn StorageClientLike,
  path: &str,
) -> Option<String> {
  if let Some(mime) = mime_from_extension(path) {
    return Some(mime);
  }
  match read_prefix(client, path).await {
    Ok(buf) => mime_from_content(&buf),
    Err(e) => {
      debug!(path, error = %e, "could not sniff mime type");
      None
    }
  }
}

fn extra_metadata(entry: &StorageEntry, timestamp: i64) -> ExtraMetadata {
  ExtraMetadata {
    kind: if entry.is_directory {
      EntryKind::Dir
    } else {
      EntryKind::File
    },
    dirname: split_dir_file(&entry.path).0,
    guid: entry.guid.clone(),
    object_name: entry.object_name.clone(),
    timestamp,
    server_id: entry.server_id,
    user_id: entry.user_id.clone(),
    date_created: entry.date_created.clone(),
    storage_zone_name: entry.storage_zone_name.clone(),
    storage_zone_id: entry.storage_zone_id,
    checksum: entry.checksum.clone(),
    replicated_zones: entry.replicated_zones.clone(),
  }
}

/// Converts one raw record. Directories carry only their path; files get
/// their size, timestamp, mime type and raw metadata.
pub(crate) async fn normalize(
  client: &dyn StorageClientLike,
  entry: StorageEntry,
) -> FilesystemResult<StorageAttributes> {
  let path = normalized_path(&entry);
  if entry.is_directory {
    return Ok(StorageAttributes::Dir(DirectoryAttributes { path }));
  }

  let last_modified = parse_timestamp(&entry.last_changed)?;
  let mime_type = if entry.content_type.is_empty() {
    detect_mime_type(client, &entry.raw_path()).await
  } else {
    Some(entry.content_type.clone())
  };

  Ok(StorageAttributes::File(FileAttributes {
    path,
    file_size: entry.length,
    visibility: Visibility::Public,
    last_modified,
    mime_type,
    extra_metadata: extra_metadata(&entry, last_modified),
  }))
}
