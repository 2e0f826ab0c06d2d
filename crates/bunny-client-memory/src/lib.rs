//! In-memory implementation of the storage API client.

use std::{
  collections::{BTreeMap, BTreeSet},
  sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use bunny_core::{
  Bytes, ClientError, ClientResult, ResponseStream, StorageClientLike,
  StorageEntry, StoragePath,
};
use chrono::{DateTime, Utc};
use futures::stream;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use ulid::Ulid;

/// Chunk size used when streaming objects back out.
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Internal representation of a stored object
#[derive(Debug, Clone)]
struct StoredObject {
  data:     Bytes,
  guid:     String,
  created:  DateTime<Utc>,
  changed:  DateTime<Utc>,
  checksum: String,
}

impl StoredObject {
  fn new(data: Bytes) -> Self {
    let now = Utc::now();
    Self {
      checksum: format!("{:X}", Sha256::digest(&data)),
      data,
      guid: Ulid::new().to_string(),
      created: now,
      changed: now,
    }
  }

  fn replace(&mut self, data: Bytes) {
    self.checksum = format!("{:X}", Sha256::digest(&data));
    self.data = data;
    self.changed = Utc::now();
  }
}

/// Explicitly created directory
#[derive(Debug, Clone)]
struct StoredDirectory {
  guid:    String,
  created: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
  objects:     BTreeMap<StoragePath, StoredObject>,
  directories: BTreeMap<StoragePath, StoredDirectory>,
  injected:    Vec<StorageEntry>,
  /// Directories whose listing fails.
  broken:      BTreeSet<StoragePath>,
}

impl State {
  fn directory_exists(&self, dir: &StoragePath) -> bool {
    dir.is_root()
      || self.directories.contains_key(dir)
      || self
        .objects
        .keys()
        .chain(self.directories.keys())
        .any(|key| key != dir && key.starts_with(dir))
  }
}

/// In-memory implementation of [`StorageClientLike`].
///
/// Listing records are shaped like the real API's: paths carry the storage
/// zone name as their first segment, file timestamps carry fractional
/// seconds and directory timestamps don't. Directories exist either
/// explicitly (via [`make_directory`](StorageClientLike::make_directory))
/// or implicitly as ancestors of stored objects.
#[derive(Debug, Clone)]
pub struct StorageClientMemory {
  zone_name:   String,
  zone_id:     i64,
  state:       Arc<RwLock<State>>,
  unavailable: Arc<AtomicBool>,
  list_calls:  Arc<AtomicUsize>,
}

impl StorageClientMemory {
  /// Creates a new empty in-memory storage zone.
  pub fn new(zone_name: impl Into<String>) -> Self {
    Self {
      zone_name:   zone_name.into(),
      zone_id:     1,
      state:       Arc::new(RwLock::new(State::default())),
      unavailable: Arc::new(AtomicBool::new(false)),
      list_calls:  Arc::new(AtomicUsize::new(0)),
    }
  }

  /// The storage zone name used as the path prefix in listings.
  #[must_use]
  pub fn zone_name(&self) -> &str { &self.zone_name }

  /// Returns the number of objects currently stored.
  pub async fn len(&self) -> usize { self.state.read().await.objects.len() }

  /// Returns true if no objects are stored.
  pub async fn is_empty(&self) -> bool {
    self.state.read().await.objects.is_empty()
  }

  /// Appends a raw record to every listing of the directory it names.
  ///
  /// Used to simulate backend anomalies such as duplicate records.
  pub async fn inject_entry(&self, entry: StorageEntry) {
    self.state.write().await.injected.push(entry);
  }

  /// Makes listings of `path` fail with a network error while every other
  /// call keeps working.
  pub async fn break_listing(&self, path: &str) {
    self.state.write().await.broken.insert(StoragePath::new(path));
  }

  /// Number of `list` calls made so far, including failed ones.
  #[must_use]
  pub fn list_calls(&self) -> usize { self.list_calls.load(Ordering::SeqCst) }

  /// Makes every subsequent call fail with a network error, or restores
  /// normal operation.
  pub fn set_unavailable(&self, unavailable: bool) {
    self.unavailable.store(unavailable, Ordering::SeqCst);
  }

  fn check_available(&self) -> ClientResult<()> {
    if self.unavailable.load(Ordering::SeqCst) {
      return Err(ClientError::NetworkError(miette::miette!(
        "storage zone `{}` is unavailable",
        self.zone_name
      )));
    }
    Ok(())
  }

  /// The zone-prefixed directory portion for records inside `dir`.
  fn record_dir(&self, dir: &StoragePath) -> String {
    if dir.is_root() {
      format!("/{}/", self.zone_name)
    } else {
      format!("/{}{dir}/", self.zone_name)
    }
  }

  fn file_entry(
    &self,
    dir: &StoragePath,
    name: &str,
    object: &StoredObject,
  ) -> StorageEntry {
    StorageEntry {
      guid: object.guid.clone(),
      storage_zone_name: self.zone_name.clone(),
      path: self.record_dir(dir),
      object_name: name.to_owned(),
      length: object.data.len() as u64,
      last_changed: object.changed.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
      is_directory: false,
      date_created: object.created.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
      storage_zone_id: self.zone_id,
      checksum: Some(object.checksum.clone()),
      ..StorageEntry::default()
    }
  }

  fn directory_entry(
    &self,
    dir: &StoragePath,
    name: &str,
    record: Option<&StoredDirectory>,
  ) -> StorageEntry {
    let created = record.map_or_else(Utc::now, |r| r.created);
    StorageEntry {
      guid: record.map(|r| r.guid.clone()).unwrap_or_default(),
      storage_zone_name: self.zone_name.clone(),
      path: self.record_dir(dir),
      object_name: name.to_owned(),
      last_changed: created.format("%Y-%m-%dT%H:%M:%S").to_string(),
      is_directory: true,
      date_created: created.format("%Y-%m-%dT%H:%M:%S").to_string(),
      storage_zone_id: self.zone_id,
      ..StorageEntry::default()
    }
  }
}

/// The first segment of `key` below `dir`, and whether more segments
/// follow it.
fn child_segment<'a>(
  dir: &StoragePath,
  key: &'a StoragePath,
) -> Option<(&'a str, bool)> {
  if key == dir || !key.starts_with(dir) {
    return None;
  }
  let rest = key.as_str()[dir.as_str().len()..].trim_start_matches('/');
  match rest.split_once('/') {
    Some((first, _)) => Some((first, true)),
    None => Some((rest, false)),
  }
}

#[async_trait::async_trait]
impl StorageClientLike for StorageClientMemory {
  #[instrument(skip(self), fields(zone = %self.zone_name))]
  async fn list(&self, path: &str) -> ClientResult<Vec<StorageEntry>> {
    self.list_calls.fetch_add(1, Ordering::SeqCst);
    self.check_available()?;
    let dir = StoragePath::new(path);
    let state = self.state.read().await;
    if state.broken.contains(&dir) {
      return Err(ClientError::NetworkError(miette::miette!(
        "listing `{dir}` failed"
      )));
    }

    let mut child_dirs = BTreeSet::new();
    let mut files = Vec::new();
    for (key, object) in &state.objects {
      match child_segment(&dir, key) {
        Some((name, true)) => {
          child_dirs.insert(name.to_owned());
        }
        Some((name, false)) => files.push(self.file_entry(&dir, name, object)),
        None => {}
      }
    }
    for key in state.directories.keys() {
      if let Some((name, _)) = child_segment(&dir, key) {
        child_dirs.insert(name.to_owned());
      }
    }

    let mut entries: Vec<StorageEntry> = child_dirs
      .iter()
      .map(|name| {
        let record = state.directories.get(&dir.join(name));
        self.directory_entry(&dir, name, record)
      })
      .collect();
    entries.extend(files);

    let record_dir = self.record_dir(&dir);
    entries.extend(
      state
        .injected
        .iter()
        .filter(|e| e.path == record_dir)
        .cloned(),
    );

    debug!(count = entries.len(), "listed directory");
    Ok(entries)
  }

  #[instrument(skip(self), fields(zone = %self.zone_name))]
  async fn download(&self, path: &str) -> ClientResult<Bytes> {
    self.check_available()?;
    let key = StoragePath::new(path);
    let state = self.state.read().await;
    state
      .objects
      .get(&key)
      .map(|o| o.data.clone())
      .ok_or_else(|| ClientError::NotFound(key.into_inner()))
  }

  #[instrument(skip(self), fields(zone = %self.zone_name))]
  async fn stream(&self, path: &str) -> ClientResult<ResponseStream> {
    let data = self.download(path).await?;

    let chunks: Vec<ClientResult<Bytes>> = (0..data.len())
      .step_by(STREAM_CHUNK_SIZE)
      .map(|start| {
        let end = (start + STREAM_CHUNK_SIZE).min(data.len());
        Ok(data.slice(start..end))
      })
      .collect();

    Ok(Box::pin(stream::iter(chunks)))
  }

  #[instrument(skip(self, contents), fields(zone = %self.zone_name, size = contents.len()))]
  async fn upload(&self, path: &str, contents: Bytes) -> ClientResult<()> {
    self.check_available()?;
    let key = StoragePath::new(path);
    if key.is_root() || path.ends_with('/') {
      return Err(ClientError::InvalidInput(miette::miette!(
        "cannot upload to directory path `{path}`"
      )));
    }

    let mut state = self.state.write().await;
    match state.objects.get_mut(&key) {
      Some(existing) => existing.replace(contents),
      None => {
        state.objects.insert(key, StoredObject::new(contents));
      }
    }
    Ok(())
  }

  #[instrument(skip(self), fields(zone = %self.zone_name))]
  async fn delete(&self, path: &str) -> ClientResult<()> {
    self.check_available()?;
    let key = StoragePath::new(path);
    let mut state = self.state.write().await;

    if !path.ends_with('/') {
      return state
        .objects
        .remove(&key)
        .map(|_| ())
        .ok_or_else(|| ClientError::NotFound(key.into_inner()));
    }

    if key.is_root() {
      return Err(ClientError::InvalidInput(miette::miette!(
        "refusing to delete the storage zone root"
      )));
    }
    if !state.directory_exists(&key) {
      return Err(ClientError::NotFound(format!("{key}/")));
    }

    state.objects.retain(|k, _| !k.starts_with(&key));
    state.directories.retain(|k, _| !k.starts_with(&key));
    Ok(())
  }

  #[instrument(skip(self), fields(zone = %self.zone_name))]
  async fn make_directory(&self, path: &str) -> ClientResult<()> {
    self.check_available()?;
    let key = StoragePath::new(path);
    let mut state = self.state.write().await;

    if state.directory_exists(&key) {
      warn!("directory already exists");
      return Err(ClientError::DirectoryAlreadyExists(key.into_inner()));
    }

    state.directories.insert(key, StoredDirectory {
      guid:    Ulid::new().to_string(),
      created: Utc::now(),
    });
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use futures::StreamExt;

  use super::*;

  #[tokio::test]
  async fn test_upload_and_download() {
    let client = StorageClientMemory::new("zone");
    assert_eq!(client.zone_name(), "zone");
    assert!(client.is_empty().await);
    client
      .upload("dir/file.txt", Bytes::from("hello world"))
      .await
      .unwrap();

    let data = client.download("/dir/file.txt").await.unwrap();
    assert_eq!(data, Bytes::from("hello world"));
    assert_eq!(client.len().await, 1);
    assert!(!client.is_empty().await);
  }

  #[tokio::test]
  async fn test_stream_chunks() {
    let client = StorageClientMemory::new("zone");
    let data = Bytes::from(vec![7u8; STREAM_CHUNK_SIZE * 2 + 10]);
    client.upload("big.bin", data.clone()).await.unwrap();

    let chunks: Vec<_> = client.stream("big.bin").await.unwrap().collect().await;
    assert_eq!(chunks.len(), 3);
    let total: usize = chunks.iter().map(|c| c.as_ref().unwrap().len()).sum();
    assert_eq!(total, data.len());
  }

  #[tokio::test]
  async fn test_download_missing() {
    let client = StorageClientMemory::new("zone");
    let result = client.download("missing.txt").await;
    assert!(matches!(result, Err(ClientError::NotFound(_))));
  }

  #[tokio::test]
  async fn test_list_shapes_records_like_the_api() {
    let client = StorageClientMemory::new("zone");
    client.upload("a.txt", Bytes::from("a")).await.unwrap();
    client.upload("sub/b.txt", Bytes::from("b")).await.unwrap();

    let root = client.list("/").await.unwrap();
    assert_eq!(root.len(), 2);

    let dir = &root[0];
    assert!(dir.is_directory);
    assert_eq!(dir.path, "/zone/");
    assert_eq!(dir.object_name, "sub");
    assert!(!dir.last_changed.contains('.'));

    let file = &root[1];
    assert!(!file.is_directory);
    assert_eq!(file.raw_path(), "/zone/a.txt");
    assert_eq!(file.length, 1);
    assert!(file.last_changed.contains('.'));

    let sub = client.list("sub").await.unwrap();
    assert_eq!(sub.len(), 1);
    assert_eq!(sub[0].raw_path(), "/zone/sub/b.txt");
  }

  #[tokio::test]
  async fn test_make_directory_twice() {
    let client = StorageClientMemory::new("zone");
    client.make_directory("/dir").await.unwrap();
    let result = client.make_directory("/dir/").await;
    assert!(matches!(result, Err(ClientError::DirectoryAlreadyExists(_))));
  }

  #[tokio::test]
  async fn test_delete_missing_is_not_found() {
    let client = StorageClientMemory::new("zone");
    let result = client.delete("nope.txt").await;
    assert!(matches!(result, Err(ClientError::NotFound(_))));
    let result = client.delete("nope/").await;
    assert!(matches!(result, Err(ClientError::NotFound(_))));
  }

  #[tokio::test]
  async fn test_delete_directory_removes_contents() {
    let client = StorageClientMemory::new("zone");
    client.upload("dir/a.txt", Bytes::from("a")).await.unwrap();
    client.upload("dir/sub/b.txt", Bytes::from("b")).await.unwrap();
    client.upload("dirty.txt", Bytes::from("c")).await.unwrap();

    client.delete("dir/").await.unwrap();
    assert_eq!(client.len().await, 1);
    assert!(client.list("dir").await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_unavailable() {
    let client = StorageClientMemory::new("zone");
    client.set_unavailable(true);
    let result = client.list("/").await;
    assert!(matches!(result, Err(ClientError::NetworkError(_))));
    client.set_unavailable(false);
    assert!(client.list("/").await.is_ok());
  }

  #[tokio::test]
  async fn test_broken_listing_and_call_count() {
    let client = StorageClientMemory::new("zone");
    client.upload("ok/a.txt", Bytes::from("a")).await.unwrap();
    client.upload("bad/b.txt", Bytes::from("b")).await.unwrap();
    client.break_listing("/bad/").await;
    assert_eq!(client.list_calls(), 0);

    assert!(client.list("ok").await.is_ok());
    let result = client.list("bad").await;
    assert!(matches!(result, Err(ClientError::NetworkError(_))));
    assert_eq!(client.download("bad/b.txt").await.unwrap(), Bytes::from("b"));
    assert_eq!(client.list_calls(), 2);
  }
}
