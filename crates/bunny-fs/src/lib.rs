//! A filesystem adapter over the BunnyCDN storage API.
//!
//! [`BunnyFilesystem`] maps generic file operations onto a
//! [`StorageClientLike`] implementer and produces public and signed URLs
//! for the pull zone in front of the storage zone.

mod attributes;
mod config;
mod error;
mod listing;
mod normalize;
pub mod pull_zone;

use std::sync::Arc;

pub use bunny_core::{
  Bytes, ClientError, RequestStream, ResponseStream, StorageClientLike,
  StorageEntry, StoragePath,
};
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use tracing::{debug, error, info, instrument, warn};

pub use self::{
  attributes::{
    DirectoryAttributes, EntryKind, ExtraMetadata, FileAttributes,
    StorageAttributes, Visibility,
  },
  config::AdapterConfig,
  error::{FilesystemError, FilesystemResult, MetadataKind},
  normalize::{
    mime_from_content, mime_from_extension, normalized_path, parse_timestamp,
  },
  pull_zone::PullZone,
};

/// Filesystem adapter for a BunnyCDN storage zone.
pub struct BunnyFilesystem {
  client:    Arc<dyn StorageClientLike>,
  pull_zone: PullZone,
}

impl BunnyFilesystem {
  /// Creates a new [`BunnyFilesystem`] over a storage client.
  #[instrument(skip(client))]
  pub fn new(client: Arc<dyn StorageClientLike>, config: &AdapterConfig) -> Self {
    info!("Initializing BunnyCDN filesystem adapter");
    Self {
      client,
      pull_zone: PullZone::from(config),
    }
  }

  /// Converts one raw listing record into a normalized entry.
  pub async fn normalize(
    &self,
    entry: StorageEntry,
  ) -> FilesystemResult<StorageAttributes> {
    normalize::normalize(self.client.as_ref(), entry).await
  }

  /// Writes `contents` to `path`, replacing any existing file.
  #[instrument(skip(self, contents), fields(size = contents.len()), err)]
  pub async fn write(&self, path: &str, contents: Bytes) -> FilesystemResult<()> {
    self.client.upload(path, contents).await.map_err(|e| {
      error!(error = ?e, "Failed to upload file");
      FilesystemError::UnableToWriteFile {
        path:   path.to_owned(),
        reason: e.to_string(),
      }
    })?;
    info!("File written successfully");
    Ok(())
  }

  /// Writes a stream to `path`. The stream is buffered before upload.
  #[instrument(skip(self, data), err)]
  pub async fn write_stream(
    &self,
    path: &str,
    data: RequestStream,
  ) -> FilesystemResult<()> {
    let contents = data
      .try_fold(BytesMut::new(), |mut acc, chunk| async move {
        acc.extend_from_slice(&chunk);
        Ok(acc)
      })
      .await
      .map_err(|e| {
        error!(error = ?e, "Failed to read upload stream");
        FilesystemError::UnableToWriteFile {
          path:   path.to_owned(),
          reason: e.to_string(),
        }
      })?
      .freeze();
    self.write(path, contents).await
  }

  /// Reads the full contents of `path`.
  #[instrument(skip(self), err)]
  pub async fn read(&self, path: &str) -> FilesystemResult<Bytes> {
    let data = self.client.download(path).await.map_err(|e| {
      error!(error = ?e, "Failed to download file");
      FilesystemError::UnableToReadFile {
        path:   path.to_owned(),
        reason: e.to_string(),
      }
    })?;
    debug!(size = data.len(), "File read successfully");
    Ok(data)
  }

  /// Opens `path` as a stream.
  #[instrument(skip(self), err)]
  pub async fn read_stream(&self, path: &str) -> FilesystemResult<ResponseStream> {
    self.client.stream(path).await.map_err(|e| {
      error!(error = ?e, "Failed to open file stream");
      FilesystemError::UnableToReadFile {
        path:   path.to_owned(),
        reason: e.to_string(),
      }
    })
  }

  /// Deletes a file. Deleting a missing file succeeds.
  #[instrument(skip(self), err)]
  pub async fn delete(&self, path: &str) -> FilesystemResult<()> {
    match self.client.delete(path).await {
      Ok(()) => {
        info!("File deleted successfully");
        Ok(())
      }
      Err(ClientError::NotFound(_)) => {
        debug!("File was already absent");
        Ok(())
      }
      Err(e) => {
        error!(error = ?e, "Failed to delete file");
        Err(FilesystemError::UnableToDeleteFile {
          path:   path.to_owned(),
          reason: e.to_string(),
        })
      }
    }
  }

  /// Deletes a directory and everything below it.
  #[instrument(skip(self), err)]
  pub async fn delete_directory(&self, path: &str) -> FilesystemResult<()> {
    let dir = format!("{}/", path.trim_end_matches('/'));
    self.client.delete(&dir).await.map_err(|e| {
      error!(error = ?e, "Failed to delete directory");
      FilesystemError::UnableToDeleteDirectory {
        path:   path.to_owned(),
        reason: e.to_string(),
      }
    })?;
    info!("Directory deleted successfully");
    Ok(())
  }

  /// Creates a directory. Creating an existing directory succeeds.
  #[instrument(skip(self), err)]
  pub async fn create_directory(&self, path: &str) -> FilesystemResult<()> {
    match self.client.make_directory(path).await {
      Ok(()) => {
        info!("Directory created successfully");
        Ok(())
      }
      Err(ClientError::DirectoryAlreadyExists(_)) => {
        warn!("Directory already exists");
        Ok(())
      }
      Err(e) => {
        error!(error = ?e, "Failed to create directory");
        Err(FilesystemError::UnableToCreateDirectory {
          path:   path.to_owned(),
          reason: e.to_string(),
        })
      }
    }
  }

  /// Moves a file by copying it and deleting the source.
  #[instrument(skip(self), err)]
  pub async fn move_file(&self, from: &str, to: &str) -> FilesystemResult<()> {
    let failed = |e: FilesystemError| FilesystemError::UnableToMoveFile {
      from:   from.to_owned(),
      to:     to.to_owned(),
      reason: e.to_string(),
    };
    let contents = self.read(from).await.map_err(failed)?;
    self.write(to, contents).await.map_err(failed)?;
    self.delete(from).await.map_err(failed)?;
    info!("File moved successfully");
    Ok(())
  }

  /// Copies a file.
  #[instrument(skip(self), err)]
  pub async fn copy(&self, from: &str, to: &str) -> FilesystemResult<()> {
    let failed = |e: FilesystemError| FilesystemError::UnableToCopyFile {
      from:   from.to_owned(),
      to:     to.to_owned(),
      reason: e.to_string(),
    };
    let contents = self.read(from).await.map_err(failed)?;
    self.write(to, contents).await.map_err(failed)?;
    info!("File copied successfully");
    Ok(())
  }

  /// Whether an entry exists at `path`.
  #[instrument(skip(self), err)]
  pub async fn file_exists(&self, path: &str) -> FilesystemResult<bool> {
    let target = StoragePath::new(path);
    let found = self
      .list_contents(target.parent().as_str(), false)
      .try_filter(|entry| futures::future::ready(entry.path() == &target))
      .try_next()
      .await
      .map_err(|e| FilesystemError::UnableToCheckExistence {
        path:   path.to_owned(),
        reason: e.to_string(),
      })?
      .is_some();
    debug!(exists = found, "Existence check completed");
    Ok(found)
  }

  /// Whether a directory exists at `path`. Shares the lookup with
  /// [`file_exists`](Self::file_exists).
  pub async fn directory_exists(&self, path: &str) -> FilesystemResult<bool> {
    self.file_exists(path).await
  }

  async fn file_attributes(
    &self,
    path: &str,
    kind: MetadataKind,
  ) -> FilesystemResult<FileAttributes> {
    let failed = |reason: String| FilesystemError::UnableToRetrieveMetadata {
      path: path.to_owned(),
      kind,
      reason,
    };
    match self.resolve_single_entry(path).await {
      Ok(StorageAttributes::File(file)) => Ok(file),
      Ok(StorageAttributes::Dir(_)) => {
        Err(failed(format!("cannot retrieve {kind} of a directory")))
      }
      Err(e) => Err(failed(e.to_string())),
    }
  }

  /// Size of the file at `path`, in bytes.
  #[instrument(skip(self), err)]
  pub async fn file_size(&self, path: &str) -> FilesystemResult<u64> {
    Ok(self.file_attributes(path, MetadataKind::FileSize).await?.file_size)
  }

  /// Last-modified Unix timestamp of the file at `path`.
  #[instrument(skip(self), err)]
  pub async fn last_modified(&self, path: &str) -> FilesystemResult<i64> {
    Ok(
      self
        .file_attributes(path, MetadataKind::LastModified)
        .await?
        .last_modified,
    )
  }

  /// Mime type of the file at `path`.
  ///
  /// Falls back to detection against the logical path when the listing
  /// carried no usable type.
  #[instrument(skip(self), err)]
  pub async fn mime_type(&self, path: &str) -> FilesystemResult<String> {
    let file = self.file_attributes(path, MetadataKind::MimeType).await?;
    if let Some(mime) = file.mime_type {
      return Ok(mime);
    }
    normalize::detect_mime_type(self.client.as_ref(), file.path.as_str())
      .await
      .ok_or_else(|| FilesystemError::UnableToRetrieveMetadata {
        path:   path.to_owned(),
        kind:   MetadataKind::MimeType,
        reason: "unknown mime type".to_owned(),
      })
  }

  /// Visibility of the entry at `path`: public when a pull zone serves it.
  #[instrument(skip(self), err)]
  pub async fn visibility(&self, path: &str) -> FilesystemResult<Visibility> {
    self.resolve_single_entry(path).await.map_err(|e| {
      FilesystemError::UnableToRetrieveMetadata {
        path:   path.to_owned(),
        kind:   MetadataKind::Visibility,
        reason: e.to_string(),
      }
    })?;
    Ok(if self.pull_zone.has_url() {
      Visibility::Public
    } else {
      Visibility::Private
    })
  }

  /// Always fails: the storage API has no visibility model.
  pub fn set_visibility(
    &self,
    path: &str,
    visibility: Visibility,
  ) -> FilesystemResult<()> {
    warn!(path, %visibility, "Visibility change requested");
    Err(FilesystemError::UnableToSetVisibility {
      path:   path.to_owned(),
      reason: "BunnyCDN does not support visibility".to_owned(),
    })
  }

  /// Hex md5 of the file's content, streamed in full.
  #[instrument(skip(self), err)]
  pub async fn checksum(&self, path: &str) -> FilesystemResult<String> {
    let failed = |reason: String| FilesystemError::UnableToProvideChecksum {
      path: path.to_owned(),
      reason,
    };
    let contents = self
      .read_stream(path)
      .await
      .map_err(|e| failed(e.to_string()))?
      .try_fold(BytesMut::new(), |mut acc, chunk| async move {
        acc.extend_from_slice(&chunk);
        Ok(acc)
      })
      .await
      .map_err(|e| failed(e.to_string()))?;
    Ok(format!("{:x}", md5::compute(&contents)))
  }

  /// The public pull zone URL of `path`.
  pub fn public_url(&self, path: &str) -> FilesystemResult<String> {
    self.pull_zone.public_url(path)
  }

  /// A token-authenticated pull zone URL for `path`, valid until
  /// `expires_at`. See [`PullZone::temporary_url`].
  pub fn temporary_url<K, V>(
    &self,
    path: &str,
    expires_at: DateTime<Utc>,
    params: impl IntoIterator<Item = (K, V)>,
    allow_for_path: Option<&str>,
  ) -> FilesystemResult<String>
  where
    K: Into<String>,
    V: Into<String>,
  {
    self
      .pull_zone
      .temporary_url(path, expires_at, params, allow_for_path)
  }
}
