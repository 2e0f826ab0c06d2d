//! Trait for a BunnyCDN-style storage API client.

use std::{io, pin::Pin};

use async_trait::async_trait;
pub use bunny_types::{StorageEntry, StoragePath};
pub use bytes::Bytes;
pub use futures::stream::Stream;
use miette::Diagnostic;

/// Type alias for streaming request data
pub type RequestStream =
  Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>;
/// Type alias for streaming response data
pub type ResponseStream =
  Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// Error types for storage API calls
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum ClientError {
  /// Object not found (the API answered 404).
  #[error("Error 404: object not found: {0}")]
  NotFound(String),

  /// Directory already exists.
  #[error("Directory already exists: {0}")]
  DirectoryAlreadyExists(String),

  /// Invalid input (e.g. a malformed path).
  #[error("Invalid input: {0}")]
  InvalidInput(miette::Report),

  /// Network error.
  #[error("Network error: {0}")]
  NetworkError(miette::Report),

  /// IO error.
  #[error("IO error: {0}")]
  IoError(#[from] io::Error),

  /// Unknown error.
  #[error("Unknown error: {0}")]
  Unknown(miette::Report),
}

impl ClientError {
  /// Convert into an [`io::Error`], for adapting response streams into
  /// readers.
  #[must_use]
  pub fn into_io_error(self) -> io::Error {
    match self {
      Self::IoError(e) => e,
      Self::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, self),
      e => io::Error::other(e),
    }
  }
}

/// A type alias for [`Result`] with [`ClientError`].
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Operations the adapter needs from the remote storage API.
///
/// Paths are passed through as the caller gave them; implementers resolve
/// them relative to their storage zone. A path ending in `/` addresses a
/// directory.
#[async_trait]
pub trait StorageClientLike: Send + Sync {
  /// List the immediate children of a directory.
  async fn list(&self, path: &str) -> ClientResult<Vec<StorageEntry>>;

  /// Download an object in full.
  async fn download(&self, path: &str) -> ClientResult<Bytes>;

  /// Download an object as a stream.
  async fn stream(&self, path: &str) -> ClientResult<ResponseStream>;

  /// Upload an object, replacing any existing content.
  async fn upload(&self, path: &str, contents: Bytes) -> ClientResult<()>;

  /// Delete an object, or a directory and its contents when `path` ends
  /// in `/`. Missing paths fail with [`ClientError::NotFound`].
  async fn delete(&self, path: &str) -> ClientResult<()>;

  /// Create a directory. Existing directories fail with
  /// [`ClientError::DirectoryAlreadyExists`].
  async fn make_directory(&self, path: &str) -> ClientResult<()>;
}
