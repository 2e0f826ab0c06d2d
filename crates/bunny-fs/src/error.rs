use std::fmt;

use miette::Diagnostic;

/// The piece of metadata a failed lookup was after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
  /// Size in bytes.
  FileSize,
  /// Mime type.
  MimeType,
  /// Last-modified timestamp.
  LastModified,
  /// Visibility.
  Visibility,
  /// A directory listing.
  Folder,
}

impl fmt::Display for MetadataKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::FileSize => "size",
      Self::MimeType => "mime type",
      Self::LastModified => "last modified",
      Self::Visibility => "visibility",
      Self::Folder => "folder",
    })
  }
}

/// Error types for filesystem operations
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum FilesystemError {
  /// Reading a file failed.
  #[error("Unable to read file from location: {path}. {reason}")]
  UnableToReadFile {
    /// Requested path.
    path:   String,
    /// Underlying message.
    reason: String,
  },

  /// Writing a file failed.
  #[error("Unable to write file at location: {path}. {reason}")]
  UnableToWriteFile {
    /// Requested path.
    path:   String,
    /// Underlying message.
    reason: String,
  },

  /// Deleting a file failed.
  #[error("Unable to delete file located at: {path}. {reason}")]
  UnableToDeleteFile {
    /// Requested path.
    path:   String,
    /// Underlying message.
    reason: String,
  },

  /// Deleting a directory failed.
  #[error("Unable to delete directory located at: {path}. {reason}")]
  UnableToDeleteDirectory {
    /// Requested path.
    path:   String,
    /// Underlying message.
    reason: String,
  },

  /// Creating a directory failed.
  #[error("Unable to create a directory at {path}. {reason}")]
  UnableToCreateDirectory {
    /// Requested path.
    path:   String,
    /// Underlying message.
    reason: String,
  },

  /// Moving a file failed.
  #[error("Unable to move file from {from} to {to}. {reason}")]
  UnableToMoveFile {
    /// Source path.
    from:   String,
    /// Destination path.
    to:     String,
    /// Underlying message.
    reason: String,
  },

  /// Copying a file failed.
  #[error("Unable to copy file from {from} to {to}. {reason}")]
  UnableToCopyFile {
    /// Source path.
    from:   String,
    /// Destination path.
    to:     String,
    /// Underlying message.
    reason: String,
  },

  /// Metadata could not be retrieved, including asking a directory for
  /// file-only metadata.
  #[error("Unable to retrieve the {kind} for file at location: {path}. {reason}")]
  UnableToRetrieveMetadata {
    /// Requested path.
    path:   String,
    /// What was being retrieved.
    kind:   MetadataKind,
    /// Underlying message.
    reason: String,
  },

  /// Existence could not be determined.
  #[error("Unable to check existence for: {path}. {reason}")]
  UnableToCheckExistence {
    /// Requested path.
    path:   String,
    /// Underlying message.
    reason: String,
  },

  /// Visibility cannot be changed.
  #[error("Unable to set visibility for file {path}. {reason}")]
  UnableToSetVisibility {
    /// Requested path.
    path:   String,
    /// Underlying message.
    reason: String,
  },

  /// The content could not be streamed for hashing.
  #[error("Unable to get checksum for {path}. {reason}")]
  UnableToProvideChecksum {
    /// Requested path.
    path:   String,
    /// Underlying message.
    reason: String,
  },

  /// No listing entry exists at the path.
  #[error("Error 404: \"{0}\"")]
  NotFound(String),

  /// The backend listed more than one entry for a single path.
  #[error("More than one entry ({count}) was returned for path \"{path}\"")]
  #[diagnostic(help("the storage API should list each path at most once"))]
  AmbiguousPath {
    /// Requested path.
    path:  String,
    /// Number of matching entries.
    count: usize,
  },

  /// A listing timestamp matched neither known format.
  #[error("Invalid timestamp in listing entry: {0:?}")]
  InvalidTimestamp(String),

  /// URL generation needs a pull zone URL.
  #[error(
    "In order to get a visible URL for a BunnyCDN object, you must pass the \
     \"pull_zone_url\" parameter to the adapter."
  )]
  #[diagnostic(help("set `pull_zone_url` or BUNNY_PULL_ZONE_URL"))]
  MissingPullZoneUrl,

  /// Signed URL generation needs the pull zone token.
  #[error(
    "In order to get a signed URL for a BunnyCDN object, you must pass the \
     \"pull_zone_token\" parameter to the adapter."
  )]
  #[diagnostic(help("set `pull_zone_token` or BUNNY_PULL_ZONE_TOKEN"))]
  MissingPullZoneToken,
}

/// A type alias for [`Result`] with [`FilesystemError`].
pub type FilesystemResult<T> = std::result::Result<T, FilesystemError>;
