use std::vec;

use bunny_types::{StorageEntry, StoragePath};
use futures::{StreamExt, TryStreamExt, future, stream::BoxStream};
use tracing::{debug, error, instrument};

use crate::{
  BunnyFilesystem, FilesystemError, FilesystemResult, MetadataKind,
  StorageAttributes, normalize::normalize,
};

/// State of a lazy, depth-first listing.
struct Traversal<'a> {
  fs:      &'a BunnyFilesystem,
  deep:    bool,
  /// Directory to fetch before yielding anything else.
  pending: Option<String>,
  /// Unconsumed records, one level per directory being walked.
  levels:  Vec<vec::IntoIter<StorageEntry>>,
}

impl Traversal<'_> {
  async fn advance(mut self) -> FilesystemResult<Option<(StorageAttributes, Self)>> {
    loop {
      if let Some(dir) = self.pending.take() {
        let entries = self.fs.fetch_listing(&dir).await?;
        self.levels.push(entries.into_iter());
      }

      let Some(level) = self.levels.last_mut() else {
        return Ok(None);
      };
      let Some(raw) = level.next() else {
        self.levels.pop();
        continue;
      };

      let entry = normalize(self.fs.client.as_ref(), raw).await?;
      if self.deep && entry.is_dir() {
        self.pending = Some(entry.path().to_string());
      }
      return Ok(Some((entry, self)));
    }
  }
}

impl BunnyFilesystem {
  #[instrument(skip(self), err)]
  async fn fetch_listing(&self, dir: &str) -> FilesystemResult<Vec<StorageEntry>> {
    let entries = self.client.list(dir).await.map_err(|e| {
      error!(error = ?e, "Failed to list directory");
      FilesystemError::UnableToRetrieveMetadata {
        path:   dir.to_owned(),
        kind:   MetadataKind::Folder,
        reason: e.to_string(),
      }
    })?;
    debug!(count = entries.len(), "Fetched directory listing");
    Ok(entries)
  }

  /// Lists the contents of a directory.
  ///
  /// Nothing is fetched until the stream is polled, and each directory
  /// costs one listing call. Entries come in the order the API returns
  /// them. With `deep`, every directory's contents follow it immediately,
  /// before its next sibling.
  pub fn list_contents<'a>(
    &'a self,
    path: &str,
    deep: bool,
  ) -> BoxStream<'a, FilesystemResult<StorageAttributes>> {
    let traversal = Traversal {
      fs: self,
      deep,
      pending: Some(path.to_owned()),
      levels: Vec::new(),
    };
    futures::stream::try_unfold(traversal, Traversal::advance).boxed()
  }

  /// Finds the listing entry for exactly one path by listing its parent.
  #[instrument(skip(self), err)]
  pub async fn resolve_single_entry(
    &self,
    path: &str,
  ) -> FilesystemResult<StorageAttributes> {
    let target = StoragePath::new(path);
    let mut matches: Vec<StorageAttributes> = self
      .list_contents(target.parent().as_str(), false)
      .try_filter(|entry| future::ready(entry.path() == &target))
      .try_collect()
      .await?;

    match matches.len() {
      0 => Err(FilesystemError::NotFound(target.into_inner())),
      1 => Ok(matches.remove(0)),
      count => {
        error!(count, "Listing returned duplicate entries");
        Err(FilesystemError::AmbiguousPath {
          path: target.into_inner(),
          count,
        })
      }
    }
  }
}
