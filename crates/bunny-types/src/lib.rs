//! Shared types for the BunnyCDN storage adapter.

mod storage_entry;
mod storage_path;

pub use self::{
  storage_entry::StorageEntry,
  storage_path::{StoragePath, replace_first, split_dir_file},
};
