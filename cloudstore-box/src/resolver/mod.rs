//! Path resolution over Box's ID-addressed API.
//!
//! Box addresses items by opaque IDs only, so a path is translated by listing one
//! folder per level from the root. Every child seen along the way is remembered in a
//! process-lifetime [`PathCache`]; a cached path costs a single fetch of the item
//! itself. Missing folders can be created on demand.

pub mod cache;
pub mod materializer;
pub mod walker;

#[cfg(test)]
mod fake;

use std::future::Future;

use cloudstore_core::{CloudStorageError, ItemKind};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::RemoteItems;
use crate::models::BoxItem;

pub use cache::{CacheEntry, Lookup, PathCache, PathKey};
pub use walker::WalkResult;

pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// The kind of item a caller is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    File,
    Folder,
    /// Either kind; only valid when the item must already exist.
    Unknown,
}

impl From<ItemKind> for ItemType {
    fn from(kind: ItemKind) -> Self {
        match kind {
            ItemKind::File => ItemType::File,
            ItemKind::Folder => ItemType::Folder,
        }
    }
}

pub struct ItemResolver<R> {
    remote: R,
    cache: PathCache,
    page_size: u32,
    materialize_lock: Mutex<()>,
}

impl<R: RemoteItems> ItemResolver<R> {
    pub fn new(remote: R) -> Self {
        Self::with_page_size(remote, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(remote: R, page_size: u32) -> Self {
        Self {
            remote,
            cache: PathCache::new(),
            page_size: page_size.max(1),
            materialize_lock: Mutex::new(()),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Records an item this process created, e.g. an upload or a copy.
    pub fn remember(&self, path: &str, id: &str, is_folder: bool) -> bool {
        let entry = CacheEntry {
            id: id.to_string(),
            is_folder,
        };
        self.cache.insert(PathKey::normalize(path), entry)
    }

    pub async fn resolve(
        &self,
        path: &str,
        desired: ItemType,
        error_if_missing: bool,
    ) -> Result<BoxItem, CloudStorageError> {
        self.resolve_with_cancel(path, desired, error_if_missing, &CancellationToken::new())
            .await
    }

    pub async fn resolve_file(
        &self,
        path: &str,
        error_if_missing: bool,
    ) -> Result<BoxItem, CloudStorageError> {
        self.resolve_file_with_cancel(path, error_if_missing, &CancellationToken::new())
            .await
    }

    pub async fn resolve_folder(
        &self,
        path: &str,
        error_if_missing: bool,
    ) -> Result<BoxItem, CloudStorageError> {
        self.resolve_folder_with_cancel(path, error_if_missing, &CancellationToken::new())
            .await
    }

    pub async fn resolve_file_with_cancel(
        &self,
        path: &str,
        error_if_missing: bool,
        cancel: &CancellationToken,
    ) -> Result<BoxItem, CloudStorageError> {
        let item = self
            .resolve_with_cancel(path, ItemType::File, error_if_missing, cancel)
            .await?;
        expect_kind(item, path, ItemKind::File)
    }

    pub async fn resolve_folder_with_cancel(
        &self,
        path: &str,
        error_if_missing: bool,
        cancel: &CancellationToken,
    ) -> Result<BoxItem, CloudStorageError> {
        let item = self
            .resolve_with_cancel(path, ItemType::Folder, error_if_missing, cancel)
            .await?;
        expect_kind(item, path, ItemKind::Folder)
    }

    /// Resolves `path` to a freshly fetched item.
    ///
    /// With `error_if_missing` unset, missing folders are created; asking to create
    /// an item of [`ItemType::Unknown`] is rejected up front.
    pub async fn resolve_with_cancel(
        &self,
        path: &str,
        desired: ItemType,
        error_if_missing: bool,
        cancel: &CancellationToken,
    ) -> Result<BoxItem, CloudStorageError> {
        if desired == ItemType::Unknown && !error_if_missing {
            return Err(CloudStorageError::InvalidArgument(
                "cannot create an item of unknown type".to_string(),
            ));
        }

        let key = PathKey::normalize(path);
        if key.is_root() {
            return Ok(BoxItem::root());
        }

        if let Lookup::Hit(entry) = self.cache.lookup(&key) {
            debug!(path = %key, id = %entry.id, "path cache hit");
            return self.fetch(&entry, cancel).await;
        }

        let walk = walker::walk(&self.remote, &self.cache, &key, self.page_size, cancel).await?;
        if walk.fully_resolved {
            return self.fetch(&walk.ancestor(), cancel).await;
        }
        if error_if_missing {
            return Err(CloudStorageError::ItemNotFound(format!("{key} does not exist")));
        }
        match desired {
            ItemType::Folder if walk.stopped_at_file() => Err(file_in_the_way(&key, &walk)),
            ItemType::Folder => self.materialize_folder(&key, cancel).await,
            ItemType::File => Err(CloudStorageError::Unsupported(format!(
                "cannot create file {key} by path"
            ))),
            ItemType::Unknown => Err(CloudStorageError::InvalidArgument(
                "cannot create an item of unknown type".to_string(),
            )),
        }
    }

    /// Creation is serialised; the walk is repeated under the lock so a folder
    /// created by a concurrent caller is found rather than created twice.
    async fn materialize_folder(
        &self,
        key: &PathKey,
        cancel: &CancellationToken,
    ) -> Result<BoxItem, CloudStorageError> {
        let _guard = cancellable(cancel, async { Ok(self.materialize_lock.lock().await) }).await?;

        let walk = walker::walk(&self.remote, &self.cache, key, self.page_size, cancel).await?;
        if walk.fully_resolved {
            return self.fetch(&walk.ancestor(), cancel).await;
        }
        if walk.stopped_at_file() {
            return Err(file_in_the_way(key, &walk));
        }
        materializer::materialize(
            &self.remote,
            &self.cache,
            &walk.ancestor(),
            key,
            walk.first_unresolved,
            ItemType::Folder,
            cancel,
        )
        .await
    }

    async fn fetch(
        &self,
        entry: &CacheEntry,
        cancel: &CancellationToken,
    ) -> Result<BoxItem, CloudStorageError> {
        if entry.is_folder {
            cancellable(cancel, self.remote.get_folder(&entry.id)).await
        } else {
            cancellable(cancel, self.remote.get_file(&entry.id)).await
        }
    }
}

/// Races `fut` against `cancel`; an already cancelled token wins without polling `fut`.
pub(crate) async fn cancellable<T, F>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, CloudStorageError>
where
    F: Future<Output = Result<T, CloudStorageError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CloudStorageError::Cancelled),
        result = fut => result,
    }
}

fn expect_kind(item: BoxItem, path: &str, expected: ItemKind) -> Result<BoxItem, CloudStorageError> {
    if item.kind() == Some(expected) {
        Ok(item)
    } else {
        Err(CloudStorageError::WrongItemType {
            path: PathKey::normalize(path).to_remote_path(),
            expected,
        })
    }
}

fn file_in_the_way(key: &PathKey, walk: &WalkResult) -> CloudStorageError {
    CloudStorageError::WrongItemType {
        path: key.prefix(walk.first_unresolved).to_remote_path(),
        expected: ItemKind::Folder,
    }
}
